//! Procedure schemas and the transport they travel over.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::effect::boxed::BoxFuture;

/// A named group of procedures served by one endpoint.
pub trait RpcGroup: Send + Sync + 'static {
    /// Group name, used in logs.
    const NAME: &'static str;
}

/// One remote procedure.
///
/// ```rust,ignore
/// struct GetTodo;
/// impl Procedure for GetTodo {
///     type Group = TodoRpcs;
///     const NAME: &'static str = "getTodo";
///     type Payload = GetTodoPayload;
///     type Success = Todo;
///     type Error = TodoNotFound;
/// }
/// ```
pub trait Procedure: Send + Sync + 'static {
    /// The group serving this procedure.
    type Group: RpcGroup;

    /// Wire name of the procedure.
    const NAME: &'static str;

    /// Request payload.
    type Payload: Serialize + Clone + Send + Sync + 'static;

    /// Successful response. Cached, hence `Serialize`.
    type Success: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + 'static;

    /// Declared failure, delivered as the expected error of the call.
    type Error: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + 'static;
}

/// What the server answered, before decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_tag", content = "value")]
pub enum RpcReply {
    /// The procedure succeeded.
    Success(Value),
    /// The procedure failed with its declared error.
    Failure(Value),
}

/// A request never produced a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcTransportError {
    /// The connection failed.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The server rejected the request outside of the procedure.
    #[error("server responded with status {status}: {message}")]
    Status {
        /// Status code
        status: u16,
        /// Server message
        message: String,
    },
    /// No procedure with this name is served.
    #[error("unknown procedure `{0}`")]
    UnknownProcedure(String),
}

/// Moves encoded calls to a server and back.
pub trait RpcTransport: Send + Sync {
    /// Invoke `procedure` with an encoded payload.
    fn send(
        &self,
        procedure: &'static str,
        payload: Value,
    ) -> BoxFuture<'static, Result<RpcReply, RpcTransportError>>;
}
