//! The RPC client service and its call effect.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::Context;
use crate::effect::cause::{Cause, Defect};
use crate::effect::trait_def::Effect;
use crate::rpc::schema::{Procedure, RpcGroup, RpcReply, RpcTransport};

/// Client for the procedures of group `G`.
///
/// Register it in a runtime's context under a [`Tag`](crate::context::Tag)
/// whose service is `RpcClient<G>`.
pub struct RpcClient<G> {
    transport: Arc<dyn RpcTransport>,
    _group: PhantomData<fn() -> G>,
}

impl<G> Clone for RpcClient<G> {
    fn clone(&self) -> Self {
        RpcClient {
            transport: self.transport.clone(),
            _group: PhantomData,
        }
    }
}

impl<G: RpcGroup> fmt::Debug for RpcClient<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient").field("group", &G::NAME).finish()
    }
}

impl<G: RpcGroup> RpcClient<G> {
    /// A client sending calls through `transport`.
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        RpcClient {
            transport,
            _group: PhantomData,
        }
    }

    /// An effect calling procedure `P` with `payload`.
    pub fn call<P>(&self, payload: P::Payload) -> RpcCall<P>
    where
        P: Procedure<Group = G>,
    {
        RpcCall {
            transport: self.transport.clone(),
            payload,
            _procedure: PhantomData,
        }
    }
}

/// Effect performing one procedure call.
///
/// Fails with the procedure's declared error. Transport failures and
/// undecodable replies are defects.
pub struct RpcCall<P: Procedure> {
    transport: Arc<dyn RpcTransport>,
    payload: P::Payload,
    _procedure: PhantomData<fn() -> P>,
}

impl<P: Procedure> fmt::Debug for RpcCall<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcCall")
            .field("procedure", &P::NAME)
            .finish_non_exhaustive()
    }
}

fn decode_defect(what: String, err: serde_json::Error) -> Defect {
    Defect::Decode {
        what,
        message: err.to_string(),
    }
}

impl<P: Procedure> Effect for RpcCall<P> {
    type Output = P::Success;
    type Error = P::Error;
    type Env = Context;

    async fn run(self, _env: &Context) -> Result<P::Success, Cause<P::Error>> {
        let payload = serde_json::to_value(&self.payload)
            .map_err(|err| decode_defect(format!("{} payload", P::NAME), err))?;
        tracing::debug!(
            group = <P::Group as RpcGroup>::NAME,
            procedure = P::NAME,
            "rpc call"
        );
        let reply = self
            .transport
            .send(P::NAME, payload)
            .await
            .map_err(|err| {
                tracing::warn!(procedure = P::NAME, error = %err, "rpc transport failed");
                Defect::Transport(err.to_string())
            })?;
        match reply {
            RpcReply::Success(value) => serde_json::from_value(value)
                .map_err(|err| decode_defect(format!("{} response", P::NAME), err).into()),
            RpcReply::Failure(value) => {
                let error = serde_json::from_value(value)
                    .map_err(|err| decode_defect(format!("{} error", P::NAME), err))?;
                Err(Cause::Fail(error))
            }
        }
    }
}
