//! Typed RPC procedures as queries and mutations.
//!
//! A [`Procedure`] names a remote call and fixes its payload, success and
//! error types. An [`RpcClient`] registered in the runtime's context sends
//! calls through an [`RpcTransport`]. [`make_rpc_hooks`] binds query and
//! mutation hooks to the client's tag and a [`RuntimeAccessor`](crate::bridge::RuntimeAccessor);
//! [`rpc_query`] and [`rpc_mutation`] do the same per call.
//!
//! Query keys are `[procedure name, payload]`, so a payload read from a
//! signal refetches whenever it changes to a structurally different value.

mod client;
mod hooks;
mod schema;

pub use client::{RpcCall, RpcClient};
pub use hooks::{
    make_rpc_hooks, rpc_effect, rpc_mutation, rpc_query, rpc_query_key, RpcHooks,
};
pub use schema::{Procedure, RpcGroup, RpcReply, RpcTransport, RpcTransportError};

#[cfg(test)]
mod tests;
