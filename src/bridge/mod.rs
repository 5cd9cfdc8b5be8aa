//! Effects as query and mutation bodies.
//!
//! This module connects the three halves of the crate:
//!
//! - a [`RuntimeScope`] builds a [`Runtime`](crate::runtime::Runtime) from a
//!   [`Layer`](crate::layer::Layer) for the lifetime of a reactive owner;
//! - a [`RuntimeAccessor`] says where a hook finds its runtime (a scope's
//!   provider, a fixed runtime or the global one);
//! - [`EffectQueries`] turns effect-returning options into a key function
//!   and a fetcher for [`leptos_query`], running each fetch with
//!   [`run_promise_unwrapped`](crate::runtime::run_promise_unwrapped)
//!   on the runtime resolved when the fetch starts.
//!
//! Owners, signals and cleanup come from [`leptos_reactive`]. Create a
//! reactive runtime and provide a query client before mounting anything:
//!
//! ```rust,ignore
//! let _reactive = leptos_reactive::create_runtime();
//! provide_query_client();
//! let provider = scope.provider(args, || { /* hooks */ });
//! ```
//!
//! Query errors are [`QueryError`](crate::runtime::QueryError)s: the full
//! cause by default, or the unwrapped expected failure with
//! `throw_on_defect`.

mod accessor;
mod boundary;
mod hooks;
mod infinite;
mod mutation;
mod query;
mod scope;

pub use accessor::{RuntimeAccessor, RuntimeStatus};
pub use boundary::{throw_error, ErrorBoundary, ThrownError};
pub use hooks::{
    make_query_hook, EffectInfiniteQueryOptions, EffectMutationOptions, EffectQueries,
    EffectQueryOptions, MutationSettings, QuerySettings,
};
pub use infinite::{EffectInfiniteQuery, InfiniteData, PageContext};
pub use mutation::{EffectMutation, MutationState, MutationStatus};
pub use query::{CacheValue, EffectQuery, QueryFnContext, QueryOutcome, QueryStatus};
pub use scope::{make_runtime_scope, RuntimeProvider, RuntimeScope};

pub(crate) use hooks::{prepare_mutation, prepare_query};
pub(crate) use query::observe;

#[cfg(test)]
mod tests;
