//! # Stillwater Query
//!
//! > *"Still waters run pure"*
//!
//! Effects as the bodies of cached, reactive queries and mutations.
//!
//! ## Philosophy
//!
//! Queries and mutations are described as [`Effect`]s: lazy, typed
//! computations that read their services from a [`Context`] and fail with a
//! [`Cause`] that keeps expected errors, defects and interruption apart. A
//! [`Runtime`] built from a [`Layer`] runs them; the [`bridge`] hands that
//! runtime to a [`leptos_reactive`] owner tree and to the [`leptos_query`]
//! cache.
//!
//! - **Still** = effect descriptions (nothing runs until a runtime runs it)
//! - **Water** = the runtime, the cache and the reactive graph they feed
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use stillwater_query::prelude::*;
//!
//! let scope = make_runtime_scope(|_: &()| Layer::<String>::succeed::<UsersTag>(Users::new()));
//!
//! let _reactive = leptos_reactive::create_runtime();
//! provide_query_client();
//! let provider = scope.provider((), || {
//!     let user = scope.use_effect_query(|| {
//!         EffectQueryOptions::new(query_key!["user", 1], |_| {
//!             service::<UsersTag, String>().and_then(|users| users.find(1))
//!         })
//!     });
//!     // user.data(), user.error(), user.is_pending() ...
//! });
//! // later: provider.dispose().await
//! ```
//!
//! Fetches run on local tasks, so the reactive code lives inside a
//! [`tokio::task::LocalSet`].
//!
//! ## Modules
//!
//! - [`effect`]: the effect trait, constructors, combinators, causes, exits
//! - [`context`] and [`layer`]: typed services and how they are built
//! - [`runtime`]: runtimes and the promise-style adapter
//! - [`query`]: cache keys and the query client re-exported from `leptos_query`
//! - [`bridge`]: runtime scopes, error boundaries and effect-bodied hooks
//! - [`rpc`]: typed RPC procedures as queries and mutations
//! - [`http_api`]: typed HTTP endpoints as queries and mutations

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod bridge;
pub mod context;
pub mod effect;
pub mod http_api;
pub mod layer;
pub mod query;
pub mod rpc;
pub mod runtime;

// Re-exports
pub use context::{service, Context, Tag};
pub use effect::{Cause, Defect, Effect, EffectExt, Exit};
pub use layer::Layer;
pub use runtime::{QueryError, RunOptions, Runtime};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::effect::prelude::*;

    pub use crate::bridge::{
        make_query_hook, make_runtime_scope, throw_error, EffectInfiniteQuery,
        EffectInfiniteQueryOptions, EffectMutation, EffectMutationOptions, EffectQueries,
        EffectQuery, EffectQueryOptions, ErrorBoundary, MutationSettings, QuerySettings,
        RuntimeAccessor, RuntimeProvider, RuntimeStatus, ThrownError,
    };
    pub use crate::layer::Layer;
    pub use crate::query::{provide_query_client, use_query_client, QueryClient, QueryKey};
    pub use crate::query_key;
    pub use crate::runtime::{
        run_promise, run_promise_exit, run_promise_unwrapped, GlobalRuntime, QueryError,
        RunOptions, Runtime,
    };
}
