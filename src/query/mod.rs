//! Cache keys, and the query cache the bridge feeds.
//!
//! Caching, staleness, deduplication and garbage collection belong to
//! [`leptos_query`]. A [`QueryClient`] is provided once per reactive tree
//! with [`provide_query_client`]; every bridged query stores its outcome in
//! it under a [`QueryKey`].
//!
//! ```rust,ignore
//! let runtime = create_runtime();
//! provide_query_client();
//! let key = query_key!["todos", { "done": false }];
//! ```
//!
//! Cached values must be serializable. The cache may ship them across a
//! server/client boundary, so every bridged query requires its success and
//! error types to implement [`CacheValue`](crate::bridge::CacheValue).

mod key;

pub use key::QueryKey;
pub use leptos_query::{
    provide_query_client, provide_query_client_with_options, use_query_client,
    DefaultQueryOptions, QueryClient, QueryData, QueryState,
};

pub(crate) use key::isolated_key;
