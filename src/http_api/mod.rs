//! Typed HTTP endpoints as queries and mutations.
//!
//! An [`HttpApi`] is described by its [`HttpEndpoint`]s: group, name,
//! method, path template and the typed parts of a request. A hook made with
//! [`make_http_api_query`] or [`make_http_api_mutation`] builds one
//! [`HttpApiClient`] from [`ConnectionOptions`] and the
//! [`HttpClientService`] of the first runtime it runs on.
//!
//! Unlike the [`rpc`](crate::rpc) hooks, every call names its
//! [`Runtime`](crate::runtime::Runtime) in its options rather than
//! resolving one from the reactive scope. The transport's services are
//! assembled per call site.
//!
//! Keys are `["httpApi", group, endpoint, ...parts]`, listing only the
//! request parts the endpoint declares.

mod client;
mod endpoint;
mod hooks;

pub use client::{
    ConnectionOptions, EndpointCall, HttpApiClient, HttpApiError, HttpClient, HttpClientError,
    HttpClientService, HttpRequest, HttpResponse,
};
pub use endpoint::{
    EndpointRequest, HttpApi, HttpEndpoint, HttpMethod, RequestPart, UnserializablePart,
};
pub use hooks::{
    http_api_query_key, make_http_api_mutation, make_http_api_query, HttpApiMutation,
    HttpApiQuery, HttpMutationOptions, HttpQueryOptions,
};
