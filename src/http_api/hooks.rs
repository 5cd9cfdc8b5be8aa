//! Query and mutation hooks for HTTP endpoints.
//!
//! Each call names its runtime explicitly. The runtime must provide an
//! [`HttpClientService`](crate::http_api::HttpClientService).

use std::fmt;

use crate::bridge::{
    observe, prepare_mutation, prepare_query, EffectMutation, EffectMutationOptions, EffectQuery,
    EffectQueryOptions, MutationSettings, QuerySettings, RuntimeAccessor,
};
use crate::http_api::client::{ConnectionOptions, Connector, HttpApiError};
use crate::http_api::endpoint::{EndpointRequest, HttpApi, HttpEndpoint, UnserializablePart};
use crate::query::{isolated_key, QueryKey};
use crate::runtime::Runtime;

/// Cache key of a call to `Ep`:
/// `["httpApi", group, endpoint, ...declared parts]`.
///
/// Declared parts follow in the order path, URL parameters, payload,
/// headers. Parts the endpoint does not declare are left out. A request
/// with a part that does not serialize has no key.
pub fn http_api_query_key<Ep: HttpEndpoint>(
    request: &EndpointRequest<Ep>,
) -> Result<QueryKey, UnserializablePart> {
    Ok(request
        .present_parts()?
        .into_iter()
        .fold(endpoint_key::<Ep>(), |key, (_, value)| key.push(value)))
}

fn endpoint_key<Ep: HttpEndpoint>() -> QueryKey {
    QueryKey::new().push("httpApi").push(Ep::GROUP).push(Ep::NAME)
}

/// Per-call options of [`HttpApiQuery::use_query`].
pub struct HttpQueryOptions<Ep: HttpEndpoint> {
    runtime: Runtime,
    request: EndpointRequest<Ep>,
    settings: QuerySettings<HttpApiError<Ep::Error>>,
}

impl<Ep: HttpEndpoint> fmt::Debug for HttpQueryOptions<Ep> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpQueryOptions")
            .field("runtime", &self.runtime)
            .field("request", &self.request)
            .field("settings", &self.settings)
            .finish()
    }
}

impl<Ep: HttpEndpoint> HttpQueryOptions<Ep> {
    /// Call `Ep` with `request` on `runtime`.
    pub fn new(runtime: Runtime, request: EndpointRequest<Ep>) -> Self {
        HttpQueryOptions {
            runtime,
            request,
            settings: QuerySettings::default(),
        }
    }

    /// Replace the query settings.
    pub fn settings(mut self, settings: QuerySettings<HttpApiError<Ep::Error>>) -> Self {
        self.settings = settings;
        self
    }

    /// Whether the query may fetch.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.settings = self.settings.enabled(enabled);
        self
    }

    /// Report a lone expected failure as [`QueryError::Failure`](crate::runtime::QueryError::Failure).
    pub fn throw_on_defect(mut self, throw_on_defect: bool) -> Self {
        self.settings = self.settings.throw_on_defect(throw_on_defect);
        self
    }
}

/// Per-call options of [`HttpApiMutation::use_mutation`].
pub struct HttpMutationOptions<Ep: HttpEndpoint> {
    runtime: Runtime,
    settings: MutationSettings<EndpointRequest<Ep>, Ep::Success, HttpApiError<Ep::Error>>,
}

impl<Ep: HttpEndpoint> fmt::Debug for HttpMutationOptions<Ep> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMutationOptions")
            .field("runtime", &self.runtime)
            .field("settings", &self.settings)
            .finish()
    }
}

impl<Ep: HttpEndpoint> HttpMutationOptions<Ep> {
    /// Call `Ep` on `runtime`.
    pub fn new(runtime: Runtime) -> Self {
        HttpMutationOptions {
            runtime,
            settings: MutationSettings::default(),
        }
    }

    /// Replace the mutation settings and callbacks.
    pub fn settings(
        mut self,
        settings: MutationSettings<EndpointRequest<Ep>, Ep::Success, HttpApiError<Ep::Error>>,
    ) -> Self {
        self.settings = settings;
        self
    }
}

/// Query hook over the endpoints of `Api`.
pub struct HttpApiQuery<Api> {
    connector: Connector<Api>,
}

impl<Api> Clone for HttpApiQuery<Api> {
    fn clone(&self) -> Self {
        HttpApiQuery {
            connector: self.connector.clone(),
        }
    }
}

impl<Api: HttpApi> fmt::Debug for HttpApiQuery<Api> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApiQuery")
            .field("api", &Api::NAME)
            .field("connector", &self.connector)
            .finish()
    }
}

/// A query hook for `Api`, connecting with `options`.
///
/// The [`HttpApiClient`](crate::http_api::HttpApiClient) is built on first
/// use and shared by every query of this hook.
pub fn make_http_api_query<Api: HttpApi>(options: ConnectionOptions) -> HttpApiQuery<Api> {
    HttpApiQuery {
        connector: Connector::new(options),
    }
}

impl<Api: HttpApi> HttpApiQuery<Api> {
    /// Observe endpoint `Ep`.
    ///
    /// `options` is read reactively; a changed request means a new key. A
    /// request without a key is cached under a key private to this call
    /// site and dies with [`Defect::Decode`](crate::effect::Defect::Decode)
    /// when sent.
    pub fn use_query<Ep>(
        &self,
        options: impl Fn() -> HttpQueryOptions<Ep> + 'static,
    ) -> EffectQuery<Ep::Success, HttpApiError<Ep::Error>>
    where
        Ep: HttpEndpoint<Api = Api>,
    {
        let connector = self.connector.clone();
        let unkeyed = isolated_key(endpoint_key::<Ep>());
        observe(&RuntimeAccessor::missing(), move || {
            let HttpQueryOptions {
                runtime,
                request,
                settings,
            } = options();
            let key = http_api_query_key(&request).unwrap_or_else(|err| {
                tracing::warn!(endpoint = Ep::NAME, error = %err, "request has no query key");
                unkeyed.clone()
            });
            let connector = connector.clone();
            let mut prepared = prepare_query(
                EffectQueryOptions::new(key, move |_| connector.call::<Ep>(request.clone()))
                    .settings(settings),
            );
            prepared.accessor = Some(RuntimeAccessor::fixed(runtime));
            prepared
        })
    }
}

/// Mutation hook over the endpoints of `Api`.
pub struct HttpApiMutation<Api> {
    connector: Connector<Api>,
}

impl<Api> Clone for HttpApiMutation<Api> {
    fn clone(&self) -> Self {
        HttpApiMutation {
            connector: self.connector.clone(),
        }
    }
}

impl<Api: HttpApi> fmt::Debug for HttpApiMutation<Api> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApiMutation")
            .field("api", &Api::NAME)
            .field("connector", &self.connector)
            .finish()
    }
}

/// A mutation hook for `Api`, connecting with `options`.
pub fn make_http_api_mutation<Api: HttpApi>(options: ConnectionOptions) -> HttpApiMutation<Api> {
    HttpApiMutation {
        connector: Connector::new(options),
    }
}

impl<Api: HttpApi> HttpApiMutation<Api> {
    /// A mutation calling `Ep` with the request passed to `mutate`.
    ///
    /// Its key is `["httpApi", group, endpoint]`.
    pub fn use_mutation<Ep>(
        &self,
        options: impl Fn() -> HttpMutationOptions<Ep> + 'static,
    ) -> EffectMutation<EndpointRequest<Ep>, Ep::Success, HttpApiError<Ep::Error>>
    where
        Ep: HttpEndpoint<Api = Api>,
    {
        let connector = self.connector.clone();
        EffectMutation::new(RuntimeAccessor::missing(), move || {
            let HttpMutationOptions { runtime, settings } = options();
            let connector = connector.clone();
            let mut prepared = prepare_mutation(
                EffectMutationOptions::new(move |request: EndpointRequest<Ep>| {
                    connector.call::<Ep>(request)
                })
                .key(endpoint_key::<Ep>())
                .settings(settings),
            );
            prepared.accessor = Some(RuntimeAccessor::fixed(runtime));
            prepared
        })
    }
}
