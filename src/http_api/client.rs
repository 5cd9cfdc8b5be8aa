//! The HTTP transport seam and the typed API client built on it.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::context::{Context, Tag};
use crate::effect::boxed::BoxFuture;
use crate::effect::cause::{Cause, Defect};
use crate::effect::constructors::from_async;
use crate::effect::ext::EffectExt;
use crate::effect::scope::{scoped, Scope};
use crate::effect::tracing::EffectTracingExt;
use crate::effect::trait_def::Effect;
use crate::http_api::endpoint::{fill_path, EndpointRequest, HttpEndpoint, HttpMethod, RequestPart};

/// A fully built request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL including the query string.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body, if the endpoint declares a payload.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First header named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        HttpResponse {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: body.to_string().into_bytes(),
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.body.is_empty() {
            serde_json::from_slice(b"null")
        } else {
            serde_json::from_slice(&self.body)
        }
    }

    /// The body as lossy UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A request that produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum HttpClientError {
    /// The connection failed.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The request timed out.
    #[error("request timed out")]
    Timeout,
    /// A non-2xx status whose body is not the endpoint's error.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// Status code
        status: u16,
        /// Response body
        body: String,
    },
}

/// Sends requests.
///
/// Resources tied to one request (connections, abort handles) are registered
/// on `scope`, which is closed when the call finishes or is interrupted.
pub trait HttpClient: Send + Sync {
    /// Send `request`.
    fn execute(
        &self,
        request: HttpRequest,
        scope: &Scope,
    ) -> BoxFuture<'static, Result<HttpResponse, HttpClientError>>;
}

/// Context tag for the [`HttpClient`] a runtime provides.
#[derive(Debug)]
pub struct HttpClientService;

impl Tag for HttpClientService {
    type Service = Arc<dyn HttpClient>;
    const NAME: &'static str = "HttpClient";
}

type TransformClient = Arc<dyn Fn(Arc<dyn HttpClient>) -> Arc<dyn HttpClient> + Send + Sync>;

/// Where and how an API client connects.
#[derive(Clone)]
pub struct ConnectionOptions {
    base_url: String,
    transform_client: Option<TransformClient>,
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("base_url", &self.base_url)
            .field("transform_client", &self.transform_client.is_some())
            .finish()
    }
}

impl ConnectionOptions {
    /// Connect to `base_url`. A trailing `/` is dropped.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        ConnectionOptions {
            base_url,
            transform_client: None,
        }
    }

    /// Wrap the runtime's [`HttpClient`] before use, e.g. to add headers.
    pub fn transform_client(
        mut self,
        f: impl Fn(Arc<dyn HttpClient>) -> Arc<dyn HttpClient> + Send + Sync + 'static,
    ) -> Self {
        self.transform_client = Some(Arc::new(f));
        self
    }

    /// The base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// An endpoint call that did not succeed.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum HttpApiError<E> {
    /// The endpoint's declared error.
    #[error("endpoint failed: {0:?}")]
    Endpoint(E),
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] HttpClientError),
    /// A 2xx body did not decode as the declared success.
    #[error("undecodable response: {0}")]
    Decode(String),
}

/// Typed client for the endpoints of `Api`.
pub struct HttpApiClient<Api> {
    http: Arc<dyn HttpClient>,
    base_url: Arc<str>,
    _api: PhantomData<fn() -> Api>,
}

impl<Api> Clone for HttpApiClient<Api> {
    fn clone(&self) -> Self {
        HttpApiClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            _api: PhantomData,
        }
    }
}

impl<Api> fmt::Debug for HttpApiClient<Api> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl<Api: Send + Sync + 'static> HttpApiClient<Api> {
    /// A client sending through `http`.
    pub fn new(http: Arc<dyn HttpClient>, options: &ConnectionOptions) -> Self {
        let http = match &options.transform_client {
            Some(transform) => transform(http),
            None => http,
        };
        HttpApiClient {
            http,
            base_url: Arc::from(options.base_url.as_str()),
            _api: PhantomData,
        }
    }

    /// An effect calling `Ep` with `request`.
    pub fn endpoint<Ep>(&self, request: EndpointRequest<Ep>) -> EndpointCall<Ep>
    where
        Ep: HttpEndpoint<Api = Api>,
    {
        EndpointCall {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            request,
        }
    }
}

/// Effect performing one endpoint call in its own [`Scope`].
pub struct EndpointCall<Ep: HttpEndpoint> {
    http: Arc<dyn HttpClient>,
    base_url: Arc<str>,
    request: EndpointRequest<Ep>,
}

impl<Ep: HttpEndpoint> fmt::Debug for EndpointCall<Ep> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointCall")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

fn encode_defect<Ep: HttpEndpoint>(part: &str, message: impl fmt::Display) -> Defect {
    Defect::Decode {
        what: format!("{}.{} {}", Ep::GROUP, Ep::NAME, part),
        message: message.to_string(),
    }
}

/// Turn a typed request into the wire request. Failures are programming
/// errors in the endpoint's schema.
pub(crate) fn build_request<Ep: HttpEndpoint>(
    base_url: &str,
    request: &EndpointRequest<Ep>,
) -> Result<HttpRequest, Defect> {
    let mut path_params = None;
    let mut body = None;
    let mut headers = Vec::new();
    let parts = request
        .present_parts()
        .map_err(|err| encode_defect::<Ep>(err.part, err.source))?;
    for (part, value) in parts {
        match part {
            "path" => path_params = Some(value),
            "payload" => body = Some(value.to_string().into_bytes()),
            "headers" => headers = header_pairs(&value).map_err(|m| encode_defect::<Ep>(part, m))?,
            _ => {}
        }
    }
    if body.is_some() {
        headers.push(("content-type".into(), "application/json".into()));
    }

    let path = fill_path(Ep::PATH, path_params.as_ref()).map_err(|m| encode_defect::<Ep>("path", m))?;
    let mut url = format!("{}{}", base_url, path);
    if <Ep::UrlParams as RequestPart>::PRESENT {
        let query = serde_urlencoded::to_string(&request.url_params)
            .map_err(|err| encode_defect::<Ep>("url params", err))?;
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
    }

    Ok(HttpRequest {
        method: Ep::METHOD,
        url,
        headers,
        body,
    })
}

fn header_pairs(value: &Value) -> Result<Vec<(String, String)>, String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("headers must serialize to an object, got {}", value))?;
    let mut pairs = Vec::with_capacity(object.len());
    for (name, value) in object {
        match value {
            Value::Null => {}
            Value::String(s) => pairs.push((name.clone(), s.clone())),
            Value::Number(_) | Value::Bool(_) => pairs.push((name.clone(), value.to_string())),
            other => return Err(format!("header `{}` is not a scalar: {}", name, other)),
        }
    }
    Ok(pairs)
}

fn decode_response<Ep: HttpEndpoint>(
    response: HttpResponse,
) -> Result<Ep::Success, HttpApiError<Ep::Error>> {
    if response.is_success() {
        return response
            .decode()
            .map_err(|err| HttpApiError::Decode(format!("{}.{}: {}", Ep::GROUP, Ep::NAME, err)));
    }
    match response.decode::<Ep::Error>() {
        Ok(error) => Err(HttpApiError::Endpoint(error)),
        Err(_) => Err(HttpApiError::Transport(HttpClientError::Status {
            status: response.status,
            body: response.text(),
        })),
    }
}

impl<Ep: HttpEndpoint> Effect for EndpointCall<Ep> {
    type Output = Ep::Success;
    type Error = HttpApiError<Ep::Error>;
    type Env = Context;

    async fn run(self, env: &Context) -> Result<Ep::Success, Cause<HttpApiError<Ep::Error>>> {
        let request = build_request::<Ep>(&self.base_url, &self.request)?;
        tracing::debug!(
            endpoint = Ep::NAME,
            group = Ep::GROUP,
            method = %request.method,
            url = %request.url,
            "http api call"
        );
        let http = self.http;
        let response = scoped(move |scope: &Scope| {
            let sent = http.execute(request, scope);
            from_async(move |_: &Context| sent)
        })
        .map_err(HttpApiError::<Ep::Error>::Transport)
        .run(env)
        .await?;
        decode_response::<Ep>(response).map_err(Cause::Fail)
    }
}

/// Builds the [`HttpApiClient`] once, from the first runtime that asks.
pub(crate) struct Connector<Api> {
    cell: Arc<OnceCell<HttpApiClient<Api>>>,
    options: ConnectionOptions,
}

impl<Api> Clone for Connector<Api> {
    fn clone(&self) -> Self {
        Connector {
            cell: self.cell.clone(),
            options: self.options.clone(),
        }
    }
}

impl<Api> fmt::Debug for Connector<Api> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("options", &self.options)
            .field("connected", &self.cell.initialized())
            .finish()
    }
}

impl<Api: Send + Sync + 'static> Connector<Api> {
    pub(crate) fn new(options: ConnectionOptions) -> Self {
        Connector {
            cell: Arc::new(OnceCell::new()),
            options,
        }
    }

    /// Connect, then call `Ep`.
    pub(crate) fn call<Ep>(
        &self,
        request: EndpointRequest<Ep>,
    ) -> impl Effect<Output = Ep::Success, Error = HttpApiError<Ep::Error>, Env = Context> + 'static
    where
        Ep: HttpEndpoint<Api = Api>,
    {
        Connect {
            connector: self.clone(),
            _error: PhantomData::<fn() -> HttpApiError<Ep::Error>>,
        }
        .and_then(move |client| client.endpoint::<Ep>(request))
        .instrument(tracing::debug_span!(
            "http_api",
            group = Ep::GROUP,
            endpoint = Ep::NAME
        ))
    }
}

struct Connect<Api, E> {
    connector: Connector<Api>,
    _error: PhantomData<fn() -> E>,
}

impl<Api, E> Effect for Connect<Api, E>
where
    Api: Send + Sync + 'static,
    E: Send,
{
    type Output = HttpApiClient<Api>;
    type Error = E;
    type Env = Context;

    async fn run(self, env: &Context) -> Result<HttpApiClient<Api>, Cause<E>> {
        let Connector { cell, options } = self.connector;
        let http = env
            .get::<HttpClientService>()
            .ok_or(Defect::missing_service(HttpClientService::NAME))?;
        let client = cell
            .get_or_init(|| async move {
                tracing::debug!(base_url = %options.base_url, "connecting http api client");
                HttpApiClient::new(http, &options)
            })
            .await;
        Ok(client.clone())
    }
}
