//! Endpoint schemas.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// An HTTP API: a named set of endpoint groups.
pub trait HttpApi: Send + Sync + 'static {
    /// API name, used in logs.
    const NAME: &'static str;
}

/// Request method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a request: path parameters, URL parameters, payload or
/// headers.
///
/// An endpoint that takes no such part declares it as `()`, which is the
/// only part with `PRESENT = false`. Absent parts are left out of the cache
/// key and the request.
pub trait RequestPart: Serialize + Clone + Send + Sync + 'static {
    /// Whether the endpoint declares this part.
    const PRESENT: bool = true;
}

impl RequestPart for () {
    const PRESENT: bool = false;
}

impl RequestPart for String {}
impl RequestPart for Value {}
impl RequestPart for BTreeMap<String, String> {}
impl RequestPart for HashMap<String, String> {}
impl RequestPart for Vec<(String, String)> {}

/// One endpoint of an [`HttpApi`].
///
/// ```rust,ignore
/// struct GetTodo;
/// impl HttpEndpoint for GetTodo {
///     type Api = TodoApi;
///     const GROUP: &'static str = "todos";
///     const NAME: &'static str = "getTodo";
///     const METHOD: HttpMethod = HttpMethod::Get;
///     const PATH: &'static str = "/todos/:id";
///     type Path = TodoId;
///     type UrlParams = ();
///     type Payload = ();
///     type Headers = ();
///     type Success = Todo;
///     type Error = TodoNotFound;
/// }
/// ```
pub trait HttpEndpoint: Send + Sync + 'static {
    /// The API this endpoint belongs to.
    type Api: HttpApi;

    /// Group name.
    const GROUP: &'static str;

    /// Endpoint name, unique within its group.
    const NAME: &'static str;

    /// Request method.
    const METHOD: HttpMethod;

    /// Path template. Segments starting with `:` are filled from the
    /// path parameters.
    const PATH: &'static str;

    /// Path parameters, serialized to an object.
    type Path: RequestPart;

    /// URL query parameters.
    type UrlParams: RequestPart;

    /// JSON request body.
    type Payload: RequestPart;

    /// Request headers, serialized to an object of scalars.
    type Headers: RequestPart;

    /// Decoded from a 2xx response body. Cached, hence `Serialize`.
    type Success: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + 'static;

    /// Decoded from an error response body.
    type Error: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + 'static;
}

/// Everything a call to `Ep` sends.
pub struct EndpointRequest<Ep: HttpEndpoint> {
    /// Path parameters.
    pub path: Ep::Path,
    /// URL query parameters.
    pub url_params: Ep::UrlParams,
    /// Request body.
    pub payload: Ep::Payload,
    /// Request headers.
    pub headers: Ep::Headers,
}

impl<Ep: HttpEndpoint> Clone for EndpointRequest<Ep> {
    fn clone(&self) -> Self {
        EndpointRequest {
            path: self.path.clone(),
            url_params: self.url_params.clone(),
            payload: self.payload.clone(),
            headers: self.headers.clone(),
        }
    }
}

impl<Ep> Default for EndpointRequest<Ep>
where
    Ep: HttpEndpoint,
    Ep::Path: Default,
    Ep::UrlParams: Default,
    Ep::Payload: Default,
    Ep::Headers: Default,
{
    fn default() -> Self {
        EndpointRequest {
            path: Default::default(),
            url_params: Default::default(),
            payload: Default::default(),
            headers: Default::default(),
        }
    }
}

impl<Ep: HttpEndpoint> fmt::Debug for EndpointRequest<Ep> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("EndpointRequest");
        s.field("endpoint", &format_args!("{}.{}", Ep::GROUP, Ep::NAME));
        match self.present_parts() {
            Ok(parts) => {
                for (name, value) in parts {
                    s.field(name, &value);
                }
            }
            Err(err) => {
                s.field("error", &format_args!("{}", err));
            }
        }
        s.finish()
    }
}

/// A request part that does not serialize to JSON.
///
/// Such a request has no cache key and cannot be sent.
#[derive(Debug, thiserror::Error)]
#[error("request part `{part}` is not serializable: {source}")]
pub struct UnserializablePart {
    /// `path`, `url_params`, `payload` or `headers`.
    pub part: &'static str,
    /// What serde_json reported.
    #[source]
    pub source: serde_json::Error,
}

impl<Ep: HttpEndpoint> EndpointRequest<Ep> {
    /// The declared parts, in key order, serialized.
    pub(crate) fn present_parts(&self) -> Result<Vec<(&'static str, Value)>, UnserializablePart> {
        let mut parts = Vec::with_capacity(4);
        push_part(&mut parts, "path", &self.path)?;
        push_part(&mut parts, "url_params", &self.url_params)?;
        push_part(&mut parts, "payload", &self.payload)?;
        push_part(&mut parts, "headers", &self.headers)?;
        Ok(parts)
    }
}

fn push_part<P: RequestPart>(
    parts: &mut Vec<(&'static str, Value)>,
    name: &'static str,
    part: &P,
) -> Result<(), UnserializablePart> {
    if !P::PRESENT {
        return Ok(());
    }
    let value = serde_json::to_value(part).map_err(|source| UnserializablePart { part: name, source })?;
    parts.push((name, value));
    Ok(())
}

/// Fill `:name` segments of `template` from the object `params`.
pub(crate) fn fill_path(template: &str, params: Option<&Value>) -> Result<String, String> {
    template
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            None => Ok(segment.to_string()),
            Some(name) => match params.and_then(|p| p.get(name)) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
                Some(other) => Err(format!("path parameter `{}` is not a scalar: {}", name, other)),
                None => Err(format!("missing path parameter `{}`", name)),
            },
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|segments| segments.join("/"))
}
