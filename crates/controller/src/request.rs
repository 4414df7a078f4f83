//! Request side types handed to controllers.
//!
//! - `ActionRequest`: the host request (head, body and session)
//! - `RouteParams`: named values captured from the matched URL pattern

use crate::session::{MemorySession, SessionHandle, SessionStore};
use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const X_REQUESTED_WITH: &str = "x-requested-with";

/// The request an action is dispatched for.
pub struct ActionRequest {
    head: Parts,
    body: Bytes,
    session: Arc<dyn SessionStore>,
}

impl fmt::Debug for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRequest")
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

impl ActionRequest {
    /// Builds a request; the session comes from a [`SessionHandle`] extension when present.
    pub fn new(head: Parts, body: Bytes) -> Self {
        let session = match head.extensions.get::<SessionHandle>() {
            Some(handle) => Arc::clone(&handle.0),
            None => Arc::new(MemorySession::new()),
        };
        Self { head, body, session }
    }

    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// Returns the HTTP version of the request
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn session(&self) -> &dyn SessionStore {
        self.session.as_ref()
    }

    /// `X-Requested-With: XMLHttpRequest`
    pub fn is_ajax(&self) -> bool {
        self.head
            .headers
            .get(X_REQUESTED_WITH)
            .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"XMLHttpRequest"))
    }

    /// Path plus query string.
    pub fn full_path(&self) -> &str {
        self.head.uri.path_and_query().map_or_else(|| self.head.uri.path(), |pq| pq.as_str())
    }

    /// Decodes the urlencoded form body of a POST, or the query string otherwise.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, serde_urlencoded::de::Error> {
        if self.head.method == Method::POST {
            serde_urlencoded::from_bytes(&self.body)
        } else {
            serde_urlencoded::from_str(self.head.uri.query().unwrap_or_default())
        }
    }

    #[cfg(test)]
    pub(crate) fn get(uri: &str) -> Self {
        Request::builder().uri(uri).body(Bytes::new()).unwrap().into()
    }
}

impl From<Request<Bytes>> for ActionRequest {
    fn from(request: Request<Bytes>) -> Self {
        let (head, body) = request.into_parts();
        Self::new(head, body)
    }
}

/// Values captured from the URL, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    params: Vec<(String, String)>,
}

impl RouteParams {
    /// Creates an empty RouteParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if there are no route parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the raw value of a parameter by its name
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    /// Parses a parameter; `None` when it is missing or doesn't parse.
    pub fn parse<T: FromStr>(&self, key: impl AsRef<str>) -> Option<T> {
        self.get(key).and_then(|value| value.parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
    }

    /// A copy without the named parameters.
    pub fn without(&self, names: &[String]) -> Self {
        let params = self.params.iter().filter(|(name, _)| !names.contains(name)).cloned().collect();
        Self { params }
    }
}

impl<'k, 'v> From<matchit::Params<'k, 'v>> for RouteParams {
    fn from(params: matchit::Params<'k, 'v>) -> Self {
        let params = params.iter().map(|(name, value)| (name.to_string(), value.to_string())).collect();
        Self { params }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::empty();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionRequest, RouteParams};
    use crate::session::{MemorySession, SessionHandle, SessionStore};
    use bytes::Bytes;
    use http::{Method, Request};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Search {
        q: String,
        page: u32,
    }

    #[test]
    fn test_query_params() {
        let request = ActionRequest::get("/item/list/?q=rust&page=2");
        assert_eq!(request.params::<Search>().unwrap(), Search { q: "rust".into(), page: 2 });
        assert_eq!(request.full_path(), "/item/list/?q=rust&page=2");
        assert!(!request.is_ajax());
    }

    #[test]
    fn test_form_params() {
        let request: ActionRequest = Request::builder()
            .method(Method::POST)
            .uri("/item/search/?q=ignored&page=9")
            .header("X-Requested-With", "XMLHttpRequest")
            .body(Bytes::from_static(b"q=form&page=3"))
            .unwrap()
            .into();
        assert_eq!(request.params::<Search>().unwrap(), Search { q: "form".into(), page: 3 });
        assert!(request.is_ajax());
    }

    #[test]
    fn test_host_session_is_used() {
        let session = Arc::new(MemorySession::new());
        session.insert("user", json!(7));
        let request: ActionRequest = Request::builder()
            .uri("/")
            .extension(SessionHandle(session.clone()))
            .body(Bytes::new())
            .unwrap()
            .into();
        assert_eq!(request.session().get("user"), Some(json!(7)));
    }

    #[test]
    fn test_route_params() {
        let mut params: RouteParams = [("tenant", "acme"), ("id", "42")].into_iter().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params.parse::<u32>("id"), Some(42));
        assert_eq!(params.parse::<u32>("tenant"), None);

        params.insert("id", "43");
        assert_eq!(params.get("id"), Some("43"));

        let stripped = params.without(&["tenant".to_string()]);
        assert_eq!(stripped.get("tenant"), None);
        assert_eq!(stripped.len(), 1);
    }
}
