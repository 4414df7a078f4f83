//! Path routing on top of `matchit`.
//!
//! Several items may share one path; the first whose [`filter::Filter`] accepts the
//! request handles it.

pub mod filter;

use crate::error::ConfigError;
use crate::handler::RequestHandler;
use crate::request::{ActionRequest, RouteParams};
use filter::Filter;
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use std::fmt;
use std::sync::Arc;
use tracing::error;

type RouterFilter = dyn Filter + Send + Sync + 'static;
type InnerRouter<T> = matchit::Router<T>;

/// Main router structure that handles HTTP request routing
pub struct Router {
    inner_router: InnerRouter<Vec<RouterItem>>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

/// A router item containing a filter and handler
pub struct RouterItem {
    filter: Box<RouterFilter>,
    param_names: Vec<String>,
    handler: Arc<dyn RequestHandler>,
}

impl fmt::Debug for RouterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterItem").field("param_names", &self.param_names).finish_non_exhaustive()
    }
}

/// Result of matching a route, containing matched items and the captured values in path order
#[derive(Debug)]
pub struct RouteResult<'router> {
    router_items: &'router [RouterItem],
    values: Vec<String>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Matches a path against the router's routes
    pub fn at(&self, path: &str) -> RouteResult<'_> {
        match self.inner_router.at(path) {
            Ok(matched) => RouteResult {
                router_items: matched.value.as_slice(),
                values: matched
                    .params
                    .iter()
                    .map(|(_, value)| percent_decode_str(value).decode_utf8_lossy().into_owned())
                    .collect(),
            },
            Err(_) => RouteResult::empty(),
        }
    }
}

impl RouterItem {
    pub fn new(filter: Box<RouterFilter>, param_names: Vec<String>, handler: Arc<dyn RequestHandler>) -> Self {
        Self { filter, param_names, handler }
    }

    /// Gets the filter for this router item
    pub fn filter(&self) -> &RouterFilter {
        self.filter.as_ref()
    }

    /// Gets the request handler for this router item
    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }

    fn params(&self, values: &[String]) -> RouteParams {
        self.param_names.iter().zip(values).map(|(name, value)| (name.as_str(), value.as_str())).collect()
    }
}

impl<'router> RouteResult<'router> {
    fn empty() -> Self {
        Self { router_items: &[], values: Vec::new() }
    }

    /// Returns true if no routes were matched
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.router_items.is_empty()
    }

    /// Gets the matched router items
    pub fn router_items(&self) -> &'router [RouterItem] {
        self.router_items
    }

    /// The first item whose filter accepts the request, with its named parameters.
    pub fn select(&self, req: &ActionRequest) -> Option<(&'router RouterItem, RouteParams)> {
        self.router_items.iter().find_map(|item| {
            let params = item.params(&self.values);
            item.filter.matches(req, &params).then_some((item, params))
        })
    }
}

#[derive(Default)]
pub struct RouterBuilder {
    data: IndexMap<String, Vec<RouterItem>>,
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder").field("paths", &self.data.keys()).finish()
    }
}

impl RouterBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Items of the same path are tried in the order they were added.
    #[must_use]
    pub fn route(mut self, route: impl Into<String>, item: RouterItem) -> Self {
        self.data.entry(route.into()).or_default().push(item);
        self
    }

    pub fn build(self) -> Result<Router, ConfigError> {
        let mut inner_router = InnerRouter::new();
        for (path, items) in self.data {
            if let Err(e) = inner_router.insert(path.clone(), items) {
                error!(cause = %e, path = %path, "can't register route");
                return Err(ConfigError::RouteConflict { path, source: e });
            }
        }
        Ok(Router { inner_router })
    }
}

#[cfg(test)]
mod tests {
    use super::filter::{param_types, true_filter};
    use super::{Router, RouterItem};
    use crate::action::ParamKind;
    use crate::body::ResponseBody;
    use crate::error::DispatchError;
    use crate::handler::RequestHandler;
    use crate::request::{ActionRequest, RouteParams};
    use crate::site::SiteState;
    use async_trait::async_trait;
    use http::Response;
    use std::sync::Arc;

    struct Named(&'static str);

    #[async_trait]
    impl RequestHandler for Named {
        async fn invoke(
            &self,
            _site: &SiteState,
            _req: ActionRequest,
            _params: RouteParams,
        ) -> Result<Response<ResponseBody>, DispatchError> {
            Ok(Response::new(self.0.into()))
        }
    }

    fn item(kinds: &[(&str, ParamKind)], name: &'static str) -> RouterItem {
        let names = kinds.iter().map(|(n, _)| (*n).to_string()).collect();
        RouterItem::new(Box::new(param_types(kinds.iter().copied())), names, Arc::new(Named(name)))
    }

    fn router() -> Router {
        Router::builder()
            .route("/blog/", RouterItem::new(Box::new(true_filter()), Vec::new(), Arc::new(Named("index"))))
            .route("/blog/{p0}/", item(&[("id", ParamKind::Int)], "by_id"))
            .route("/blog/{p0}/", item(&[("slug", ParamKind::Slug)], "by_slug"))
            .route("/blog/list/", RouterItem::new(Box::new(true_filter()), Vec::new(), Arc::new(Named("list"))))
            .build()
            .unwrap()
    }

    #[test]
    fn test_select_by_param_type() {
        let router = router();
        let req = ActionRequest::get("/");

        let result = router.at("/blog/42/");
        assert_eq!(result.router_items().len(), 2);
        let (_, params) = result.select(&req).unwrap();
        assert_eq!(params.get("id"), Some("42"));

        let (_, params) = router.at("/blog/hello-world/").select(&req).unwrap();
        assert_eq!(params.get("slug"), Some("hello-world"));

        assert!(router.at("/blog/hello%20world/").select(&req).is_none());
        assert!(router.at("/blog/list/").select(&req).unwrap().1.is_empty());
        assert!(router.at("/nope/").is_empty());
    }

    #[test]
    fn test_conflict() {
        let result = Router::builder()
            .route("/a/{p0}", item(&[("id", ParamKind::Int)], "a"))
            .route("/a/{p1}", item(&[("slug", ParamKind::Slug)], "b"))
            .build();
        assert!(result.is_err());
    }
}
