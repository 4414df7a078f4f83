//! The site: registered controllers mounted below one URL registry.
//!
//! ```no_run
//! use micro_controller::{Action, ActionContext, ActionError, Controller, ControllerDef, Site};
//! use serde_json::{Value, json};
//!
//! #[derive(Default)]
//! struct HelloController;
//!
//! impl HelloController {
//!     fn index(&mut self, _ctx: &mut ActionContext<'_>) -> Result<Value, ActionError> {
//!         Ok(json!({"greeting": "hello"}))
//!     }
//! }
//!
//! impl Controller for HelloController {
//!     fn define(def: ControllerDef<Self>) -> ControllerDef<Self> {
//!         def.action(Action::new("index", Self::index).json())
//!     }
//! }
//!
//! let site = Site::builder().controller::<HelloController>().build().unwrap();
//! ```

use crate::body::ResponseBody;
use crate::catalog::ActionCatalog;
use crate::config::SiteConfig;
use crate::controller::Controller;
use crate::error::{BoxError, ConfigError, DispatchError, UrlError};
use crate::handler::{ActionHandler, ControllerDispatch, ControllerHandler, NotFoundHandler, RequestHandler};
use crate::helper::{UrlArgs, UrlRegistry};
use crate::request::{ActionRequest, RouteParams};
use crate::route;
use crate::router::filter::{Filter, param_types, true_filter};
use crate::router::{Router, RouterBuilder, RouterItem};
use crate::template::TemplateEngine;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// What every dispatch of a site shares.
pub struct SiteState {
    pub(crate) config: SiteConfig,
    pub(crate) templates: Option<Arc<dyn TemplateEngine>>,
    pub(crate) urls: UrlRegistry,
}

impl fmt::Debug for SiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteState")
            .field("config", &self.config)
            .field("has_templates", &self.templates.is_some())
            .field("urls", &self.urls)
            .finish()
    }
}

impl SiteState {
    pub(crate) fn new(config: SiteConfig, templates: Option<Arc<dyn TemplateEngine>>, urls: UrlRegistry) -> Self {
        Self { config, templates, urls }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn templates(&self) -> Option<&dyn TemplateEngine> {
        self.templates.as_deref()
    }

    pub fn urls(&self) -> &UrlRegistry {
        &self.urls
    }
}

type ControllerMap = HashMap<String, Arc<dyn ControllerDispatch>>;

/// State threaded through the mount functions while a site is built.
#[derive(Default)]
struct Assembly {
    config: SiteConfig,
    catalog: ActionCatalog,
    router: RouterBuilder,
    urls: UrlRegistry,
    controllers: ControllerMap,
}

type Mount = fn(&mut Assembly) -> Result<(), ConfigError>;

fn mount<C: Controller>(assembly: &mut Assembly) -> Result<(), ConfigError> {
    let Some(info) = assembly.catalog.register::<C>(&assembly.config)? else {
        return Ok(());
    };
    let Some(table) = assembly.catalog.actions_of::<C>(true) else {
        return Ok(());
    };

    let routes = route::synthesize(&info, &table.metas())?;
    let base = format!("{}{}/", assembly.config.normalized_mount_prefix(), info.full_name);
    assembly.urls.add_controller(&info.full_name, &info.name, &base, &routes);

    let controller: Arc<dyn ControllerDispatch> = Arc::new(ControllerHandler::new(table));
    for entry in &routes {
        let params: Vec<_> = entry.pattern.params().map(|(name, kind)| (name.to_string(), kind)).collect();
        let names = params.iter().map(|(name, _)| name.clone()).collect();
        let filter: Box<dyn Filter + Send + Sync> =
            if params.is_empty() { Box::new(true_filter()) } else { Box::new(param_types(params)) };
        let handler = Arc::new(ActionHandler::new(Arc::clone(&controller), entry.action.clone()));
        let router = std::mem::take(&mut assembly.router);
        assembly.router = router.route(entry.pattern.router_path(&base), RouterItem::new(filter, names, handler));
    }

    info!(controller = %info.full_name, base = %base, routes = routes.len(), "controller mounted");
    assembly.controllers.insert(info.full_name.clone(), controller);
    Ok(())
}

pub struct SiteBuilder {
    config: SiteConfig,
    mounts: Vec<Mount>,
    templates: Option<Arc<dyn TemplateEngine>>,
    not_found: Option<Box<dyn RequestHandler>>,
}

impl fmt::Debug for SiteBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteBuilder")
            .field("config", &self.config)
            .field("controllers", &self.mounts.len())
            .field("has_templates", &self.templates.is_some())
            .finish_non_exhaustive()
    }
}

impl SiteBuilder {
    fn new() -> Self {
        Self { config: SiteConfig::default(), mounts: Vec::new(), templates: None, not_found: None }
    }

    #[must_use]
    pub fn config(mut self, config: SiteConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers controller `C`. Controllers are mounted in registration order.
    #[must_use]
    pub fn controller<C: Controller>(mut self) -> Self {
        self.mounts.push(mount::<C>);
        self
    }

    #[must_use]
    pub fn templates(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.templates = Some(Arc::new(engine));
        self
    }

    /// Handles requests no route accepts, [`NotFoundHandler`] by default.
    #[must_use]
    pub fn not_found(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.not_found = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Result<Site, ConfigError> {
        let mut assembly = Assembly { config: self.config, ..Assembly::default() };
        for mount in self.mounts {
            mount(&mut assembly)?;
        }

        let router = assembly.router.build()?;
        Ok(Site {
            state: SiteState::new(assembly.config, self.templates, assembly.urls),
            router,
            controllers: assembly.controllers,
            not_found: self.not_found.unwrap_or_else(|| Box::new(NotFoundHandler)),
        })
    }
}

pub struct Site {
    state: SiteState,
    router: Router,
    controllers: ControllerMap,
    not_found: Box<dyn RequestHandler>,
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("state", &self.state)
            .field("controllers", &self.controllers.keys())
            .finish_non_exhaustive()
    }
}

impl Site {
    pub fn builder() -> SiteBuilder {
        SiteBuilder::new()
    }

    pub fn state(&self) -> &SiteState {
        &self.state
    }

    pub fn urls(&self) -> &UrlRegistry {
        &self.state.urls
    }

    /// See [`UrlRegistry::url_for`].
    pub fn url_for<Q: Serialize + ?Sized>(
        &self,
        controller: Option<&str>,
        action: Option<&str>,
        args: &UrlArgs,
        query: Option<&Q>,
    ) -> Result<String, UrlError> {
        self.state.urls.url_for(controller, action, None, args, query)
    }

    /// Routes and dispatches one request.
    ///
    /// Unknown paths go to the not found handler. A failure no failure hook recovered from
    /// is returned as the error.
    pub async fn call(&self, req: Request<Bytes>) -> Result<Response<ResponseBody>, BoxError> {
        let req = ActionRequest::from(req);
        let selected = self.router.at(req.uri().path()).select(&req);
        let result = match selected {
            Some((item, params)) => item.handler().invoke(&self.state, req, params).await,
            None => {
                debug!(method = %req.method(), path = req.uri().path(), "no route matched");
                self.not_found.invoke(&self.state, req, RouteParams::empty()).await
            }
        };
        Self::finish(result)
    }

    /// Dispatches `action` of `controller` without routing.
    pub async fn call_action(
        &self,
        controller: &str,
        action: &str,
        req: Request<Bytes>,
    ) -> Result<Response<ResponseBody>, BoxError> {
        let result = match self.controllers.get(controller) {
            Some(handler) => handler.dispatch(&self.state, action, ActionRequest::from(req), RouteParams::empty()),
            None => Err(DispatchError::invalid_action(controller, action)),
        };
        Self::finish(result)
    }

    fn finish(result: Result<Response<ResponseBody>, DispatchError>) -> Result<Response<ResponseBody>, BoxError> {
        match result {
            Ok(response) => Ok(response),
            Err(e @ DispatchError::InvalidAction { .. }) => {
                debug!(cause = %e, "invalid action");
                let mut response = Response::new(ResponseBody::from(e.to_string()));
                *response.status_mut() = StatusCode::NOT_FOUND;
                response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
                Ok(response)
            }
            Err(e) => {
                error!(cause = %e, "request failed");
                Err(Box::new(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Site;
    use crate::action::{Action, Slug};
    use crate::body::ResponseBody;
    use crate::config::SiteConfig;
    use crate::context::ActionContext;
    use crate::controller::{Controller, ControllerDef, FilterReply};
    use crate::error::{ActionError, ConfigError, DispatchError};
    use crate::helper::UrlArgs;
    use crate::template::MiniJinjaEngine;
    use bytes::Bytes;
    use http::header::CONTENT_TYPE;
    use http::{Request, Response, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    async fn body(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Bytes> {
        Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    #[derive(Default)]
    struct BlogController {
        user: Option<String>,
    }

    impl BlogController {
        fn index(&mut self, ctx: &mut ActionContext<'_>) -> Result<Value, ActionError> {
            ctx.flash().append("welcome", "normal");
            Ok(json!({"posts": ["first", "second"], "user": self.user}))
        }

        fn show(&mut self, ctx: &mut ActionContext<'_>) -> Result<Value, ActionError> {
            Ok(json!({"id": ctx.param::<u32>("id")}))
        }

        fn by_slug(&mut self, ctx: &mut ActionContext<'_>) -> Result<Value, ActionError> {
            Ok(json!({"slug": ctx.param::<Slug>("name").map(|slug| slug.0)}))
        }

        fn crash(&mut self, _ctx: &mut ActionContext<'_>) -> Result<Value, ActionError> {
            Err(ActionError::failed("database is gone"))
        }
    }

    impl Controller for BlogController {
        fn define(def: ControllerDef<Self>) -> ControllerDef<Self> {
            def.action(Action::new("index", Self::index))
                .action(Action::new("show", Self::show).param::<u32>("id").json())
                .action(Action::new("by_slug", Self::by_slug).url("show/<slug:name>/").erase_default_urls().json())
                .action(Action::new("crash", Self::crash))
        }

        fn before_filter(&mut self, ctx: &mut ActionContext<'_>) -> Result<FilterReply, ActionError> {
            self.user = ctx.request().headers().get("x-user").and_then(|v| v.to_str().ok()).map(str::to_string);
            Ok(FilterReply::Continue)
        }
    }

    fn site() -> Site {
        let mut engine = MiniJinjaEngine::new();
        engine
            .add_template(
                "blog/index.html",
                "{{ controller_name }}/{{ action_name }}: {{ posts | join(\", \") }} by {{ user }} \
                 [{{ controller_helper.urls.crash }}] {{ flash | length }}",
            )
            .unwrap();
        Site::builder().controller::<BlogController>().templates(engine).build().unwrap()
    }

    #[tokio::test]
    async fn test_template_action() {
        let site = site();
        let req = Request::builder().uri("/blog/").header("x-user", "ada").body(Bytes::new()).unwrap();
        let response = site.call(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(body(response).await, "blog/index: first, second by ada [/blog/crash/] 1");
    }

    #[tokio::test]
    async fn test_routes_by_param_type() {
        let site = site();

        let response = site.call(get("/blog/show/42/")).await.unwrap();
        assert_eq!(body(response).await, r#"{"id":42}"#);

        let response = site.call(get("/blog/show/hello-world/")).await.unwrap();
        assert_eq!(body(response).await, r#"{"slug":"hello-world"}"#);

        let response = site.call(get("/blog/show/hello%20world/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = site.call(get("/nowhere/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_call_action() {
        let site = site();
        let response = site.call_action("blog", "show", get("/")).await.unwrap();
        assert_eq!(body(response).await, r#"{"id":null}"#);

        let response = site.call_action("blog", "missing", get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await, "Action 'missing' not found in controller 'blog'");
    }

    #[tokio::test]
    async fn test_unhandled_failure_reaches_host() {
        let site = site();
        let Err(e) = site.call(get("/blog/crash/")).await else { panic!("expected an error") };
        let e = e.downcast::<DispatchError>().unwrap();
        assert!(matches!(*e, DispatchError::Unhandled(ActionError::Failed(_))));
    }

    #[test]
    fn test_url_for_and_mount_prefix() {
        let config = SiteConfig { mount_prefix: "app".to_string(), ..SiteConfig::default() };
        let site = Site::builder().config(config).controller::<BlogController>().build().unwrap();

        let url = site.url_for::<()>(Some("blog"), Some("show"), &UrlArgs::positional([7]), None).unwrap();
        assert_eq!(url, "/app/blog/show/7/");
        let url = site.url_for(Some("blog"), None, &UrlArgs::None, Some(&[("page", 2)])).unwrap();
        assert_eq!(url, "/app/blog/?page=2");
        assert_eq!(site.urls().reverse_path("blog/by_slug/intro", None).unwrap(), "/app/blog/show/intro/");
    }

    #[derive(Default)]
    struct BrokenController;

    impl Controller for BrokenController {
        fn define(def: ControllerDef<Self>) -> ControllerDef<Self> {
            def.action(Action::new("index", |_: &mut Self, _| Ok(())).url("<int:id/"))
        }
    }

    #[test]
    fn test_invalid_pattern_fails_build() {
        let result = Site::builder().controller::<BrokenController>().build();
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }
}
