//! Controllers: named groups of actions sharing filters and rendering defaults.
//!
//! A controller is a plain type implementing [`Controller`]. Its actions and options are
//! declared once in [`Controller::define`]; a fresh instance is created with `Default` for
//! every dispatched request, so fields can carry state from the before filter to the action.
//!
//! ```ignore
//! #[derive(Default)]
//! struct UserController;
//!
//! impl Controller for UserController {
//!     fn define(def: ControllerDef<Self>) -> ControllerDef<Self> {
//!         def.action(Action::new("index", Self::index)).action(Action::new("show", Self::show).param::<u64>("id"))
//!     }
//! }
//! ```

use crate::action::Action;
use crate::body::ResponseBody;
use crate::config::SiteConfig;
use crate::context::ActionContext;
use crate::error::ActionError;
use crate::naming;
use crate::render::{JsonStyle, Renderer, RendererChoice, YamlStyle};
use http::{Method, Response};
use serde_json::{Map, Value};
use std::fmt;

/// What a filter hands back to the chain.
pub enum FilterReply {
    Continue,
    /// Merged into the template context.
    Merge(Map<String, Value>),
    /// Ends the chain with this renderer's output. Only valid from the before filter.
    Render(Renderer),
    /// Ends the chain with this response.
    Response(Response<ResponseBody>),
}

impl fmt::Debug for FilterReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReply::Continue => f.write_str("Continue"),
            FilterReply::Merge(map) => f.debug_tuple("Merge").field(map).finish(),
            FilterReply::Render(renderer) => f.debug_tuple("Render").field(renderer).finish(),
            FilterReply::Response(response) => f.debug_tuple("Response").field(&response.status()).finish(),
        }
    }
}

impl From<Map<String, Value>> for FilterReply {
    fn from(map: Map<String, Value>) -> Self {
        FilterReply::Merge(map)
    }
}

/// Mappings are merged, any other value is ignored.
impl From<Value> for FilterReply {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => FilterReply::Merge(map),
            _ => FilterReply::Continue,
        }
    }
}

impl From<Renderer> for FilterReply {
    fn from(renderer: Renderer) -> Self {
        FilterReply::Render(renderer)
    }
}

impl From<Response<ResponseBody>> for FilterReply {
    fn from(response: Response<ResponseBody>) -> Self {
        FilterReply::Response(response)
    }
}

/// A failure turned into something renderable by [`Controller::on_exception`].
/// Mappings and text are rendered with status 500.
pub enum Recovery {
    /// Rendered with the error template.
    Mapping(Map<String, Value>),
    /// Rendered verbatim as text.
    Text(String),
    Response(Response<ResponseBody>),
}

impl fmt::Debug for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recovery::Mapping(map) => f.debug_tuple("Mapping").field(map).finish(),
            Recovery::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Recovery::Response(response) => f.debug_tuple("Response").field(&response.status()).finish(),
        }
    }
}

pub trait Controller: Default + Send + 'static {
    /// Declares the actions and options of the controller.
    fn define(def: ControllerDef<Self>) -> ControllerDef<Self>;

    /// Runs before the action unless the action disables filters.
    fn before_filter(&mut self, _ctx: &mut ActionContext<'_>) -> Result<FilterReply, ActionError> {
        Ok(FilterReply::Continue)
    }

    /// Runs after the action with the renderer about to be materialized.
    fn after_filter(&mut self, _ctx: &mut ActionContext<'_>, _renderer: &Renderer) -> Result<FilterReply, ActionError> {
        Ok(FilterReply::Continue)
    }

    /// Called once with any failure of the filters, the action or the render step.
    /// `Ok(None)` hands the failure back to the host.
    fn on_exception(&mut self, _ctx: &mut ActionContext<'_>, _error: &ActionError) -> Result<Option<Recovery>, ActionError> {
        Ok(None)
    }
}

/// Declaration of a controller, filled in by [`Controller::define`].
pub struct ControllerDef<C> {
    pub(crate) type_name: String,
    pub(crate) name: Option<String>,
    pub(crate) prefix: Option<String>,
    pub(crate) route_prefixes: Vec<String>,
    pub(crate) template_prefix: Option<String>,
    pub(crate) template_extension: Option<String>,
    pub(crate) no_subdirectories: bool,
    pub(crate) no_ajax_prefix: bool,
    pub(crate) default_renderer: Option<RendererChoice>,
    pub(crate) consume_params: Vec<String>,
    pub(crate) inflection: Option<bool>,
    pub(crate) methods: Vec<Method>,
    pub(crate) json_style: Option<JsonStyle>,
    pub(crate) yaml_style: Option<YamlStyle>,
    pub(crate) charset: Option<String>,
    pub(crate) action_specific_error_template: bool,
    pub(crate) pass_request: bool,
    pub(crate) actions: Vec<Action<C>>,
}

impl<C> fmt::Debug for ControllerDef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDef")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}

impl<C: 'static> ControllerDef<C> {
    pub(crate) fn new() -> Self {
        Self {
            type_name: naming::short_type_name(std::any::type_name::<C>()).to_string(),
            name: None,
            prefix: None,
            route_prefixes: Vec::new(),
            template_prefix: None,
            template_extension: None,
            no_subdirectories: false,
            no_ajax_prefix: false,
            default_renderer: None,
            consume_params: Vec::new(),
            inflection: None,
            methods: Vec::new(),
            json_style: None,
            yaml_style: None,
            charset: None,
            action_specific_error_template: false,
            pass_request: true,
            actions: Vec::new(),
        }
    }
}

impl<C> ControllerDef<C> {
    #[must_use]
    pub fn action(mut self, action: Action<C>) -> Self {
        self.actions.push(action);
        self
    }

    /// The identifier names are derived from, the Rust type name by default.
    #[must_use]
    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Prepended to the name in URLs, but not in template paths.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Every route is registered once below each of these patterns.
    #[must_use]
    pub fn route_prefix(mut self, pattern: impl Into<String>) -> Self {
        self.route_prefixes.push(pattern.into());
        self
    }

    #[must_use]
    pub fn template_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.template_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn template_extension(mut self, extension: impl Into<String>) -> Self {
        self.template_extension = Some(extension.into());
        self
    }

    /// `{controller}_{action}.{ext}` instead of `{controller}/{action}.{ext}`.
    #[must_use]
    pub fn no_subdirectories(mut self) -> Self {
        self.no_subdirectories = true;
        self
    }

    #[must_use]
    pub fn no_ajax_prefix(mut self) -> Self {
        self.no_ajax_prefix = true;
        self
    }

    #[must_use]
    pub fn default_renderer(mut self, choice: RendererChoice) -> Self {
        self.default_renderer = Some(choice);
        self
    }

    /// Route parameters stripped before the action sees them, e.g. those of a route prefix.
    #[must_use]
    pub fn consume_param(mut self, name: impl Into<String>) -> Self {
        self.consume_params.push(name.into());
        self
    }

    #[must_use]
    pub fn inflection(mut self, enabled: bool) -> Self {
        self.inflection = Some(enabled);
        self
    }

    /// Verbs accepted by actions declaring none.
    #[must_use]
    pub fn methods<I: IntoIterator<Item = Method>>(mut self, methods: I) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    #[must_use]
    pub fn json_style(mut self, style: JsonStyle) -> Self {
        self.json_style = Some(style);
        self
    }

    #[must_use]
    pub fn yaml_style(mut self, style: YamlStyle) -> Self {
        self.yaml_style = Some(style);
        self
    }

    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Failure mappings render `{controller}/{action}__error.{ext}` instead of `error.{ext}`.
    #[must_use]
    pub fn action_specific_error_template(mut self) -> Self {
        self.action_specific_error_template = true;
        self
    }

    /// Actions no longer see the request through [`ActionContext::passed_request`] unless
    /// they ask for it with [`Action::with_request`]. Filters still see it.
    #[must_use]
    pub fn without_request(mut self) -> Self {
        self.pass_request = false;
        self
    }

    /// Controller settings with the site defaults filled in.
    pub(crate) fn resolve(&self, config: &SiteConfig) -> ControllerInfo {
        let inflect = self.inflection.unwrap_or(config.inflection);
        let name = naming::controller_name(&self.type_name, self.name.as_deref(), None, inflect, false);
        let full_name =
            naming::controller_name(&self.type_name, self.name.as_deref(), self.prefix.as_deref(), inflect, true);
        ControllerInfo {
            template_prefix: self.template_prefix.clone().unwrap_or_else(|| name.clone()),
            name,
            full_name,
            route_prefixes: self.route_prefixes.clone(),
            template_extension: self.template_extension.clone().unwrap_or_else(|| config.template_extension.clone()),
            no_subdirectories: self.no_subdirectories,
            no_ajax_prefix: self.no_ajax_prefix,
            default_renderer: self.default_renderer.unwrap_or(config.default_renderer),
            consume_params: self.consume_params.clone(),
            methods: self.methods.clone(),
            json_style: self.json_style.unwrap_or(config.json_style),
            yaml_style: self.yaml_style.unwrap_or(config.yaml_style),
            charset: self.charset.clone().unwrap_or_else(|| config.charset.clone()),
            action_specific_error_template: self.action_specific_error_template,
            pass_request: self.pass_request,
        }
    }
}

/// Resolved, immutable controller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerInfo {
    /// Canonical name without prefix.
    pub name: String,
    /// Canonical name with prefix, the mount point.
    pub full_name: String,
    pub route_prefixes: Vec<String>,
    pub template_prefix: String,
    pub template_extension: String,
    pub no_subdirectories: bool,
    pub no_ajax_prefix: bool,
    pub default_renderer: RendererChoice,
    pub consume_params: Vec<String>,
    pub methods: Vec<Method>,
    pub json_style: JsonStyle,
    pub yaml_style: YamlStyle,
    pub charset: String,
    pub action_specific_error_template: bool,
    /// Whether actions are handed the request unless they decide otherwise.
    pub pass_request: bool,
}

#[cfg(test)]
impl ControllerInfo {
    pub(crate) fn for_tests(name: &str) -> Self {
        ControllerDef::<()>::new().name(name).resolve(&SiteConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::{ControllerDef, FilterReply};
    use crate::config::SiteConfig;
    use crate::render::RendererChoice;
    use serde_json::json;

    struct HTTPResponseCodeController;

    #[test]
    fn test_resolve_names() {
        let config = SiteConfig::default();
        let def = ControllerDef::<HTTPResponseCodeController>::new();
        assert_eq!(def.type_name, "HTTPResponseCodeController");

        let info = def.resolve(&config);
        assert_eq!(info.name, "httpresponse_code");
        assert_eq!(info.template_prefix, "httpresponse_code");
        assert_eq!(info.default_renderer, RendererChoice::Template);

        let info = ControllerDef::<HTTPResponseCodeController>::new().inflection(true).prefix("api_").resolve(&config);
        assert_eq!(info.name, "http_response_code");
        assert_eq!(info.full_name, "api_http_response_code");
        assert_eq!(info.template_prefix, "http_response_code");

        let config = SiteConfig { inflection: true, ..SiteConfig::default() };
        let info = ControllerDef::<HTTPResponseCodeController>::new().template_prefix("codes").resolve(&config);
        assert_eq!(info.name, "http_response_code");
        assert_eq!(info.template_prefix, "codes");
    }

    #[test]
    fn test_filter_reply_from_value() {
        assert!(matches!(FilterReply::from(json!({"a": 1})), FilterReply::Merge(map) if map["a"] == 1));
        assert!(matches!(FilterReply::from(json!("ignored")), FilterReply::Continue));
    }
}
