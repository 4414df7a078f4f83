//! Per-action configuration.
//!
//! An [`Action`] binds a canonical name to a controller method together with everything the
//! route synthesizer and the filter chain need to know about it: the route parameter, URL
//! overrides, allowed verbs, response mimetype, template overrides and so on.
//!
//! ```ignore
//! Action::new("show", Self::show).param::<u64>("id").methods([Method::GET])
//! ```

use crate::body::ResponseBody;
use crate::context::ActionContext;
use crate::error::{ActionError, RenderError};
use crate::naming;
use crate::render::{Renderer, RendererChoice};
use crate::request::{ActionRequest, RouteParams};
use http::{HeaderValue, Method, Response, StatusCode, header};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The designated default action, mounted at the controller root.
pub const INDEX: &str = "index";

/// Type constraint of a route parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Int,
    Str,
    /// Letters, digits, `-` and `_`.
    Slug,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Int => "int",
            ParamKind::Str => "str",
            ParamKind::Slug => "slug",
        }
    }

    /// Whether a captured path segment satisfies the constraint.
    pub fn matches(self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        match self {
            ParamKind::Int => value.bytes().all(|b| b.is_ascii_digit()),
            ParamKind::Str => !value.contains('/'),
            ParamKind::Slug => value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'),
        }
    }
}

impl FromStr for ParamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(ParamKind::Int),
            "str" => Ok(ParamKind::Str),
            "slug" => Ok(ParamKind::Slug),
            other => Err(format!("unknown parameter type '{other}'")),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a Rust type to the route constraint inferred for it.
pub trait ParamType {
    const KIND: ParamKind;
}

macro_rules! int_param_types {
    ($($ty:ty),*) => {
        $(impl ParamType for $ty {
            const KIND: ParamKind = ParamKind::Int;
        })*
    };
}

int_param_types!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl ParamType for String {
    const KIND: ParamKind = ParamKind::Str;
}

/// An unconstrained path segment, restricted to slug characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slug(pub String);

impl ParamType for Slug {
    const KIND: ParamKind = ParamKind::Slug;
}

impl FromStr for Slug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if ParamKind::Slug.matches(s) { Ok(Slug(s.to_string())) } else { Err(format!("'{s}' is not a slug")) }
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The trailing route parameter of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionParam {
    pub name: String,
    pub kind: ParamKind,
    /// Whether the action works without it, which adds the bare route.
    pub has_default: bool,
}

/// What an action hands back to the filter chain.
pub enum ActionReply {
    /// A payload for the default renderer, with an optional explicit status.
    Data { payload: Value, status: Option<u16> },
    Render(Renderer),
    /// A finished response, returned as is.
    Response(Response<ResponseBody>),
}

impl ActionReply {
    pub fn data(payload: impl Into<Value>) -> Self {
        ActionReply::Data { payload: payload.into(), status: None }
    }
}

impl fmt::Debug for ActionReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionReply::Data { payload, status } => {
                f.debug_struct("Data").field("payload", payload).field("status", status).finish()
            }
            ActionReply::Render(renderer) => f.debug_tuple("Render").field(renderer).finish(),
            ActionReply::Response(response) => f.debug_tuple("Response").field(&response.status()).finish(),
        }
    }
}

impl From<Value> for ActionReply {
    fn from(payload: Value) -> Self {
        ActionReply::Data { payload, status: None }
    }
}

impl From<Map<String, Value>> for ActionReply {
    fn from(map: Map<String, Value>) -> Self {
        ActionReply::Data { payload: Value::Object(map), status: None }
    }
}

impl From<(Value, u16)> for ActionReply {
    fn from((payload, status): (Value, u16)) -> Self {
        ActionReply::Data { payload, status: Some(status) }
    }
}

impl From<(Value, StatusCode)> for ActionReply {
    fn from((payload, status): (Value, StatusCode)) -> Self {
        ActionReply::Data { payload, status: Some(status.as_u16()) }
    }
}

impl From<String> for ActionReply {
    fn from(text: String) -> Self {
        ActionReply::Data { payload: Value::String(text), status: None }
    }
}

impl From<&str> for ActionReply {
    fn from(text: &str) -> Self {
        ActionReply::Data { payload: Value::String(text.to_string()), status: None }
    }
}

impl From<()> for ActionReply {
    fn from((): ()) -> Self {
        ActionReply::Data { payload: Value::Null, status: None }
    }
}

impl From<Renderer> for ActionReply {
    fn from(renderer: Renderer) -> Self {
        ActionReply::Render(renderer)
    }
}

impl From<Response<ResponseBody>> for ActionReply {
    fn from(response: Response<ResponseBody>) -> Self {
        ActionReply::Response(response)
    }
}

const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'/').remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// A request predicate guarding an action, e.g. "the user is logged in".
///
/// When the predicate fails, ajax requests get `403 Forbidden`; other requests are
/// redirected to the login url with the current path in the `next` query field.
#[derive(Clone)]
pub struct AccessGuard {
    test: Arc<dyn Fn(&ActionRequest) -> bool + Send + Sync>,
    login_url: String,
    redirect_field: String,
}

impl fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGuard")
            .field("login_url", &self.login_url)
            .field("redirect_field", &self.redirect_field)
            .finish_non_exhaustive()
    }
}

impl AccessGuard {
    pub fn new<F>(login_url: impl Into<String>, test: F) -> Self
    where
        F: Fn(&ActionRequest) -> bool + Send + Sync + 'static,
    {
        Self { test: Arc::new(test), login_url: login_url.into(), redirect_field: "next".to_string() }
    }

    #[must_use]
    pub fn redirect_field(mut self, field: impl Into<String>) -> Self {
        self.redirect_field = field.into();
        self
    }

    /// `None` when access is granted, otherwise the refusal response.
    pub fn check(&self, request: &ActionRequest) -> Result<Option<Response<ResponseBody>>, RenderError> {
        if (self.test)(request) {
            return Ok(None);
        }
        if request.is_ajax() {
            return Ok(Some(Response::builder().status(StatusCode::FORBIDDEN).body(ResponseBody::empty())?));
        }

        let next = utf8_percent_encode(request.full_path(), QUERY_VALUE);
        let location = format!("{}?{}={}", self.login_url, self.redirect_field, next);
        let location = HeaderValue::try_from(location).map_err(http::Error::from)?;
        let response =
            Response::builder().status(StatusCode::FOUND).header(header::LOCATION, location).body(ResponseBody::empty())?;
        Ok(Some(response))
    }
}

/// Type erased action configuration.
#[derive(Debug, Clone)]
pub struct ActionMeta {
    pub(crate) fn_name: String,
    pub(crate) explicit_name: Option<String>,
    pub(crate) prefix: Option<String>,
    pub(crate) param: Option<ActionParam>,
    pub(crate) url_patterns: Vec<String>,
    pub(crate) erase_default_urls: bool,
    pub(crate) url_parameters: Option<String>,
    pub(crate) methods: Vec<Method>,
    pub(crate) mimetype: Option<String>,
    pub(crate) charset: Option<String>,
    pub(crate) disable_filters: bool,
    pub(crate) template_name: Option<String>,
    pub(crate) ajax_template_name: Option<String>,
    pub(crate) named_url: Option<String>,
    pub(crate) no_ajax_prefix: bool,
    pub(crate) renderer: Option<RendererChoice>,
    pub(crate) guard: Option<AccessGuard>,
    pub(crate) receives_request: Option<bool>,
}

impl ActionMeta {
    fn new(fn_name: &str) -> Self {
        Self {
            fn_name: fn_name.to_string(),
            explicit_name: None,
            prefix: None,
            param: None,
            url_patterns: Vec::new(),
            erase_default_urls: false,
            url_parameters: None,
            methods: Vec::new(),
            mimetype: None,
            charset: None,
            disable_filters: false,
            template_name: None,
            ajax_template_name: None,
            named_url: None,
            no_ajax_prefix: false,
            renderer: None,
            guard: None,
            receives_request: None,
        }
    }

    /// Canonical name, `None` when the method name is reserved for helpers.
    pub fn name(&self, with_prefix: bool) -> Option<String> {
        naming::action_name(&self.fn_name, self.explicit_name.as_deref(), self.prefix.as_deref(), with_prefix)
    }

    pub fn fn_name(&self) -> &str {
        &self.fn_name
    }

    pub fn param(&self) -> Option<&ActionParam> {
        self.param.as_ref()
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn disable_filters(&self) -> bool {
        self.disable_filters
    }

    /// Whether the action is handed the request, `None` to follow the controller.
    pub fn receives_request(&self) -> Option<bool> {
        self.receives_request
    }

    /// Explicit route name, or `None` for the `{controller}_{action}` convention.
    pub fn named_url(&self) -> Option<&str> {
        self.named_url.as_deref()
    }
}

pub(crate) type ActionFn<C> = dyn Fn(&mut C, &mut ActionContext<'_>) -> Result<ActionReply, ActionError> + Send + Sync;

/// An action of controller `C`.
pub struct Action<C> {
    pub(crate) meta: ActionMeta,
    pub(crate) handler: Arc<ActionFn<C>>,
}

impl<C> fmt::Debug for Action<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("meta", &self.meta).finish_non_exhaustive()
    }
}

impl<C: 'static> Action<C> {
    /// Binds `fn_name` to a method receiving the request context.
    pub fn new<F, R>(fn_name: &str, f: F) -> Self
    where
        F: Fn(&mut C, &mut ActionContext<'_>) -> Result<R, ActionError> + Send + Sync + 'static,
        R: Into<ActionReply>,
    {
        let handler = move |controller: &mut C, ctx: &mut ActionContext<'_>| f(controller, ctx).map(Into::<ActionReply>::into);
        Self { meta: ActionMeta::new(fn_name), handler: Arc::new(handler) }
    }

    /// Binds `fn_name` to a method that only sees the route parameters, not the request.
    pub fn without_request<F, R>(fn_name: &str, f: F) -> Self
    where
        F: Fn(&mut C, &RouteParams) -> Result<R, ActionError> + Send + Sync + 'static,
        R: Into<ActionReply>,
    {
        let handler = move |controller: &mut C, ctx: &mut ActionContext<'_>| f(controller, ctx.params()).map(Into::<ActionReply>::into);
        let mut meta = ActionMeta::new(fn_name);
        meta.receives_request = Some(false);
        Self { meta, handler: Arc::new(handler) }
    }
}

impl<C> Action<C> {
    pub fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    /// Hands the request to this action even if its controller opted out.
    #[must_use]
    pub fn with_request(mut self) -> Self {
        self.meta.receives_request = Some(true);
        self
    }

    /// Overrides the name derived from the method name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.meta.explicit_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.meta.prefix = Some(prefix.into());
        self
    }

    /// A required trailing parameter, `/{action}/<kind:name>/` only.
    #[must_use]
    pub fn param<T: ParamType>(self, name: impl Into<String>) -> Self {
        self.param_of(name, T::KIND, false)
    }

    /// A trailing parameter with a default, so the bare `/{action}/` route exists too.
    #[must_use]
    pub fn optional_param<T: ParamType>(self, name: impl Into<String>) -> Self {
        self.param_of(name, T::KIND, true)
    }

    #[must_use]
    pub fn param_of(mut self, name: impl Into<String>, kind: ParamKind, has_default: bool) -> Self {
        self.meta.param = Some(ActionParam { name: name.into(), kind, has_default });
        self
    }

    /// An extra URL pattern relative to the controller root, e.g. `archive/<int:year>/`.
    #[must_use]
    pub fn url(mut self, pattern: impl Into<String>) -> Self {
        self.meta.url_patterns.push(pattern.into());
        self
    }

    /// Only the explicit [`url`](Self::url) patterns are registered.
    #[must_use]
    pub fn erase_default_urls(mut self) -> Self {
        self.meta.erase_default_urls = true;
        self
    }

    /// Replaces the synthesized parameter segment, spliced after `{action}/`.
    #[must_use]
    pub fn url_parameters(mut self, segment: impl Into<String>) -> Self {
        self.meta.url_parameters = Some(segment.into());
        self
    }

    #[must_use]
    pub fn methods<I: IntoIterator<Item = Method>>(mut self, methods: I) -> Self {
        self.meta.methods = methods.into_iter().collect();
        self
    }

    #[must_use]
    pub fn mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.meta.mimetype = Some(mimetype.into());
        self
    }

    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.meta.charset = Some(charset.into());
        self
    }

    /// Skip the controller's before and after filters.
    #[must_use]
    pub fn disable_filters(mut self) -> Self {
        self.meta.disable_filters = true;
        self
    }

    #[must_use]
    pub fn template(mut self, name: impl Into<String>) -> Self {
        self.meta.template_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn ajax_template(mut self, name: impl Into<String>) -> Self {
        self.meta.ajax_template_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn named_url(mut self, name: impl Into<String>) -> Self {
        self.meta.named_url = Some(name.into());
        self
    }

    #[must_use]
    pub fn no_ajax_prefix(mut self) -> Self {
        self.meta.no_ajax_prefix = true;
        self
    }

    /// Wrap plain return values in this renderer instead of the controller default.
    #[must_use]
    pub fn renderer(mut self, choice: RendererChoice) -> Self {
        self.meta.renderer = Some(choice);
        self
    }

    #[must_use]
    pub fn json(self) -> Self {
        self.renderer(RendererChoice::Json)
    }

    #[must_use]
    pub fn yaml(self) -> Self {
        self.renderer(RendererChoice::Yaml)
    }

    /// Negotiate the renderer from the `Accept` header.
    #[must_use]
    pub fn auto(self) -> Self {
        self.renderer(RendererChoice::Auto)
    }

    #[must_use]
    pub fn guard(mut self, guard: AccessGuard) -> Self {
        self.meta.guard = Some(guard);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessGuard, Action, ParamKind, Slug};
    use crate::request::ActionRequest;
    use bytes::Bytes;
    use http::{Request, StatusCode, header};
    use serde_json::json;

    #[derive(Default)]
    struct Blog;

    #[test]
    fn test_param_kinds() {
        assert!(ParamKind::Int.matches("42"));
        assert!(!ParamKind::Int.matches("4a"));
        assert!(!ParamKind::Int.matches(""));
        assert!(ParamKind::Str.matches("hello world"));
        assert!(ParamKind::Slug.matches("hello-world_2"));
        assert!(!ParamKind::Slug.matches("hello world"));
        assert_eq!("slug".parse::<ParamKind>(), Ok(ParamKind::Slug));
        assert!("float".parse::<ParamKind>().is_err());
        assert_eq!("a-b".parse::<Slug>(), Ok(Slug("a-b".to_string())));
    }

    #[test]
    fn test_builder() {
        let action = Action::new("show", |_: &mut Blog, _| Ok(json!({})))
            .name("view")
            .prefix("admin_")
            .param::<u64>("id")
            .json();
        let meta = action.meta();
        assert_eq!(meta.name(true).as_deref(), Some("admin_view"));
        assert_eq!(meta.name(false).as_deref(), Some("view"));
        assert_eq!(meta.param().map(|p| (p.kind, p.has_default)), Some((ParamKind::Int, false)));

        let helper = Action::new("_helper", |_: &mut Blog, _| Ok(()));
        assert_eq!(helper.meta().name(true), None);

        let plain = Action::without_request("about", |_: &mut Blog, _| Ok("about"));
        assert_eq!(plain.meta().receives_request(), Some(false));
        assert_eq!(Action::new("about", |_: &mut Blog, _| Ok("about")).meta().receives_request(), None);
        assert_eq!(Action::new("about", |_: &mut Blog, _| Ok("about")).with_request().meta().receives_request(), Some(true));
    }

    #[test]
    fn test_guard() {
        let guard = AccessGuard::new("/login/", |request| request.headers().contains_key("x-user"));

        let request = ActionRequest::get("/blog/edit/?id=1");
        let response = guard.check(&request).unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login/?next=/blog/edit/%3Fid%3D1");

        let ajax: ActionRequest =
            Request::builder().uri("/blog/edit/").header("x-requested-with", "XMLHttpRequest").body(Bytes::new()).unwrap().into();
        assert_eq!(guard.check(&ajax).unwrap().unwrap().status(), StatusCode::FORBIDDEN);

        let user: ActionRequest = Request::builder().uri("/blog/edit/").header("x-user", "1").body(Bytes::new()).unwrap().into();
        assert!(guard.check(&user).unwrap().is_none());
    }
}
