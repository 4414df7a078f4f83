//! Per-request state shared by the filters and the action of one dispatch.

use crate::action::ActionMeta;
use crate::controller::ControllerInfo;
use crate::error::UrlError;
use crate::flash::Flash;
use crate::helper::{UrlArgs, UrlRegistry};
use crate::request::{ActionRequest, RouteParams};
use cookie::Cookie;
use http::header::{HeaderName, HeaderValue, SET_COOKIE};
use http::{HeaderMap, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Everything a filter or an action sees of the current dispatch.
///
/// Owned by exactly one dispatch and dropped with it.
pub struct ActionContext<'a> {
    request: &'a ActionRequest,
    params: RouteParams,
    url_params: RouteParams,
    controller: &'a ControllerInfo,
    action_name: &'a str,
    action: &'a ActionMeta,
    flash_key: &'a str,
    urls: &'a UrlRegistry,
    data: Map<String, Value>,
    headers: HeaderMap,
    cookies: Vec<Cookie<'static>>,
    pub(crate) before_filter_done: bool,
    pub(crate) after_filter_done: bool,
    pub(crate) request_passed: bool,
}

impl fmt::Debug for ActionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("controller", &self.controller.name)
            .field("action", &self.action_name)
            .field("params", &self.params)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(
        request: &'a ActionRequest,
        url_params: RouteParams,
        controller: &'a ControllerInfo,
        action_name: &'a str,
        action: &'a ActionMeta,
        flash_key: &'a str,
        urls: &'a UrlRegistry,
    ) -> Self {
        Self {
            request,
            params: url_params.without(&controller.consume_params),
            url_params,
            controller,
            action_name,
            action,
            flash_key,
            urls,
            data: Map::new(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            before_filter_done: false,
            after_filter_done: false,
            request_passed: true,
        }
    }

    pub fn request(&self) -> &'a ActionRequest {
        self.request
    }

    /// The request as handed to the action, `None` while an action that does not receive
    /// it runs.
    pub fn passed_request(&self) -> Option<&'a ActionRequest> {
        self.request_passed.then_some(self.request)
    }

    /// Route parameters meant for the action, without the controller's consumed ones.
    pub fn params(&self) -> &RouteParams {
        &self.params
    }

    /// Every captured route parameter.
    pub fn url_params(&self) -> &RouteParams {
        &self.url_params
    }

    /// Parses a route parameter.
    pub fn param<T: FromStr>(&self, name: &str) -> Option<T> {
        self.params.parse(name)
    }

    pub fn controller(&self) -> &'a ControllerInfo {
        self.controller
    }

    pub fn controller_name(&self) -> &'a str {
        &self.controller.name
    }

    /// Canonical action name, with prefix.
    pub fn action_name(&self) -> &'a str {
        self.action_name
    }

    pub fn action(&self) -> &'a ActionMeta {
        self.action
    }

    pub fn is_ajax(&self) -> bool {
        self.request.is_ajax()
    }

    pub fn flash(&self) -> Flash<'a> {
        Flash::new(self.request.session(), self.flash_key)
    }

    /// Template data merged by the before filter.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    pub(crate) fn merge_data(&mut self, data: Map<String, Value>) {
        self.data.extend(data);
    }

    /// Sets a header on the response, replacing any previous value.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.cookies.retain(|existing| existing.name() != cookie.name());
        self.cookies.push(cookie);
    }

    /// Expires the cookie on the client.
    pub fn delete_cookie(&mut self, name: impl Into<String>) {
        let mut cookie = Cookie::build((name.into(), "")).path("/").build();
        cookie.make_removal();
        self.set_cookie(cookie);
    }

    /// Resolves an action url, see [`UrlRegistry::url_for`].
    pub fn url_for<Q: Serialize>(
        &self,
        controller: Option<&str>,
        action: Option<&str>,
        args: &UrlArgs,
        query: Option<&Q>,
    ) -> Result<String, UrlError> {
        let controller = controller.unwrap_or(&self.controller.full_name);
        self.urls.url_for(Some(controller), action, None, args, query)
    }

    /// Resolves a named url.
    pub fn url_named<Q: Serialize>(&self, name: &str, args: &UrlArgs, query: Option<&Q>) -> Result<String, UrlError> {
        self.urls.url_for(None, None, Some(name), args, query)
    }

    pub fn urls(&self) -> &'a UrlRegistry {
        self.urls
    }

    /// Copies the collected headers and cookies onto `response`.
    pub(crate) fn apply_to<B>(&self, response: &mut Response<B>) {
        for (name, value) in &self.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        for cookie in &self.cookies {
            match HeaderValue::try_from(cookie.to_string()) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => warn!(cause = %e, cookie = cookie.name(), "dropping cookie with invalid header value"),
            }
        }
    }
}
