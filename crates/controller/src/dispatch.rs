//! The filter chain.
//!
//! ```text
//! ENTRY -> METHOD_CHECK -> BEFORE_FILTER -> ACTION -> AFTER_FILTER -> RENDER -> DONE
//!                               \______________\___________\____________\-> ERROR
//! ```
//!
//! A failure in any of the filters, the action or the render step is handed once to
//! [`Controller::on_exception`]. The after filter never runs once the chain failed.

use crate::action::{ActionMeta, ActionReply};
use crate::body::ResponseBody;
use crate::catalog::{ActionTable, CatalogEntry};
use crate::context::ActionContext;
use crate::controller::{Controller, ControllerInfo, FilterReply, Recovery};
use crate::error::{ActionError, DispatchError, RenderError};
use crate::negotiate;
use crate::render::{RenderScope, Renderer, RendererChoice, RendererKind, TemplateNaming};
use crate::request::{ActionRequest, RouteParams};
use crate::site::SiteState;
use http::header::ALLOW;
use http::{HeaderValue, Method, Response, StatusCode};
use serde_json::{Map, Value, json};
use std::fmt;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Entry,
    MethodCheck,
    BeforeFilter,
    Action,
    AfterFilter,
    Render,
    Done,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Entry => "entry",
            Stage::MethodCheck => "method_check",
            Stage::BeforeFilter => "before_filter",
            Stage::Action => "action",
            Stage::AfterFilter => "after_filter",
            Stage::Render => "render",
            Stage::Done => "done",
            Stage::Error => "error",
        };
        f.write_str(name)
    }
}

/// Runs `action_name` of the controller owning `table` for one request.
pub(crate) fn dispatch<C: Controller>(
    site: &SiteState,
    table: &ActionTable<C>,
    action_name: &str,
    req: ActionRequest,
    params: RouteParams,
) -> Result<Response<ResponseBody>, DispatchError> {
    let info = table.info().as_ref();
    let Some(entry) = table.get(action_name) else {
        return Err(DispatchError::invalid_action(&info.full_name, action_name));
    };
    let meta = entry.meta.as_ref();
    let short_action = meta.name(false).unwrap_or_else(|| action_name.to_string());
    let mut chain = Chain { site, table, info, meta, action_name, short_action, stage: Stage::Entry };

    chain.enter(Stage::MethodCheck);
    if let Some(response) = method_not_allowed(info, meta, req.method()) {
        debug!(controller = %info.full_name, action = action_name, method = %req.method(), "method not allowed");
        return Ok(response);
    }

    let mut controller = C::default();
    let mut ctx = ActionContext::new(&req, params, info, action_name, meta, &site.config.flash_key, &site.urls);
    let mut response = match chain.run(&mut controller, &mut ctx, entry) {
        Ok(response) => response,
        Err(e) => chain.recover(&mut controller, &mut ctx, e)?,
    };
    ctx.apply_to(&mut response);
    chain.enter(Stage::Done);
    Ok(response)
}

fn method_not_allowed(info: &ControllerInfo, meta: &ActionMeta, method: &Method) -> Option<Response<ResponseBody>> {
    let allowed = if meta.methods().is_empty() { info.methods.as_slice() } else { meta.methods() };
    if allowed.is_empty() || allowed.contains(method) {
        return None;
    }

    let allowed = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    let mut response = Response::new(ResponseBody::from(allowed.clone()));
    *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
    if let Ok(value) = HeaderValue::from_str(&allowed) {
        response.headers_mut().insert(ALLOW, value);
    }
    Some(response)
}

struct Chain<'a, C> {
    site: &'a SiteState,
    table: &'a ActionTable<C>,
    info: &'a ControllerInfo,
    meta: &'a ActionMeta,
    action_name: &'a str,
    short_action: String,
    stage: Stage,
}

impl<C: Controller> Chain<'_, C> {
    fn enter(&mut self, stage: Stage) {
        debug!(controller = %self.info.full_name, action = self.action_name, from = %self.stage, to = %stage, "dispatch stage");
        self.stage = stage;
    }

    fn run(
        &mut self,
        controller: &mut C,
        ctx: &mut ActionContext<'_>,
        entry: &CatalogEntry<C>,
    ) -> Result<Response<ResponseBody>, ActionError> {
        let filters = !self.meta.disable_filters();

        self.enter(Stage::BeforeFilter);
        if filters && !ctx.before_filter_done {
            ctx.before_filter_done = true;
            match controller.before_filter(ctx)? {
                FilterReply::Continue => {}
                FilterReply::Merge(data) => ctx.merge_data(data),
                FilterReply::Response(response) => return Ok(response),
                FilterReply::Render(renderer) => {
                    self.enter(Stage::Render);
                    return Ok(self.render(renderer, ctx)?);
                }
            }
        }

        self.enter(Stage::Action);
        if let Some(guard) = &self.meta.guard
            && let Some(refusal) = guard.check(ctx.request())?
        {
            debug!(controller = %self.info.full_name, action = self.action_name, status = %refusal.status(), "access refused");
            return Ok(refusal);
        }
        ctx.request_passed = self.meta.receives_request().unwrap_or(self.info.pass_request);
        let reply = (entry.handler)(controller, ctx);
        ctx.request_passed = true;
        let mut renderer = match reply? {
            ActionReply::Response(response) => return Ok(response),
            ActionReply::Render(renderer) => renderer,
            ActionReply::Data { payload, status } => {
                let renderer = self.wrap(payload, ctx.request());
                match status {
                    Some(code) => renderer.with_status(StatusCode::from_u16(code).map_err(ActionError::failed)?),
                    None => renderer,
                }
            }
        };
        renderer.fill_missing(ctx.data());

        self.enter(Stage::AfterFilter);
        if filters && !ctx.after_filter_done {
            ctx.after_filter_done = true;
            match controller.after_filter(ctx, &renderer)? {
                FilterReply::Continue => {}
                FilterReply::Merge(data) => renderer.update(Value::Object(data))?,
                FilterReply::Response(response) => return Ok(response),
                FilterReply::Render(_) => {
                    return Err(ActionError::contract("the after filter may only return a mapping or a response"));
                }
            }
        }

        self.enter(Stage::Render);
        Ok(self.render(renderer, ctx)?)
    }

    fn recover(
        &mut self,
        controller: &mut C,
        ctx: &mut ActionContext<'_>,
        failure: ActionError,
    ) -> Result<Response<ResponseBody>, DispatchError> {
        let failed_at = self.stage;
        self.enter(Stage::Error);
        warn!(cause = %failure, controller = %self.info.full_name, action = self.action_name, stage = %failed_at, "action failed");

        let recovery = match controller.on_exception(ctx, &failure) {
            Ok(Some(recovery)) => recovery,
            Ok(None) => {
                error!(cause = %failure, controller = %self.info.full_name, action = self.action_name, "unhandled action failure");
                return Err(DispatchError::Unhandled(failure));
            }
            Err(e) => {
                error!(cause = %e, controller = %self.info.full_name, action = self.action_name, "failure hook failed");
                return Err(DispatchError::Unhandled(e));
            }
        };

        let renderer = match recovery {
            Recovery::Response(response) => return Ok(response),
            Recovery::Mapping(data) => {
                let action = self.info.action_specific_error_template.then_some(self.action_name);
                let template = self.naming(ctx.request()).error_template(action);
                Renderer::template_named(Value::Object(data), template)
            }
            Recovery::Text(text) => Renderer::text(text),
        };
        let renderer = self.with_action_overrides(renderer).with_status(StatusCode::INTERNAL_SERVER_ERROR);

        self.enter(Stage::Render);
        self.render(renderer, ctx).map_err(|e| {
            error!(cause = %e, controller = %self.info.full_name, action = self.action_name, "can't render the failure");
            DispatchError::Unhandled(e.into())
        })
    }

    /// The renderer for a plain action payload.
    fn wrap(&self, payload: Value, req: &ActionRequest) -> Renderer {
        let choice = match self.meta.renderer.unwrap_or(self.info.default_renderer) {
            RendererChoice::Auto => negotiate::select_renderer(req.headers()),
            choice => choice,
        };
        let renderer = Renderer::for_choice(choice, payload)
            .with_json_style(self.info.json_style)
            .with_yaml_style(self.info.yaml_style);
        self.with_action_overrides(renderer)
    }

    fn with_action_overrides(&self, mut renderer: Renderer) -> Renderer {
        if let Some(mimetype) = &self.meta.mimetype {
            renderer = renderer.with_mimetype(mimetype.clone());
        }
        if let Some(charset) = &self.meta.charset {
            renderer = renderer.with_charset(charset.clone());
        }
        renderer
    }

    fn naming(&self, req: &ActionRequest) -> TemplateNaming<'_> {
        TemplateNaming {
            prefix: &self.info.template_prefix,
            action: &self.short_action,
            extension: &self.info.template_extension,
            no_subdirectories: self.info.no_subdirectories,
            ajax: req.is_ajax() && !(self.info.no_ajax_prefix || self.meta.no_ajax_prefix),
            template_name: self.meta.template_name.as_deref(),
            ajax_template_name: self.meta.ajax_template_name.as_deref(),
        }
    }

    fn render(&self, renderer: Renderer, ctx: &ActionContext<'_>) -> Result<Response<ResponseBody>, RenderError> {
        let req = ctx.request();
        let framework = match renderer.kind() {
            RendererKind::Template { .. } => self.framework_context(ctx),
            _ => Map::new(),
        };
        let scope = RenderScope {
            request: req,
            engine: self.site.templates.as_deref(),
            naming: self.naming(req),
            framework,
            default_charset: &self.info.charset,
        };
        renderer.render(&scope)
    }

    /// Fields every template sees next to the action's data.
    fn framework_context(&self, ctx: &ActionContext<'_>) -> Map<String, Value> {
        let req = ctx.request();
        let mut context = Map::new();
        context.insert(
            "request".to_string(),
            json!({
                "method": req.method().as_str(),
                "path": req.uri().path(),
                "query": req.uri().query().unwrap_or_default(),
                "is_ajax": req.is_ajax(),
            }),
        );
        context.insert("controller_name".to_string(), json!(self.info.name));
        context.insert("controller_actions".to_string(), json!(self.table.names().collect::<Vec<_>>()));
        context.insert("action_name".to_string(), json!(self.action_name));
        context.insert(
            "controller_helper".to_string(),
            json!({
                "controller": self.info.full_name,
                "urls": self.site.urls.action_urls(&self.info.full_name),
            }),
        );
        context.insert("flash".to_string(), ctx.flash().to_value());
        context
    }
}
