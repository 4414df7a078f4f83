//! Renderers turn an action's payload into the final response body.
//!
//! A [`Renderer`] carries the payload together with the rendering intent: which variant
//! materializes it, the mimetype and charset of the result, and an optional status code.
//! Every variant supports [`Renderer::update`], which merges a mapping into a mapping
//! payload; the text variant additionally accepts a string, replacing the payload.
//! Redirects ignore updates.

mod template;
mod yaml;

pub use template::TemplateNaming;
pub use yaml::YamlStyle;

use crate::body::ResponseBody;
use crate::error::RenderError;
use crate::request::ActionRequest;
use crate::template::TemplateEngine;
use http::{HeaderValue, Response, StatusCode, header};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

pub const APPLICATION_YAML: &str = "application/yaml";
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Which renderer wraps an action's plain return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererChoice {
    #[default]
    Template,
    Text,
    Json,
    Yaml,
    /// Pick one from the request's `Accept` header.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonStyle {
    #[default]
    Compact,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererKind {
    Template { template_name: Option<String> },
    Text,
    Json(JsonStyle),
    Yaml(YamlStyle),
    Redirect { location: String, permanent: bool },
}

impl RendererKind {
    fn label(&self) -> &'static str {
        match self {
            RendererKind::Template { .. } => "template",
            RendererKind::Text => "text",
            RendererKind::Json(_) => "json",
            RendererKind::Yaml(_) => "yaml",
            RendererKind::Redirect { .. } => "redirect",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Renderer {
    kind: RendererKind,
    data: Value,
    mimetype: String,
    charset: Option<String>,
    status: Option<StatusCode>,
}

impl Renderer {
    fn new(kind: RendererKind, data: Value, mimetype: &str) -> Self {
        Self { kind, data, mimetype: mimetype.to_string(), charset: None, status: None }
    }

    /// Renders `data` through the conventional template of the current action.
    pub fn template(data: impl Into<Value>) -> Self {
        Self::new(RendererKind::Template { template_name: None }, data.into(), mime::TEXT_HTML.as_ref())
    }

    pub fn template_named(data: impl Into<Value>, template_name: impl Into<String>) -> Self {
        let kind = RendererKind::Template { template_name: Some(template_name.into()) };
        Self::new(kind, data.into(), mime::TEXT_HTML.as_ref())
    }

    pub fn text(data: impl Into<Value>) -> Self {
        Self::new(RendererKind::Text, data.into(), mime::TEXT_PLAIN.as_ref())
    }

    pub fn json(data: impl Into<Value>) -> Self {
        Self::new(RendererKind::Json(JsonStyle::default()), data.into(), mime::APPLICATION_JSON.as_ref())
    }

    pub fn yaml(data: impl Into<Value>) -> Self {
        Self::new(RendererKind::Yaml(YamlStyle::default()), data.into(), APPLICATION_YAML)
    }

    /// A temporary (302) redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::redirect_with(location, false)
    }

    /// A permanent (301) redirect.
    pub fn permanent_redirect(location: impl Into<String>) -> Self {
        Self::redirect_with(location, true)
    }

    pub fn redirect_with(location: impl Into<String>, permanent: bool) -> Self {
        let kind = RendererKind::Redirect { location: location.into(), permanent };
        Self::new(kind, Value::Null, mime::TEXT_HTML.as_ref())
    }

    /// Builds the renderer for a [`RendererChoice`]. `Auto` must be negotiated first, it
    /// falls back to text here.
    pub fn for_choice(choice: RendererChoice, data: Value) -> Self {
        match choice {
            RendererChoice::Template => Self::template(data),
            RendererChoice::Json => Self::json(data),
            RendererChoice::Yaml => Self::yaml(data),
            RendererChoice::Text | RendererChoice::Auto => Self::text(data),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = mimetype.into();
        self
    }

    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    #[must_use]
    pub fn with_json_style(mut self, style: JsonStyle) -> Self {
        if let RendererKind::Json(current) = &mut self.kind {
            *current = style;
        }
        self
    }

    #[must_use]
    pub fn with_yaml_style(mut self, style: YamlStyle) -> Self {
        if let RendererKind::Yaml(current) = &mut self.kind {
            *current = style;
        }
        self
    }

    pub fn kind(&self) -> &RendererKind {
        &self.kind
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.kind, RendererKind::Redirect { .. })
    }

    /// The payload when it is a mapping.
    pub fn context(&self) -> Option<&Map<String, Value>> {
        self.data.as_object()
    }

    /// Merges `data` into the payload.
    pub fn update(&mut self, data: Value) -> Result<(), RenderError> {
        let label = self.kind.label();
        match (&self.kind, &mut self.data, data) {
            (RendererKind::Redirect { .. }, _, _) => Ok(()),
            (_, Value::Object(existing), Value::Object(new)) => {
                existing.extend(new);
                Ok(())
            }
            (RendererKind::Text, existing, Value::String(text)) => {
                *existing = Value::String(text);
                Ok(())
            }
            (_, Value::Object(_), _) => Err(RenderError::update(label, "expecting a mapping")),
            (_, _, _) => Err(RenderError::update(label, "the existing payload is not a mapping")),
        }
    }

    /// Adds the keys of `context` the payload doesn't define yet. No-op for non-mapping payloads.
    pub(crate) fn fill_missing(&mut self, context: &Map<String, Value>) {
        if let Value::Object(existing) = &mut self.data {
            for (key, value) in context {
                if !existing.contains_key(key) {
                    existing.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Materializes the renderer into a response.
    pub fn render(self, scope: &RenderScope<'_>) -> Result<Response<ResponseBody>, RenderError> {
        let status = self.status.unwrap_or(StatusCode::OK);
        let body = match self.kind {
            RendererKind::Redirect { location, permanent } => {
                let status = if permanent { StatusCode::MOVED_PERMANENTLY } else { StatusCode::FOUND };
                let location = HeaderValue::try_from(location).map_err(http::Error::from)?;
                return Ok(Response::builder()
                    .status(status)
                    .header(header::LOCATION, location)
                    .body(ResponseBody::empty())?);
            }
            RendererKind::Template { template_name } => template::render(template_name, self.data, scope)?,
            RendererKind::Text => match self.data {
                Value::String(text) => text,
                other => serde_json::to_string_pretty(&other)?,
            },
            RendererKind::Json(JsonStyle::Compact) => serde_json::to_string(&self.data)?,
            RendererKind::Json(JsonStyle::Pretty) => serde_json::to_string_pretty(&self.data)?,
            RendererKind::Yaml(style) => yaml::to_yaml(&self.data, style)?,
        };

        let charset = self.charset.as_deref().unwrap_or(scope.default_charset);
        let content_type = HeaderValue::try_from(format!("{}; charset={}", self.mimetype, charset)).map_err(http::Error::from)?;
        Ok(Response::builder().status(status).header(header::CONTENT_TYPE, content_type).body(ResponseBody::from(body))?)
    }
}

/// What a renderer may need from the dispatch that produced it.
pub struct RenderScope<'a> {
    pub request: &'a ActionRequest,
    pub engine: Option<&'a dyn TemplateEngine>,
    pub naming: TemplateNaming<'a>,
    /// Framework fields added to a template context.
    pub framework: Map<String, Value>,
    pub default_charset: &'a str,
}

impl fmt::Debug for RenderScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderScope")
            .field("naming", &self.naming)
            .field("has_engine", &self.engine.is_some())
            .finish_non_exhaustive()
    }
}
