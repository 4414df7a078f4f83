use std::error::Error;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Errors raised while assembling a [`Site`](crate::Site). These are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid url pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route '{path}' can't be registered: {source}")]
    RouteConflict {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("invalid controller '{controller}': {reason}")]
    InvalidController { controller: String, reason: String },
}

impl ConfigError {
    pub fn invalid_pattern<P: ToString, S: ToString>(pattern: P, reason: S) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_controller<C: ToString, S: ToString>(controller: C, reason: S) -> Self {
        Self::InvalidController { controller: controller.to_string(), reason: reason.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("json encode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml encode error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("template '{name}' failed: {reason}")]
    Template { name: String, reason: String },

    #[error("no template engine configured, can't render '{name}'")]
    MissingEngine { name: String },

    #[error("can't update {renderer} renderer: {reason}")]
    Update { renderer: &'static str, reason: String },

    #[error("invalid response: {0}")]
    Response(#[from] http::Error),
}

impl RenderError {
    pub fn template<N: ToString, S: ToString>(name: N, reason: S) -> Self {
        Self::Template { name: name.to_string(), reason: reason.to_string() }
    }

    pub fn update<S: ToString>(renderer: &'static str, reason: S) -> Self {
        Self::Update { renderer, reason: reason.to_string() }
    }
}

/// A failure raised by a filter, an action or the render step.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("{0}")]
    Failed(BoxError),

    #[error("filter contract violated: {reason}")]
    Contract { reason: String },

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("url error: {0}")]
    Url(#[from] UrlError),
}

impl ActionError {
    pub fn failed<E: Into<BoxError>>(e: E) -> Self {
        Self::Failed(e.into())
    }

    pub fn contract<S: ToString>(reason: S) -> Self {
        Self::Contract { reason: reason.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum UrlError {
    #[error("no such controller: {0}")]
    InvalidController(String),

    #[error("no such action: {0}")]
    InvalidAction(String),

    #[error("no url named '{name}' accepts {args}")]
    NoReverseMatch { name: String, args: String },

    #[error("query string encode error: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),
}

impl UrlError {
    pub fn no_reverse_match<N: ToString, A: ToString>(name: N, args: A) -> Self {
        Self::NoReverseMatch { name: name.to_string(), args: args.to_string() }
    }
}

/// Outcome of a dispatch the pipeline could not turn into a response.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Action '{action}' not found in controller '{controller}'")]
    InvalidAction { controller: String, action: String },

    #[error("unhandled action failure: {0}")]
    Unhandled(#[source] ActionError),
}

impl DispatchError {
    pub fn invalid_action<C: ToString, A: ToString>(controller: C, action: A) -> Self {
        Self::InvalidAction { controller: controller.to_string(), action: action.to_string() }
    }
}
