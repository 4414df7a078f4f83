//! Convention driven controllers on top of the `http` crate types.
//!
//! A controller groups actions. Its name, the URLs of its actions and the templates they
//! render are derived from the controller type and the action names, so a controller like
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
//!
//! is served at `/user/` and `/user/show/<int:id>/`, rendering `user/index.html` and
//! `user/show.html`. Every request runs the filter chain (see [`Stage`]) and failures are
//! handed to [`Controller::on_exception`].

mod action;
mod body;
mod config;
mod context;
mod controller;
mod dispatch;
mod error;
mod flash;
mod handler;
mod helper;
mod request;
mod session;
mod site;
mod template;

pub mod catalog;
pub mod naming;
pub mod negotiate;
pub mod render;
pub mod route;
pub mod router;

pub use action::{AccessGuard, Action, ActionMeta, ActionParam, ActionReply, INDEX, ParamKind, ParamType, Slug};
pub use body::ResponseBody;
pub use config::{DEFAULT_FLASH_KEY, SiteConfig};
pub use context::ActionContext;
pub use controller::{Controller, ControllerDef, ControllerInfo, FilterReply, Recovery};
pub use dispatch::Stage;
pub use error::{ActionError, BoxError, ConfigError, DispatchError, RenderError, UrlError};
pub use flash::{Flash, FlashMessage, KIND_ERROR, KIND_NORMAL};
pub use handler::{NotFoundHandler, RequestHandler};
pub use helper::{UrlArgs, UrlRegistry};
pub use render::{JsonStyle, Renderer, RendererChoice, YamlStyle};
pub use request::{ActionRequest, RouteParams};
pub use session::{MemorySession, SessionHandle, SessionStore};
pub use site::{Site, SiteBuilder, SiteState};
pub use template::{MiniJinjaEngine, TemplateEngine};
