//! Template engine seam.
//!
//! The template renderer hands a resolved template name and the accumulated context to a
//! [`TemplateEngine`]. [`MiniJinjaEngine`] is the bundled implementation.

use crate::error::RenderError;
use crate::request::ActionRequest;
use minijinja::Environment;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// Renders a named template with a context mapping.
#[cfg_attr(test, mockall::automock)]
pub trait TemplateEngine: Send + Sync {
    fn render(&self, name: &str, context: &Map<String, Value>, request: &ActionRequest) -> Result<String, RenderError>;
}

/// A [`TemplateEngine`] backed by minijinja.
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl fmt::Debug for MiniJinjaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniJinjaEngine").finish_non_exhaustive()
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniJinjaEngine {
    pub fn new() -> Self {
        Self { env: Environment::new() }
    }

    /// Loads templates lazily from `dir`, so `user/list.html` maps to `{dir}/user/list.html`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(dir));
        Self { env }
    }

    /// Registers an in-memory template.
    pub fn add_template(&mut self, name: impl Into<String>, source: impl Into<String>) -> Result<(), RenderError> {
        let name = name.into();
        self.env.add_template_owned(name.clone(), source.into()).map_err(|e| RenderError::template(name, e))
    }

    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render(&self, name: &str, context: &Map<String, Value>, _request: &ActionRequest) -> Result<String, RenderError> {
        let template = self.env.get_template(name).map_err(|e| RenderError::template(name, e))?;
        template.render(context).map_err(|e| RenderError::template(name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::{MiniJinjaEngine, TemplateEngine};
    use crate::error::RenderError;
    use crate::request::ActionRequest;
    use serde_json::json;

    #[test]
    fn test_render_in_memory_template() {
        let mut engine = MiniJinjaEngine::new();
        engine.add_template("user/show.html", "{{ action_name }}: {{ user.name }}").unwrap();

        let context = json!({"user": {"name": "ada"}, "action_name": "show"});
        let request = ActionRequest::get("/user/show/");
        let output = engine.render("user/show.html", context.as_object().unwrap(), &request).unwrap();
        assert_eq!(output, "show: ada");
    }

    #[test]
    fn test_missing_template() {
        let engine = MiniJinjaEngine::new();
        let request = ActionRequest::get("/");
        let result = engine.render("nope.html", &serde_json::Map::new(), &request);
        assert!(matches!(result, Err(RenderError::Template { name, .. }) if name == "nope.html"));
    }
}
