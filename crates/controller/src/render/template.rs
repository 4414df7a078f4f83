use super::RenderScope;
use crate::error::RenderError;
use serde_json::{Map, Value};

/// Inputs of template name resolution for one dispatched action.
#[derive(Debug, Clone, Copy)]
pub struct TemplateNaming<'a> {
    /// Template directory of the controller, its name without prefix by default.
    pub prefix: &'a str,
    /// Action name without prefix.
    pub action: &'a str,
    pub extension: &'a str,
    pub no_subdirectories: bool,
    /// Use the ajax (`_` prefixed) conventions.
    pub ajax: bool,
    pub template_name: Option<&'a str>,
    pub ajax_template_name: Option<&'a str>,
}

impl TemplateNaming<'_> {
    /// Explicit name, then the action's own override, then the convention.
    pub fn resolve(&self, explicit: Option<&str>) -> String {
        if let Some(name) = explicit {
            return name.to_string();
        }
        let configured = if self.ajax { self.ajax_template_name } else { self.template_name };
        match configured {
            Some(name) => name.to_string(),
            None => self.conventional(self.action),
        }
    }

    /// `{prefix}/{action}.{ext}`, or `{prefix}_{action}.{ext}` without subdirectories.
    pub fn conventional(&self, action: &str) -> String {
        let ajax = if self.ajax { "_" } else { "" };
        if self.no_subdirectories {
            format!("{ajax}{}_{action}.{}", self.prefix, self.extension)
        } else {
            format!("{}/{ajax}{action}.{}", self.prefix, self.extension)
        }
    }

    /// `error.{ext}`, or `{prefix}/{action}__error.{ext}` named after the prefixed action
    /// when `action` is given.
    pub fn error_template(&self, action: Option<&str>) -> String {
        if let Some(action) = action {
            self.conventional(&format!("{action}__error"))
        } else {
            let ajax = if self.ajax { "_" } else { "" };
            format!("{ajax}error.{}", self.extension)
        }
    }
}

pub(super) fn render(template_name: Option<String>, data: Value, scope: &RenderScope<'_>) -> Result<String, RenderError> {
    let name = scope.naming.resolve(template_name.as_deref());
    let Some(engine) = scope.engine else {
        return Err(RenderError::MissingEngine { name });
    };

    let mut context = match data {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    for (key, value) in &scope.framework {
        if !context.contains_key(key) {
            context.insert(key.clone(), value.clone());
        }
    }
    engine.render(&name, &context, scope.request)
}
