//! Site wide configuration.
//!
//! Every field has a default, so a config can be deserialized from a partial document:
//!
//! ```
//! use micro_controller::{RendererChoice, SiteConfig};
//!
//! let config: SiteConfig = serde_json::from_str(r#"{"default_renderer": "json"}"#).unwrap();
//! assert_eq!(config.default_renderer, RendererChoice::Json);
//! assert_eq!(config.template_extension, "html");
//! ```

use crate::render::{DEFAULT_CHARSET, JsonStyle, RendererChoice, YamlStyle};
use serde::Deserialize;

pub const DEFAULT_FLASH_KEY: &str = "micro_controller_flash";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Renderer wrapping plain action results when neither the action nor the controller picks one.
    pub default_renderer: RendererChoice,
    pub template_extension: String,
    /// Session key holding the flash messages.
    pub flash_key: String,
    /// Use the inflection name derivation unless a controller says otherwise.
    pub inflection: bool,
    /// Path every controller is mounted below, ends with `/`.
    pub mount_prefix: String,
    pub charset: String,
    pub json_style: JsonStyle,
    pub yaml_style: YamlStyle,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            default_renderer: RendererChoice::Template,
            template_extension: "html".to_string(),
            flash_key: DEFAULT_FLASH_KEY.to_string(),
            inflection: false,
            mount_prefix: "/".to_string(),
            charset: DEFAULT_CHARSET.to_string(),
            json_style: JsonStyle::Compact,
            yaml_style: YamlStyle::Flow,
        }
    }
}

impl SiteConfig {
    /// The mount prefix with exactly one leading and one trailing `/`.
    pub fn normalized_mount_prefix(&self) -> String {
        let trimmed = self.mount_prefix.trim_matches('/');
        if trimmed.is_empty() { "/".to_string() } else { format!("/{trimmed}/") }
    }
}

#[cfg(test)]
mod tests {
    use super::SiteConfig;
    use crate::render::{JsonStyle, RendererChoice, YamlStyle};

    #[test]
    fn test_partial_yaml_config() {
        let config: SiteConfig = serde_yaml::from_str("default_renderer: auto\nyaml_style: block\nmount_prefix: app\n").unwrap();
        assert_eq!(config.default_renderer, RendererChoice::Auto);
        assert_eq!(config.yaml_style, YamlStyle::Block);
        assert_eq!(config.json_style, JsonStyle::Compact);
        assert_eq!(config.flash_key, "micro_controller_flash");
        assert_eq!(config.normalized_mount_prefix(), "/app/");
        assert_eq!(SiteConfig::default().normalized_mount_prefix(), "/");
    }
}
