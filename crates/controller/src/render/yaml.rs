//! YAML rendering in flow and block style.

use crate::error::RenderError;
use serde::Deserialize;
use serde_json::Value;

/// Collection style of the YAML renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YamlStyle {
    /// `{name: ada, tags: [a, b]}`
    #[default]
    Flow,
    /// One key per line, the `serde_yaml` default.
    Block,
}

pub(super) fn to_yaml(value: &Value, style: YamlStyle) -> Result<String, RenderError> {
    match style {
        YamlStyle::Block => Ok(serde_yaml::to_string(value)?),
        YamlStyle::Flow => {
            let mut out = String::new();
            write_flow(&mut out, value)?;
            out.push('\n');
            Ok(out)
        }
    }
}

fn write_flow(out: &mut String, value: &Value) -> Result<(), RenderError> {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_flow(out, item)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key)?;
                out.push_str(": ");
                write_flow(out, item)?;
            }
            out.push('}');
        }
        Value::String(s) => write_string(out, s)?,
        scalar => out.push_str(serde_yaml::to_string(scalar)?.trim_end()),
    }
    Ok(())
}

// serde_yaml quotes for block context, collections need more
fn write_string(out: &mut String, s: &str) -> Result<(), RenderError> {
    let scalar = serde_yaml::to_string(s)?;
    let scalar = scalar.trim_end();
    if needs_flow_quotes(s) || scalar.contains(['\n', ',', '[', ']', '{', '}']) {
        out.push_str(&serde_json::to_string(s)?);
    } else {
        out.push_str(scalar);
    }
    Ok(())
}

const FLOW_INDICATORS: &str = ":?-,[]{}#&*!|>'\"%@`";

fn needs_flow_quotes(s: &str) -> bool {
    s.starts_with(|c: char| FLOW_INDICATORS.contains(c)) || s.ends_with(':') || s.contains(": ") || s.contains(" #")
}

#[cfg(test)]
mod tests {
    use super::{YamlStyle, to_yaml};
    use serde_json::{Value, json};

    #[test]
    fn test_flow_style() {
        let value = json!({"name": "ada", "tags": ["a", "b"], "age": 36, "admin": false, "manager": null});
        let yaml = to_yaml(&value, YamlStyle::Flow).unwrap();
        assert_eq!(yaml, "{name: ada, tags: [a, b], age: 36, admin: false, manager: null}\n");
    }

    #[test]
    fn test_flow_quotes_indicators() {
        let value = json!({"list": "a, b", "multi": "one\ntwo", "bool_like": "true"});
        let yaml = to_yaml(&value, YamlStyle::Flow).unwrap();
        let parsed: Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_flow_quotes_leading_indicators() {
        for s in ["::1", ":)", ":x", "?x", "-x", "- a", "a: b", "x #y", "*x", "&x", "!x", "|", ">", "%x", "@x", "`x", "'x", "\"x", "a:"] {
            let value = json!({(s): s, "list": [s]});
            let yaml = to_yaml(&value, YamlStyle::Flow).unwrap();
            let parsed: Value = serde_yaml::from_str(&yaml).unwrap_or_else(|e| panic!("{s:?} rendered as {yaml:?}: {e}"));
            assert_eq!(parsed, value, "{s:?}");
        }
    }

    #[test]
    fn test_flow_keeps_plain_strings_bare() {
        let value = json!({"url": "http://x", "name": "ada"});
        let yaml = to_yaml(&value, YamlStyle::Flow).unwrap();
        assert_eq!(yaml, "{url: http://x, name: ada}\n");
    }

    #[test]
    fn test_block_style() {
        let yaml = to_yaml(&json!({"a": 1, "b": [true]}), YamlStyle::Block).unwrap();
        assert_eq!(yaml, "a: 1\nb:\n- true\n");
    }
}
