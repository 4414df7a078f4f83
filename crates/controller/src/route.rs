//! URL patterns and route synthesis.
//!
//! Patterns are written relative to the controller root, one segment per `/`:
//!
//! - `archive/` a literal segment
//! - `<int:year>/` a typed parameter, the type being one of `int`, `str` or `slug`
//! - `<name>/` an untyped parameter, matching any segment (`str`)
//!
//! A trailing `/` is significant. An empty pattern addresses the controller root.

use crate::action::{ActionMeta, INDEX, ParamKind};
use crate::controller::ControllerInfo;
use crate::error::ConfigError;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param { name: String, kind: ParamKind },
}

/// A parsed URL pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl UrlPattern {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        if trimmed.is_empty() {
            return Ok(Self { segments: Vec::new(), trailing_slash: false });
        }

        let trailing_slash = trimmed.ends_with('/');
        let body = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let mut segments = Vec::new();
        for part in body.split('/') {
            let segment = parse_segment(part).map_err(|reason| ConfigError::invalid_pattern(raw, reason))?;
            if let Segment::Param { name, .. } = &segment
                && segments.iter().any(|s| matches!(s, Segment::Param { name: existing, .. } if existing == name))
            {
                return Err(ConfigError::invalid_pattern(raw, format!("duplicate parameter '{name}'")));
            }
            segments.push(segment);
        }
        Ok(Self { segments, trailing_slash })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parameters in pattern order.
    pub fn params(&self) -> impl Iterator<Item = (&str, ParamKind)> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param { name, kind } => Some((name.as_str(), *kind)),
            Segment::Literal(_) => None,
        })
    }

    /// `self` mounted below `prefix`.
    pub fn prefixed(&self, prefix: &UrlPattern) -> Result<Self, ConfigError> {
        if prefix.is_root() {
            return Ok(self.clone());
        }
        let mut segments = prefix.segments.clone();
        for segment in &self.segments {
            if let Segment::Param { name, .. } = segment
                && prefix.params().any(|(existing, _)| existing == name.as_str())
            {
                return Err(ConfigError::invalid_pattern(
                    format!("{prefix}{self}"),
                    format!("duplicate parameter '{name}'"),
                ));
            }
            segments.push(segment.clone());
        }
        let trailing_slash = if self.is_root() { prefix.trailing_slash } else { self.trailing_slash };
        Ok(Self { segments, trailing_slash })
    }

    /// The matchit path below `base` (which ends with `/`). Parameters are numbered by
    /// position so that patterns differing only in parameter names share one route.
    pub(crate) fn router_path(&self, base: &str) -> String {
        let mut path = base.to_string();
        let mut index = 0;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                path.push('/');
            }
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Param { .. } => {
                    path.push_str(&format!("{{p{index}}}"));
                    index += 1;
                }
            }
        }
        if self.trailing_slash {
            path.push('/');
        }
        path
    }

    /// Fills the parameters from `value_of`, `None` when one is missing or has the wrong type.
    pub(crate) fn reverse<'v>(&self, base: &str, mut value_of: impl FnMut(&str) -> Option<&'v str>) -> Option<String> {
        let mut path = base.to_string();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                path.push('/');
            }
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Param { name, kind } => {
                    let value = value_of(name.as_str())?;
                    if !kind.matches(value) {
                        return None;
                    }
                    path.extend(percent_encoding::utf8_percent_encode(value, SEGMENT));
                }
            }
        }
        if self.trailing_slash {
            path.push('/');
        }
        Some(path)
    }
}

const SEGMENT: &percent_encoding::AsciiSet =
    &percent_encoding::NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

fn parse_segment(part: &str) -> Result<Segment, String> {
    if part.is_empty() {
        return Err("empty path segment".to_string());
    }
    if part.contains(['{', '}']) {
        return Err("'{' and '}' are not allowed".to_string());
    }

    let Some(inner) = part.strip_prefix('<') else {
        if part.contains(['<', '>']) {
            return Err(format!("parameter '{part}' must span the whole segment"));
        }
        return Ok(Segment::Literal(part.to_string()));
    };
    let Some(inner) = inner.strip_suffix('>') else {
        return Err(format!("unclosed parameter '{part}'"));
    };

    let (kind, name) = match inner.split_once(':') {
        Some((kind, name)) => (kind.parse::<ParamKind>()?, name),
        None => (ParamKind::Str, inner),
    };
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(format!("invalid parameter name '{name}'"));
    }
    Ok(Segment::Param { name: name.to_string(), kind })
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match segment {
                Segment::Literal(literal) => f.write_str(literal)?,
                Segment::Param { name, kind } => write!(f, "<{kind}:{name}>")?,
            }
        }
        if self.trailing_slash {
            f.write_str("/")?;
        }
        Ok(())
    }
}

/// One URL pattern bound to one action.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub pattern: UrlPattern,
    /// Name used by reverse lookups.
    pub name: String,
    /// Canonical action name, with prefix.
    pub action: String,
    pub meta: Arc<ActionMeta>,
}

/// Every route of a controller, in registration order.
///
/// Per action the explicit patterns come first, then the parameterized default pattern,
/// then the bare one. The default patterns of the index action are registered last, so the
/// root parameter never shadows another action.
pub fn synthesize<'a, I>(info: &ControllerInfo, actions: I) -> Result<Vec<RouteEntry>, ConfigError>
where
    I: IntoIterator<Item = (&'a String, &'a Arc<ActionMeta>)>,
{
    let prefixes = info
        .route_prefixes
        .iter()
        .map(|prefix| UrlPattern::parse(prefix))
        .collect::<Result<Vec<_>, _>>()?;

    let expand = |raw: &str| -> Result<Vec<UrlPattern>, ConfigError> {
        let pattern = UrlPattern::parse(raw)?;
        if prefixes.is_empty() {
            return Ok(vec![pattern]);
        }
        prefixes.iter().map(|prefix| pattern.prefixed(prefix)).collect()
    };

    let mut routes = Vec::new();
    let mut index_routes = Vec::new();
    for (action, meta) in actions {
        let short_name = meta.name(false).unwrap_or_else(|| action.clone());
        let route_name = meta.named_url.clone().unwrap_or_else(|| format!("{}_{short_name}", info.name));
        let url_name = action.replace("__", "/");

        let mut patterns = meta.url_patterns.clone();
        let mut index_patterns = Vec::new();
        if !meta.erase_default_urls {
            let bare_allowed = meta.param.as_ref().is_none_or(|param| param.has_default);
            if action == INDEX {
                if let Some(param) = &meta.param {
                    index_patterns.push(format!("<{}:{}>/", param.kind, param.name));
                }
                if bare_allowed {
                    index_patterns.push(String::new());
                }
            } else if let Some(segment) = &meta.url_parameters {
                patterns.push(format!("{url_name}/{segment}"));
            } else {
                if let Some(param) = &meta.param {
                    patterns.push(format!("{url_name}/<{}:{}>/", param.kind, param.name));
                }
                if bare_allowed {
                    patterns.push(format!("{url_name}/"));
                }
            }
        }

        for (raw, target) in patterns.iter().map(|raw| (raw, false)).chain(index_patterns.iter().map(|raw| (raw, true))) {
            for pattern in expand(raw)? {
                debug!(controller = %info.full_name, action = %action, pattern = %pattern, "synthesized route");
                let entry = RouteEntry { pattern, name: route_name.clone(), action: action.clone(), meta: Arc::clone(meta) };
                if target { index_routes.push(entry) } else { routes.push(entry) }
            }
        }
    }
    routes.extend(index_routes);
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::{Segment, UrlPattern, synthesize};
    use crate::action::{Action, ActionMeta, ParamKind};
    use crate::controller::ControllerInfo;
    use indexmap::IndexMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct Shop;

    fn table(actions: Vec<Action<Shop>>) -> IndexMap<String, Arc<ActionMeta>> {
        actions
            .into_iter()
            .filter_map(|action| action.meta().name(true).map(|name| (name, Arc::new(action.meta().clone()))))
            .collect()
    }

    fn patterns(info: &ControllerInfo, actions: Vec<Action<Shop>>) -> Vec<(String, String)> {
        let table = table(actions);
        synthesize(info, &table).unwrap().into_iter().map(|route| (route.pattern.to_string(), route.name)).collect()
    }

    fn info() -> ControllerInfo {
        ControllerInfo::for_tests("shop")
    }

    #[test]
    fn test_parse() {
        let pattern = UrlPattern::parse("archive/<int:year>/<slug>/").unwrap();
        assert_eq!(pattern.segments()[0], Segment::Literal("archive".to_string()));
        assert_eq!(pattern.params().collect::<Vec<_>>(), vec![("year", ParamKind::Int), ("slug", ParamKind::Str)]);
        assert_eq!(pattern.router_path("/blog/"), "/blog/archive/{p0}/{p1}/");
        assert!(UrlPattern::parse("").unwrap().is_root());

        assert!(UrlPattern::parse("a//b").is_err());
        assert!(UrlPattern::parse("x<int:id>/").is_err());
        assert!(UrlPattern::parse("<float:id>/").is_err());
        assert!(UrlPattern::parse("<id>/<id>/").is_err());
        assert!(UrlPattern::parse("{id}/").is_err());
    }

    #[test]
    fn test_reverse() {
        let pattern = UrlPattern::parse("show/<int:id>/").unwrap();
        assert_eq!(pattern.reverse("/shop/", |_| Some("12")).as_deref(), Some("/shop/show/12/"));
        assert_eq!(pattern.reverse("/shop/", |_| Some("x")), None);

        let pattern = UrlPattern::parse("find/<q>/").unwrap();
        assert_eq!(pattern.reverse("/shop/", |_| Some("a b")).as_deref(), Some("/shop/find/a%20b/"));
    }

    #[test]
    fn test_index_with_required_param() {
        let routes = patterns(&info(), vec![Action::new("index", |_: &mut Shop, _| Ok(())).param::<u32>("id")]);
        assert_eq!(routes, vec![("<int:id>/".to_string(), "shop_index".to_string())]);
    }

    #[test]
    fn test_index_with_default_param() {
        let routes = patterns(&info(), vec![Action::new("index", |_: &mut Shop, _| Ok(())).optional_param::<String>("page")]);
        let patterns: Vec<_> = routes.into_iter().map(|(pattern, _)| pattern).collect();
        assert_eq!(patterns, vec!["<str:page>/".to_string(), String::new()]);
    }

    #[test]
    fn test_actions() {
        let routes = patterns(
            &info(),
            vec![
                Action::new("index", |_: &mut Shop, _| Ok(())),
                Action::new("show", |_: &mut Shop, _| Ok(())).param::<crate::action::Slug>("item"),
                Action::new("list", |_: &mut Shop, _| Ok(())).optional_param::<u32>("page").named_url("catalogue"),
                Action::new("archive", |_: &mut Shop, _| Ok(())).url_parameters("<int:year>/<int:month>/"),
                Action::new("feed", |_: &mut Shop, _| Ok(())).url("rss.xml").erase_default_urls(),
                Action::new("admin__users", |_: &mut Shop, _| Ok(())),
                Action::new("_helper", |_: &mut Shop, _| Ok(())),
            ],
        );
        let expected = [
            ("show/<slug:item>/", "shop_show"),
            ("list/<int:page>/", "catalogue"),
            ("list/", "catalogue"),
            ("archive/<int:year>/<int:month>/", "shop_archive"),
            ("rss.xml", "shop_feed"),
            ("admin/users/", "shop_admin__users"),
            ("", "shop_index"),
        ];
        let expected: Vec<_> = expected.iter().map(|(p, n)| (p.to_string(), n.to_string())).collect();
        assert_eq!(routes, expected);
    }

    #[test]
    fn test_route_prefixes_multiply() {
        let mut info = info();
        info.route_prefixes = vec!["<slug:tenant>/".to_string(), "global/".to_string()];
        let routes = patterns(&info, vec![Action::new("index", |_: &mut Shop, _| Ok(())).optional_param::<u32>("id")]);
        let patterns: Vec<_> = routes.into_iter().map(|(pattern, _)| pattern).collect();
        assert_eq!(
            patterns,
            vec!["<slug:tenant>/<int:id>/", "global/<int:id>/", "<slug:tenant>/", "global/"]
        );
    }
}
