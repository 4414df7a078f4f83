//! Reverse URL lookup.
//!
//! The [`UrlRegistry`] is filled once while the site is assembled and keeps, for every
//! route name, the patterns registered under it in registration order.

use crate::action::INDEX;
use crate::error::UrlError;
use crate::route::{RouteEntry, UrlPattern};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// Path arguments of a reverse lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UrlArgs {
    #[default]
    None,
    /// Filled into the pattern parameters in order.
    Positional(Vec<String>),
    /// Matched to the pattern parameters by name, all of them must be used.
    Named(Vec<(String, String)>),
}

impl UrlArgs {
    pub fn positional<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        UrlArgs::Positional(args.into_iter().map(|arg| arg.to_string()).collect())
    }

    pub fn named<I, K, V>(args: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        UrlArgs::Named(args.into_iter().map(|(name, value)| (name.into(), value.to_string())).collect())
    }

    fn len(&self) -> usize {
        match self {
            UrlArgs::None => 0,
            UrlArgs::Positional(args) => args.len(),
            UrlArgs::Named(args) => args.len(),
        }
    }

    fn fill(&self, base: &str, pattern: &UrlPattern) -> Option<String> {
        if pattern.params().count() != self.len() {
            return None;
        }
        match self {
            UrlArgs::None => pattern.reverse(base, |_| None),
            UrlArgs::Positional(args) => {
                let mut values = args.iter();
                pattern.reverse(base, |_| values.next().map(String::as_str))
            }
            UrlArgs::Named(args) => pattern.reverse(base, |name| {
                args.iter().find(|(arg, _)| arg == name).map(|(_, value)| value.as_str())
            }),
        }
    }
}

impl fmt::Display for UrlArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlArgs::None => f.write_str("no arguments"),
            UrlArgs::Positional(args) => write!(f, "arguments {args:?}"),
            UrlArgs::Named(args) => write!(f, "keyword arguments {args:?}"),
        }
    }
}

#[derive(Debug, Clone)]
struct NamedPattern {
    base: String,
    pattern: UrlPattern,
}

#[derive(Debug, Clone, Default)]
struct ControllerUrls {
    name: String,
    /// action name, with and without prefix, to route name
    actions: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct UrlRegistry {
    routes: IndexMap<String, Vec<NamedPattern>>,
    controllers: IndexMap<String, ControllerUrls>,
}

impl UrlRegistry {
    /// Records the routes of a controller mounted at `base`.
    pub(crate) fn add_controller(&mut self, full_name: &str, name: &str, base: &str, routes: &[RouteEntry]) {
        let controller = self
            .controllers
            .entry(full_name.to_string())
            .or_insert_with(|| ControllerUrls { name: name.to_string(), actions: IndexMap::new() });
        for route in routes {
            controller.actions.entry(route.action.clone()).or_insert_with(|| route.name.clone());
            if let Some(short) = route.meta.name(false) {
                controller.actions.entry(short).or_insert_with(|| route.name.clone());
            }
            let patterns = self.routes.entry(route.name.clone()).or_default();
            if let Some(first) = patterns.iter().find(|p| p.base != base) {
                warn!(route = %route.name, first = %first.base, base, "route name registered by another controller, reverse resolves the first");
            }
            patterns.push(NamedPattern { base: base.to_string(), pattern: route.pattern.clone() });
        }
    }

    fn controller(&self, name: &str) -> Option<&ControllerUrls> {
        self.controllers.get(name).or_else(|| self.controllers.values().find(|c| c.name == name))
    }

    /// Path of the named route, the first registered pattern accepting `args` wins.
    pub fn reverse(&self, name: &str, args: &UrlArgs) -> Result<String, UrlError> {
        self.routes
            .get(name)
            .and_then(|patterns| patterns.iter().find_map(|p| args.fill(&p.base, &p.pattern)))
            .ok_or_else(|| UrlError::no_reverse_match(name, args))
    }

    /// Resolves an action url.
    ///
    /// - `named_url` wins when given
    /// - otherwise `action` of `controller`, by its explicit route name or `{controller}_{action}`
    /// - otherwise the index of `controller`
    ///
    /// A non empty `query` is urlencoded and appended.
    pub fn url_for<Q: Serialize + ?Sized>(
        &self,
        controller: Option<&str>,
        action: Option<&str>,
        named_url: Option<&str>,
        args: &UrlArgs,
        query: Option<&Q>,
    ) -> Result<String, UrlError> {
        let route_name = match named_url {
            Some(name) => name.to_string(),
            None => {
                let controller_name = controller.unwrap_or_default();
                let urls =
                    self.controller(controller_name).ok_or_else(|| UrlError::InvalidController(controller_name.to_string()))?;
                match action {
                    Some(action) => {
                        let action = action.trim_matches(['"', '\'']);
                        urls.actions.get(action).cloned().ok_or_else(|| UrlError::InvalidAction(action.to_string()))?
                    }
                    None => urls.actions.get(INDEX).cloned().unwrap_or_else(|| format!("{}_{INDEX}", urls.name)),
                }
            }
        };

        let mut url = self.reverse(&route_name, args)?;
        if let Some(query) = query {
            let query = serde_urlencoded::to_string(query)?;
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            }
        }
        Ok(url)
    }

    /// Resolves the `controller/action/id` shorthand. Parts written `key:value` set `controller`,
    /// `action` or a named path argument; a missing controller means `current`.
    pub fn reverse_path(&self, shorthand: &str, current: Option<&str>) -> Result<String, UrlError> {
        let mut order = ["controller", "action", "id"].into_iter();
        let mut controller = current.map(str::to_string);
        let mut action = None;
        let mut positional = Vec::new();
        let mut named = Vec::new();

        for part in shorthand.trim_matches(['/', ' ']).split('/').filter(|part| !part.is_empty()) {
            let (key, value, explicit) = match part.split_once(':') {
                Some((key, value)) => (key, value, true),
                None => match order.next() {
                    Some(key) => (key, part, false),
                    None => continue,
                },
            };
            match key {
                "controller" => controller = Some(value.to_string()),
                "action" => action = Some(value.to_string()),
                _ if explicit => named.push((key.to_string(), value.to_string())),
                _ => positional.push(value.to_string()),
            }
        }

        let args = if !named.is_empty() {
            named.extend(positional.into_iter().map(|value| ("id".to_string(), value)));
            UrlArgs::Named(named)
        } else if !positional.is_empty() {
            UrlArgs::Positional(positional)
        } else {
            UrlArgs::None
        };
        self.url_for::<()>(controller.as_deref(), action.as_deref(), None, &args, None)
    }

    /// Parameterless url of every action of a controller, keyed by action name.
    pub fn action_urls(&self, controller: &str) -> Map<String, Value> {
        let mut urls = Map::new();
        if let Some(controller) = self.controller(controller) {
            for (action, route_name) in &controller.actions {
                if let Ok(url) = self.reverse(route_name, &UrlArgs::None) {
                    urls.insert(action.clone(), Value::String(url));
                }
            }
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::{UrlArgs, UrlRegistry};
    use crate::action::Action;
    use crate::controller::ControllerInfo;
    use crate::error::UrlError;
    use crate::route::synthesize;
    use indexmap::IndexMap;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Order;

    fn registry() -> UrlRegistry {
        let info = ControllerInfo::for_tests("order");
        let actions: IndexMap<_, _> = [
            Action::new("index", |_: &mut Order, _| Ok(())),
            Action::new("show", |_: &mut Order, _| Ok(())).param::<u32>("id"),
            Action::new("list", |_: &mut Order, _| Ok(())).optional_param::<u32>("page").prefix("all_"),
            Action::new("export", |_: &mut Order, _| Ok(())).url("export/<slug:format>/").named_url("order_export"),
        ]
        .into_iter()
        .filter_map(|action| action.meta().name(true).map(|name| (name, Arc::new(action.meta().clone()))))
        .collect();

        let routes = synthesize(&info, &actions).unwrap();
        let mut registry = UrlRegistry::default();
        registry.add_controller("shop_order", "order", "/shop_order/", &routes);
        registry
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_shared_route_name_warns() {
        let info = ControllerInfo::for_tests("user");
        let actions: IndexMap<_, _> = [Action::new("index", |_: &mut Order, _| Ok(()))]
            .into_iter()
            .filter_map(|action| action.meta().name(true).map(|name| (name, Arc::new(action.meta().clone()))))
            .collect();
        let routes = synthesize(&info, &actions).unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt().with_writer(move || writer.clone()).with_ansi(false).finish();
        let mut urls = UrlRegistry::default();
        tracing::subscriber::with_default(subscriber, || {
            urls.add_controller("admin_user", "user", "/admin_user/", &routes);
            urls.add_controller("shop_user", "user", "/shop_user/", &routes);
        });

        assert_eq!(urls.reverse("user_index", &UrlArgs::None).unwrap(), "/admin_user/");
        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("route=user_index"), "{logs}");
        assert!(logs.contains("first=/admin_user/"), "{logs}");
    }

    #[test]
    fn test_url_for() {
        let urls = registry();
        let none = UrlArgs::None;
        assert_eq!(urls.url_for::<()>(Some("order"), None, None, &none, None).unwrap(), "/shop_order/");
        assert_eq!(
            urls.url_for::<()>(Some("shop_order"), Some("show"), None, &UrlArgs::positional([7]), None).unwrap(),
            "/shop_order/show/7/"
        );
        assert_eq!(
            urls.url_for(Some("order"), Some("list"), None, &none, Some(&[("sort", "date desc")])).unwrap(),
            "/shop_order/all_list/?sort=date+desc"
        );
        assert_eq!(
            urls.url_for::<()>(None, None, Some("order_export"), &UrlArgs::named([("format", "csv")]), None).unwrap(),
            "/shop_order/export/csv/"
        );
    }

    #[test]
    fn test_url_errors() {
        let urls = registry();
        let none = UrlArgs::None;
        assert!(matches!(urls.url_for::<()>(Some("nope"), None, None, &none, None), Err(UrlError::InvalidController(_))));
        assert!(matches!(urls.url_for::<()>(Some("order"), Some("nope"), None, &none, None), Err(UrlError::InvalidAction(_))));
        assert!(matches!(
            urls.url_for::<()>(Some("order"), Some("show"), None, &UrlArgs::positional(["x"]), None),
            Err(UrlError::NoReverseMatch { .. })
        ));
    }

    #[test]
    fn test_reverse_path() {
        let urls = registry();
        assert_eq!(urls.reverse_path("/order/show/4", None).unwrap(), "/shop_order/show/4/");
        assert_eq!(urls.reverse_path("order/", None).unwrap(), "/shop_order/");
        assert_eq!(urls.reverse_path("action:list", Some("order")).unwrap(), "/shop_order/all_list/");
        assert_eq!(urls.reverse_path("action:show/id:9", Some("order")).unwrap(), "/shop_order/show/9/");
    }

    #[test]
    fn test_action_urls() {
        let urls = registry().action_urls("order");
        assert_eq!(urls["index"], "/shop_order/");
        assert_eq!(urls["list"], "/shop_order/all_list/");
        assert!(!urls.contains_key("show"));
    }
}
