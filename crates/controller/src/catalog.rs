//! The action catalog: every registered controller's actions, built once at startup.

use crate::action::{ActionFn, ActionMeta};
use crate::config::SiteConfig;
use crate::controller::{Controller, ControllerDef, ControllerInfo};
use crate::error::ConfigError;
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One cataloged action.
pub struct CatalogEntry<C> {
    pub meta: Arc<ActionMeta>,
    pub(crate) handler: Arc<ActionFn<C>>,
}

impl<C> Clone for CatalogEntry<C> {
    fn clone(&self) -> Self {
        Self { meta: Arc::clone(&self.meta), handler: Arc::clone(&self.handler) }
    }
}

impl<C> fmt::Debug for CatalogEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry").field("meta", &self.meta).finish_non_exhaustive()
    }
}

/// Actions of one controller by canonical name, in declaration order.
pub struct ActionTable<C> {
    info: Arc<ControllerInfo>,
    actions: IndexMap<String, CatalogEntry<C>>,
}

impl<C> fmt::Debug for ActionTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTable").field("controller", &self.info.full_name).field("actions", &self.actions.keys()).finish()
    }
}

impl<C> ActionTable<C> {
    pub fn info(&self) -> &Arc<ControllerInfo> {
        &self.info
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry<C>> {
        self.actions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CatalogEntry<C>)> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action metadata keyed by name, the shape route synthesis consumes.
    pub fn metas(&self) -> IndexMap<String, Arc<ActionMeta>> {
        self.actions.iter().map(|(name, entry)| (name.clone(), Arc::clone(&entry.meta))).collect()
    }
}

type AnyTable = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct ActionCatalog {
    tables: HashMap<(TypeId, bool), AnyTable>,
    names: HashMap<String, TypeId>,
}

impl fmt::Debug for ActionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCatalog").field("controllers", &self.names.keys()).finish()
    }
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogs `C`. Returns `None` when `C` or another controller with the same name was
    /// registered before; the first registration wins.
    pub fn register<C: Controller>(&mut self, config: &SiteConfig) -> Result<Option<Arc<ControllerInfo>>, ConfigError> {
        let type_id = TypeId::of::<C>();
        if self.tables.contains_key(&(type_id, true)) {
            debug!(controller = std::any::type_name::<C>(), "controller already cataloged");
            return Ok(None);
        }

        let def = C::define(ControllerDef::new());
        let info = Arc::new(def.resolve(config));
        if self.names.contains_key(&info.full_name) {
            warn!(controller = %info.full_name, ty = std::any::type_name::<C>(), "duplicate controller name, keeping the first");
            return Ok(None);
        }
        if info.full_name.is_empty() || info.full_name.contains(['/', '{', '}']) {
            return Err(ConfigError::invalid_controller(&info.full_name, "name must be a single non empty path segment"));
        }

        for with_prefix in [true, false] {
            let mut actions = IndexMap::with_capacity(def.actions.len());
            for action in &def.actions {
                let Some(name) = action.meta.name(with_prefix) else {
                    debug!(controller = %info.full_name, method = action.meta.fn_name(), "not an action name, skipped");
                    continue;
                };
                let entry = CatalogEntry { meta: Arc::new(action.meta.clone()), handler: Arc::clone(&action.handler) };
                if actions.insert(name.clone(), entry).is_some() {
                    return Err(ConfigError::invalid_controller(&info.full_name, format!("action '{name}' is declared twice")));
                }
            }
            let table: AnyTable = Arc::new(ActionTable::<C> { info: Arc::clone(&info), actions });
            self.tables.insert((type_id, with_prefix), table);
        }

        info!(controller = %info.full_name, actions = def.actions.len(), "controller cataloged");
        self.names.insert(info.full_name.clone(), type_id);
        Ok(Some(info))
    }

    /// The action table of `C`, the same shared table on every call.
    pub fn actions_of<C: Controller>(&self, with_prefix: bool) -> Option<Arc<ActionTable<C>>> {
        let table = self.tables.get(&(TypeId::of::<C>(), with_prefix))?;
        Arc::clone(table).downcast::<ActionTable<C>>().ok()
    }

    pub fn contains(&self, controller_name: &str) -> bool {
        self.names.contains_key(controller_name)
    }
}

#[cfg(test)]
mod tests {
    use super::ActionCatalog;
    use crate::action::Action;
    use crate::config::SiteConfig;
    use crate::context::ActionContext;
    use crate::controller::{Controller, ControllerDef};
    use crate::error::{ActionError, ConfigError};
    use serde_json::{Value, json};
    use std::sync::Arc;

    #[derive(Default)]
    struct ProductController;

    impl ProductController {
        fn list(&mut self, _ctx: &mut ActionContext<'_>) -> Result<Value, ActionError> {
            Ok(json!([]))
        }
    }

    impl Controller for ProductController {
        fn define(def: ControllerDef<Self>) -> ControllerDef<Self> {
            def.action(Action::new("list", Self::list))
                .action(Action::new("index", |_: &mut Self, _| Ok(())).prefix("p_"))
                .action(Action::new("_secret", Self::list))
                .action(Action::new("Upper", Self::list))
                .action(Action::new("9lives", Self::list))
        }
    }

    #[derive(Default)]
    struct OtherProductController;

    impl Controller for OtherProductController {
        fn define(def: ControllerDef<Self>) -> ControllerDef<Self> {
            def.name("product")
        }
    }

    #[derive(Default)]
    struct TwiceController;

    impl Controller for TwiceController {
        fn define(def: ControllerDef<Self>) -> ControllerDef<Self> {
            def.action(Action::new("show", |_: &mut Self, _| Ok(()))).action(Action::new("display", |_: &mut Self, _| Ok(())).name("show"))
        }
    }

    #[test]
    fn test_actions_of() {
        let mut catalog = ActionCatalog::new();
        let info = catalog.register::<ProductController>(&SiteConfig::default()).unwrap().unwrap();
        assert_eq!(info.full_name, "product");

        let table = catalog.actions_of::<ProductController>(true).unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["list", "p_index"]);
        let sans_prefix = catalog.actions_of::<ProductController>(false).unwrap();
        assert_eq!(sans_prefix.names().collect::<Vec<_>>(), vec!["list", "index"]);

        let again = catalog.actions_of::<ProductController>(true).unwrap();
        assert!(Arc::ptr_eq(&table, &again));
    }

    #[test]
    fn test_first_registration_wins() {
        let mut catalog = ActionCatalog::new();
        let config = SiteConfig::default();
        assert!(catalog.register::<ProductController>(&config).unwrap().is_some());
        assert!(catalog.register::<ProductController>(&config).unwrap().is_none());
        assert!(catalog.register::<OtherProductController>(&config).unwrap().is_none());
        assert!(catalog.actions_of::<OtherProductController>(true).is_none());
        assert!(catalog.contains("product"));
    }

    #[test]
    fn test_duplicate_action() {
        let mut catalog = ActionCatalog::new();
        let result = catalog.register::<TwiceController>(&SiteConfig::default());
        assert!(matches!(result, Err(ConfigError::InvalidController { .. })));
    }
}
