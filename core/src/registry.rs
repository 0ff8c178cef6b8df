//! Plugin registry: lookup of plugins by `<type>.<name>` reference.

use crate::errors::RegistryError;
use crate::event::{spawn_publish, Event, EventBus};
use crate::plugin::Plugin;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Splits a `"<type>.<name>"` plugin reference, rejecting anything else.
/// Used both by the registry on registration and by callers resolving a
/// step's `plugin` field.
pub fn parse_plugin_ref(reference: &str) -> Result<(&str, &str), RegistryError> {
    match reference.split_once('.') {
        Some((ty, name)) if !ty.is_empty() && !name.is_empty() => Ok((ty, name)),
        _ => Err(RegistryError::MalformedRef(reference.to_string())),
    }
}

/// Holds every plugin available to the engine, keyed by its full reference.
///
/// Reads never cross an `.await`, so a plain `RwLock` is enough here; the
/// registry is built once at startup and then read far more often than
/// written.
#[derive(Default)]
pub struct Registry {
    plugins: RwLock<HashMap<String, Arc<dyn Plugin>>>,
    bus: Option<EventBus>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that publishes `plugin.registered` to `bus` as plugins are
    /// added, for composition roots that want to observe the event.
    pub fn with_bus(bus: EventBus) -> Self {
        Self {
            plugins: RwLock::new(HashMap::new()),
            bus: Some(bus),
        }
    }

    /// Register a plugin under its own `name()`. Fails if a plugin with the
    /// same `<type>.<name>` is already registered.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> Result<(), RegistryError> {
        let reference = plugin.name().to_string();
        let (ty, name) = parse_plugin_ref(&reference)?;
        let mut plugins = self.plugins.write().expect("registry lock poisoned");
        if plugins.contains_key(&reference) {
            return Err(RegistryError::DuplicatePlugin(ty.to_string(), name.to_string()));
        }
        info!(plugin = %reference, "registered plugin");
        plugins.insert(reference.clone(), plugin);
        drop(plugins);
        if let Some(bus) = &self.bus {
            spawn_publish(bus.clone(), Event::PluginRegistered { reference });
        }
        Ok(())
    }

    pub fn get(&self, reference: &str) -> Result<Arc<dyn Plugin>, RegistryError> {
        let (ty, name) = parse_plugin_ref(reference)?;
        self.plugins
            .read()
            .expect("registry lock poisoned")
            .get(reference)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(ty.to_string(), name.to_string()))
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.plugins
            .read()
            .expect("registry lock poisoned")
            .contains_key(reference)
    }

    /// List every registered plugin reference, grouped for discovery
    /// endpoints (HTTP surface, MCP tool listing).
    pub fn list(&self) -> Vec<String> {
        let plugins = self.plugins.read().expect("registry lock poisoned");
        let mut names: Vec<String> = plugins.keys().cloned().collect();
        names.sort();
        debug!(count = names.len(), "listed registered plugins");
        names
    }

    /// List every plugin registered under `type_name`, sorted by name.
    pub fn list_by_type(&self, type_name: &str) -> Vec<Arc<dyn Plugin>> {
        let plugins = self.plugins.read().expect("registry lock poisoned");
        let mut matches: Vec<(&str, Arc<dyn Plugin>)> = plugins
            .iter()
            .filter_map(|(reference, plugin)| {
                let (ty, name) = parse_plugin_ref(reference).ok()?;
                (ty == type_name).then(|| (name, plugin.clone()))
            })
            .collect();
        matches.sort_by_key(|(name, _)| *name);
        matches.into_iter().map(|(_, plugin)| plugin).collect()
    }

    /// The full registry grouped as `type -> name -> plugin`, for the
    /// `ListAll` contract operation.
    pub fn list_all(&self) -> HashMap<String, HashMap<String, Arc<dyn Plugin>>> {
        let plugins = self.plugins.read().expect("registry lock poisoned");
        let mut grouped: HashMap<String, HashMap<String, Arc<dyn Plugin>>> = HashMap::new();
        for (reference, plugin) in plugins.iter() {
            if let Ok((ty, name)) = parse_plugin_ref(reference) {
                grouped.entry(ty.to_string()).or_default().insert(name.to_string(), plugin.clone());
            }
        }
        grouped
    }

    /// Every distinct plugin type currently registered.
    pub fn types(&self) -> Vec<String> {
        let plugins = self.plugins.read().expect("registry lock poisoned");
        let mut types: std::collections::HashSet<String> = std::collections::HashSet::new();
        for reference in plugins.keys() {
            if let Ok((ty, _)) = parse_plugin_ref(reference) {
                types.insert(ty.to_string());
            }
        }
        let mut types: Vec<String> = types.into_iter().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::test_support::EchoPlugin;

    #[test]
    fn parses_well_formed_reference() {
        assert_eq!(parse_plugin_ref("Data_Processing.echo"), Ok(("Data_Processing", "echo")));
    }

    #[test]
    fn rejects_reference_without_dot() {
        assert!(parse_plugin_ref("echo").is_err());
    }

    #[test]
    fn register_then_get_roundtrips() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoPlugin)).unwrap();
        assert!(registry.get("Test.echo").is_ok());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoPlugin)).unwrap();
        let err = registry.register(Arc::new(EchoPlugin)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicatePlugin(..)));
    }

    #[test]
    fn missing_plugin_reports_not_found() {
        let registry = Registry::new();
        let err = registry.get("Data_Processing.missing").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(..)));
    }

    #[test]
    fn list_by_type_and_types_group_correctly() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoPlugin)).unwrap();
        assert_eq!(registry.types(), vec!["Test".to_string()]);
        assert_eq!(registry.list_by_type("Test").len(), 1);
        assert!(registry.list_by_type("Other").is_empty());
    }

    #[test]
    fn list_all_groups_by_type_then_name() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoPlugin)).unwrap();
        let all = registry.list_all();
        assert!(all.get("Test").and_then(|names| names.get("echo")).is_some());
    }

    #[tokio::test]
    async fn register_with_bus_publishes_plugin_registered() {
        use crate::event::EventBus;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        bus.subscribe(
            "plugin_registered",
            Arc::new(move |event| {
                let seen = seen_clone.clone();
                Box::pin(async move {
                    if let Event::PluginRegistered { reference } = event {
                        assert_eq!(reference, "Test.echo");
                    }
                    seen.fetch_add(1, Ordering::SeqCst);
                })
            }),
        )
        .await;

        let registry = Registry::with_bus(bus);
        registry.register(Arc::new(EchoPlugin)).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
