use super::{FileBasedHashRingRouter, ROUTER_NAME, Router, RouterOptions};
use crate::core::{Result, RouterError};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a router from host-supplied options.
pub trait RouterFactory: Send + Sync {
    /// Name the host knows the router by
    fn name(&self) -> &'static str;

    fn create(&self, options: RouterOptions) -> Result<Arc<dyn Router>>;
}

/// Factory for [`FileBasedHashRingRouter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBasedHashRingRouterFactory;

impl RouterFactory for FileBasedHashRingRouterFactory {
    fn name(&self) -> &'static str {
        ROUTER_NAME
    }

    fn create(&self, options: RouterOptions) -> Result<Arc<dyn Router>> {
        Ok(Arc::new(FileBasedHashRingRouter::create(options)?))
    }
}

/// The side of a host application that installs router plugins.
pub trait PluginHost {
    fn plugin_package_name(&self) -> &str;

    fn on_plugin_setup(&mut self, factory: Box<dyn RouterFactory>);
}

/// Install the file based router into `host`.
pub fn setup(host: &mut dyn PluginHost) {
    tracing::info!(
        plugin = ROUTER_NAME,
        package = host.plugin_package_name(),
        "Plugin installed"
    );
    host.on_plugin_setup(Box::new(FileBasedHashRingRouterFactory));
}

/// Registry of router factories, keyed by name.
pub struct RouterRegistry {
    package_name: String,
    factories: HashMap<&'static str, Box<dyn RouterFactory>>,
}

impl RouterRegistry {
    pub fn new(package_name: &str) -> Self {
        Self {
            package_name: package_name.to_string(),
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in router installed.
    pub fn with_default_routers(package_name: &str) -> Self {
        let mut registry = Self::new(package_name);
        setup(&mut registry);
        registry
    }

    pub fn register(&mut self, factory: Box<dyn RouterFactory>) {
        tracing::debug!(router = factory.name(), "registered router factory");
        self.factories.insert(factory.name(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn create(&self, name: &str, options: RouterOptions) -> Result<Arc<dyn Router>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RouterError::Configuration(format!("Unknown router '{}'", name)))?;
        factory.create(options)
    }
}

impl PluginHost for RouterRegistry {
    fn plugin_package_name(&self) -> &str {
        &self.package_name
    }

    fn on_plugin_setup(&mut self, factory: Box<dyn RouterFactory>) {
        self.register(factory);
    }
}
