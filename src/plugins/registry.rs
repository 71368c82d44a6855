//! Registration table for plugin factories

use super::{AuthProvider, Connector, StaticAuthProvider, Transformer};
use crate::config::ConnectorConfig;
use crate::connector::{ApiConnector, SseConnector};
use crate::error::{Error, Result};
use crate::types::ValueMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds a transformer from its parameters
pub type TransformerFactory = Arc<dyn Fn(&ValueMap) -> Result<Box<dyn Transformer>> + Send + Sync>;

/// Builds a connector from a connector config
pub type ConnectorFactory =
    Arc<dyn Fn(ConnectorConfig) -> Result<Box<dyn Connector>> + Send + Sync>;

/// Builds an auth provider from its parameters
pub type AuthFactory = Arc<dyn Fn(&ValueMap) -> Result<Box<dyn AuthProvider>> + Send + Sync>;

/// Plugin role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Transformer,
    Connector,
    Auth,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Transformer => "transformer",
            PluginKind::Connector => "connector",
            PluginKind::Auth => "auth",
        }
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub kind: PluginKind,
    pub name: String,
}

#[derive(Clone)]
enum Factory {
    Transformer(TransformerFactory),
    Connector(ConnectorFactory),
    Auth(AuthFactory),
}

impl Factory {
    fn kind(&self) -> PluginKind {
        match self {
            Factory::Transformer(_) => PluginKind::Transformer,
            Factory::Connector(_) => PluginKind::Connector,
            Factory::Auth(_) => PluginKind::Auth,
        }
    }
}

/// Plugin factories keyed by `(kind, name)`
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: BTreeMap<(PluginKind, String), Factory>,
}

impl PluginRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `rest` and `sse` connectors and the
    /// `static` auth provider
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_connector("rest", |config| {
            Ok(Box::new(ApiConnector::new(config)?) as Box<dyn Connector>)
        });
        registry.register_connector("sse", |config| {
            let connector = SseConnector::from_connector(ApiConnector::new(config)?)?;
            Ok(Box::new(connector) as Box<dyn Connector>)
        });
        registry.register_auth("static", |_| {
            Ok(Box::new(StaticAuthProvider) as Box<dyn AuthProvider>)
        });
        registry
    }

    fn insert(&mut self, name: String, factory: Factory) {
        let kind = factory.kind();
        if self.factories.contains_key(&(kind, name.clone())) {
            warn!(kind = %kind, name = %name, "Overwriting existing plugin");
        }
        debug!(kind = %kind, name = %name, "Registered plugin");
        self.factories.insert((kind, name), factory);
    }

    /// Register a transformer factory, replacing any with the same name
    pub fn register_transformer<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ValueMap) -> Result<Box<dyn Transformer>> + Send + Sync + 'static,
    {
        self.insert(name.into(), Factory::Transformer(Arc::new(factory)));
    }

    /// Register a connector factory, replacing any with the same name
    pub fn register_connector<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(ConnectorConfig) -> Result<Box<dyn Connector>> + Send + Sync + 'static,
    {
        self.insert(name.into(), Factory::Connector(Arc::new(factory)));
    }

    /// Register an auth provider factory, replacing any with the same name
    pub fn register_auth<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ValueMap) -> Result<Box<dyn AuthProvider>> + Send + Sync + 'static,
    {
        self.insert(name.into(), Factory::Auth(Arc::new(factory)));
    }

    /// Whether a plugin is registered
    pub fn contains(&self, kind: PluginKind, name: &str) -> bool {
        self.factories.contains_key(&(kind, name.to_string()))
    }

    /// Registered plugins, optionally of one kind, ordered by kind then name
    pub fn list(&self, kind: Option<PluginKind>) -> Vec<PluginInfo> {
        self.factories
            .keys()
            .filter(|(k, _)| kind.map_or(true, |wanted| *k == wanted))
            .map(|(kind, name)| PluginInfo {
                kind: *kind,
                name: name.clone(),
            })
            .collect()
    }

    fn factory(&self, kind: PluginKind, name: &str) -> Result<&Factory> {
        self.factories
            .get(&(kind, name.to_string()))
            .ok_or_else(|| Error::config(format!("Plugin not found: {kind}.{name}")))
    }

    /// Instantiate a transformer
    pub fn transformer(&self, name: &str, params: &ValueMap) -> Result<Box<dyn Transformer>> {
        match self.factory(PluginKind::Transformer, name)? {
            Factory::Transformer(factory) => factory(params),
            _ => Err(Error::config(format!("Plugin {name} is not a transformer"))),
        }
    }

    /// Instantiate a connector of type `name`
    pub fn connector(&self, name: &str, config: ConnectorConfig) -> Result<Box<dyn Connector>> {
        match self.factory(PluginKind::Connector, name)? {
            Factory::Connector(factory) => factory(config),
            _ => Err(Error::config(format!("Plugin {name} is not a connector"))),
        }
    }

    /// Instantiate an auth provider
    pub fn auth_provider(&self, name: &str, params: &ValueMap) -> Result<Box<dyn AuthProvider>> {
        match self.factory(PluginKind::Auth, name)? {
            Factory::Auth(factory) => factory(params),
            _ => Err(Error::config(format!("Plugin {name} is not an auth provider"))),
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.list(None))
            .finish()
    }
}
