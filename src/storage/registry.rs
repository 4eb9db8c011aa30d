//! Provider registry and factory
//!
//! Built once at startup and passed by reference; the name map is read-only
//! after registration.

use super::error::{ConnectionError, RegistryError};
use super::{azure, dropbox, local, ConnectionDescriptor, ProviderConfig, StorageProvider};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Builds a provider from its configuration
pub type ProviderConstructor =
    fn(&ProviderConfig) -> Result<Box<dyn StorageProvider>, ConnectionError>;

/// Maps provider names to constructors
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every provider shipped with this crate
    pub fn with_builtin_providers() -> Self {
        let mut registry = Self::new();
        for (name, constructor) in [
            (azure::PROVIDER_NAME, azure::construct as ProviderConstructor),
            (dropbox::PROVIDER_NAME, dropbox::construct as ProviderConstructor),
            (local::PROVIDER_NAME, local::construct as ProviderConstructor),
        ] {
            // Built-in names are distinct
            let _ = registry.register(name, constructor);
        }
        registry
    }

    /// Register a provider; a name may only be registered once
    pub fn register(
        &mut self,
        name: &str,
        constructor: ProviderConstructor,
    ) -> Result<(), RegistryError> {
        let name = name.to_lowercase();
        if self.providers.contains_key(&name) {
            warn!("Ignoring duplicate registration of storage provider '{}'", name);
            return Err(RegistryError::DuplicateProvider(name));
        }
        debug!("Registered storage provider '{}'", name);
        self.providers.insert(name, constructor);
        Ok(())
    }

    /// Registered names, sorted
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(&name.to_lowercase())
    }

    /// Build the provider selected by the connection string's scheme
    pub fn create_from_connection_string(
        &self,
        connection_string: &str,
        config: &ProviderConfig,
    ) -> Result<Box<dyn StorageProvider>, RegistryError> {
        let descriptor = ConnectionDescriptor::parse(connection_string.trim())?;
        let constructor = self.lookup(descriptor.scheme())?;

        let mut config = config.clone();
        config.connection_string = Some(connection_string.trim().to_string());

        debug!("Creating '{}' provider for {}", descriptor.scheme(), descriptor);
        Ok(constructor(&config)?)
    }

    /// Build a provider by explicit name, ignoring any connection string scheme
    pub fn create(
        &self,
        provider_name: &str,
        config: &ProviderConfig,
    ) -> Result<Box<dyn StorageProvider>, RegistryError> {
        let constructor = self.lookup(provider_name.trim())?;
        debug!("Creating '{}' provider (explicit)", provider_name.trim());
        Ok(constructor(config)?)
    }

    fn lookup(&self, name: &str) -> Result<ProviderConstructor, RegistryError> {
        self.providers
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| RegistryError::UnknownProvider {
                name: name.to_string(),
                available: self.provider_names(),
            })
    }
}
