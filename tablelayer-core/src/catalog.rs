//! Name to factory lookup for drivers and BLOB stores.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    blob::BlobStoreFactory,
    config::is_identifier,
    driver::DriverFactory,
    error::{DatabaseError, DatabaseResult},
};

/// The drivers and BLOB stores a database configuration may name.
///
/// Names are case-insensitive identifiers.
#[derive(Clone, Default)]
pub struct DriverCatalog {
    drivers: HashMap<String, Arc<dyn DriverFactory>>,
    blobs: HashMap<String, Arc<dyn BlobStoreFactory>>,
}

impl DriverCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a driver factory, replacing any factory of the same name.
    pub fn register_driver(&mut self, name: &str, factory: impl DriverFactory + 'static) -> &mut Self {
        self.drivers.insert(name.to_lowercase(), Arc::new(factory));
        self
    }

    /// Registers a BLOB-store factory, replacing any factory of the same name.
    pub fn register_blob(&mut self, name: &str, factory: impl BlobStoreFactory + 'static) -> &mut Self {
        self.blobs.insert(name.to_lowercase(), Arc::new(factory));
        self
    }

    pub fn with_driver(mut self, name: &str, factory: impl DriverFactory + 'static) -> Self {
        self.register_driver(name, factory);
        self
    }

    pub fn with_blob(mut self, name: &str, factory: impl BlobStoreFactory + 'static) -> Self {
        self.register_blob(name, factory);
        self
    }

    pub fn driver(&self, name: &str) -> DatabaseResult<Arc<dyn DriverFactory>> {
        lookup(&self.drivers, "driver", name)
    }

    pub fn blob(&self, name: &str) -> DatabaseResult<Arc<dyn BlobStoreFactory>> {
        lookup(&self.blobs, "BLOB store", name)
    }

    /// Registered driver names, sorted.
    pub fn driver_names(&self) -> Vec<String> {
        sorted_keys(&self.drivers)
    }

    /// Registered BLOB-store names, sorted.
    pub fn blob_names(&self) -> Vec<String> {
        sorted_keys(&self.blobs)
    }
}

fn lookup<T: ?Sized>(map: &HashMap<String, Arc<T>>, kind: &str, name: &str) -> DatabaseResult<Arc<T>> {
    if !is_identifier(name) {
        return Err(DatabaseError::Configuration(format!("invalid {kind} name: {name:?}")));
    }

    map.get(&name.to_lowercase())
        .cloned()
        .ok_or_else(|| DatabaseError::Configuration(format!("unknown {kind}: {name}")))
}

fn sorted_keys<T: ?Sized>(map: &HashMap<String, Arc<T>>) -> Vec<String> {
    let mut names = map.keys().cloned().collect::<Vec<_>>();
    names.sort();
    names
}

impl fmt::Debug for DriverCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverCatalog")
            .field("drivers", &self.driver_names())
            .field("blobs", &self.blob_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NullBlobFactory, SpyFactory};

    #[test]
    fn lookups_are_case_insensitive() {
        let catalog = DriverCatalog::new()
            .with_driver("Mock", SpyFactory::default())
            .with_blob("null", NullBlobFactory);

        assert!(catalog.driver("mock").is_ok());
        assert!(catalog.driver("MOCK").is_ok());
        assert!(catalog.blob("null").is_ok());
        assert_eq!(catalog.driver_names(), vec!["mock".to_string()]);
    }

    #[test]
    fn unknown_or_invalid_names_are_configuration_errors() {
        let catalog = DriverCatalog::new().with_driver("mock", SpyFactory::default());

        assert!(matches!(catalog.driver("postgres"), Err(DatabaseError::Configuration(_))));
        assert!(matches!(catalog.driver("../mock"), Err(DatabaseError::Configuration(_))));
        assert!(matches!(catalog.blob("file"), Err(DatabaseError::Configuration(_))));
    }
}
