//! Named, shared database instances.
//!
//! A [`Registry`] caches one [`Database`] per name so independent call sites can share a
//! configured connection. Names are case-insensitive identifiers. An instance is built the first
//! time its name is requested, either from an explicit [`SchemaSource`] given to
//! [`Registry::set`] or from the definition file `<schema_dir>/<name>.json` on
//! [`Registry::get`]. Registered names are never overwritten.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use bson::Document;
use mea::rwlock::RwLock;
use tracing::{debug, info, warn};

use crate::{
    catalog::DriverCatalog,
    config::{DatabaseConfig, is_identifier},
    database::Database,
    error::{DatabaseError, DatabaseResult},
};

/// Where a registered database gets its configuration from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// A raw configuration document, sanitized before use.
    Inline(Document),
    /// A typed configuration.
    Config(DatabaseConfig),
    /// The name of a definition file in the schema directory.
    Named(String),
}

impl From<Document> for SchemaSource {
    fn from(document: Document) -> Self {
        SchemaSource::Inline(document)
    }
}

impl From<DatabaseConfig> for SchemaSource {
    fn from(config: DatabaseConfig) -> Self {
        SchemaSource::Config(config)
    }
}

impl From<&str> for SchemaSource {
    fn from(name: &str) -> Self {
        SchemaSource::Named(name.to_string())
    }
}

#[derive(Debug)]
pub struct Registry {
    schema_dir: PathBuf,
    catalog: DriverCatalog,
    instances: RwLock<HashMap<String, Arc<Database>>>,
}

impl Registry {
    pub fn new(schema_dir: impl Into<PathBuf>, catalog: DriverCatalog) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            catalog,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// `databases/` next to the running executable, falling back to the working directory.
    pub fn default_schema_dir() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_default()
            .join("databases")
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    pub fn catalog(&self) -> &DriverCatalog {
        &self.catalog
    }

    /// Returns the database called `name`, building it from its definition file on first use.
    pub async fn get(&self, name: &str) -> DatabaseResult<Arc<Database>> {
        let key = registry_key(name)?;

        if let Some(database) = self.instances.read().await.get(&key) {
            return Ok(database.clone());
        }

        let mut instances = self.instances.write().await;
        // another task may have built it while we waited for the lock
        if let Some(database) = instances.get(&key) {
            return Ok(database.clone());
        }

        let database = Arc::new(self.build(SchemaSource::Named(key.clone())).await?);
        instances.insert(key.clone(), database.clone());
        info!(name = %key, "database registered from definition file");

        Ok(database)
    }

    /// Builds and registers a database under `name`. Fails if the name is already registered.
    pub async fn set(&self, name: &str, source: impl Into<SchemaSource>) -> DatabaseResult<Arc<Database>> {
        let key = registry_key(name)?;

        let mut instances = self.instances.write().await;
        if instances.contains_key(&key) {
            return Err(DatabaseError::AlreadyRegistered(key));
        }

        let database = Arc::new(self.build(source.into()).await?);
        instances.insert(key.clone(), database.clone());
        info!(name = %key, "database registered");

        Ok(database)
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.instances.read().await.contains_key(&name.to_lowercase())
    }

    /// Registered names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names = self.instances.read().await.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Shuts down and forgets every registered database. Every database is shut down even when
    /// one fails; the first failure is returned.
    pub async fn clear(&self) -> DatabaseResult<()> {
        let drained = self.instances.write().await.drain().collect::<Vec<_>>();

        let mut first_error = None;
        for (name, database) in drained {
            debug!(name = %name, "unregistering database");
            if let Err(err) = database.shutdown().await {
                warn!(name = %name, error = %err, "database shutdown failed");
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn build(&self, source: SchemaSource) -> DatabaseResult<Database> {
        match source {
            SchemaSource::Inline(document) => Database::from_document(document, &self.catalog).await,
            SchemaSource::Config(config) => Database::connect(config, &self.catalog).await,
            SchemaSource::Named(name) => {
                let document = self.load_definition(&name).await?;
                Database::from_document(document, &self.catalog).await
            }
        }
    }

    async fn load_definition(&self, name: &str) -> DatabaseResult<Document> {
        let key = registry_key(name)?;
        let path = self.schema_dir.join(format!("{key}.json"));

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(DatabaseError::NotFound(key));
            }
            Err(err) => return Err(err.into()),
        };

        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| DatabaseError::Configuration(format!("{}: {e}", path.display())))?;
        if !value.is_object() {
            return Err(DatabaseError::Configuration(format!(
                "{}: definition must be a JSON object",
                path.display()
            )));
        }

        bson::ser::serialize_to_document(&value)
            .map_err(|e| DatabaseError::Configuration(format!("{}: {e}", path.display())))
    }
}

fn registry_key(name: &str) -> DatabaseResult<String> {
    if is_identifier(name) {
        Ok(name.to_lowercase())
    } else {
        Err(DatabaseError::InvalidName(name.to_string()))
    }
}
