//! Connection settings for the MongoDB driver (the `store` section of a database configuration).

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use tracing::warn;

use tablelayer_core::{
    config::{self, FieldRule, RuleKind},
    error::{DatabaseError, DatabaseResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub host: String,
    pub port: u16,
    /// Database name.
    pub db: String,
    /// Upper bound of the connection pool.
    pub pool: u32,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 27017,
            db: "cocotte".to_string(),
            pool: 1,
        }
    }
}

fn default_host() -> Bson {
    Bson::String("127.0.0.1".into())
}

fn default_port() -> Bson {
    Bson::Int32(27017)
}

fn default_db() -> Bson {
    Bson::String("cocotte".into())
}

fn default_pool() -> Bson {
    Bson::Int32(1)
}

impl MongoConfig {
    pub const RULES: &'static [FieldRule] = &[
        FieldRule {
            name: "host",
            kind: RuleKind::String,
            required: false,
            default: default_host,
            caption: "host",
            example: "127.0.0.1",
            description: "Host name or address of the MongoDB server.",
        },
        FieldRule {
            name: "port",
            kind: RuleKind::Integer { min: 1, max: 65535 },
            required: false,
            default: default_port,
            caption: "port",
            example: "27017",
            description: "TCP port of the MongoDB server.",
        },
        FieldRule {
            name: "db",
            kind: RuleKind::Pattern("^[a-z][_0-9a-z]*$"),
            required: false,
            default: default_db,
            caption: "database name",
            example: "cocotte",
            description: "Lower-case letters, digits and underscores, starting with a letter.",
        },
        FieldRule {
            name: "pool",
            kind: RuleKind::Integer { min: 1, max: 100 },
            required: false,
            default: default_pool,
            caption: "connection pool size",
            example: "5",
            description: "Maximum number of pooled connections.",
        },
    ];

    /// Reads a `store` section. Invalid values fall back to their defaults with a warning.
    pub fn from_store(store: &Document) -> DatabaseResult<Self> {
        let mut store = store.clone();
        let mut issues = Vec::new();
        config::sanitize(Self::RULES, &mut store, &mut issues, Some("store"));

        for issue in issues.iter().filter(|issue| !issue.warn) {
            warn!(field = %issue.name, message = %issue.message, "mongodb setting replaced by default");
        }

        bson::de::deserialize_from_document(store)
            .map_err(|e| DatabaseError::Configuration(e.to_string()))
    }

    pub fn connection_string(&self) -> String {
        format!(
            "mongodb://{}:{}/{}?maxPoolSize={}",
            self.host, self.port, self.db, self.pool
        )
    }
}
