//! MongoDB driver for tablelayer.
//!
//! Collections serve as tables. Selectors, sort documents and update operators are passed to the
//! server unchanged, so the full MongoDB query language is available through `find`, `update`
//! and `remove`. Map-reduce is supported; SQL is not.
//!
//! Enable it through the `mongodb` feature of the umbrella crate:
//!
//! ```toml
//! [dependencies]
//! tablelayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Configuration
//!
//! The `store` section of a database configuration accepts `host`, `port`, `db` and `pool`.
//! Missing or invalid values fall back to `127.0.0.1`, `27017`, `cocotte` and `1`.
//!
//! # Example
//!
//! ```ignore
//! use tablelayer::{catalog::DriverCatalog, config::DatabaseConfig, database::Database};
//! use tablelayer::mongodb::MongoDriverFactory;
//! use bson::doc;
//!
//! let catalog = DriverCatalog::new().with_driver("mongodb", MongoDriverFactory);
//! let config = DatabaseConfig {
//!     store: doc! { "host": "db.internal", "db": "shop" },
//!     ..Default::default()
//! };
//!
//! let db = Database::connect(config, &catalog).await?;
//! ```

pub mod config;
pub mod store;

pub use config::MongoConfig;
pub use store::{MongoDriver, MongoDriverFactory};
