//! Convenient re-exports of commonly used types from tablelayer.
//!
//! ```ignore
//! use tablelayer::prelude::*;
//! ```

pub use tablelayer_core::{
    args::{AddArgs, FindArgs, FindCall, RemoveArgs, UpdateArgs},
    blob::{BlobContext, BlobId, BlobStore, BlobStoreFactory, BlobWriter},
    builder::Builder,
    capability::{Capabilities, Operation, Permissions},
    catalog::DriverCatalog,
    config::{ConfigIssue, DatabaseConfig, FieldRule, RuleKind},
    database::Database,
    driver::{Driver, DriverFactory},
    error::{DatabaseError, DatabaseResult},
    query::{
        AddOptions, FindOptions, FindOutput, IndexInfo, IndexOptions, RemoveOptions, Sort,
        SortDirection, UpdateOptions,
    },
    registry::{Registry, SchemaSource},
};
