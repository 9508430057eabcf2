//! Error types and result types for database operations.
//!
//! Every fallible operation in the workspace returns [`DatabaseResult<T>`]. Errors raised by the
//! facade itself (configuration, argument shape, permissions, builder preconditions) are produced
//! before anything is delegated; errors reported by a driver or BLOB store are returned unchanged.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::capability::Operation;

/// Represents all possible errors that can occur when working with a database.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The configuration is malformed: unknown or invalid driver/blob name, bad definition file,
    /// or a value of the wrong type.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A database with this name is already registered.
    #[error("Database {0} is already registered")]
    AlreadyRegistered(String),
    /// The name is not a valid database identifier.
    #[error("Invalid database name: {0}")]
    InvalidName(String),
    /// No definition exists for the requested name.
    #[error("Database definition not found: {0}")]
    NotFound(String),
    /// The call does not match any recognized argument shape.
    #[error("Invalid arguments: {0}")]
    ArgumentShape(String),
    /// The operation is disabled by `readonly`/`modifySchema` or not offered by the driver.
    #[error("{}", .0.denied_message())]
    PermissionDenied(Operation),
    /// Map-reduce or SQL was requested but is not enabled.
    #[error("Not supported: {0}")]
    NotSupported(String),
    /// A builder terminal was called before the builder was ready.
    #[error("Precondition failed: {0}")]
    Precondition(String),
    /// The table does not exist in the store.
    #[error("Table not found: {0}")]
    TableNotFound(String),
    /// The document violates the driver's constraints.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// An I/O error from a file-backed collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

impl From<BsonError> for DatabaseError {
    fn from(err: BsonError) -> Self {
        DatabaseError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DatabaseError {
    fn from(err: SerdeJsonError) -> Self {
        DatabaseError::Serialization(err.to_string())
    }
}
