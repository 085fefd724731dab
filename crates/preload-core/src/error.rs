//! Error types for preload operations.

use std::fmt;

/// The primary error type for all preload operations.
#[derive(Debug)]
pub enum Error {
    /// Relationship name not declared on the entity (or any of its parents)
    UnknownRelationship(RelationshipError),
    /// Owner set cannot be loaded through the requested relationship
    InvalidOwnerSet(OwnerSetError),
    /// Failure reported by the storage collaborator, passed through untouched
    Storage(StorageError),
    /// Row decoding errors
    Type(TypeError),
    /// Configuration errors
    Config(ConfigError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct RelationshipError {
    pub entity: String,
    pub relationship: String,
}

#[derive(Debug, Clone)]
pub struct OwnerSetError {
    pub kind: OwnerSetErrorKind,
    pub entity: String,
    pub relationship: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerSetErrorKind {
    /// An owner does not expose the key field the relationship joins on
    MissingKey,
    /// An owner does not expose a slot for the relationship
    MissingSlot,
    /// The slot exists but holds a different cardinality or target type
    SlotMismatch,
    /// The requested target type is not the relationship's target entity
    TargetMismatch,
}

#[derive(Debug)]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub table: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Table or column not found
    NotFound,
    /// Query rejected or failed during execution
    Query,
    /// Connection to the store was lost or refused
    Connection,
    /// Query shape the store cannot execute
    Unsupported,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Shorthand for an owner-set validation failure.
    pub fn invalid_owner_set(
        kind: OwnerSetErrorKind,
        entity: impl Into<String>,
        relationship: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::InvalidOwnerSet(OwnerSetError {
            kind,
            entity: entity.into(),
            relationship: relationship.into(),
            message: message.into(),
        })
    }

    /// Shorthand for an unknown relationship.
    pub fn unknown_relationship(entity: impl Into<String>, relationship: impl Into<String>) -> Self {
        Error::UnknownRelationship(RelationshipError {
            entity: entity.into(),
            relationship: relationship.into(),
        })
    }

    /// Shorthand for a configuration error without a source.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Is this an error raised by the storage collaborator?
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    /// The owner-set error kind, if this is an owner-set failure.
    pub fn owner_set_kind(&self) -> Option<OwnerSetErrorKind> {
        match self {
            Error::InvalidOwnerSet(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            table: None,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the table the failing query targeted.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownRelationship(e) => write!(f, "Unknown relationship: {}", e),
            Error::InvalidOwnerSet(e) => write!(f, "Invalid owner set: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Storage(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not declared on '{}'", self.relationship, self.entity)
    }
}

impl fmt::Display for OwnerSetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: {}",
            self.entity, self.relationship, self.message
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = &self.table {
            write!(f, "{} (table {})", self.message, table)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.actual)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<RelationshipError> for Error {
    fn from(err: RelationshipError) -> Self {
        Error::UnknownRelationship(err)
    }
}

impl From<OwnerSetError> for Error {
    fn from(err: OwnerSetError) -> Self {
        Error::InvalidOwnerSet(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for preload operations.
pub type Result<T> = std::result::Result<T, Error>;
