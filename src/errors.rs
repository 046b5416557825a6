use thiserror::Error;

use crate::economy::types::{ItemCode, Money};

/// Failures raised below the engine: the persistent store, record codecs and
/// the unit-of-work harness itself.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// A transaction script touched a table it did not declare.
    #[error("script {script} accessed undeclared table {table}")]
    UndeclaredAccess {
        script: &'static str,
        table: &'static str,
    },

    /// A write would have broken a storage invariant (zero count, missing row).
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The underlying transaction was interrupted and will be replayed or aborted.
    #[error("transaction interrupted")]
    Interrupted,

    /// Fault injected by a test harness.
    #[error("injected fault on {0}")]
    Injected(&'static str),

    /// Password hashing or stored hash parsing failed.
    #[error("credential error: {0}")]
    Credential(String),

    /// A shared lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
}

/// Coarse error category used by callers to branch without matching payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    InvalidInput,
    InsufficientFunds,
    InsufficientInventory,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::InsufficientFunds => "InsufficientFunds",
            ErrorKind::InsufficientInventory => "InsufficientInventory",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by every public engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Character, item, slot occupant or catalog entry absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The character is not owned by the acting account.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Duplicate name/code or redundant equip.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed or out-of-range request data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Money, available: Money },

    #[error("insufficient inventory for item {item_code}: requested {requested}, held {held}")]
    InsufficientInventory {
        item_code: ItemCode,
        requested: u32,
        held: u32,
    },

    /// Missing, malformed or expired credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Store failure. The detail stays in `source()` and is never displayed.
    #[error("internal error")]
    Internal(#[from] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Forbidden(_) => ErrorKind::Forbidden,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            EngineError::InsufficientInventory { .. } => ErrorKind::InsufficientInventory,
            EngineError::Unauthorized(_) => ErrorKind::Unauthorized,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        EngineError::NotFound(what.into())
    }

    pub fn forbidden(what: impl Into<String>) -> Self {
        EngineError::Forbidden(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        EngineError::Conflict(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        EngineError::InvalidInput(what.into())
    }
}

impl From<sled::Error> for EngineError {
    fn from(e: sled::Error) -> Self {
        EngineError::Internal(StoreError::Sled(e))
    }
}

impl From<bincode::Error> for EngineError {
    fn from(e: bincode::Error) -> Self {
        EngineError::Internal(StoreError::Bincode(e))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Internal(StoreError::Io(e))
    }
}
