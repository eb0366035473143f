use thiserror::Error;

/// Errors surfaced by the messaging core.
///
/// Every variant maps to a stable identifier (see [`CourierError::code`]) so a calling layer can
/// pick its own status mapping without matching on display strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CourierError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Conflict during cleanup: {0}")]
    ConflictOnCleanup(String),

    #[error("Notification dispatch failed: {0}")]
    DispatchFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Store busy: {0}")]
    Busy(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl CourierError {
    /// Stable, machine-readable identifier of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            CourierError::NotFound(_) => "not_found",
            CourierError::InvalidReference(_) => "invalid_reference",
            CourierError::AlreadyExists(_) => "already_exists",
            CourierError::ConflictOnCleanup(_) => "conflict_on_cleanup",
            CourierError::DispatchFailure(_) => "dispatch_failure",
            CourierError::Storage(_) => "storage_error",
            CourierError::Busy(_) => "store_busy",
            CourierError::Config(_) => "config_error",
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CourierError::Busy(_) | CourierError::ConflictOnCleanup(_)
        )
    }

    pub fn message_not_found(id: i64) -> Self {
        CourierError::NotFound(format!("message {}", id))
    }

    pub fn user_not_found(id: i64) -> Self {
        CourierError::NotFound(format!("user {}", id))
    }
}

pub type Result<T> = std::result::Result<T, CourierError>;
