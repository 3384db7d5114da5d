use crate::deletion::DeletionPhase;
use crate::types::AccountField;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoyagerError {
    #[error("not initialized: run 'voyager init'")]
    NotInitialized,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user already exists: {0}")]
    UserExists(String),

    #[error("destination not found: {0}")]
    DestinationNotFound(String),

    #[error("invalid email address '{0}'")]
    InvalidEmail(String),

    #[error("invalid update: {0}")]
    InvalidPatch(String),

    #[error("an update to '{0}' is already in flight")]
    UpdateInFlight(AccountField),

    #[error("cannot {action} while deletion is {from}")]
    InvalidDeletionTransition {
        from: DeletionPhase,
        action: &'static str,
    },

    #[error("no cached destinations")]
    NoDestinations,

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VoyagerError>;
