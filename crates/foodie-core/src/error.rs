use foodie_api::PlacesError;
use foodie_store::StoreError;
use thiserror::Error;

/// Everything that can go wrong between the caller and the outside world
///
/// A duplicate save is deliberately absent: it is an outcome, not an error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Places provider request failed: {0}")]
    Transport(String),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown list: {0} (expected favorites or pending)")]
    UnknownList(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PlacesError> for Error {
    fn from(e: PlacesError) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Storage(e.to_string())
    }
}
