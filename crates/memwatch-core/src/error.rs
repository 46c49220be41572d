use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Failed to write process memory at address {address:#x}: {message}")]
    MemoryWriteFailed { address: u64, message: String },

    #[error("Failed to suspend or resume process: {0}")]
    SuspendFailed(String),

    #[error("Unknown memory type: {0}")]
    UnknownType(String),

    #[error("Unknown special variable handler: {0}")]
    UnknownSpecial(String),

    #[error("Invalid variable definition '{name}': {message}")]
    InvalidDefinition { name: String, message: String },

    #[error("Unknown watch variable: {0}")]
    UnknownVariable(String),

    #[error("Cannot convert '{input}' to {ty}")]
    InvalidNumber { input: String, ty: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    pub(crate) fn read_failed(address: u64, message: impl Into<String>) -> Self {
        Error::MemoryReadFailed {
            address,
            message: message.into(),
        }
    }

    pub(crate) fn write_failed(address: u64, message: impl Into<String>) -> Self {
        Error::MemoryWriteFailed {
            address,
            message: message.into(),
        }
    }
}
