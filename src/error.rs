//! Error types for deck creation, capture and export

use thiserror::Error;

/// Result type alias for deckshot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the creation service or driving a browser
#[derive(Error, Debug)]
pub enum Error {
    /// Non-2xx response, malformed body or unreachable endpoint
    #[error("Transport failed: {0}")]
    TransportError(String),

    /// Browser launch, navigation or screenshot failure
    #[error("Automation failed: {0}")]
    AutomationError(String),

    /// Export URL refused access; the deck is not shared or not yet published
    #[error("Export unavailable (HTTP {status}): {url}")]
    ExportUnavailable { status: u16, url: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error while writing captures or exports
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// headless_chrome reports everything as anyhow::Error
#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::AutomationError(err.to_string())
    }
}
