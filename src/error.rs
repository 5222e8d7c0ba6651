use thiserror::Error;

/// Library errors using thiserror for structured error handling.
///
/// These errors represent the failures the perception core reports. Capture
/// errors are never escalated by the scheduler; they only explain why a tick
/// produced no board.

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to load tile model from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse tile model")]
    ParseFailed(#[source] serde_json::Error),

    #[error("Unsupported tile model version: {0}")]
    UnsupportedVersion(u32),

    #[error("Malformed tile model: {0}")]
    Malformed(String),

    #[error("Invalid colour {value:?} in samples for {tile}")]
    InvalidColor { tile: String, value: String },
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to enumerate on-screen windows")]
    EnumerationFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to capture window")]
    CaptureFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Window {0} is no longer on screen")]
    WindowNotFound(u32),

    #[error("Frame {width}x{height} is too small to contain a playfield")]
    FrameTooSmall { width: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine the configuration directory")]
    NoConfigDir,
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
