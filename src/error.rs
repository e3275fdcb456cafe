use thiserror::Error;

/// Main error type for ssmtail
#[derive(Debug, Error)]
pub enum SsmTailError {
    // Selection errors (fatal, raised before any worker starts)
    #[error("Selection error: {0}")]
    Selection(String),

    // Session broker errors
    #[error("Failed to open session for {target}: {reason}")]
    SessionOpen { target: String, reason: String },

    #[error("Failed to close session {session}: {reason}")]
    SessionClose { session: String, reason: String },

    // Stream errors
    #[error("Failed to spawn transport: {0}")]
    Spawn(String),

    #[error("Failed to read remote output: {0}")]
    StreamRead(String),

    // Teardown errors
    #[error("Failed to terminate transport: {0}")]
    Terminate(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    #[error("Invalid grep pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    // Cloud API errors
    #[error("AWS error: {0}")]
    Aws(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ssmtail operations
pub type Result<T> = std::result::Result<T, SsmTailError>;
