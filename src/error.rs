use thiserror::Error;

/// Main error type for modelctl
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Registry unavailable: {0}\n\nTroubleshooting:\n- Is the model server running? Try: curl http://localhost:11434/api/tags\n- Check registry.base_url in ~/.config/modelctl/config.toml\n- Run with RUST_LOG=debug for more details")]
    UpstreamUnavailable(#[from] RegistryError),

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] RegistryError),

    #[error("Config error: {0}\n\nTroubleshooting:\n- Check config file: ~/.config/modelctl/config.toml\n- Delete the file to fall back to built-in defaults")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Registry-specific errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0} not found in registry")]
    NotFound(String),

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("{0}")]
    Stream(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
