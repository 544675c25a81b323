pub mod config;
pub mod error;
pub mod models;
pub mod registry;

pub use error::{LifecycleError, RegistryError, Result};
pub use models::{DownloadProgress, ModelManager};
pub use registry::ModelInfo;
