pub mod cache;
pub mod download;
pub mod inventory;
pub mod manager;
pub mod upload;

pub use cache::InventoryCache;
pub use download::{DownloadCoordinator, DownloadProgress, PROGRESS_SCALE};
pub use manager::ModelManager;
pub use upload::BlobUploader;
