mod download;
pub use download::hash_on_disk;
pub use download::package::{CacheLocation, Package, PackageStatus, CACHE_FILE_NAME};
pub use download::{download_to_file, download_to_vec, user_agent, Fetcher, HttpFetcher, Timeouts};

mod util;
pub use util::first_success;

pub mod install;
pub mod manifest;
pub use manifest::{ArchiveManifests, ManifestSource};

pub mod service;
pub use service::{ServiceControl, Systemctl};

mod update;
pub use update::{CandidateUpdateRequest, Outcome, SentinelLocation, UpdateConfig, Updater, SENTINEL_FILE_NAME};
pub use update::{EXIT_ERROR, EXIT_NO_UPDATE, EXIT_SUCCESS, EXIT_UPDATE_AVAILABLE};

mod error;
pub use error::{Error, RollbackError};

pub type Result<T> = std::result::Result<T, Error>;
