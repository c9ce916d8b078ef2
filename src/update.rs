use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use tempfile::TempDir;

use update_format_wyu::{ClientManifest, ServerManifest, CLIENT_CONTAINER_NAME};
use wyu_types::{compare_versions, Hasher, Sha1};

use crate::download::package::{CacheLocation, Package};
use crate::download::{download_to_vec, Fetcher};
use crate::error::{Error, RollbackError};
use crate::install;
use crate::manifest::ManifestSource;
use crate::service::ServiceControl;
use crate::Result;

pub const SENTINEL_FILE_NAME: &str = "failed_install.wys";
const TEMP_DIR_PREFIX: &str = "wyu_tmp_";

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_NO_UPDATE: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_UPDATE_AVAILABLE: i32 = 2;

/// Copy of the server manifest whose install failed. An update whose server
/// manifest is byte-for-byte the same is not retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelLocation(PathBuf);

impl SentinelLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SentinelLocation(path.into())
    }

    /// `failed_install.wys` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        SentinelLocation(dir.join(SENTINEL_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Whether `server_manifest` is the one that failed last time. An
    /// unreadable sentinel counts as no match.
    pub fn matches(&self, server_manifest: &[u8]) -> bool {
        match fs::read(&self.0) {
            Ok(failed) => Sha1::digest(&failed) == Sha1::digest(server_manifest),
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => {
                warn!("failed to read {}: {err}", self.0.display());
                false
            }
        }
    }

    pub fn record(&self, server_manifest: &[u8]) -> io::Result<()> {
        fs::write(&self.0, server_manifest)
    }
}

/// Everything one update cycle needs to know about where things are.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    client_manifest_path: PathBuf,
    install_dir: PathBuf,
    url_args: String,
    server_manifest_url: Option<String>,
    package_url: Option<String>,
    cache: CacheLocation,
    sentinel: SentinelLocation,
}

impl UpdateConfig {
    /// Configuration for the product installed in `install_dir`, described by
    /// `client.wyc` next to it. The cache and sentinel live in `install_dir`.
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        let install_dir = install_dir.into();

        Self {
            client_manifest_path: install_dir.join(CLIENT_CONTAINER_NAME),
            url_args: String::new(),
            server_manifest_url: None,
            package_url: None,
            cache: CacheLocation::in_dir(&install_dir),
            sentinel: SentinelLocation::in_dir(&install_dir),
            install_dir,
        }
    }

    pub fn client_manifest_path(mut self, param_path: impl Into<PathBuf>) -> Self {
        self.client_manifest_path = param_path.into();
        self
    }

    /// Substituted for `%urlargs%` in every manifest and package URL.
    pub fn url_args(mut self, param_url_args: impl Into<String>) -> Self {
        self.url_args = param_url_args.into();
        self
    }

    pub fn server_manifest_url(mut self, param_url: Option<String>) -> Self {
        self.server_manifest_url = param_url;
        self
    }

    pub fn package_url(mut self, param_url: Option<String>) -> Self {
        self.package_url = param_url;
        self
    }

    pub fn cache(mut self, param_cache: CacheLocation) -> Self {
        self.cache = param_cache;
        self
    }

    pub fn sentinel(mut self, param_sentinel: SentinelLocation) -> Self {
        self.sentinel = param_sentinel;
        self
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }
}

/// How an update cycle ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing newer is published. Carries the newer of the two versions.
    NoUpdate { version: String },
    UpdateAvailable { version: String },
    Updated { version: String },
}

impl Outcome {
    pub fn version(&self) -> &str {
        match self {
            Outcome::NoUpdate { version } | Outcome::UpdateAvailable { version } | Outcome::Updated { version } => version,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::NoUpdate { .. } => EXIT_NO_UPDATE,
            Outcome::UpdateAvailable { .. } => EXIT_UPDATE_AVAILABLE,
            Outcome::Updated { .. } => EXIT_SUCCESS,
        }
    }
}

/// The manifests an update decision is made from.
#[derive(Debug)]
pub struct CandidateUpdateRequest {
    pub client: ClientManifest,
    /// The server container exactly as downloaded.
    pub server_bytes: Vec<u8>,
    pub server: ServerManifest,
}

impl CandidateUpdateRequest {
    /// Compares installed and published versions.
    pub fn outcome(&self) -> Outcome {
        let installed = &self.client.installed_version;
        let target = &self.server.version_to_update;

        match compare_versions(installed, target) {
            Ordering::Less => Outcome::UpdateAvailable { version: target.clone() },
            Ordering::Equal => Outcome::NoUpdate { version: target.clone() },
            Ordering::Greater => Outcome::NoUpdate { version: installed.clone() },
        }
    }
}

pub struct Updater<M, F, S> {
    config: UpdateConfig,
    manifests: M,
    fetcher: F,
    services: S,
}

impl<M: ManifestSource, F: Fetcher, S: ServiceControl> Updater<M, F, S> {
    pub fn new(config: UpdateConfig, manifests: M, fetcher: F, services: S) -> Self {
        Updater {
            config,
            manifests,
            fetcher,
            services,
        }
    }

    /// Reads the client manifest and fetches the server manifest it points to.
    ///
    /// Fails if that server manifest is the one recorded by a failed install.
    pub fn candidate_request(&self) -> Result<CandidateUpdateRequest> {
        let client = self.manifests.client_manifest(&self.config.client_manifest_path)?;

        let urls = client.server_manifest_urls(&self.config.url_args, self.config.server_manifest_url.as_deref());
        debug!("server manifest URLs: {urls:?}");
        let server_bytes = download_to_vec(&self.fetcher, &urls)?;

        let server = self.manifests.server_manifest(&server_bytes)?;

        if self.config.sentinel.matches(&server_bytes) {
            return Err(Error::PreviouslyFailed(server.version_to_update));
        }

        Ok(CandidateUpdateRequest { client, server_bytes, server })
    }

    /// Reports whether an update is available without downloading it.
    pub fn check(&self) -> Result<Outcome> {
        let request = self.candidate_request()?;
        let outcome = request.outcome();

        info!("installed version {:?}, published version {:?}: {outcome:?}", request.client.installed_version, request.server.version_to_update);
        Ok(outcome)
    }

    /// Downloads, verifies and installs the published update if it is newer
    /// than the installed version.
    pub fn update(&self) -> Result<Outcome> {
        let request = self.candidate_request()?;

        let version = match request.outcome() {
            Outcome::UpdateAvailable { version } => version,
            outcome => {
                info!("no update to install: {outcome:?}");
                return Ok(outcome);
            }
        };
        info!("updating {:?} from {} to {version}", request.client.product_name_lossy(), request.client.installed_version);

        let workdir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir_in(&self.config.install_dir)
            .map_err(Error::CreateTempDir)?;

        let server = &request.server;
        let mut package = Package::new(
            server.package_urls(&self.config.url_args, self.config.package_url.as_deref()),
            workdir.path().join("wyu"),
            server.expected_adler32(),
            &server.file_sha1,
        );
        package.check_cache(&self.config.cache)?;
        package.download(&self.fetcher, &self.config.cache)?;
        package.verify_signature_on_disk(request.client.public_key())?;

        let files = install::extract(&package.path, &workdir.path().join("extracted"))?;
        let (details, updates) = install::split_update_details(files, &self.manifests)?;

        let backup = match install::backup_files(&updates, &self.config.install_dir, &workdir.path().join("backup")) {
            Ok(backup) => backup,
            Err(err) => {
                if let Error::BackupFailed { rollback: Some(rollback), .. } = &err {
                    keep_backup(workdir, rollback);
                }
                return Err(err);
            }
        };

        if let Err(cause) = install::install_update(&details, &updates, &self.config.install_dir, &self.services) {
            error!("installing update failed: {cause}");

            let rollback = backup.rollback().err();
            if let Some(err) = &rollback {
                keep_backup(workdir, err);
            }

            for service in &details.services_to_start {
                if let Err(err) = self.services.start(service) {
                    warn!("failed to restart service {service}: {err}");
                }
            }

            let sentinel = self.config.sentinel.record(&request.server_bytes).err();
            return Err(Error::InstallFailed {
                cause: Box::new(cause),
                rollback,
                sentinel,
            });
        }

        let mut client = request.client;
        client.installed_version = version.clone();
        self.manifests.persist_client_manifest(&self.config.client_manifest_path, &client)?;

        info!("updated to version {version}");
        Ok(Outcome::Updated { version })
    }
}

/// Leaves the work directory on disk; it holds the only copy of the originals
/// a rollback could not restore.
fn keep_backup(workdir: TempDir, rollback: &RollbackError) {
    let kept = workdir.keep();
    error!("{rollback}");
    error!("not removing {}, restore the originals from there", kept.display());
}
