use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;

use log::debug;

use update_format_wyu::{ClientManifest, ServerManifest, UpdateDetails};

use crate::error::Error;
use crate::Result;

/// Where the orchestrator reads manifests from and writes the client
/// manifest back to.
pub trait ManifestSource {
    /// Reads the client manifest out of its container at `path`.
    fn client_manifest(&self, path: &Path) -> Result<ClientManifest>;

    /// Parses a downloaded server container.
    fn server_manifest(&self, bytes: &[u8]) -> Result<ServerManifest>;

    /// Reads an extracted update details file.
    fn update_details(&self, path: &Path) -> Result<UpdateDetails>;

    /// Replaces the client manifest inside the container at `path`.
    fn persist_client_manifest(&self, path: &Path, manifest: &ClientManifest) -> Result<()>;
}

impl<T: ManifestSource + ?Sized> ManifestSource for &T {
    fn client_manifest(&self, path: &Path) -> Result<ClientManifest> {
        (**self).client_manifest(path)
    }

    fn server_manifest(&self, bytes: &[u8]) -> Result<ServerManifest> {
        (**self).server_manifest(bytes)
    }

    fn update_details(&self, path: &Path) -> Result<UpdateDetails> {
        (**self).update_details(path)
    }

    fn persist_client_manifest(&self, path: &Path, manifest: &ClientManifest) -> Result<()> {
        (**self).persist_client_manifest(path, manifest)
    }
}

/// Manifests stored in their zip containers on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveManifests;

impl ManifestSource for ArchiveManifests {
    fn client_manifest(&self, path: &Path) -> Result<ClientManifest> {
        let file = File::open(path).map_err(Error::OpenFile)?;
        ClientManifest::read_container(BufReader::new(file)).map_err(|err| Error::ClientManifest(path.to_path_buf(), err))
    }

    fn server_manifest(&self, bytes: &[u8]) -> Result<ServerManifest> {
        ServerManifest::read_container(Cursor::new(bytes)).map_err(Error::ServerManifest)
    }

    fn update_details(&self, path: &Path) -> Result<UpdateDetails> {
        let file = File::open(path).map_err(Error::OpenFile)?;
        UpdateDetails::parse(&mut BufReader::new(file)).map_err(|err| Error::UpdateDetails(path.to_path_buf(), err))
    }

    fn persist_client_manifest(&self, path: &Path, manifest: &ClientManifest) -> Result<()> {
        let original = fs::read(path).map_err(Error::ReadFromFile)?;
        let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));

        // replace the container with a single rename
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(Error::CreateFile)?;
        let writer = manifest
            .rewrite_container(Cursor::new(original), BufWriter::new(tmp))
            .map_err(|err| Error::PersistClientManifest(path.to_path_buf(), err))?;
        let tmp = writer.into_inner().map_err(|err| Error::WriteFile(err.into_error()))?;

        tmp.persist(path).map_err(|err| Error::RenameFile(err.error))?;
        debug!("wrote installed version {:?} to {}", manifest.installed_version, path.display());

        Ok(())
    }
}
