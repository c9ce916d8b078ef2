use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use update_format_wyu::verify_sig;
use wyu_types::{adler32_value, Adler32, Sha1};

use crate::download::{download_to_file, hash_on_disk, Fetcher};
use crate::error::Error;
use crate::Result;

pub const CACHE_FILE_NAME: &str = "last_wyu_download";

/// Where the last successfully downloaded package is kept between runs.
///
/// The cache holds a single package and is only trusted when its Adler-32
/// matches the one published for the update being installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocation(PathBuf);

impl CacheLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CacheLocation(path.into())
    }

    /// `last_wyu_download` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        CacheLocation(dir.join(CACHE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStatus {
    ToDownload,
    DownloadFailed,
    BadChecksum,
    Unverified,
    BadSignature,
    Verified,
}

/// An update package on its way from the update server (or the cache) to
/// extraction.
#[derive(Debug)]
pub struct Package<'a> {
    pub urls: Vec<String>,
    /// Working copy, inside the update's temporary directory.
    pub path: PathBuf,
    /// `0` when the server manifest did not publish a checksum.
    pub expected_adler32: u32,
    /// Signature over the SHA1 of the package.
    pub signature: Cow<'a, [u8]>,
    pub status: PackageStatus,
}

impl<'a> Package<'a> {
    pub fn new(urls: Vec<String>, path: PathBuf, expected_adler32: u32, signature: &'a [u8]) -> Self {
        Package {
            urls,
            path,
            expected_adler32,
            signature: Cow::Borrowed(signature),
            status: PackageStatus::ToDownload,
        }
    }

    /// Reuses the cached package when its checksum matches the expected one.
    ///
    /// Any problem with the cache is logged and leaves the package to be
    /// downloaded.
    pub fn check_cache(&mut self, cache: &CacheLocation) -> Result<()> {
        let cached = cache.path();

        if self.expected_adler32 == 0 {
            info!("no checksum published for the package, not using {}", cached.display());
            return Ok(());
        }

        if !cached.exists() {
            info!("{} does not exist, skipping cached download.", cached.display());
            return Ok(());
        }

        let actual = match hash_on_disk::<Adler32>(cached, None) {
            Ok(digest) => adler32_value(&digest),
            Err(err) => {
                warn!("failed to hash {}: {err}", cached.display());
                return Ok(());
            }
        };

        if actual != self.expected_adler32 {
            info!("{}: checksum {actual:#010x} does not match, will re-download", cached.display());
            return Ok(());
        }

        match fs::copy(cached, &self.path) {
            Ok(_) => {
                info!("{}: good checksum, reusing cached package", cached.display());
                self.status = PackageStatus::Unverified;
            }
            Err(err) => warn!("failed to copy cached package {}: {err}", cached.display()),
        }

        Ok(())
    }

    /// Downloads the package unless the cache already provided it, checks the
    /// checksum and refreshes the cache.
    pub fn download<F: Fetcher>(&mut self, fetcher: &F, cache: &CacheLocation) -> Result<()> {
        match self.status {
            PackageStatus::ToDownload => {}
            _ => return Ok(()),
        }

        info!("downloading update package into {}...", self.path.display());

        if let Err(err) = download_to_file(fetcher, &self.urls, &self.path) {
            error!("downloading failed with error {err}");
            self.status = PackageStatus::DownloadFailed;
            return Err(err);
        }

        self.verify_checksum()?;

        // a package that cannot be cached is still good to install
        if let Err(err) = fs::copy(&self.path, cache.path()) {
            warn!("error caching update package to {}: {err}", cache.path().display());
        }

        Ok(())
    }

    pub fn verify_checksum(&mut self) -> Result<()> {
        if self.expected_adler32 == 0 {
            debug!("no Adler32 published, skipping checksum");
            self.status = PackageStatus::Unverified;
            return Ok(());
        }

        let calculated = adler32_value(&hash_on_disk::<Adler32>(&self.path, None)?);

        debug!("    expected adler32:   {:#010x}", self.expected_adler32);
        debug!("    calculated adler32: {calculated:#010x}");
        debug!("    adler32 match?      {}", self.expected_adler32 == calculated);

        if calculated != self.expected_adler32 {
            self.status = PackageStatus::BadChecksum;
            return Err(Error::ChecksumMismatch {
                expected: self.expected_adler32,
                actual: calculated,
            });
        }

        self.status = PackageStatus::Unverified;
        Ok(())
    }

    /// Checks the package signature against the client's public key.
    ///
    /// Without a public key there is nothing to check. With one, an unsigned
    /// package is refused.
    pub fn verify_signature_on_disk(&mut self, public_key_xml: Option<&str>) -> Result<()> {
        let Some(public_key_xml) = public_key_xml else {
            debug!("client manifest has no public key, skipping signature check");
            return Ok(());
        };

        if self.signature.is_empty() {
            self.status = PackageStatus::BadSignature;
            return Err(Error::UpdateNotSigned);
        }

        let public_key = verify_sig::parse_public_key_xml(public_key_xml).map_err(Error::ParsePublicKey)?;
        let digest = hash_on_disk::<Sha1>(&self.path, None)?;

        if let Err(err) = verify_sig::verify_rsa_pkcs_prehash(&digest, &self.signature, public_key) {
            self.status = PackageStatus::BadSignature;
            return Err(Error::SignatureInvalid(err));
        }

        info!("verified signature of {}", self.path.display());
        self.status = PackageStatus::Verified;
        Ok(())
    }
}
