use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

use url::Url;

#[derive(Debug)]
pub enum Error {
    OpenFile(io::Error),
    GetFileMetadata(io::Error),
    ReadFromFile(io::Error),
    CreateFile(io::Error),
    WriteFile(io::Error),
    RenameFile(io::Error),
    CreateDirectory(io::Error),
    CreateTempDir(io::Error),
    ParseUrl(String, url::ParseError),
    BuildClient(reqwest::Error),
    SendGetRequest(Url, reqwest::Error),
    GetRequestFailed(Url, reqwest::StatusCode),
    ErrorPageReturned(Url),
    CopyRequestBodyToFile(reqwest::Error),
    NoUrlsSpecified,
    DownloadFailed(Vec<(String, Error)>),
    ClientManifest(PathBuf, update_format_wyu::Error),
    ServerManifest(update_format_wyu::Error),
    UpdateDetails(PathBuf, update_format_wyu::Error),
    PersistClientManifest(PathBuf, update_format_wyu::Error),
    PreviouslyFailed(String),
    UpdateNotSigned,
    ParsePublicKey(update_format_wyu::verify_sig::Error),
    SignatureInvalid(update_format_wyu::verify_sig::Error),
    ChecksumMismatch { expected: u32, actual: u32 },
    OpenArchive(zip::result::ZipError),
    ReadArchiveEntry(zip::result::ZipError),
    IllegalEntryPath(String),
    ExtractEntry(PathBuf, io::Error),
    NoManifestFound,
    BackupFailed { path: PathBuf, source: io::Error, rollback: Option<RollbackError> },
    InstallFile { path: PathBuf, source: io::Error },
    RunServiceCommand(String, io::Error),
    ServiceCommandFailed { action: &'static str, service: String, code: Option<i32> },
    InstallFailed { cause: Box<Error>, rollback: Option<RollbackError>, sentinel: Option<io::Error> },
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenFile(err) => write!(f, "failed to open file: {err}"),
            Error::GetFileMetadata(err) => write!(f, "failed to get file metadata: {err}"),
            Error::ReadFromFile(err) => write!(f, "failed to read file: {err}"),
            Error::CreateFile(err) => write!(f, "failed to create file: {err}"),
            Error::WriteFile(err) => write!(f, "failed to write file: {err}"),
            Error::RenameFile(err) => write!(f, "failed to rename file: {err}"),
            Error::CreateDirectory(err) => write!(f, "failed to create directory: {err}"),
            Error::CreateTempDir(err) => write!(f, "failed to create temp dir: {err}"),
            Error::ParseUrl(url, err) => write!(f, "failed to parse URL {url:?}: {err}"),
            Error::BuildClient(err) => write!(f, "failed to build client: {err}"),
            Error::SendGetRequest(url, err) => write!(f, "failed to send GET request to {url}: {err}"),
            Error::GetRequestFailed(url, status) => write!(f, "GET request to {url} returned status code {status}"),
            Error::ErrorPageReturned(url) => write!(f, "could not download {url}: a web page was returned from the web server"),
            Error::CopyRequestBodyToFile(err) => write!(f, "failed to copy request body to file: {err}"),
            Error::NoUrlsSpecified => write!(f, "no download URLs are specified"),
            Error::DownloadFailed(failures) => {
                write!(f, "download failed from all {} URL(s)", failures.len())?;
                for (url, err) in failures {
                    write!(f, "; {url}: {err}")?;
                }
                Ok(())
            }
            Error::ClientManifest(path, err) => write!(f, "error reading client manifest {}: {err}", path.display()),
            Error::ServerManifest(err) => write!(f, "error parsing downloaded server manifest: {err}"),
            Error::UpdateDetails(path, err) => write!(f, "error reading update details {}: {err}", path.display()),
            Error::PersistClientManifest(path, err) => write!(f, "failed to write client manifest {}: {err}", path.display()),
            Error::PreviouslyFailed(version) => write!(f, "updating to version {version:?} failed before, aborting update"),
            Error::UpdateNotSigned => write!(f, "the update is not signed, all updates must be signed in order to be installed"),
            Error::ParsePublicKey(err) => write!(f, "invalid public key in client manifest: {err}"),
            Error::SignatureInvalid(err) => write!(f, "the downloaded package failed the signature validation: {err}"),
            Error::ChecksumMismatch { expected, actual } => {
                write!(f, "the downloaded package failed the Adler32 validation: expected {expected:#010x}, got {actual:#010x}")
            }
            Error::OpenArchive(err) => write!(f, "failed to open package archive: {err}"),
            Error::ReadArchiveEntry(err) => write!(f, "failed to read package archive entry: {err}"),
            Error::IllegalEntryPath(name) => write!(f, "{name:?}: illegal file path"),
            Error::ExtractEntry(path, err) => write!(f, "failed to extract {}: {err}", path.display()),
            Error::NoManifestFound => write!(f, "no update details file found in package"),
            Error::BackupFailed { path, source, rollback } => {
                write!(f, "failed to back up {}: {source}", path.display())?;
                if let Some(rollback) = rollback {
                    write!(f, " ({rollback})")?;
                }
                Ok(())
            }
            Error::InstallFile { path, source } => write!(f, "failed to install {}: {source}", path.display()),
            Error::RunServiceCommand(service, err) => write!(f, "failed to run service command for {service}: {err}"),
            Error::ServiceCommandFailed { action, service, code } => match code {
                Some(code) => write!(f, "failed to {action} {service}: exit status {code}"),
                None => write!(f, "failed to {action} {service}: terminated by signal"),
            },
            Error::InstallFailed { cause, rollback, sentinel } => {
                write!(f, "error applying update: {cause}")?;
                if let Some(rollback) = rollback {
                    write!(f, "; {rollback}")?;
                }
                if let Some(err) = sentinel {
                    write!(f, "; failed to write failed install sentinel: {err}")?;
                }
                Ok(())
            }
        }
    }
}

/// Files that could not be put back while undoing a backup or an install.
///
/// Originals that were not restored are still in `backup_dir`.
#[derive(Debug)]
pub struct RollbackError {
    pub backup_dir: PathBuf,
    pub failures: Vec<(PathBuf, io::Error)>,
}

impl std::error::Error for RollbackError {}

impl Display for RollbackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rollback failed for {} file(s), originals kept in {}", self.failures.len(), self.backup_dir.display())?;
        for (path, err) in &self.failures {
            write!(f, "; {}: {err}", path.display())?;
        }
        Ok(())
    }
}
