use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use zip::ZipArchive;

use update_format_wyu::{UpdateDetails, UPDATE_DETAILS_ENTRY};

use crate::error::{Error, RollbackError};
use crate::manifest::ManifestSource;
use crate::service::ServiceControl;
use crate::Result;

/// Extracts every entry of the package at `archive` below `dest` and returns
/// the paths of the extracted regular files.
///
/// Entries whose path would land outside `dest` are refused.
pub fn extract(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive).map_err(Error::OpenFile)?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(Error::OpenArchive)?;

    fs::create_dir_all(dest).map_err(Error::CreateDirectory)?;

    let mut files = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(Error::ReadArchiveEntry)?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(Error::IllegalEntryPath(entry.name().to_string()));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(Error::CreateDirectory)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(Error::CreateDirectory)?;
        }

        let mut out = File::create(&target).map_err(|err| Error::ExtractEntry(target.clone(), err))?;
        io::copy(&mut entry, &mut out).map_err(|err| Error::ExtractEntry(target.clone(), err))?;

        debug!("extracted {}", target.display());
        files.push(target);
    }

    Ok(files)
}

/// Separates the update details file from the files to install.
pub fn split_update_details<M: ManifestSource>(files: Vec<PathBuf>, manifests: &M) -> Result<(UpdateDetails, Vec<PathBuf>)> {
    let mut details = None;
    let mut updates = Vec::with_capacity(files.len());

    for file in files {
        if file.file_name().is_some_and(|name| name == UPDATE_DETAILS_ENTRY) {
            details = Some(manifests.update_details(&file)?);
        } else {
            updates.push(file);
        }
    }

    let details = details.ok_or(Error::NoManifestFound)?;
    Ok((details, updates))
}

/// Install-directory files moved aside before an update.
#[derive(Debug)]
pub struct Backup {
    dir: PathBuf,
    install_dir: PathBuf,
    /// Names moved into `dir`.
    saved: Vec<OsString>,
    /// Names that had no original; an install creates them.
    created: Vec<OsString>,
}

impl Backup {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn saved(&self) -> &[OsString] {
        &self.saved
    }

    /// Puts the install directory back the way it was before the backup.
    ///
    /// Every file is attempted; failures are collected.
    pub fn rollback(&self) -> std::result::Result<(), RollbackError> {
        let mut failures = Vec::new();

        for name in &self.created {
            let path = self.install_dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed {}", path.display()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => failures.push((path, err)),
            }
        }

        for name in &self.saved {
            let from = self.dir.join(name);
            let to = self.install_dir.join(name);
            match fs::rename(&from, &to) {
                Ok(()) => debug!("restored {}", to.display()),
                Err(err) => failures.push((to, err)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RollbackError {
                backup_dir: self.dir.clone(),
                failures,
            })
        }
    }
}

/// Moves the install-directory files that `updates` will replace into
/// `backup_dir`, matching by file name. Originals that do not exist are
/// skipped.
///
/// On failure everything moved so far is put back.
pub fn backup_files(updates: &[PathBuf], install_dir: &Path, backup_dir: &Path) -> Result<Backup> {
    fs::create_dir_all(backup_dir).map_err(Error::CreateDirectory)?;

    let mut backup = Backup {
        dir: backup_dir.to_path_buf(),
        install_dir: install_dir.to_path_buf(),
        saved: Vec::new(),
        created: Vec::new(),
    };

    for update in updates {
        let Some(name) = update.file_name() else {
            continue;
        };
        if backup.saved.iter().chain(&backup.created).any(|known| known == name) {
            continue;
        }

        let original = install_dir.join(name);
        match fs::symlink_metadata(&original) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                backup.created.push(name.to_os_string());
                continue;
            }
            _ => {}
        }

        if let Err(source) = fs::rename(&original, backup_dir.join(name)) {
            let rollback = backup.rollback().err();
            return Err(Error::BackupFailed { path: original, source, rollback });
        }

        debug!("backed up {}", original.display());
        backup.saved.push(name.to_os_string());
    }

    info!("backed up {} file(s) into {}", backup.saved.len(), backup_dir.display());
    Ok(backup)
}

/// Stops the services to stop, moves the updated files into `install_dir` by
/// file name and starts the services to start. Services that do not exist are
/// skipped.
pub fn install_update<S: ServiceControl>(details: &UpdateDetails, updates: &[PathBuf], install_dir: &Path, services: &S) -> Result<()> {
    for service in &details.services_to_stop {
        if !services.exists(service)? {
            debug!("service {service} does not exist, not stopping it");
            continue;
        }
        if services.is_running(service)? {
            services.stop(service)?;
        }
    }

    for update in updates {
        let Some(name) = update.file_name() else {
            warn!("skipping {}, it has no file name", update.display());
            continue;
        };

        let target = install_dir.join(name);
        fs::rename(update, &target).map_err(|source| Error::InstallFile { path: target.clone(), source })?;
        debug!("installed {}", target.display());
    }

    for service in &details.services_to_start {
        if !services.exists(service)? {
            debug!("service {service} does not exist, not starting it");
            continue;
        }
        services.start(service)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ArchiveManifests;
    use crate::service::tests::FakeServices;
    use std::io::Cursor;
    use update_format_wyu::write_archive_entries;

    fn write_package(path: &Path, entries: &[(&str, &[u8])]) {
        let zip = write_archive_entries(Cursor::new(Vec::new()), entries).unwrap();
        fs::write(path, zip.into_inner()).unwrap();
    }

    fn details_bytes(stop: &[&str], start: &[&str]) -> Vec<u8> {
        UpdateDetails {
            services_to_stop: stop.iter().map(|s| s.to_string()).collect(),
            services_to_start: start.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
        .to_bytes()
        .unwrap()
    }

    #[test]
    fn test_extract_and_split() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("wyu");
        let udt = details_bytes(&["widget-agent"], &["widget-agent"]);
        write_package(&package, &[(UPDATE_DETAILS_ENTRY, udt.as_slice()), ("base/WidgetX.txt", &b"new widget"[..])]);

        let files = extract(&package, &dir.path().join("extracted")).unwrap();
        assert_eq!(files.len(), 2);

        let (details, updates) = split_update_details(files, &ArchiveManifests).unwrap();
        assert_eq!(details.services_to_stop, vec!["widget-agent"]);
        assert_eq!(updates, vec![dir.path().join("extracted").join("base").join("WidgetX.txt")]);
        assert_eq!(fs::read(&updates[0]).unwrap(), b"new widget");
    }

    #[test]
    fn test_extract_rejects_zip_slip() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("wyu");
        write_package(&package, &[("../evil.txt", &b"gotcha"[..])]);

        let dest = dir.path().join("extracted");
        assert!(matches!(extract(&package, &dest), Err(Error::IllegalEntryPath(name)) if name == "../evil.txt"));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_no_update_details() {
        let files = vec![PathBuf::from("/tmp/extracted/WidgetX.txt")];
        assert!(matches!(split_update_details(files, &ArchiveManifests), Err(Error::NoManifestFound)));
    }

    #[test]
    fn test_backup_install_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let install_dir = dir.path().join("install");
        let extracted = dir.path().join("extracted");
        fs::create_dir_all(&install_dir).unwrap();
        fs::create_dir_all(&extracted).unwrap();

        fs::write(install_dir.join("WidgetX.txt"), b"old widget").unwrap();
        fs::write(extracted.join("WidgetX.txt"), b"new widget").unwrap();
        fs::write(extracted.join("WidgetY.txt"), b"brand new").unwrap();
        let updates = vec![extracted.join("WidgetX.txt"), extracted.join("WidgetY.txt")];

        let backup = backup_files(&updates, &install_dir, &dir.path().join("backup")).unwrap();
        assert_eq!(backup.saved(), &[OsString::from("WidgetX.txt")]);
        assert!(!install_dir.join("WidgetX.txt").exists());
        assert_eq!(fs::read(backup.dir().join("WidgetX.txt")).unwrap(), b"old widget");

        let services = FakeServices::default();
        install_update(&UpdateDetails::default(), &updates, &install_dir, &services).unwrap();
        assert_eq!(fs::read(install_dir.join("WidgetX.txt")).unwrap(), b"new widget");
        assert_eq!(fs::read(install_dir.join("WidgetY.txt")).unwrap(), b"brand new");

        backup.rollback().unwrap();
        assert_eq!(fs::read(install_dir.join("WidgetX.txt")).unwrap(), b"old widget");
        assert!(!install_dir.join("WidgetY.txt").exists());
    }

    #[test]
    fn test_install_failure_then_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let install_dir = dir.path().join("install");
        let extracted = dir.path().join("extracted");
        fs::create_dir_all(&install_dir).unwrap();
        fs::create_dir_all(&extracted).unwrap();

        fs::write(install_dir.join("WidgetX.txt"), b"old widget").unwrap();
        fs::write(extracted.join("WidgetX.txt"), b"new widget").unwrap();
        // vanished between extraction and install
        let updates = vec![extracted.join("WidgetX.txt"), extracted.join("Missing.txt")];

        let backup = backup_files(&updates, &install_dir, &dir.path().join("backup")).unwrap();
        let err = install_update(&UpdateDetails::default(), &updates, &install_dir, &FakeServices::default()).unwrap_err();
        assert!(matches!(err, Error::InstallFile { ref path, .. } if path == &install_dir.join("Missing.txt")));

        backup.rollback().unwrap();
        assert_eq!(fs::read(install_dir.join("WidgetX.txt")).unwrap(), b"old widget");
    }

    #[test]
    fn test_rollback_failure_names_backup_dir() {
        let dir = tempfile::tempdir().unwrap();
        let install_dir = dir.path().join("install");
        let extracted = dir.path().join("extracted");
        fs::create_dir_all(install_dir.join("WidgetX.txt")).unwrap();
        fs::write(install_dir.join("WidgetX.txt").join("precious.dat"), b"keep me").unwrap();
        fs::create_dir_all(&extracted).unwrap();
        fs::write(extracted.join("WidgetX.txt"), b"new widget").unwrap();
        let updates = vec![extracted.join("WidgetX.txt")];

        let backup = backup_files(&updates, &install_dir, &dir.path().join("backup")).unwrap();
        install_update(&UpdateDetails::default(), &updates, &install_dir, &FakeServices::default()).unwrap();

        let err = backup.rollback().unwrap_err();
        assert_eq!(err.backup_dir, dir.path().join("backup"));
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].0, install_dir.join("WidgetX.txt"));
        assert!(err.to_string().contains("originals kept in"));
        assert_eq!(fs::read(dir.path().join("backup").join("WidgetX.txt").join("precious.dat")).unwrap(), b"keep me");
    }

    #[test]
    fn test_service_order() {
        let dir = tempfile::tempdir().unwrap();
        let details = UpdateDetails {
            services_to_stop: vec!["widget-agent".to_string(), "not-installed".to_string()],
            services_to_start: vec!["widget-agent".to_string(), "not-installed".to_string()],
            ..Default::default()
        };
        let services = FakeServices::with(&["widget-agent"]);

        install_update(&details, &[], dir.path(), &services).unwrap();
        assert_eq!(*services.calls.borrow(), vec!["stop widget-agent", "start widget-agent"]);
    }

    #[test]
    fn test_stopped_service_is_not_stopped_again() {
        let dir = tempfile::tempdir().unwrap();
        let details = UpdateDetails {
            services_to_stop: vec!["widget-agent".to_string()],
            ..Default::default()
        };
        let services = FakeServices::with(&["widget-agent"]);
        services.running.borrow_mut().clear();

        install_update(&details, &[], dir.path(), &services).unwrap();
        assert!(services.calls.borrow().is_empty());
    }
}
