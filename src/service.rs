use std::process::{Command, Output};

use log::{debug, info};

use crate::error::Error;
use crate::Result;

/// Control over the system services an update stops and starts.
pub trait ServiceControl {
    fn exists(&self, name: &str) -> Result<bool>;
    fn is_running(&self, name: &str) -> Result<bool>;
    fn start(&self, name: &str) -> Result<()>;
    fn stop(&self, name: &str) -> Result<()>;
}

impl<T: ServiceControl + ?Sized> ServiceControl for &T {
    fn exists(&self, name: &str) -> Result<bool> {
        (**self).exists(name)
    }

    fn is_running(&self, name: &str) -> Result<bool> {
        (**self).is_running(name)
    }

    fn start(&self, name: &str) -> Result<()> {
        (**self).start(name)
    }

    fn stop(&self, name: &str) -> Result<()> {
        (**self).stop(name)
    }
}

/// systemd services, driven through `systemctl`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Systemctl;

impl Systemctl {
    fn run(&self, name: &str, args: &[&str]) -> Result<Output> {
        let unit = unit_name(name);
        debug!("running systemctl {} {unit}", args.join(" "));

        Command::new("systemctl").args(args).arg(&unit).output().map_err(|err| Error::RunServiceCommand(unit, err))
    }

    fn run_checked(&self, action: &'static str, name: &str) -> Result<()> {
        let output = self.run(name, &[action])?;
        if !output.status.success() {
            return Err(Error::ServiceCommandFailed {
                action,
                service: unit_name(name),
                code: output.status.code(),
            });
        }

        Ok(())
    }
}

impl ServiceControl for Systemctl {
    fn exists(&self, name: &str) -> Result<bool> {
        // exits non-zero when nothing matches, the listing decides
        let output = self.run(name, &["list-unit-files", "--no-legend", "--no-pager"])?;
        Ok(unit_listed(&output.stdout, &unit_name(name)))
    }

    fn is_running(&self, name: &str) -> Result<bool> {
        // exits non-zero for every state but "active"
        let output = self.run(name, &["is-active"])?;
        Ok(is_active(&output.stdout))
    }

    fn start(&self, name: &str) -> Result<()> {
        info!("starting service {name}");
        self.run_checked("start", name)
    }

    fn stop(&self, name: &str) -> Result<()> {
        info!("stopping service {name}");
        self.run_checked("stop", name)
    }
}

/// Whether `systemctl list-unit-files --no-legend` output has a line for `unit`.
fn unit_listed(stdout: &[u8], unit: &str) -> bool {
    String::from_utf8_lossy(stdout).lines().any(|line| line.split_whitespace().next() == Some(unit))
}

/// Whether `systemctl is-active` reported the unit as active.
fn is_active(stdout: &[u8]) -> bool {
    String::from_utf8_lossy(stdout).lines().next().map(str::trim) == Some("active")
}

/// Appends `.service` to bare service names.
fn unit_name(name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{name}.service")
    }
}
