use std::env;
use std::fs;
use std::process;

#[macro_use]
extern crate log;

use anyhow::{bail, Context, Result};
use argh::FromArgs;

use wyu_rs::{ArchiveManifests, HttpFetcher, Outcome, Systemctl, Timeouts, UpdateConfig, Updater, EXIT_ERROR};

/// Switches understood in wyUpdate's `/switch` and `-option=value` forms.
const KNOWN_ARGS: &[&str] = &[
    "debug",
    "quickcheck",
    "justcheck",
    "noerr",
    "fromservice",
    "urlargs",
    "cdata",
    "logfile",
    "outputinfo",
    "wysserver",
    "wyuserver",
    "help",
];

#[derive(FromArgs, Debug)]
/// Check for, download and install updates of a product described by a
/// wyUpdate client manifest.
struct Args {
    /// log debug messages
    #[argh(switch)]
    debug: bool,

    /// check for an update without installing it; requires --justcheck
    #[argh(switch)]
    quickcheck: bool,

    /// only report whether an update is available; requires --quickcheck
    #[argh(switch)]
    justcheck: bool,

    /// do not print errors to stderr
    #[argh(switch)]
    noerr: bool,

    /// download and install the update
    #[argh(switch)]
    fromservice: bool,

    /// string substituted for %urlargs% in update URLs
    #[argh(option, default = "String::new()")]
    urlargs: String,

    /// path to the client manifest container, default client.wyc next to the executable
    #[argh(option)]
    cdata: Option<String>,

    /// file to write the error message to
    #[argh(option)]
    logfile: Option<String>,

    /// file to write the outcome to, stdout if empty
    #[argh(option)]
    outputinfo: Option<String>,

    /// server manifest URL to use instead of the ones in the client manifest
    #[argh(option)]
    wysserver: Option<String>,

    /// package URL to use instead of the ones in the server manifest
    #[argh(option)]
    wyuserver: Option<String>,
}

/// Rewrites `/switch`, `-switch` and `-option=value` into `--switch` and
/// `--option value`. Switch names are case-insensitive, values are kept as
/// given. Anything else passes through untouched.
fn normalize_args(raw: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(raw.len());

    for arg in raw {
        let stripped = arg.trim_start_matches(['/', '-']);
        if stripped.len() == arg.len() {
            args.push(arg.clone());
            continue;
        }

        let (key, value) = match stripped.split_once('=') {
            Some((key, value)) => (key.to_ascii_lowercase(), Some(value)),
            None => (stripped.to_ascii_lowercase(), None),
        };

        if !KNOWN_ARGS.contains(&key.as_str()) {
            args.push(arg.clone());
            continue;
        }

        args.push(format!("--{key}"));
        if let Some(value) = value {
            args.push(value.to_string());
        }
    }

    args
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

fn write_message(path: &str, msg: &str) {
    if let Err(err) = fs::write(path, msg) {
        warn!("failed to write {path:?}: {err}");
    }
}

fn output_info(args: &Args, msg: &str) {
    match args.outputinfo.as_deref() {
        None => {}
        Some("") => println!("{msg}"),
        Some(path) => write_message(path, msg),
    }
}

fn run(args: &Args) -> Result<Outcome> {
    let exe = env::current_exe().context("failed to locate executable")?;
    let install_dir = exe.parent().context("executable has no parent directory")?;

    let mut config = UpdateConfig::new(install_dir)
        .url_args(args.urlargs.as_str())
        .server_manifest_url(args.wysserver.clone())
        .package_url(args.wyuserver.clone());
    if let Some(cdata) = &args.cdata {
        config = config.client_manifest_path(cdata);
    }

    let fetcher = HttpFetcher::new(Timeouts::default())?;
    let updater = Updater::new(config, ArchiveManifests, fetcher, Systemctl);

    if args.quickcheck && args.justcheck {
        info!("checking for updates...");
        return Ok(updater.check()?);
    }

    if args.fromservice {
        info!("updating...");
        return Ok(updater.update()?);
    }

    bail!("nothing to do, pass /quickcheck /justcheck to check for updates or /fromservice to install them");
}

fn main() {
    let raw: Vec<String> = env::args().collect();
    let command = raw.first().map(String::as_str).unwrap_or("wyupdate");
    let normalized = normalize_args(raw.get(1..).unwrap_or_default());
    let normalized: Vec<&str> = normalized.iter().map(String::as_str).collect();

    let args = match Args::from_args(&[command], &normalized) {
        Ok(args) => args,
        Err(early_exit) => match early_exit.status {
            Ok(()) => {
                println!("{}", early_exit.output);
                process::exit(0);
            }
            Err(()) => {
                eprintln!("{}", early_exit.output);
                process::exit(EXIT_ERROR);
            }
        },
    };

    init_logging(args.debug);
    debug!("{args:?}");

    let code = match run(&args) {
        Ok(outcome) => {
            match &outcome {
                Outcome::NoUpdate { version } => info!("no update available, version {version}"),
                Outcome::UpdateAvailable { version } => info!("update available, version {version}"),
                Outcome::Updated { version } => info!("update successful, version {version}"),
            }
            output_info(&args, outcome.version());
            outcome.exit_code()
        }
        Err(err) => {
            let msg = format!("{err:#}");
            error!("{msg}");
            if !args.noerr {
                eprintln!("{msg}");
            }
            if let Some(path) = &args.logfile {
                write_message(path, &msg);
            }
            output_info(&args, &msg);
            EXIT_ERROR
        }
    };

    process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(args: &[&str]) -> Vec<String> {
        normalize_args(&args.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_normalize_windows_style() {
        assert_eq!(
            normalize(&["/quickcheck", "/JustCheck", "/noerr", "-urlargs=Key=Value", "/outputinfo=C:\\check.log"]),
            vec!["--quickcheck", "--justcheck", "--noerr", "--urlargs", "Key=Value", "--outputinfo", "C:\\check.log"]
        );
    }

    #[test]
    fn test_normalize_keeps_values() {
        assert_eq!(
            normalize(&["-cdata", "/opt/widget/client.wyc", "--logfile=/var/log/wyupdate.log", "-outputinfo="]),
            vec!["--cdata", "/opt/widget/client.wyc", "--logfile", "/var/log/wyupdate.log", "--outputinfo", ""]
        );
    }

    #[test]
    fn test_parse_normalized() {
        let normalized = normalize(&["/fromservice", "-logfile=update.log", "-urlargs=abc"]);
        let normalized: Vec<&str> = normalized.iter().map(String::as_str).collect();
        let args = Args::from_args(&["wyupdate"], &normalized).unwrap();

        assert!(args.fromservice);
        assert!(!args.quickcheck);
        assert_eq!(args.logfile.as_deref(), Some("update.log"));
        assert_eq!(args.urlargs, "abc");
        assert_eq!(args.cdata, None);
    }
}
