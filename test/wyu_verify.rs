use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use argh::FromArgs;

use update_format_wyu::{ClientManifest, ServerManifest};
use wyu_rs::{install, ArchiveManifests, Package};

#[derive(FromArgs, Debug)]
/// A test program for verifying an update package against the client and
/// server manifests, without installing it.
struct Args {
    /// client manifest container (client.wyc)
    #[argh(option, short = 'c')]
    client_path: String,

    /// server manifest container (.wys)
    #[argh(option, short = 's')]
    server_path: String,

    /// update package (.wyu)
    #[argh(option, short = 'p')]
    package_path: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Args = argh::from_env();

    let client = ClientManifest::read_container(BufReader::new(File::open(&args.client_path)?))?;
    let server = ServerManifest::read_container(BufReader::new(File::open(&args.server_path)?))?;

    let mut pkg = Package::new(vec![], PathBuf::from(&args.package_path), server.expected_adler32(), &server.file_sha1);

    pkg.verify_checksum()?;
    match client.public_key() {
        Some(_) => {
            pkg.verify_signature_on_disk(client.public_key())?;
            println!("Parsed and verified signature data from file {:?}", args.package_path);
        }
        None => println!("client manifest has no public key, signature not checked"),
    }

    let tmpdir = tempfile::tempdir()?;
    let files = install::extract(&pkg.path, tmpdir.path())?;
    let (details, updates) = install::split_update_details(files, &ArchiveManifests)?;

    println!("version to update: {}", server.version_to_update);
    println!("services to stop: {:?}", details.services_to_stop);
    println!("services to start: {:?}", details.services_to_start);
    for update in &updates {
        println!("file: {}", update.strip_prefix(tmpdir.path()).unwrap_or(update).display());
    }

    Ok(())
}
