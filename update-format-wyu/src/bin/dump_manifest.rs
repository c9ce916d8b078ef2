use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use argh::FromArgs;

use update_format_wyu::{ClientManifest, ServerManifest, UpdateDetails};

#[derive(FromArgs, Debug)]
/// Print the content of a wyUpdate client container (.wyc), server container (.wys)
/// or update details file (.udt).
struct Args {
    /// kind of file: wyc, wys or udt; guessed from the extension when omitted
    #[argh(option, short = 'k')]
    kind: Option<String>,

    /// path to the file to dump
    #[argh(positional)]
    path: String,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let kind = match args.kind.clone() {
        Some(kind) => kind,
        None => args.path.rsplit('.').next().unwrap_or_default().to_ascii_lowercase(),
    };

    let file = File::open(&args.path).context(format!("failed to open {:?}", args.path))?;
    let mut reader = BufReader::new(file);

    match kind.as_str() {
        "wyc" => println!("{:#?}", ClientManifest::read_container(reader)?),
        "wys" => {
            let manifest = ServerManifest::read_container(reader)?;
            println!("{manifest:#?}");
            println!("file SHA1 signature: {}", wyu_types::to_hex_string(&manifest.file_sha1));
        }
        "udt" => println!("{:#?}", UpdateDetails::parse(&mut reader)?),
        other => anyhow::bail!("unknown manifest kind {other:?}, expected wyc, wys or udt"),
    }

    Ok(())
}
