mod error;
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub mod tlv;

mod archive;
pub use archive::{read_archive_entry, rewrite_archive_entry, write_archive_entries};

pub mod client;
pub use client::ClientManifest;

pub mod server;
pub use server::ServerManifest;

pub mod details;
pub use details::{FileInfo, UpdateDetails};

pub mod verify_sig;

/// Name of the client manifest container next to the installed program.
pub const CLIENT_CONTAINER_NAME: &str = "client.wyc";

/// Name of the client manifest entry inside the client container.
pub const CLIENT_MANIFEST_ENTRY: &str = "iuclient.iuc";

/// Name of the server manifest entry inside the downloaded server container.
pub const SERVER_MANIFEST_ENTRY: &str = "0";

/// Name of the update-details manifest entry inside an update package.
pub const UPDATE_DETAILS_ENTRY: &str = "updtdetails.udt";
