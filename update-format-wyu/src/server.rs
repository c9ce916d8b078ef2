//! Server manifest (magic `IUSDFV2`), served zipped as the single entry `"0"`.

use std::io::{Cursor, Read, Seek, Write};

use crate::archive::write_archive_entries;
use crate::client::URL_ARGS_PLACEHOLDER;
use crate::tlv::{self, Layout, Record, Schema};
use crate::{read_archive_entry, Result, SERVER_MANIFEST_ENTRY};

pub const SERVER_MANIFEST_MAGIC: &str = "IUSDFV2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerTag {
    CurrentLastVersion,
    ServerFileSite,
    MinClientVersion,
    DummyVarLen,
    VersionToUpdate,
    UpdateFileSite,
    Rtf,
    LatestChanges,
    UpdateFileSize,
    UpdateFileAdler32,
    FileSha1,
    Folder,
    UpdateErrorText,
    UpdateErrorLink,
}

impl Schema for ServerTag {
    fn from_tag(tag: u8) -> Option<Self> {
        let tag = match tag {
            0x01 => ServerTag::CurrentLastVersion,
            0x02 => ServerTag::ServerFileSite,
            0x07 => ServerTag::MinClientVersion,
            0x0F => ServerTag::DummyVarLen,
            0x0B => ServerTag::VersionToUpdate,
            0x03 => ServerTag::UpdateFileSite,
            0x80 => ServerTag::Rtf,
            0x04 => ServerTag::LatestChanges,
            0x09 => ServerTag::UpdateFileSize,
            0x08 => ServerTag::UpdateFileAdler32,
            0x14 => ServerTag::FileSha1,
            0x0A => ServerTag::Folder,
            0x20 => ServerTag::UpdateErrorText,
            0x21 => ServerTag::UpdateErrorLink,
            _ => return None,
        };
        Some(tag)
    }

    fn tag(self) -> u8 {
        match self {
            ServerTag::CurrentLastVersion => 0x01,
            ServerTag::ServerFileSite => 0x02,
            ServerTag::MinClientVersion => 0x07,
            ServerTag::DummyVarLen => 0x0F,
            ServerTag::VersionToUpdate => 0x0B,
            ServerTag::UpdateFileSite => 0x03,
            ServerTag::Rtf => 0x80,
            ServerTag::LatestChanges => 0x04,
            ServerTag::UpdateFileSize => 0x09,
            ServerTag::UpdateFileAdler32 => 0x08,
            ServerTag::FileSha1 => 0x14,
            ServerTag::Folder => 0x0A,
            ServerTag::UpdateErrorText => 0x20,
            ServerTag::UpdateErrorLink => 0x21,
        }
    }

    fn layout(self) -> Layout {
        match self {
            ServerTag::CurrentLastVersion
            | ServerTag::ServerFileSite
            | ServerTag::MinClientVersion
            | ServerTag::VersionToUpdate
            | ServerTag::UpdateFileSite
            | ServerTag::LatestChanges
            | ServerTag::UpdateErrorText
            | ServerTag::UpdateErrorLink => Layout::DString,
            ServerTag::DummyVarLen => Layout::LengthOnly,
            ServerTag::Rtf | ServerTag::UpdateFileSize | ServerTag::UpdateFileAdler32 | ServerTag::FileSha1 | ServerTag::Folder => Layout::Plain,
        }
    }
}

/// Description of the newest available update, as published by the update server.
///
/// Fields the updater does not act on keep their raw value bytes; an empty
/// value stands for an absent field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerManifest {
    pub current_last_version: Vec<u8>,
    pub server_file_site: Vec<u8>,
    pub min_client_version: Vec<u8>,
    /// Length carried by the value-less "dummy" record, if present.
    pub dummy_var_len: Option<u32>,
    pub version_to_update: String,
    /// Update package URLs, tried in order.
    pub update_file_sites: Vec<String>,
    pub rtf: Vec<u8>,
    pub latest_changes: Vec<u8>,
    pub update_file_size: Vec<u8>,
    pub update_file_adler32: Option<i64>,
    /// RSA signature over the SHA1 digest of the update package.
    pub file_sha1: Vec<u8>,
    pub folder: Vec<u8>,
    pub update_error_text: Vec<u8>,
    pub update_error_link: Vec<u8>,
}

impl ServerManifest {
    pub fn parse<R: Read>(r: &mut R) -> Result<Self> {
        tlv::read_header(r, SERVER_MANIFEST_MAGIC)?;

        let mut manifest = ServerManifest::default();

        while let Some(record) = tlv::read_record::<ServerTag, _>(r)? {
            if record.is_absent() {
                continue;
            }

            match record.tag {
                ServerTag::VersionToUpdate => manifest.version_to_update = record.into_string()?,
                ServerTag::UpdateFileSite => manifest.update_file_sites.push(record.into_string()?),
                ServerTag::UpdateFileAdler32 => manifest.update_file_adler32 = Some(record.to_i64()?),
                ServerTag::FileSha1 => manifest.file_sha1 = record.into_bytes(),
                ServerTag::DummyVarLen => manifest.dummy_var_len = Some(record.length),
                ServerTag::CurrentLastVersion => manifest.current_last_version = record.into_bytes(),
                ServerTag::ServerFileSite => manifest.server_file_site = record.into_bytes(),
                ServerTag::MinClientVersion => manifest.min_client_version = record.into_bytes(),
                ServerTag::Rtf => manifest.rtf = record.into_bytes(),
                ServerTag::LatestChanges => manifest.latest_changes = record.into_bytes(),
                ServerTag::UpdateFileSize => manifest.update_file_size = record.into_bytes(),
                ServerTag::Folder => manifest.folder = record.into_bytes(),
                ServerTag::UpdateErrorText => manifest.update_error_text = record.into_bytes(),
                ServerTag::UpdateErrorLink => manifest.update_error_link = record.into_bytes(),
            }
        }

        Ok(manifest)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        tlv::write_header(w, SERVER_MANIFEST_MAGIC)?;

        let mut records = vec![
            Record::new(ServerTag::CurrentLastVersion, self.current_last_version.clone())?,
            Record::new(ServerTag::ServerFileSite, self.server_file_site.clone())?,
            Record::new(ServerTag::MinClientVersion, self.min_client_version.clone())?,
        ];
        if let Some(len) = self.dummy_var_len {
            records.push(Record::length_only(ServerTag::DummyVarLen, len));
        }
        records.push(Record::from_string(ServerTag::VersionToUpdate, &self.version_to_update)?);
        for site in &self.update_file_sites {
            records.push(Record::from_string(ServerTag::UpdateFileSite, site)?);
        }
        records.push(Record::new(ServerTag::Rtf, self.rtf.clone())?);
        records.push(Record::new(ServerTag::LatestChanges, self.latest_changes.clone())?);
        records.push(Record::new(ServerTag::UpdateFileSize, self.update_file_size.clone())?);
        if let Some(adler32) = self.update_file_adler32 {
            records.push(Record::from_i64(ServerTag::UpdateFileAdler32, adler32)?);
        }
        records.push(Record::new(ServerTag::FileSha1, self.file_sha1.clone())?);
        records.push(Record::new(ServerTag::Folder, self.folder.clone())?);
        records.push(Record::new(ServerTag::UpdateErrorText, self.update_error_text.clone())?);
        records.push(Record::new(ServerTag::UpdateErrorLink, self.update_error_link.clone())?);

        for record in &records {
            tlv::write_record(w, record)?;
        }

        tlv::write_end(w)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(buf)
    }

    /// Parses the manifest out of a downloaded server container.
    pub fn read_container<R: Read + Seek>(reader: R) -> Result<Self> {
        let bytes = read_archive_entry(reader, SERVER_MANIFEST_ENTRY)?;
        Self::parse(&mut Cursor::new(bytes))
    }

    /// Packs the manifest into a server container, as published on the update server.
    pub fn to_container(&self) -> Result<Vec<u8>> {
        let bytes = self.to_bytes()?;
        Ok(write_archive_entries(Cursor::new(Vec::new()), &[(SERVER_MANIFEST_ENTRY, bytes.as_slice())])?.into_inner())
    }

    /// Expected Adler-32 of the update package; `0` means no checksum was published.
    pub fn expected_adler32(&self) -> u32 {
        // the checksum is stored widened to a signed 64-bit field
        self.update_file_adler32.unwrap_or(0) as u32
    }

    /// URLs to fetch the update package from, in order.
    ///
    /// An override URL replaces the published list. In either case the first
    /// `%urlargs%` in each URL is replaced by `url_args`.
    pub fn package_urls(&self, url_args: &str, override_url: Option<&str>) -> Vec<String> {
        let sites = match override_url.filter(|url| !url.is_empty()) {
            Some(url) => vec![url.to_string()],
            None => self.update_file_sites.clone(),
        };

        sites.iter().map(|site| site.replacen(URL_ARGS_PLACEHOLDER, url_args, 1)).collect()
    }
}
