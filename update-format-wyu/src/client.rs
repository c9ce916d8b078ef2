//! Client manifest (`iuclient.iuc`, magic `IUCDFV2`), shipped zipped as `client.wyc`
//! next to the installed program.

use std::borrow::Cow;
use std::io::{Cursor, Read, Seek, Write};

use crate::tlv::{self, Layout, Record, Schema};
use crate::{read_archive_entry, rewrite_archive_entry, Result, CLIENT_MANIFEST_ENTRY};

pub const CLIENT_MANIFEST_MAGIC: &str = "IUCDFV2";

/// Placeholder in server manifest URLs that is replaced by the caller's URL arguments.
pub const URL_ARGS_PLACEHOLDER: &str = "%urlargs%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTag {
    CompanyName,
    ProductName,
    InstalledVersion,
    Guid,
    ServerFileSite,
    WyupdateServerSite,
    HeaderImageAlignment,
    HeaderTextIndent,
    HeaderTextColor,
    HeaderFilename,
    SideImageFilename,
    LanguageCulture,
    LanguageFilename,
    HideHeaderDivider,
    CloseWyupdate,
    CustomTitleBar,
    PublicKey,
}

impl Schema for ClientTag {
    fn from_tag(tag: u8) -> Option<Self> {
        let tag = match tag {
            0x01 => ClientTag::CompanyName,
            0x02 => ClientTag::ProductName,
            0x03 => ClientTag::InstalledVersion,
            0x0A => ClientTag::Guid,
            0x04 => ClientTag::ServerFileSite,
            0x09 => ClientTag::WyupdateServerSite,
            0x11 => ClientTag::HeaderImageAlignment,
            0x12 => ClientTag::HeaderTextIndent,
            0x13 => ClientTag::HeaderTextColor,
            0x14 => ClientTag::HeaderFilename,
            0x15 => ClientTag::SideImageFilename,
            0x18 => ClientTag::LanguageCulture,
            0x16 => ClientTag::LanguageFilename,
            0x17 => ClientTag::HideHeaderDivider,
            0x19 => ClientTag::CloseWyupdate,
            0x1A => ClientTag::CustomTitleBar,
            0x1B => ClientTag::PublicKey,
            _ => return None,
        };
        Some(tag)
    }

    fn tag(self) -> u8 {
        match self {
            ClientTag::CompanyName => 0x01,
            ClientTag::ProductName => 0x02,
            ClientTag::InstalledVersion => 0x03,
            ClientTag::Guid => 0x0A,
            ClientTag::ServerFileSite => 0x04,
            ClientTag::WyupdateServerSite => 0x09,
            ClientTag::HeaderImageAlignment => 0x11,
            ClientTag::HeaderTextIndent => 0x12,
            ClientTag::HeaderTextColor => 0x13,
            ClientTag::HeaderFilename => 0x14,
            ClientTag::SideImageFilename => 0x15,
            ClientTag::LanguageCulture => 0x18,
            ClientTag::LanguageFilename => 0x16,
            ClientTag::HideHeaderDivider => 0x17,
            ClientTag::CloseWyupdate => 0x19,
            ClientTag::CustomTitleBar => 0x1A,
            ClientTag::PublicKey => 0x1B,
        }
    }

    fn layout(self) -> Layout {
        match self {
            ClientTag::CompanyName
            | ClientTag::ProductName
            | ClientTag::InstalledVersion
            | ClientTag::ServerFileSite
            | ClientTag::WyupdateServerSite
            | ClientTag::HeaderImageAlignment
            | ClientTag::HeaderTextColor
            | ClientTag::HeaderFilename
            | ClientTag::SideImageFilename
            | ClientTag::LanguageCulture
            | ClientTag::LanguageFilename => Layout::DString,
            ClientTag::Guid | ClientTag::CustomTitleBar | ClientTag::PublicKey | ClientTag::HeaderTextIndent | ClientTag::HideHeaderDivider | ClientTag::CloseWyupdate => Layout::Plain,
        }
    }
}

/// Installed product description.
///
/// Only the fields the updater acts on are decoded. Everything else is kept as
/// the raw value bytes found in the manifest and written back unchanged; an
/// empty value stands for an absent field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientManifest {
    pub company_name: Vec<u8>,
    pub product_name: Vec<u8>,
    pub guid: Vec<u8>,
    pub installed_version: String,
    /// Server manifest URLs, tried in order.
    pub server_file_sites: Vec<String>,
    pub wyupdate_server_sites: Vec<Vec<u8>>,
    pub header_image_alignment: Vec<u8>,
    pub header_text_indent: Vec<u8>,
    pub header_text_color: Vec<u8>,
    pub header_filename: Vec<u8>,
    pub side_image_filename: Vec<u8>,
    pub language_culture: Vec<u8>,
    pub hide_header_divider: Vec<u8>,
    /// RSA public key as `<RSAKeyValue>` XML.
    pub public_key: String,
    pub language_filename: Vec<u8>,
    pub custom_title_bar: Vec<u8>,
    pub close_wyupdate: Vec<u8>,
}

impl ClientManifest {
    pub fn parse<R: Read>(r: &mut R) -> Result<Self> {
        tlv::read_header(r, CLIENT_MANIFEST_MAGIC)?;

        let mut manifest = ClientManifest::default();

        while let Some(record) = tlv::read_record::<ClientTag, _>(r)? {
            if record.is_absent() {
                continue;
            }

            match record.tag {
                ClientTag::InstalledVersion => manifest.installed_version = record.into_string()?,
                ClientTag::ServerFileSite => manifest.server_file_sites.push(record.into_string()?),
                ClientTag::PublicKey => manifest.public_key = record.into_string()?,
                ClientTag::CompanyName => manifest.company_name = record.into_bytes(),
                ClientTag::ProductName => manifest.product_name = record.into_bytes(),
                ClientTag::Guid => manifest.guid = record.into_bytes(),
                ClientTag::WyupdateServerSite => manifest.wyupdate_server_sites.push(record.into_bytes()),
                ClientTag::HeaderImageAlignment => manifest.header_image_alignment = record.into_bytes(),
                ClientTag::HeaderTextIndent => manifest.header_text_indent = record.into_bytes(),
                ClientTag::HeaderTextColor => manifest.header_text_color = record.into_bytes(),
                ClientTag::HeaderFilename => manifest.header_filename = record.into_bytes(),
                ClientTag::SideImageFilename => manifest.side_image_filename = record.into_bytes(),
                ClientTag::LanguageCulture => manifest.language_culture = record.into_bytes(),
                ClientTag::LanguageFilename => manifest.language_filename = record.into_bytes(),
                ClientTag::HideHeaderDivider => manifest.hide_header_divider = record.into_bytes(),
                ClientTag::CloseWyupdate => manifest.close_wyupdate = record.into_bytes(),
                ClientTag::CustomTitleBar => manifest.custom_title_bar = record.into_bytes(),
            }
        }

        Ok(manifest)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        tlv::write_header(w, CLIENT_MANIFEST_MAGIC)?;

        let mut records = vec![
            Record::new(ClientTag::CompanyName, self.company_name.clone())?,
            Record::new(ClientTag::ProductName, self.product_name.clone())?,
            Record::new(ClientTag::Guid, self.guid.clone())?,
            Record::from_string(ClientTag::InstalledVersion, &self.installed_version)?,
        ];
        for site in &self.server_file_sites {
            records.push(Record::from_string(ClientTag::ServerFileSite, site)?);
        }
        for site in &self.wyupdate_server_sites {
            records.push(Record::new(ClientTag::WyupdateServerSite, site.clone())?);
        }
        for (tag, value) in [
            (ClientTag::HeaderImageAlignment, &self.header_image_alignment),
            (ClientTag::HeaderTextIndent, &self.header_text_indent),
            (ClientTag::HeaderTextColor, &self.header_text_color),
            (ClientTag::HeaderFilename, &self.header_filename),
            (ClientTag::SideImageFilename, &self.side_image_filename),
            (ClientTag::LanguageCulture, &self.language_culture),
            (ClientTag::HideHeaderDivider, &self.hide_header_divider),
        ] {
            records.push(Record::new(tag, value.clone())?);
        }
        records.push(Record::from_string(ClientTag::PublicKey, &self.public_key)?);
        records.push(Record::new(ClientTag::LanguageFilename, self.language_filename.clone())?);
        records.push(Record::new(ClientTag::CustomTitleBar, self.custom_title_bar.clone())?);
        records.push(Record::new(ClientTag::CloseWyupdate, self.close_wyupdate.clone())?);

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

    /// Parses the manifest out of a `client.wyc` container.
    pub fn read_container<R: Read + Seek>(reader: R) -> Result<Self> {
        let bytes = read_archive_entry(reader, CLIENT_MANIFEST_ENTRY)?;
        Self::parse(&mut Cursor::new(bytes))
    }

    /// Writes a copy of the container in `reader` to `writer` with this manifest
    /// in place of the old one. Other container entries are kept as they are.
    pub fn rewrite_container<R: Read + Seek, W: Write + Seek>(&self, reader: R, writer: W) -> Result<W> {
        rewrite_archive_entry(reader, writer, CLIENT_MANIFEST_ENTRY, &self.to_bytes()?)
    }

    /// Product name for messages. Not necessarily UTF-8 on the wire.
    pub fn product_name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.product_name)
    }

    /// Public key XML, if updates for this product have to be signed.
    pub fn public_key(&self) -> Option<&str> {
        Some(self.public_key.as_str()).filter(|key| !key.is_empty())
    }

    /// URLs to fetch the server manifest from, in order.
    ///
    /// An override URL replaces the configured list. Otherwise the first
    /// `%urlargs%` in each configured URL is replaced by `url_args`.
    pub fn server_manifest_urls(&self, url_args: &str, override_url: Option<&str>) -> Vec<String> {
        if let Some(url) = override_url.filter(|url| !url.is_empty()) {
            return vec![url.to_string()];
        }

        self.server_file_sites.iter().map(|site| site.replacen(URL_ARGS_PLACEHOLDER, url_args, 1)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::write_archive_entries;
    use crate::Error;

    fn sample_manifest() -> ClientManifest {
        ClientManifest {
            company_name: b"Acme".to_vec(),
            product_name: b"Widget Service".to_vec(),
            guid: b"4a3b6e1c-1a2b-4c5d-9e8f-0a1b2c3d4e5f".to_vec(),
            installed_version: "1.0.0".to_string(),
            server_file_sites: vec!["https://updates.example.com/widget.wys?auth=%urlargs%".to_string(), "https://mirror.example.com/widget.wys".to_string()],
            wyupdate_server_sites: vec![],
            header_image_alignment: b"Left".to_vec(),
            header_text_indent: (-1i32).to_le_bytes().to_vec(),
            header_text_color: b"Black".to_vec(),
            header_filename: Vec::new(),
            side_image_filename: b"s.png".to_vec(),
            language_culture: b"en-US".to_vec(),
            hide_header_divider: 0i32.to_le_bytes().to_vec(),
            public_key: String::new(),
            language_filename: Vec::new(),
            custom_title_bar: Vec::new(),
            close_wyupdate: 1i32.to_le_bytes().to_vec(),
        }
    }

    #[test]
    fn test_round_trip() {
        let manifest = sample_manifest();
        let bytes = manifest.to_bytes().unwrap();

        assert!(bytes.starts_with(b"IUCDFV2"));
        assert_eq!(bytes.last(), Some(&0xFF));

        let parsed = ClientManifest::parse(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed, manifest);

        // writing an unmodified manifest reproduces the original bytes
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_record_order() {
        let manifest = ClientManifest {
            company_name: b"A".to_vec(),
            guid: b"G".to_vec(),
            installed_version: "1".to_string(),
            ..Default::default()
        };

        let bytes = manifest.to_bytes().unwrap();
        #[rustfmt::skip]
        let expected: &[u8] = &[
            b'I', b'U', b'C', b'D', b'F', b'V', b'2',
            0x01, 5, 0, 0, 0, 1, 0, 0, 0, b'A',
            0x0A, 1, 0, 0, 0, b'G',
            0x03, 5, 0, 0, 0, 1, 0, 0, 0, b'1',
            0xFF,
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_uninterpreted_values_survive_rewrite() {
        let mut bytes = b"IUCDFV2".to_vec();
        // company name in Latin-1
        bytes.extend_from_slice(&[0x01, 8, 0, 0, 0, 4, 0, 0, 0, b'C', b'a', b'f', 0xE9]);
        bytes.extend_from_slice(&[0x03, 9, 0, 0, 0, 5, 0, 0, 0, b'1', b'.', b'0', b'.', b'0']);
        // hide header divider stored as 2 rather than 0 or 1
        bytes.extend_from_slice(&[0x17, 4, 0, 0, 0, 2, 0, 0, 0]);
        // close wyupdate with a short value
        bytes.extend_from_slice(&[0x19, 1, 0, 0, 0, 1]);
        bytes.push(0xFF);

        let mut manifest = ClientManifest::parse(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(manifest.company_name, b"Caf\xE9");
        assert_eq!(manifest.product_name_lossy(), "");
        assert_eq!(manifest.hide_header_divider, [2, 0, 0, 0]);
        assert_eq!(manifest.to_bytes().unwrap(), bytes);

        manifest.installed_version = "1.0.1".to_string();
        let rewritten = manifest.to_bytes().unwrap();
        let reread = ClientManifest::parse(&mut Cursor::new(&rewritten)).unwrap();
        assert_eq!(reread.installed_version, "1.0.1");
        assert_eq!(reread.company_name, b"Caf\xE9");
        assert_eq!(reread.hide_header_divider, [2, 0, 0, 0]);
        assert_eq!(reread.close_wyupdate, [1]);
    }

    #[test]
    fn test_zero_length_records_are_absent() {
        let mut bytes = b"IUCDFV2".to_vec();
        bytes.extend_from_slice(&[0x03, 5, 0, 0, 0, 1, 0, 0, 0, b'2']);
        // empty server site, bool and int
        bytes.extend_from_slice(&[0x04, 4, 0, 0, 0, 0, 0, 0, 0]);
        bytes.extend_from_slice(&[0x17, 0, 0, 0, 0]);
        bytes.extend_from_slice(&[0x12, 0, 0, 0, 0]);
        bytes.push(0xFF);

        let manifest = ClientManifest::parse(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(manifest.installed_version, "2");
        assert!(manifest.server_file_sites.is_empty());
        assert!(manifest.hide_header_divider.is_empty());
        assert!(manifest.header_text_indent.is_empty());
        assert_eq!(manifest.to_bytes().unwrap(), b"IUCDFV2\x03\x05\x00\x00\x00\x01\x00\x00\x00\x32\xFF");
    }

    #[test]
    fn test_invalid_header() {
        let mut bytes = sample_manifest().to_bytes().unwrap();
        bytes[2] = b'S';

        assert!(matches!(ClientManifest::parse(&mut Cursor::new(&bytes)), Err(Error::InvalidHeader { .. })));
    }

    #[test]
    fn test_unknown_tag() {
        let mut bytes = b"IUCDFV2".to_vec();
        bytes.extend_from_slice(&[0x30, 1, 0, 0, 0, 0, 0xFF]);

        assert!(matches!(ClientManifest::parse(&mut Cursor::new(&bytes)), Err(Error::UnknownTag(0x30))));
    }

    #[test]
    fn test_truncated_manifest() {
        let bytes = sample_manifest().to_bytes().unwrap();
        let truncated = &bytes[..bytes.len() - 5];

        assert!(matches!(ClientManifest::parse(&mut Cursor::new(truncated)), Err(Error::TruncatedStream { .. })));
    }

    #[test]
    fn test_server_manifest_urls() {
        let manifest = sample_manifest();

        assert_eq!(manifest.server_manifest_urls("secret", None), vec!["https://updates.example.com/widget.wys?auth=secret", "https://mirror.example.com/widget.wys"]);
        assert_eq!(manifest.server_manifest_urls("", None)[0], "https://updates.example.com/widget.wys?auth=");
        assert_eq!(manifest.server_manifest_urls("secret", Some("http://127.0.0.1:8080/test.wys")), vec!["http://127.0.0.1:8080/test.wys"]);
    }

    #[test]
    fn test_only_first_placeholder_is_replaced() {
        let manifest = ClientManifest {
            server_file_sites: vec!["https://a/%urlargs%/%urlargs%".to_string()],
            ..Default::default()
        };

        assert_eq!(manifest.server_manifest_urls("x", None), vec!["https://a/x/%urlargs%"]);
    }

    #[test]
    fn test_container_rewrite_updates_version() {
        let manifest = sample_manifest();
        let iuc = manifest.to_bytes().unwrap();
        let container = write_archive_entries(Cursor::new(Vec::new()), &[(CLIENT_MANIFEST_ENTRY, iuc.as_slice()), ("s.png", &b"side image"[..])]).unwrap().into_inner();

        let mut updated = ClientManifest::read_container(Cursor::new(&container)).unwrap();
        assert_eq!(updated, manifest);

        updated.installed_version = "1.0.1".to_string();
        let rewritten = updated.rewrite_container(Cursor::new(&container), Cursor::new(Vec::new())).unwrap().into_inner();

        let reread = ClientManifest::read_container(Cursor::new(&rewritten)).unwrap();
        assert_eq!(reread.installed_version, "1.0.1");
        assert_eq!(reread.server_file_sites, manifest.server_file_sites);
        assert_eq!(read_archive_entry(Cursor::new(&rewritten), "s.png").unwrap(), b"side image");
    }

    #[test]
    fn test_public_key() {
        let mut manifest = sample_manifest();
        assert_eq!(manifest.public_key(), None);

        manifest.public_key = "<RSAKeyValue/>".to_string();
        assert_eq!(manifest.public_key(), Some("<RSAKeyValue/>"));
    }
}
