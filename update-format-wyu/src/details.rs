//! Update details manifest (`updtdetails.udt`, magic `IUUDFV2`) carried inside
//! an update package.

use std::io::{Read, Write};

use crate::tlv::{self, Layout, Record, Schema};
use crate::Result;

pub const UPDATE_DETAILS_MAGIC: &str = "IUUDFV2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailsTag {
    RegistryChangesCount,
    FileInfosCount,
    BeginFileInfo,
    RelativePath,
    DeltaPatchPath,
    NewFileAdler32,
    EndFileInfo,
    ServiceToStop,
    ServiceToStart,
}

impl Schema for DetailsTag {
    fn from_tag(tag: u8) -> Option<Self> {
        let tag = match tag {
            0x20 => DetailsTag::RegistryChangesCount,
            0x21 => DetailsTag::FileInfosCount,
            0x8B => DetailsTag::BeginFileInfo,
            0x40 => DetailsTag::RelativePath,
            0x47 => DetailsTag::DeltaPatchPath,
            0x48 => DetailsTag::NewFileAdler32,
            0x9B => DetailsTag::EndFileInfo,
            0x32 => DetailsTag::ServiceToStop,
            0x33 => DetailsTag::ServiceToStart,
            _ => return None,
        };
        Some(tag)
    }

    fn tag(self) -> u8 {
        match self {
            DetailsTag::RegistryChangesCount => 0x20,
            DetailsTag::FileInfosCount => 0x21,
            DetailsTag::BeginFileInfo => 0x8B,
            DetailsTag::RelativePath => 0x40,
            DetailsTag::DeltaPatchPath => 0x47,
            DetailsTag::NewFileAdler32 => 0x48,
            DetailsTag::EndFileInfo => 0x9B,
            DetailsTag::ServiceToStop => 0x32,
            DetailsTag::ServiceToStart => 0x33,
        }
    }

    fn layout(self) -> Layout {
        match self {
            DetailsTag::BeginFileInfo | DetailsTag::EndFileInfo => Layout::Marker,
            DetailsTag::RelativePath | DetailsTag::DeltaPatchPath => Layout::DString,
            DetailsTag::RegistryChangesCount | DetailsTag::FileInfosCount | DetailsTag::NewFileAdler32 | DetailsTag::ServiceToStop | DetailsTag::ServiceToStart => Layout::Plain,
        }
    }
}

/// One file entry of the update details. Recorded only; installation copies
/// every package entry regardless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub relative_path: String,
    pub delta_patch_path: String,
    pub new_file_adler32: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateDetails {
    pub registry_changes_count: Option<i32>,
    pub file_infos_count: Option<i32>,
    pub file_infos: Vec<FileInfo>,
    /// Services stopped before the files are swapped, in order.
    pub services_to_stop: Vec<String>,
    /// Services started after the files are swapped, in order.
    pub services_to_start: Vec<String>,
}

impl UpdateDetails {
    pub fn parse<R: Read>(r: &mut R) -> Result<Self> {
        tlv::read_header(r, UPDATE_DETAILS_MAGIC)?;

        let mut details = UpdateDetails::default();
        let mut current: Option<FileInfo> = None;

        while let Some(record) = tlv::read_record::<DetailsTag, _>(r)? {
            if record.is_absent() {
                continue;
            }

            match record.tag {
                DetailsTag::RegistryChangesCount => details.registry_changes_count = Some(record.to_i32()?),
                DetailsTag::FileInfosCount => details.file_infos_count = Some(record.to_i32()?),
                DetailsTag::BeginFileInfo => {
                    if let Some(info) = current.replace(FileInfo::default()) {
                        details.file_infos.push(info);
                    }
                }
                DetailsTag::RelativePath => current.get_or_insert_with(FileInfo::default).relative_path = record.into_string()?,
                DetailsTag::DeltaPatchPath => current.get_or_insert_with(FileInfo::default).delta_patch_path = record.into_string()?,
                DetailsTag::NewFileAdler32 => current.get_or_insert_with(FileInfo::default).new_file_adler32 = Some(record.to_i64()?),
                DetailsTag::EndFileInfo => details.file_infos.push(current.take().unwrap_or_default()),
                DetailsTag::ServiceToStop => details.services_to_stop.push(record.into_string()?),
                DetailsTag::ServiceToStart => details.services_to_start.push(record.into_string()?),
            }
        }

        // unterminated trailing group
        if let Some(info) = current {
            details.file_infos.push(info);
        }

        Ok(details)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        tlv::write_header(w, UPDATE_DETAILS_MAGIC)?;

        let mut records = Vec::new();
        if let Some(count) = self.registry_changes_count {
            records.push(Record::from_i32(DetailsTag::RegistryChangesCount, count)?);
        }
        if let Some(count) = self.file_infos_count {
            records.push(Record::from_i32(DetailsTag::FileInfosCount, count)?);
        }
        for info in &self.file_infos {
            records.push(Record::marker(DetailsTag::BeginFileInfo));
            records.push(Record::from_string(DetailsTag::RelativePath, &info.relative_path)?);
            records.push(Record::from_string(DetailsTag::DeltaPatchPath, &info.delta_patch_path)?);
            if let Some(adler32) = info.new_file_adler32 {
                records.push(Record::from_i64(DetailsTag::NewFileAdler32, adler32)?);
            }
            records.push(Record::marker(DetailsTag::EndFileInfo));
        }
        for service in &self.services_to_stop {
            records.push(Record::from_string(DetailsTag::ServiceToStop, service)?);
        }
        for service in &self.services_to_start {
            records.push(Record::from_string(DetailsTag::ServiceToStart, service)?);
        }

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
}
