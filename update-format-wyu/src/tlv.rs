//! Tag-length-value record stream shared by all manifest formats.
//!
//! A record starts with a single tag byte. Depending on the tag, a little-endian
//! `u32` "data length" (value length + 4) may follow, then a little-endian `u32`
//! value length and the value bytes. The tag `0xFF` ends the stream.

use std::io::{self, Read, Write};

use crate::{Error, Result};

/// Tag that terminates every record stream.
pub const END_OF_RECORDS: u8 = 0xFF;

/// Length of the ASCII magic that precedes every record stream.
pub const HEADER_LEN: usize = 7;

/// On-the-wire shape of a record, fixed per tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// data length, length, value
    DString,
    /// length, value
    Plain,
    /// length only; no value bytes are stored
    LengthOnly,
    /// the tag byte alone
    Marker,
}

/// Closed set of tags understood by one manifest format.
pub trait Schema: Sized + Copy + std::fmt::Debug {
    fn from_tag(tag: u8) -> Option<Self>;

    fn tag(self) -> u8;

    fn layout(self) -> Layout;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<T> {
    pub tag: T,
    pub data_length: Option<u32>,
    pub length: u32,
    pub value: Vec<u8>,
}

impl<T: Schema> Record<T> {
    pub fn new(tag: T, value: Vec<u8>) -> Result<Self> {
        let length = u32::try_from(value.len()).ok().filter(|len| *len <= u32::MAX - 4).ok_or(Error::ValueTooLong {
            tag: tag.tag(),
            len: value.len(),
        })?;

        let data_length = match tag.layout() {
            Layout::DString => Some(length + 4),
            _ => None,
        };

        Ok(Record {
            tag,
            data_length,
            length,
            value,
        })
    }

    pub fn from_string(tag: T, s: &str) -> Result<Self> {
        Self::new(tag, s.as_bytes().to_vec())
    }

    pub fn from_bool(tag: T, b: bool) -> Result<Self> {
        Self::from_i32(tag, i32::from(b))
    }

    pub fn from_i32(tag: T, i: i32) -> Result<Self> {
        Self::new(tag, i.to_le_bytes().to_vec())
    }

    pub fn from_i64(tag: T, i: i64) -> Result<Self> {
        Self::new(tag, i.to_le_bytes().to_vec())
    }

    pub fn length_only(tag: T, length: u32) -> Self {
        Record {
            tag,
            data_length: None,
            length,
            value: Vec::new(),
        }
    }

    pub fn marker(tag: T) -> Self {
        Self::length_only(tag, 0)
    }

    /// A zero-length record carries nothing. Readers treat it as if the field
    /// were missing, the same way writers drop it.
    pub fn is_absent(&self) -> bool {
        self.tag.layout() != Layout::Marker && self.length == 0
    }

    pub fn to_bool(&self) -> Result<bool> {
        Ok(self.to_i32()? != 0)
    }

    pub fn to_i32(&self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.fixed_value::<4>()?))
    }

    pub fn to_i64(&self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.fixed_value::<8>()?))
    }

    pub fn into_string(self) -> Result<String> {
        let tag = self.tag.tag();
        String::from_utf8(self.value).map_err(|source| Error::InvalidString {
            tag,
            source,
        })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.value
    }

    fn fixed_value<const N: usize>(&self) -> Result<[u8; N]> {
        <[u8; N]>::try_from(self.value.as_slice()).map_err(|_| Error::InvalidValueLength {
            tag: self.tag.tag(),
            expected: N,
            actual: self.value.len(),
        })
    }
}

/// Reads and checks the 7-byte ASCII magic in front of a record stream.
pub fn read_header<R: Read>(r: &mut R, magic: &'static str) -> Result<()> {
    let mut header = [0u8; HEADER_LEN];
    r.read_exact(&mut header).map_err(Error::ReadHeader)?;

    if header != magic.as_bytes() {
        return Err(Error::InvalidHeader {
            expected: magic,
            actual: header.to_vec(),
        });
    }

    Ok(())
}

pub fn write_header<W: Write>(w: &mut W, magic: &'static str) -> Result<()> {
    w.write_all(magic.as_bytes()).map_err(Error::WriteRecord)
}

/// Reads the next record.
///
/// Returns `None` at the end of the stream or at the end-of-records tag. Running out
/// of input after the tag byte is reported as [`Error::TruncatedStream`].
pub fn read_record<T: Schema, R: Read>(r: &mut R) -> Result<Option<Record<T>>> {
    let mut tag = [0u8; 1];
    match r.read_exact(&mut tag) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(Error::ReadRecord(err)),
    }

    let tag = tag[0];
    if tag == END_OF_RECORDS {
        return Ok(None);
    }

    let schema_tag = T::from_tag(tag).ok_or(Error::UnknownTag(tag))?;
    let layout = schema_tag.layout();

    if layout == Layout::Marker {
        return Ok(Some(Record::marker(schema_tag)));
    }

    // data length is redundant with length and only ever skipped over
    let data_length = match layout {
        Layout::DString => Some(read_u32(r, tag)?),
        _ => None,
    };

    let length = read_u32(r, tag)?;

    let mut value = Vec::new();
    if layout != Layout::LengthOnly {
        // grows with the input instead of trusting the length for an allocation
        r.by_ref().take(u64::from(length)).read_to_end(&mut value).map_err(|err| classify(tag, err))?;

        if value.len() != length as usize {
            return Err(Error::TruncatedStream {
                tag,
                source: io::Error::new(io::ErrorKind::UnexpectedEof, format!("expected {length} value bytes, got {}", value.len())),
            });
        }
    }

    Ok(Some(Record {
        tag: schema_tag,
        data_length,
        length,
        value,
    }))
}

/// Writes a record. Records of length zero are omitted, except for markers.
pub fn write_record<T: Schema, W: Write>(w: &mut W, record: &Record<T>) -> Result<()> {
    let layout = record.tag.layout();

    if layout != Layout::Marker && record.length == 0 {
        return Ok(());
    }

    w.write_all(&[record.tag.tag()]).map_err(Error::WriteRecord)?;

    match layout {
        Layout::Marker => return Ok(()),
        Layout::DString => w.write_all(&record.length.saturating_add(4).to_le_bytes()).map_err(Error::WriteRecord)?,
        Layout::Plain | Layout::LengthOnly => {}
    }

    w.write_all(&record.length.to_le_bytes()).map_err(Error::WriteRecord)?;

    if layout != Layout::LengthOnly {
        w.write_all(&record.value).map_err(Error::WriteRecord)?;
    }

    Ok(())
}

pub fn write_end<W: Write>(w: &mut W) -> Result<()> {
    w.write_all(&[END_OF_RECORDS]).map_err(Error::WriteRecord)
}

fn read_u32<R: Read>(r: &mut R, tag: u8) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|err| classify(tag, err))?;
    Ok(u32::from_le_bytes(buf))
}

fn classify(tag: u8, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::TruncatedStream {
            tag,
            source: err,
        }
    } else {
        Error::ReadRecord(err)
    }
}
