use std::string::FromUtf8Error;

#[derive(Debug)]
pub enum Error {
    ReadHeader(std::io::Error),
    InvalidHeader {
        expected: &'static str,
        actual: Vec<u8>,
    },
    UnknownTag(u8),
    TruncatedStream {
        tag: u8,
        source: std::io::Error,
    },
    ReadRecord(std::io::Error),
    WriteRecord(std::io::Error),
    ValueTooLong {
        tag: u8,
        len: usize,
    },
    InvalidValueLength {
        tag: u8,
        expected: usize,
        actual: usize,
    },
    InvalidString {
        tag: u8,
        source: FromUtf8Error,
    },
    OpenArchive(zip::result::ZipError),
    MissingEntry(String),
    ReadEntry(String, std::io::Error),
    CopyEntry(String, zip::result::ZipError),
    WriteArchive(zip::result::ZipError),
    WriteEntry(String, std::io::Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::ReadHeader(err) => write!(f, "failed to read manifest header: {err}"),
            Error::InvalidHeader {
                expected,
                actual,
            } => write!(f, "invalid manifest header: expected {expected:?}, got {:?}", String::from_utf8_lossy(actual)),
            Error::UnknownTag(tag) => write!(f, "unknown tag {tag:#04x}"),
            Error::TruncatedStream {
                tag,
                source,
            } => write!(f, "record stream truncated inside record {tag:#04x}: {source}"),
            Error::ReadRecord(err) => write!(f, "failed to read record: {err}"),
            Error::WriteRecord(err) => write!(f, "failed to write record: {err}"),
            Error::ValueTooLong {
                tag,
                len,
            } => write!(f, "value of record {tag:#04x} is too long: {len} bytes"),
            Error::InvalidValueLength {
                tag,
                expected,
                actual,
            } => write!(f, "invalid value length in record {tag:#04x}: expected {expected}, got {actual}"),
            Error::InvalidString {
                tag,
                source,
            } => write!(f, "record {tag:#04x} does not hold valid UTF-8: {source}"),
            Error::OpenArchive(err) => write!(f, "failed to open zip archive: {err}"),
            Error::MissingEntry(name) => write!(f, "archive has no entry named {name:?}"),
            Error::ReadEntry(name, err) => write!(f, "failed to read archive entry {name:?}: {err}"),
            Error::CopyEntry(name, err) => write!(f, "failed to copy archive entry {name:?}: {err}"),
            Error::WriteArchive(err) => write!(f, "failed to write zip archive: {err}"),
            Error::WriteEntry(name, err) => write!(f, "failed to write archive entry {name:?}: {err}"),
        }
    }
}
