use std::io::{Read, Seek, Write};

use log::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::{Error, Result};

/// Reads the whole content of entry `name` out of a zip archive.
pub fn read_archive_entry<R: Read + Seek>(reader: R, name: &str) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(reader).map_err(Error::OpenArchive)?;

    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(Error::MissingEntry(name.to_string())),
        Err(err) => return Err(Error::OpenArchive(err)),
    };

    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).map_err(|err| Error::ReadEntry(name.to_string(), err))?;

    Ok(buf)
}

/// Writes a new archive holding the given entries, in order.
pub fn write_archive_entries<W: Write + Seek>(writer: W, entries: &[(&str, &[u8])]) -> Result<W> {
    let mut zip = ZipWriter::new(writer);

    for (name, content) in entries {
        write_entry(&mut zip, name, content)?;
    }

    zip.finish().map_err(Error::WriteArchive)
}

/// Copies `reader` into `writer`, replacing the content of entry `name`.
///
/// Every other entry is copied without recompression. The entry is appended if the
/// source archive does not have it yet.
pub fn rewrite_archive_entry<R: Read + Seek, W: Write + Seek>(reader: R, writer: W, name: &str, content: &[u8]) -> Result<W> {
    let mut archive = ZipArchive::new(reader).map_err(Error::OpenArchive)?;
    let mut zip = ZipWriter::new(writer);
    let mut replaced = false;

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(Error::OpenArchive)?;
        let entry_name = entry.name().to_string();

        if entry_name == name {
            write_entry(&mut zip, name, content)?;
            replaced = true;
            continue;
        }

        debug!("keeping archive entry {entry_name:?}");
        zip.raw_copy_file(entry).map_err(|err| Error::CopyEntry(entry_name, err))?;
    }

    if !replaced {
        write_entry(&mut zip, name, content)?;
    }

    zip.finish().map_err(Error::WriteArchive)
}

fn write_entry<W: Write + Seek>(zip: &mut ZipWriter<W>, name: &str, content: &[u8]) -> Result<()> {
    zip.start_file(name, SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)).map_err(Error::WriteArchive)?;
    zip.write_all(content).map_err(|err| Error::WriteEntry(name.to_string(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_entry() {
        let archive = write_archive_entries(Cursor::new(Vec::new()), &[("a", &b"first"[..]), ("b", &b"second"[..])]).unwrap().into_inner();

        assert_eq!(read_archive_entry(Cursor::new(&archive), "b").unwrap(), b"second");
        assert!(matches!(read_archive_entry(Cursor::new(&archive), "c"), Err(Error::MissingEntry(name)) if name == "c"));
    }

    #[test]
    fn test_read_entry_not_a_zip() {
        assert!(matches!(read_archive_entry(Cursor::new(b"IUSDFV2 not zipped".to_vec()), "0"), Err(Error::OpenArchive(_))));
    }

    #[test]
    fn test_rewrite_keeps_other_entries() {
        let entries: &[(&str, &[u8])] = &[("left.png", &b"image bytes"[..]), ("iuclient.iuc", &b"old"[..]), ("right.png", &b"more image bytes"[..])];
        let original = write_archive_entries(Cursor::new(Vec::new()), entries).unwrap().into_inner();

        let rewritten = rewrite_archive_entry(Cursor::new(&original), Cursor::new(Vec::new()), "iuclient.iuc", b"new").unwrap().into_inner();

        assert_eq!(read_archive_entry(Cursor::new(&rewritten), "iuclient.iuc").unwrap(), b"new");
        assert_eq!(read_archive_entry(Cursor::new(&rewritten), "left.png").unwrap(), b"image bytes");
        assert_eq!(read_archive_entry(Cursor::new(&rewritten), "right.png").unwrap(), b"more image bytes");

        let names: Vec<String> = ZipArchive::new(Cursor::new(&rewritten)).unwrap().file_names().map(str::to_string).collect();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_rewrite_appends_missing_entry() {
        let original = write_archive_entries(Cursor::new(Vec::new()), &[("left.png", &b"image bytes"[..])]).unwrap().into_inner();
        let rewritten = rewrite_archive_entry(Cursor::new(&original), Cursor::new(Vec::new()), "iuclient.iuc", b"new").unwrap().into_inner();

        assert_eq!(read_archive_entry(Cursor::new(&rewritten), "iuclient.iuc").unwrap(), b"new");
    }
}
