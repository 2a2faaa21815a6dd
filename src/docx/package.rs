//! DOCX zip container I/O.
//!
//! A package is kept as an ordered list of `(entry_name, bytes)` so that parts
//! we never touch (media, themes, settings) are written back byte-for-byte and
//! `[Content_Types].xml` stays the first entry, as Word expects.

use crate::error::Tex2DocxError;
use std::io::{Read, Seek, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// An opened DOCX (or any OPC) package.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    entries: Vec<(String, Vec<u8>)>,
}

impl DocxPackage {
    /// Build a package from entries, e.g. in tests.
    pub fn from_entries(entries: Vec<(String, Vec<u8>)>) -> Self {
        Self { entries }
    }

    /// Read a package from disk.
    pub fn open(path: &Path) -> Result<Self, Tex2DocxError> {
        let file = std::fs::File::open(path).map_err(|e| Tex2DocxError::DocumentRead {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::read_from(file).map_err(|detail| Tex2DocxError::DocumentRead {
            path: path.to_path_buf(),
            detail,
        })
    }

    /// Read a package from any seekable source.
    pub fn read_from<R: Read + Seek>(reader: R) -> Result<Self, String> {
        let mut archive = ZipArchive::new(reader).map_err(|e| e.to_string())?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| e.to_string())?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(|e| e.to_string())?;
            entries.push((name, data));
        }
        debug!("Read package with {} entries", entries.len());
        Ok(Self { entries })
    }

    /// Raw bytes of an entry.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// Entry decoded as UTF-8 text (lossy).
    pub fn get_text(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|data| String::from_utf8_lossy(data).into_owned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Replace an entry in place, or append it.
    pub fn put(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = data,
            None => self.entries.push((name.to_string(), data)),
        }
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Write the package as a zip archive.
    ///
    /// Media is STORED, everything else DEFLATED, matching the layout Word
    /// itself produces.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<(), String> {
        let mut zip = ZipWriter::new(writer);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in &self.entries {
            let opts = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), opts)
                .map_err(|e| e.to_string())?;
            zip.write_all(data).map_err(|e| e.to_string())?;
        }
        zip.finish().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Persist to `path` atomically (temp file + rename) so a failed save
    /// never leaves a truncated document behind.
    pub fn save(&self, path: &Path) -> Result<(), Tex2DocxError> {
        let write_err = |source: std::io::Error| Tex2DocxError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let tmp_path = path.with_extension("docx.tmp");
        let file = std::fs::File::create(&tmp_path).map_err(write_err)?;
        if let Err(detail) = self.write_to(file) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(write_err(std::io::Error::other(detail)));
        }
        std::fs::rename(&tmp_path, path).map_err(write_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_then_read_preserves_order_and_bytes() {
        let pkg = DocxPackage::from_entries(vec![
            ("[Content_Types].xml".into(), b"<Types/>".to_vec()),
            ("word/document.xml".into(), b"<w:document/>".to_vec()),
            ("word/media/rId9.png".into(), vec![0x89, b'P', b'N', b'G']),
        ]);
        let mut buf = Cursor::new(Vec::new());
        pkg.write_to(&mut buf).expect("write");
        buf.set_position(0);
        let back = DocxPackage::read_from(buf).expect("read");
        let names: Vec<&str> = back.entry_names().collect();
        assert_eq!(
            names,
            vec!["[Content_Types].xml", "word/document.xml", "word/media/rId9.png"]
        );
        assert_eq!(back.get("word/media/rId9.png"), Some(&[0x89, b'P', b'N', b'G'][..]));
    }

    #[test]
    fn test_put_replaces_existing_entry() {
        let mut pkg = DocxPackage::from_entries(vec![("a.xml".into(), b"1".to_vec())]);
        pkg.put("a.xml", b"2".to_vec());
        pkg.put("b.xml", b"3".to_vec());
        assert_eq!(pkg.get_text("a.xml").as_deref(), Some("2"));
        assert_eq!(pkg.entry_names().count(), 2);
    }

    #[test]
    fn test_open_missing_file_is_document_read_error() {
        let err = DocxPackage::open(Path::new("/definitely/not/here.docx")).unwrap_err();
        assert!(matches!(err, Tex2DocxError::DocumentRead { .. }));
    }

    #[test]
    fn test_save_is_atomic_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.docx");
        let pkg = DocxPackage::from_entries(vec![("x.xml".into(), b"<x/>".to_vec())]);
        pkg.save(&path).expect("save");
        assert!(path.exists());
        assert!(!dir.path().join("out.docx.tmp").exists());
    }
}
