//! ZIP bundling for multi-file results

use crate::error::PdfDeskError;
use std::io::{Cursor, Write};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// One file inside a bundle
#[derive(Debug, Clone)]
pub struct BundleEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl BundleEntry {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Write `entries` into an in-memory ZIP archive, in order
pub fn bundle(entries: &[BundleEntry]) -> Result<Vec<u8>, PdfDeskError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        zip.start_file(entry.name.as_str(), options)?;
        zip.write_all(&entry.data)?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
pub(crate) fn unbundle(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            (file.name().to_string(), data)
        })
        .collect()
}
