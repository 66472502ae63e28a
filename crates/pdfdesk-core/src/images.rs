//! Embedded image extraction
//!
//! Walks each page's XObject resources (recursing into form XObjects) and
//! exports the images we can hand back without re-implementing a codec:
//! JPEG and JPEG 2000 streams as stored, 8-bit RGB/Gray samples as PNG.

use crate::archive::BundleEntry;
use crate::document::{inherited_attribute, load_document, resolve_dict};
use crate::error::PdfDeskError;
use image::{GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::debug;

/// Images found in a document
#[derive(Debug, Default)]
pub struct ExtractedImages {
    pub images: Vec<BundleEntry>,
    /// Image XObjects with an encoding we do not export
    pub skipped: usize,
}

/// Extract every supported image, named `page<p>_img<k>.<ext>`
pub fn extract_images(bytes: &[u8]) -> Result<ExtractedImages, PdfDeskError> {
    let doc = load_document(bytes)?;
    let mut result = ExtractedImages::default();

    for (page_num, page_id) in doc.get_pages() {
        let mut visited = HashSet::new();
        let mut found = Vec::new();

        if let Some(resources) =
            inherited_attribute(&doc, page_id, b"Resources").and_then(|r| resolve_dict(&doc, &r))
        {
            collect_images(&doc, &resources, &mut visited, &mut found);
        }

        for (k, image_id) in found.into_iter().enumerate() {
            let stream = match doc.get_object(image_id).and_then(Object::as_stream) {
                Ok(stream) => stream,
                Err(_) => continue,
            };
            match export_image(stream) {
                Some((ext, data)) => {
                    let name = format!("page{}_img{}.{}", page_num, k + 1, ext);
                    debug!(%name, size = data.len(), "extracted image");
                    result.images.push(BundleEntry::new(name, data));
                }
                None => result.skipped += 1,
            }
        }
    }

    Ok(result)
}

fn collect_images(
    doc: &Document,
    resources: &Dictionary,
    visited: &mut HashSet<ObjectId>,
    found: &mut Vec<ObjectId>,
) {
    let xobjects = match resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
    {
        Some(dict) => dict,
        None => return,
    };

    for (_, value) in xobjects.iter() {
        let id = match value.as_reference() {
            Ok(id) => id,
            Err(_) => continue,
        };
        if !visited.insert(id) {
            continue;
        }
        let stream = match doc.get_object(id).and_then(Object::as_stream) {
            Ok(stream) => stream,
            Err(_) => continue,
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => found.push(id),
            Ok(b"Form") => {
                if let Some(inner) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|obj| resolve_dict(doc, obj))
                {
                    collect_images(doc, &inner, visited, found);
                }
            }
            _ => {}
        }
    }
}

fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

/// File extension and bytes for an exportable image stream
fn export_image(stream: &Stream) -> Option<(&'static str, Vec<u8>)> {
    let filters = filters(stream);
    match filters.iter().map(Vec::as_slice).collect::<Vec<_>>().as_slice() {
        [b"DCTDecode"] => Some(("jpg", stream.content.clone())),
        [b"JPXDecode"] => Some(("jp2", stream.content.clone())),
        [] => samples_to_png(stream, &stream.content),
        [b"FlateDecode"] => {
            let samples = stream.decompressed_content().ok()?;
            samples_to_png(stream, &samples)
        }
        _ => None,
    }
}

fn samples_to_png(stream: &Stream, samples: &[u8]) -> Option<(&'static str, Vec<u8>)> {
    let dict = &stream.dict;
    let width = dict.get(b"Width").and_then(Object::as_i64).ok()? as u32;
    let height = dict.get(b"Height").and_then(Object::as_i64).ok()? as u32;
    let bits = dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let color_space = dict.get(b"ColorSpace").and_then(Object::as_name).ok()?;
    let pixels = (width as usize).checked_mul(height as usize)?;
    let mut out = Cursor::new(Vec::new());

    match color_space {
        b"DeviceRGB" => {
            let data = samples.get(..pixels.checked_mul(3)?)?.to_vec();
            RgbImage::from_raw(width, height, data)?
                .write_to(&mut out, ImageFormat::Png)
                .ok()?;
        }
        b"DeviceGray" => {
            let data = samples.get(..pixels)?.to_vec();
            GrayImage::from_raw(width, height, data)?
                .write_to(&mut out, ImageFormat::Png)
                .ok()?;
        }
        _ => return None,
    }

    Some(("png", out.into_inner()))
}
