//! Document loading, saving and page-tree plumbing shared by the operations

use crate::error::PdfDeskError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;

/// US Letter, used when a page has no MediaBox anywhere in its ancestry
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Attributes a page may inherit from its `Pages` ancestors
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards parent walks against cyclic page trees
const MAX_TREE_DEPTH: usize = 64;

/// Basic facts about an uploaded PDF
#[derive(Debug, Clone, Serialize, Default)]
pub struct PdfInfo {
    /// Number of pages in the document
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    /// File size in bytes
    pub file_size: usize,
    /// Document title from metadata (if available)
    pub title: Option<String>,
    /// Width and height of page 1 in points
    pub first_page_size: [f32; 2],
}

/// Load a PDF, rejecting encrypted documents up front
pub fn load_document(bytes: &[u8]) -> Result<Document, PdfDeskError> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(PdfDeskError::ParseError(
            "Not a valid PDF file (missing %PDF- header)".into(),
        ));
    }

    let doc = Document::load_mem(bytes).map_err(|e| PdfDeskError::ParseError(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(PdfDeskError::Encrypted);
    }
    if doc.get_pages().is_empty() {
        return Err(PdfDeskError::ParseError("PDF has no pages".into()));
    }

    Ok(doc)
}

/// Compress and serialize a document
pub fn save_document(doc: &mut Document) -> Result<Vec<u8>, PdfDeskError> {
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfDeskError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfDeskError> {
    let doc = load_document(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// Validate an upload and report what the panel shows before running a tool
pub fn inspect(bytes: &[u8]) -> Result<PdfInfo, PdfDeskError> {
    let doc = load_document(bytes)?;

    let title = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|info| resolve_dict(&doc, info))
        .and_then(|info| match info.get(b"Title") {
            Ok(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        });

    let [x0, y0, x1, y1] = media_box(&doc, page_id(&doc, 1)?);

    Ok(PdfInfo {
        page_count: doc.get_pages().len() as u32,
        version: doc.version.clone(),
        file_size: bytes.len(),
        title,
        first_page_size: [x1 - x0, y1 - y0],
    })
}

/// Look up the object id of a 1-indexed page
pub(crate) fn page_id(doc: &Document, page_num: u32) -> Result<ObjectId, PdfDeskError> {
    doc.get_pages().get(&page_num).copied().ok_or_else(|| {
        PdfDeskError::InvalidRange(format!(
            "Page {} does not exist (document has {} pages)",
            page_num,
            doc.get_pages().len()
        ))
    })
}

/// Find an attribute on the page or the nearest ancestor that defines it
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// Dereference an object into an owned dictionary
pub(crate) fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

/// The page's MediaBox as `[x0, y0, x1, y1]` with `x0 <= x1` and `y0 <= y1`.
///
/// A rectangle may name any two opposite corners, so the corners are
/// reordered into lower-left and upper-right.
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let values = inherited_attribute(doc, page_id, b"MediaBox").and_then(|obj| {
        let arr = match obj {
            Object::Array(arr) => arr,
            Object::Reference(id) => doc.get_object(id).ok()?.as_array().ok()?.clone(),
            _ => return None,
        };
        let nums: Vec<f32> = arr.iter().filter_map(number).collect();
        (nums.len() == 4).then(|| {
            [
                nums[0].min(nums[2]),
                nums[1].min(nums[3]),
                nums[0].max(nums[2]),
                nums[1].max(nums[3]),
            ]
        })
    });

    values.unwrap_or(DEFAULT_MEDIA_BOX)
}

/// The page's effective /Rotate value, normalized into [0, 360)
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360)
}

/// Object id of the root `Pages` node
pub(crate) fn pages_root_id(doc: &Document) -> Result<ObjectId, PdfDeskError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(|_| PdfDeskError::OperationError("No Root in trailer".into()))?;

    doc.get_dictionary(catalog_id)
        .map_err(|_| PdfDeskError::OperationError("Catalog not found".into()))?
        .get(b"Pages")
        .and_then(|pages| pages.as_reference())
        .map_err(|_| PdfDeskError::OperationError("No Pages in catalog".into()))
}

/// Replace the page tree with a single flat `Pages` node listing `page_refs` in order.
///
/// Inheritable attributes are copied onto each page first so nothing is lost
/// when intermediate `Pages` nodes drop out of the tree.
pub(crate) fn rebuild_page_tree(
    doc: &mut Document,
    page_refs: &[ObjectId],
) -> Result<(), PdfDeskError> {
    let pages_id = pages_root_id(doc)?;

    for &page in page_refs {
        let missing: Vec<(&[u8], Object)> = {
            let dict = doc
                .get_dictionary(page)
                .map_err(|_| PdfDeskError::OperationError("Invalid page dictionary".into()))?;
            INHERITABLE
                .iter()
                .filter(|key| !dict.has(key))
                .filter_map(|key| inherited_attribute(doc, page, key).map(|v| (*key, v)))
                .collect()
        };

        let dict = doc
            .get_dictionary_mut(page)
            .map_err(|_| PdfDeskError::OperationError("Invalid page dictionary".into()))?;
        for (key, value) in missing {
            dict.set(key, value);
        }
        dict.set("Parent", Object::Reference(pages_id));
    }

    let pages_dict = doc
        .get_dictionary_mut(pages_id)
        .map_err(|_| PdfDeskError::OperationError("Invalid pages dictionary".into()))?;
    let kids = page_refs
        .iter()
        .map(|&id| Object::Reference(id))
        .collect::<Vec<_>>();
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", Object::Integer(page_refs.len() as i64));

    Ok(())
}
