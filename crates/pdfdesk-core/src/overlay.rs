//! Drawing on top of existing pages
//!
//! Every overlay goes through the same two steps: register the resources
//! the overlay needs on the page, then append a content stream that uses
//! them. The page's original content is bracketed with `q`/`Q` so its
//! graphics state cannot leak into what we draw.

use crate::document::{inherited_attribute, resolve_dict};
use crate::error::PdfDeskError;
use lopdf::{
    content::{Content, Operation},
    dictionary, Dictionary, Document, Object, ObjectId, Stream,
};

/// Add `value` under `/Resources/<category>` with a fresh name starting with `prefix`.
///
/// The page gets its own copy of its resource dictionary first, so shared
/// or inherited resources are never modified.
pub(crate) fn register_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &str,
    prefix: &str,
    value: Object,
) -> Result<String, PdfDeskError> {
    let mut resources = inherited_attribute(doc, page_id, b"Resources")
        .and_then(|obj| resolve_dict(doc, &obj))
        .unwrap_or_else(Dictionary::new);

    let mut entries = resources
        .get(category.as_bytes())
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .unwrap_or_else(Dictionary::new);

    let name = unique_name(&entries, prefix);
    entries.set(name.as_bytes().to_vec(), value);
    resources.set(category.as_bytes().to_vec(), Object::Dictionary(entries));

    doc.get_dictionary_mut(page_id)
        .map_err(|_| PdfDeskError::OperationError("Invalid page dictionary".into()))?
        .set("Resources", Object::Dictionary(resources));

    Ok(name)
}

fn unique_name(entries: &Dictionary, prefix: &str) -> String {
    (1..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|candidate| !entries.has(candidate.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

/// Append an overlay content stream after the page's existing content
pub(crate) fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), PdfDeskError> {
    let existing: Vec<Object> = {
        let page = doc
            .get_dictionary(page_id)
            .map_err(|_| PdfDeskError::OperationError("Invalid page dictionary".into()))?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                // Contents may point at an array of streams
                Ok(Object::Array(parts)) => parts.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(parts)) => parts.clone(),
            _ => Vec::new(),
        }
    };

    let save = Content {
        operations: vec![Operation::new("q", vec![])],
    };
    let mut overlay_ops = vec![Operation::new("Q", vec![])];
    overlay_ops.extend(operations);
    let overlay = Content {
        operations: overlay_ops,
    };

    let save_id = doc.add_object(Stream::new(Dictionary::new(), save.encode()?));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay.encode()?));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    doc.get_dictionary_mut(page_id)
        .map_err(|_| PdfDeskError::OperationError("Invalid page dictionary".into()))?
        .set("Contents", Object::Array(contents));

    Ok(())
}

/// An ExtGState that sets the fill (and stroke) alpha
pub(crate) fn alpha_state(doc: &mut Document, alpha: f32) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(alpha),
        "CA" => Object::Real(alpha),
    })
}

/// `q`/`Q`-balanced check used by the overlay tests
#[cfg(test)]
pub(crate) fn is_balanced(content: &str) -> bool {
    let mut depth = 0i32;
    for token in content.split_whitespace() {
        match token {
            "q" => depth += 1,
            "Q" => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
