//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document.

use crate::document::{load_document, rebuild_page_tree, save_document};
use crate::error::PdfDeskError;
use lopdf::{Object, ObjectId};
use std::collections::BTreeMap;
use tracing::debug;

/// Merge multiple PDFs into one, in the order given
///
/// The algorithm:
/// 1. Require at least two documents
/// 2. Load all documents, the first one becomes the destination
/// 3. For each further source document:
///    a. Calculate ID offset to avoid conflicts
///    b. Import all objects with remapped IDs
///    c. Append its pages to the destination page list
/// 4. Rebuild a flat page tree, prune orphans, compress and return
pub fn merge_documents(documents: &[Vec<u8>]) -> Result<Vec<u8>, PdfDeskError> {
    if documents.len() < 2 {
        return Err(PdfDeskError::InvalidInput(
            "Please upload at least 2 PDF files to merge".into(),
        ));
    }

    // Load all documents first
    let mut loaded_docs = Vec::with_capacity(documents.len());
    for (i, doc_bytes) in documents.iter().enumerate() {
        let doc = load_document(doc_bytes).map_err(|e| match e {
            PdfDeskError::ParseError(msg) => {
                PdfDeskError::ParseError(format!("Failed to load document {}: {}", i + 1, msg))
            }
            other => other,
        })?;
        loaded_docs.push(doc);
    }

    // Start with the first document as the base
    let mut dest = loaded_docs.remove(0);
    let mut dest_max_id = dest.max_id;
    let mut dest_page_refs: Vec<ObjectId> = dest.get_pages().values().copied().collect();

    for source in loaded_docs {
        // Get source pages before we start moving objects out
        let source_pages: Vec<ObjectId> = source.get_pages().values().copied().collect();
        let id_offset = dest_max_id;

        let remapped: BTreeMap<ObjectId, Object> = source
            .objects
            .into_iter()
            .map(|(old_id, object)| {
                (
                    (old_id.0 + id_offset, old_id.1),
                    remap_object_refs(object, id_offset),
                )
            })
            .collect();
        dest.objects.extend(remapped);

        dest_page_refs.extend(
            source_pages
                .into_iter()
                .map(|old| (old.0 + id_offset, old.1)),
        );

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;
    debug!(pages = dest_page_refs.len(), "merged page list");

    rebuild_page_tree(&mut dest, &dest_page_refs)?;
    dest.prune_objects();

    save_document(&mut dest)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_nested_pdf, create_test_pdf, page_markers};
    use lopdf::Document;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_empty_fails() {
        let result = merge_documents(&[]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("at least 2 PDF files"));
    }

    #[test]
    fn test_merge_single_document_is_rejected() {
        let pdf = create_test_pdf(2, "Single");
        assert!(matches!(
            merge_documents(&[pdf]),
            Err(PdfDeskError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_merge_two_documents_combines_pages() {
        let doc_a = create_test_pdf(2, "DocA");
        let doc_b = create_test_pdf(3, "DocB");

        let merged = merge_documents(&[doc_a, doc_b]).unwrap();

        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 5, "Merged document should have 5 pages");
    }

    #[test]
    fn test_merge_preserves_page_order() {
        let doc1 = create_test_pdf(2, "First");
        let doc2 = create_test_pdf(1, "Second");
        let doc3 = create_test_pdf(2, "Third");

        let merged = merge_documents(&[doc1, doc2, doc3]).unwrap();

        assert_eq!(
            page_markers(&merged),
            vec![
                "First-Page-1",
                "First-Page-2",
                "Second-Page-1",
                "Third-Page-1",
                "Third-Page-2"
            ]
        );
    }

    #[test]
    fn test_merge_handles_different_sizes() {
        let doc1 = create_test_pdf(10, "Large");
        let doc2 = create_test_pdf(1, "Small");
        let doc3 = create_test_pdf(5, "Medium");

        let merged = merge_documents(&[doc1, doc2, doc3]).unwrap();

        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 16);
    }

    #[test]
    fn test_merge_flattens_nested_trees() {
        let merged = merge_documents(&[create_test_pdf(1, "Flat"), create_nested_pdf()]).unwrap();

        let doc = Document::load_mem(&merged).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);

        // Nested pages keep the A4 box they used to inherit
        let last = pages[&3];
        let dict = doc.get_dictionary(last).unwrap();
        assert!(dict.has(b"MediaBox"));
        assert_eq!(
            page_markers(&merged),
            vec!["Flat-Page-1", "Nested-Page-1", "Nested-Page-2"]
        );
    }

    #[test]
    fn test_merge_rejects_corrupt_input_with_position() {
        let good = create_test_pdf(1, "Good");
        let err = merge_documents(&[good, b"%PDF-1.7 garbage".to_vec()]).unwrap_err();
        assert!(err.to_string().contains("document 2"));
    }
}
