//! Page reordering

use crate::document::{load_document, rebuild_page_tree, save_document};
use crate::error::PdfDeskError;
use crate::pages::parse_page_order;
use lopdf::ObjectId;
use tracing::debug;

/// Rearrange pages according to `order`, e.g. "3,1,2".
///
/// The order must be a permutation of every page; anything else is
/// rejected before the document is touched.
pub fn reorder_pages(bytes: &[u8], order: &str) -> Result<Vec<u8>, PdfDeskError> {
    let mut doc = load_document(bytes)?;
    let pages = doc.get_pages();
    let order = parse_page_order(order, pages.len() as u32)?;

    debug!(?order, "reordering pages");

    let refs: Vec<ObjectId> = order
        .iter()
        .filter_map(|num| pages.get(num).copied())
        .collect();

    rebuild_page_tree(&mut doc, &refs)?;
    doc.prune_objects();

    save_document(&mut doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_nested_pdf, create_test_pdf, page_markers};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reorder_applies_permutation() {
        let pdf = create_test_pdf(3, "Re");
        let result = reorder_pages(&pdf, "3,1,2").unwrap();
        assert_eq!(
            page_markers(&result),
            vec!["Re-Page-3", "Re-Page-1", "Re-Page-2"]
        );
    }

    #[test]
    fn test_reorder_identity_keeps_order() {
        let pdf = create_test_pdf(3, "Re");
        let result = reorder_pages(&pdf, "1-3").unwrap();
        assert_eq!(
            page_markers(&result),
            vec!["Re-Page-1", "Re-Page-2", "Re-Page-3"]
        );
    }

    #[test]
    fn test_reorder_rejects_non_permutations() {
        let pdf = create_test_pdf(3, "Re");
        assert!(reorder_pages(&pdf, "1,2").is_err());
        assert!(reorder_pages(&pdf, "1,2,2").is_err());
        assert!(reorder_pages(&pdf, "1,2,4").is_err());
        assert!(reorder_pages(&pdf, "").is_err());
    }

    #[test]
    fn test_reorder_nested_tree() {
        let pdf = create_nested_pdf();
        let result = reorder_pages(&pdf, "2,1").unwrap();
        assert_eq!(
            page_markers(&result),
            vec!["Nested-Page-2", "Nested-Page-1"]
        );
    }
}
