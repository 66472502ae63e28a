//! PDF Split algorithm
//!
//! Extracts pages from a PDF by deleting everything else and pruning the
//! objects only the deleted pages used.

use crate::document::{load_document, rebuild_page_tree, save_document};
use crate::error::PdfDeskError;
use crate::pages::parse_page_selection;
use lopdf::{Document, ObjectId};
use std::collections::HashSet;
use tracing::debug;

/// Split a PDF, extracting only the specified pages (1-indexed)
///
/// Pages keep their original relative order; duplicates collapse.
pub fn split_document(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfDeskError> {
    let doc = load_document(bytes)?;
    keep_pages(&doc, pages)
}

/// Split every page into its own single-page PDF
pub fn split_each(bytes: &[u8]) -> Result<Vec<Vec<u8>>, PdfDeskError> {
    let doc = load_document(bytes)?;
    let page_count = doc.get_pages().len() as u32;

    (1..=page_count)
        .map(|page| keep_pages(&doc, &[page]))
        .collect()
}

/// Keep the inclusive range `start..=end`
pub fn split_range(bytes: &[u8], start: u32, end: u32) -> Result<Vec<u8>, PdfDeskError> {
    if start > end {
        return Err(PdfDeskError::InvalidRange(format!(
            "Start page {} is after end page {}",
            start, end
        )));
    }
    let pages: Vec<u32> = (start..=end).collect();
    split_document(bytes, &pages)
}

/// Keep the pages named by a range expression such as "1,3,5-7"
pub fn extract_pages(bytes: &[u8], ranges: &str) -> Result<(Vec<u8>, Vec<u32>), PdfDeskError> {
    let doc = load_document(bytes)?;
    let pages = parse_page_selection(ranges, doc.get_pages().len() as u32)?;
    let output = keep_pages(&doc, &pages)?;
    Ok((output, pages))
}

fn keep_pages(doc: &Document, pages: &[u32]) -> Result<Vec<u8>, PdfDeskError> {
    if pages.is_empty() {
        return Err(PdfDeskError::InvalidRange("No pages specified".into()));
    }

    // Validate page numbers are > 0
    if pages.contains(&0) {
        return Err(PdfDeskError::InvalidRange(
            "Page numbers must be >= 1".into(),
        ));
    }

    let page_count = doc.get_pages().len() as u32;
    if let Some(&page) = pages.iter().find(|&&p| p > page_count) {
        return Err(PdfDeskError::InvalidRange(format!(
            "Page {} does not exist (document has {} pages)",
            page, page_count
        )));
    }

    // Clone the document for modification
    let mut new_doc = doc.clone();

    // Calculate pages to delete
    let pages_to_keep: HashSet<u32> = pages.iter().copied().collect();
    let pages_to_delete: Vec<u32> = (1..=page_count)
        .filter(|p| !pages_to_keep.contains(p))
        .collect();

    debug!(keep = pages_to_keep.len(), delete = pages_to_delete.len(), "splitting");

    if !pages_to_delete.is_empty() {
        new_doc.delete_pages(&pages_to_delete);
        // delete_pages leaves stale /Count values behind
        let remaining: Vec<ObjectId> = new_doc.get_pages().values().copied().collect();
        rebuild_page_tree(&mut new_doc, &remaining)?;
    }

    // Remove objects only the deleted pages referenced
    new_doc.prune_objects();

    save_document(&mut new_doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_documents;
    use crate::test_support::{create_test_pdf, page_markers};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_empty_pages_fails() {
        let pdf = create_test_pdf(5, "Split");
        assert!(split_document(&pdf, &[]).is_err());
    }

    #[test]
    fn test_split_extracts_single_page() {
        let pdf = create_test_pdf(5, "Split");
        let result = split_document(&pdf, &[3]).unwrap();
        assert_eq!(page_markers(&result), vec!["Split-Page-3"]);
    }

    #[test]
    fn test_split_extracts_multiple_pages() {
        let pdf = create_test_pdf(5, "Split");
        let result = split_document(&pdf, &[1, 3, 5]).unwrap();
        let doc = Document::load_mem(&result).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_split_invalid_page_number_fails() {
        let pdf = create_test_pdf(5, "Split");
        assert!(split_document(&pdf, &[10]).is_err());
    }

    #[test]
    fn test_split_page_zero_fails() {
        let pdf = create_test_pdf(5, "Split");
        assert!(split_document(&pdf, &[0]).is_err());
    }

    #[test]
    fn test_split_each_yields_one_file_per_page() {
        let pdf = create_test_pdf(4, "Each");
        let parts = split_each(&pdf).unwrap();
        assert_eq!(parts.len(), 4);
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(page_markers(part), vec![format!("Each-Page-{}", i + 1)]);
        }
    }

    #[test]
    fn test_split_range_is_inclusive() {
        let pdf = create_test_pdf(6, "Range");
        let result = split_range(&pdf, 2, 4).unwrap();
        assert_eq!(
            page_markers(&result),
            vec!["Range-Page-2", "Range-Page-3", "Range-Page-4"]
        );
    }

    #[test]
    fn test_split_range_rejects_reversed() {
        let pdf = create_test_pdf(6, "Range");
        assert!(split_range(&pdf, 4, 2).is_err());
        assert!(split_range(&pdf, 5, 7).is_err());
    }

    #[test]
    fn test_extract_pages_sorted_without_duplicates() {
        let pdf = create_test_pdf(10, "Ten");
        let (result, pages) = extract_pages(&pdf, "7,1,3,5-7").unwrap();
        assert_eq!(pages, vec![1, 3, 5, 6, 7]);
        assert_eq!(
            page_markers(&result),
            vec![
                "Ten-Page-1",
                "Ten-Page-3",
                "Ten-Page-5",
                "Ten-Page-6",
                "Ten-Page-7"
            ]
        );
    }

    #[test]
    fn test_extract_pages_rejects_out_of_range() {
        let pdf = create_test_pdf(3, "Three");
        assert!(extract_pages(&pdf, "2,4").is_err());
    }

    #[test]
    fn test_split_each_merges_back_in_order() {
        let pdf = create_test_pdf(5, "Whole");
        let parts = split_each(&pdf).unwrap();

        let merged = merge_documents(&parts).unwrap();

        assert_eq!(page_markers(&merged), page_markers(&pdf));
    }
}
