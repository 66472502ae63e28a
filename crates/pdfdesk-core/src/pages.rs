//! Page range parsing
//!
//! All page numbers are 1-indexed. `parse_ranges` checks syntax and a fixed cap; the
//! `parse_page_*` helpers also check the numbers against a document.

use crate::error::PdfDeskError;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// Highest page number `parse_ranges` will expand when no document is known
pub const MAX_PAGE_NUMBER: u32 = 100_000;

/// Parse page range string like "1-3, 5, 8-10" into sorted unique page numbers
pub fn parse_ranges(input: &str) -> Result<Vec<u32>, PdfDeskError> {
    collect_pages(input, MAX_PAGE_NUMBER)
}

fn collect_pages(input: &str, max_page: u32) -> Result<Vec<u32>, PdfDeskError> {
    let mut pages = BTreeSet::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        pages.extend(expand_part(part, max_page)?);
    }

    Ok(pages.into_iter().collect())
}

/// Parse a page selection and check it against the document's page count.
///
/// Rejects empty input, page 0 and pages past the end of the document.
pub fn parse_page_selection(input: &str, page_count: u32) -> Result<Vec<u32>, PdfDeskError> {
    if input.trim().is_empty() {
        return Err(PdfDeskError::InvalidInput(
            "Please enter page numbers".into(),
        ));
    }

    let pages = collect_pages(input, page_count)?;
    if pages.is_empty() {
        return Err(PdfDeskError::InvalidRange("No pages specified".into()));
    }
    check_bounds(&pages, page_count)?;

    Ok(pages)
}

/// Parse a new page order such as "3, 1, 2".
///
/// Order is kept as written. The result must name every page of the
/// document exactly once.
pub fn parse_page_order(input: &str, page_count: u32) -> Result<Vec<u32>, PdfDeskError> {
    if input.trim().is_empty() {
        return Err(PdfDeskError::InvalidInput("Please enter the new page order".into()));
    }

    let mut order = Vec::new();
    let mut seen = vec![false; page_count as usize];
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        for page in expand_part(part, page_count)? {
            check_bounds(&[page], page_count)?;
            let slot = &mut seen[(page - 1) as usize];
            if *slot {
                return Err(PdfDeskError::InvalidRange(format!(
                    "Page {} appears more than once",
                    page
                )));
            }
            *slot = true;
            order.push(page);
        }
    }

    let missing: Vec<String> = seen
        .iter()
        .enumerate()
        .filter(|(_, present)| !**present)
        .map(|(idx, _)| (idx + 1).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PdfDeskError::InvalidRange(format!(
            "Order must list every page exactly once; missing: {}",
            missing.join(", ")
        )));
    }

    Ok(order)
}

/// Expand one comma-separated part. Ranges ending past `max_page` are
/// rejected before anything is expanded.
fn expand_part(part: &str, max_page: u32) -> Result<RangeInclusive<u32>, PdfDeskError> {
    if let Some((start, end)) = part.split_once('-') {
        // Range like "1-3"
        let start: u32 = start
            .trim()
            .parse()
            .map_err(|_| PdfDeskError::InvalidRange(format!("Invalid start: {}", start)))?;
        let end: u32 = end
            .trim()
            .parse()
            .map_err(|_| PdfDeskError::InvalidRange(format!("Invalid end: {}", end)))?;

        if start > end {
            return Err(PdfDeskError::InvalidRange(format!(
                "Start {} > end {}",
                start, end
            )));
        }
        if end > max_page {
            return Err(PdfDeskError::InvalidRange(format!(
                "Range {}-{} goes past the last page ({})",
                start, end, max_page
            )));
        }

        Ok(start..=end)
    } else {
        // Single page like "5"
        let page: u32 = part
            .parse()
            .map_err(|_| PdfDeskError::InvalidRange(format!("Invalid page: {}", part)))?;
        Ok(page..=page)
    }
}

fn check_bounds(pages: &[u32], page_count: u32) -> Result<(), PdfDeskError> {
    if pages.contains(&0) {
        return Err(PdfDeskError::InvalidRange(
            "Page numbers must be >= 1".into(),
        ));
    }
    if let Some(&page) = pages.iter().find(|&&p| p > page_count) {
        return Err(PdfDeskError::InvalidRange(format!(
            "Page {} does not exist (document has {} pages)",
            page, page_count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    #[test]
    fn test_parse_ranges_single() {
        assert_eq!(parse_ranges("5").unwrap(), vec![5]);
    }

    #[test]
    fn test_parse_ranges_complex() {
        let result = parse_ranges("1-3, 5, 8-10").unwrap();
        assert_eq!(result, vec![1, 2, 3, 5, 8, 9, 10]);
    }

    #[test]
    fn test_parse_ranges_deduplicates() {
        assert_eq!(parse_ranges("1-3, 2-4").unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_ranges_sorts() {
        assert_eq!(parse_ranges("7,3,5").unwrap(), vec![3, 5, 7]);
    }

    #[test]
    fn test_parse_ranges_rejects_reversed_range() {
        assert!(parse_ranges("5-3").is_err());
    }

    #[test]
    fn test_parse_ranges_rejects_garbage() {
        assert!(parse_ranges("one").is_err());
        assert!(parse_ranges("3-").is_err());
        assert!(parse_ranges("1-2-3").is_err());
    }

    #[test]
    fn test_selection_matches_documented_example() {
        let pages = parse_page_selection("1,3,5-7", 10).unwrap();
        assert_eq!(pages, vec![1, 3, 5, 6, 7]);
    }

    #[test]
    fn test_selection_rejects_out_of_bounds() {
        let err = parse_page_selection("1, 11", 10).unwrap_err();
        assert!(err.to_string().contains("Page 11 does not exist"));
        assert!(parse_page_selection("0", 10).is_err());
    }

    #[test]
    fn test_selection_rejects_empty() {
        assert!(matches!(
            parse_page_selection("   ", 10),
            Err(PdfDeskError::InvalidInput(_))
        ));
        assert!(parse_page_selection(" , ,", 10).is_err());
    }

    #[test]
    fn test_order_keeps_written_order() {
        assert_eq!(parse_page_order("3,1,2", 3).unwrap(), vec![3, 1, 2]);
        assert_eq!(parse_page_order("4, 1-3", 4).unwrap(), vec![4, 1, 2, 3]);
    }

    #[test]
    fn test_order_rejects_duplicates() {
        let err = parse_page_order("1,1,2", 3).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_order_rejects_omissions() {
        let err = parse_page_order("1,3", 3).unwrap_err();
        assert!(err.to_string().contains("missing: 2"));
    }

    #[test]
    fn test_order_rejects_out_of_range() {
        assert!(parse_page_order("1,2,4", 3).is_err());
    }

    #[test]
    fn test_huge_range_rejected_before_expanding() {
        let started = Instant::now();

        let err = parse_page_selection("1-4294967295", 10).unwrap_err();
        assert!(err.to_string().contains("goes past the last page (10)"));
        assert!(parse_page_order("1-50000000", 10).is_err());
        assert!(parse_ranges("1-4294967295").is_err());

        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_range_ending_on_last_page_is_accepted() {
        assert_eq!(parse_page_selection("8-10", 10).unwrap(), vec![8, 9, 10]);
        assert_eq!(parse_page_order("2-3, 1", 3).unwrap(), vec![2, 3, 1]);
    }
}
