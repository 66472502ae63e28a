//! Page rotation
//!
//! Rotation is additive: the requested angle is added to the page's
//! effective /Rotate (which may be inherited) and normalized into [0, 360).

use crate::document::{load_document, page_rotation, save_document};
use crate::error::PdfDeskError;
use crate::pages::parse_page_selection;
use lopdf::{Object, ObjectId};
use tracing::debug;

/// Rotate pages clockwise by `angle` degrees.
///
/// `pages` is a page-range expression; `None` rotates every page.
pub fn rotate_pages(bytes: &[u8], angle: i32, pages: Option<&str>) -> Result<Vec<u8>, PdfDeskError> {
    if angle % 90 != 0 {
        return Err(PdfDeskError::InvalidInput(format!(
            "Rotation must be a multiple of 90 degrees, got {}",
            angle
        )));
    }

    let mut doc = load_document(bytes)?;
    let all_pages = doc.get_pages();
    let page_count = all_pages.len() as u32;

    let selected: Vec<u32> = match pages {
        Some(ranges) => parse_page_selection(ranges, page_count)?,
        None => (1..=page_count).collect(),
    };

    let targets: Vec<(ObjectId, i64)> = selected
        .iter()
        .filter_map(|num| all_pages.get(num).copied())
        .map(|id| (id, (page_rotation(&doc, id) + angle as i64).rem_euclid(360)))
        .collect();

    for (id, rotation) in targets {
        debug!(page = ?id, rotation, "rotating page");
        doc.get_dictionary_mut(id)
            .map_err(|_| PdfDeskError::OperationError("Invalid page dictionary".into()))?
            .set("Rotate", Object::Integer(rotation));
    }

    save_document(&mut doc)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::test_support::create_test_pdf;
    use lopdf::Document;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: successive rotations accumulate modulo 360
        #[test]
        fn rotations_accumulate_mod_360(turns in prop::collection::vec(-4i32..=4, 1..5)) {
            let mut pdf = create_test_pdf(1, "Prop");
            for turn in &turns {
                pdf = rotate_pages(&pdf, turn * 90, None).unwrap();
            }

            let expected = (turns.iter().sum::<i32>() * 90).rem_euclid(360) as i64;
            let doc = Document::load_mem(&pdf).unwrap();
            let page = *doc.get_pages().values().next().unwrap();
            prop_assert_eq!(page_rotation(&doc, page), expected);
        }
    }
}
