//! Page-by-page text extraction

use crate::document::load_document;
use crate::error::PdfDeskError;
use tracing::warn;

/// Extracted text with one `--- Page N ---` section per page
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    /// Pages whose text could not be decoded
    pub failed_pages: Vec<u32>,
}

/// Extract the text of every page.
///
/// A page whose content cannot be decoded yields an empty section instead
/// of failing the whole document.
pub fn extract_text(bytes: &[u8]) -> Result<ExtractedText, PdfDeskError> {
    let doc = load_document(bytes)?;
    let mut output = ExtractedText::default();

    for page_num in doc.get_pages().keys() {
        let body = match doc.extract_text(&[*page_num]) {
            Ok(text) => text,
            Err(e) => {
                warn!(page = page_num, error = %e, "text extraction failed");
                output.failed_pages.push(*page_num);
                String::new()
            }
        };
        output
            .text
            .push_str(&format!("\n\n--- Page {} ---\n\n{}", page_num, body.trim_end()));
    }

    Ok(output)
}
