//! OCR for scanned documents

use crate::error::PdfDeskError;
use crate::render::encode_png;
use image::DynamicImage;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info};

const TESSERACT_HINT: &str =
    "install tesseract-ocr (e.g. `apt install tesseract-ocr`) or set PDFDESK_TESSERACT_BIN";

/// Recognizes text in a page image
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String, PdfDeskError>;
}

/// The `tesseract` command-line tool, fed a PNG on stdin
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: String,
    lang: String,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            lang: lang.into(),
        }
    }

    fn missing(&self) -> PdfDeskError {
        PdfDeskError::MissingDependency {
            name: "tesseract",
            hint: format!("`{}` was not found; {}", self.binary, TESSERACT_HINT),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &DynamicImage) -> Result<String, PdfDeskError> {
        let start = Instant::now();
        let png = encode_png(image)?;

        debug!(binary = %self.binary, lang = %self.lang, "running tesseract");
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", self.lang.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => self.missing(),
                _ => PdfDeskError::OperationError(format!("Could not start tesseract: {}", e)),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png)?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(PdfDeskError::OperationError(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = text.len(),
            "ocr complete"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_a_dependency_error() {
        let engine = TesseractCli::new("pdfdesk-no-such-tesseract-binary", "eng");
        let image = DynamicImage::new_rgb8(4, 4);

        match engine.recognize(&image) {
            Err(PdfDeskError::MissingDependency { name, hint }) => {
                assert_eq!(name, "tesseract");
                assert!(hint.contains("pdfdesk-no-such-tesseract-binary"));
            }
            other => panic!("expected MissingDependency, got {:?}", other),
        }
    }
}
