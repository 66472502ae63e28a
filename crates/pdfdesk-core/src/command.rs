//! Command dispatch
//!
//! Every tool is one [`PdfCommand`] variant. [`execute`] runs a command
//! against a [`Toolbox`] and packages the output as an [`Artifact`].

use crate::archive::{bundle, BundleEntry};
use crate::compress::{compress_document, CompressionMethod, CompressionTier};
use crate::document::get_page_count;
use crate::error::PdfDeskError;
use crate::highlight::{add_highlight, HighlightOptions};
use crate::images::extract_images;
use crate::invoice::{extract_invoices, invoice_workbook, InvoiceField};
use crate::merge::merge_documents;
use crate::ocr::{OcrEngine, TesseractCli};
use crate::render::{rasterize_pages, PdfiumRasterizer, RasterOptions, Rasterizer};
use crate::reorder::reorder_pages;
use crate::rotate::rotate_pages;
use crate::sheet::XLSX_MIME;
use crate::sign::{sign_document, SignatureOptions};
use crate::split::{extract_pages, split_each, split_range};
use crate::text::extract_text;
use crate::watermark::{add_watermark, WatermarkOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub const PDF_MIME: &str = "application/pdf";
pub const ZIP_MIME: &str = "application/zip";
pub const TEXT_MIME: &str = "text/plain; charset=utf-8";

/// Characters of extracted text echoed back for the in-page preview
const PREVIEW_CHARS: usize = 5000;

/// Binary payloads travel as standard base64 strings
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        // Accept data URLs straight from a FileReader
        let payload = match encoded.split_once(";base64,") {
            Some((_, rest)) => rest,
            None => encoded.as_str(),
        };
        STANDARD
            .decode(payload.trim())
            .map_err(serde::de::Error::custom)
    }
}

/// An uploaded file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputFile {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Merge,
    Split,
    ExtractPages,
    Rotate,
    Reorder,
    Watermark,
    ExtractText,
    ExtractImages,
    Compress,
    Rasterize,
    Highlight,
    Sign,
    ExtractInvoice,
}

impl Tool {
    /// Menu order
    pub const ALL: [Tool; 13] = [
        Tool::Merge,
        Tool::Split,
        Tool::ExtractPages,
        Tool::Rotate,
        Tool::Reorder,
        Tool::Watermark,
        Tool::ExtractText,
        Tool::ExtractImages,
        Tool::Compress,
        Tool::Rasterize,
        Tool::Highlight,
        Tool::Sign,
        Tool::ExtractInvoice,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Tool::Merge => "merge",
            Tool::Split => "split",
            Tool::ExtractPages => "extract_pages",
            Tool::Rotate => "rotate",
            Tool::Reorder => "reorder",
            Tool::Watermark => "watermark",
            Tool::ExtractText => "extract_text",
            Tool::ExtractImages => "extract_images",
            Tool::Compress => "compress",
            Tool::Rasterize => "rasterize",
            Tool::Highlight => "highlight",
            Tool::Sign => "sign",
            Tool::ExtractInvoice => "extract_invoice",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Merge => "Merge PDFs",
            Tool::Split => "Split PDF",
            Tool::ExtractPages => "Extract Pages",
            Tool::Rotate => "Rotate Pages",
            Tool::Reorder => "Reorder Pages",
            Tool::Watermark => "Add Watermark",
            Tool::ExtractText => "Extract Text",
            Tool::ExtractImages => "Extract Images",
            Tool::Compress => "Compress PDF",
            Tool::Rasterize => "PDF to Images",
            Tool::Highlight => "Highlight Area",
            Tool::Sign => "Sign PDF",
            Tool::ExtractInvoice => "Invoice to Excel",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tool::Merge => "Combine two or more PDFs in upload order",
            Tool::Split => "Split into single pages or cut out a page range",
            Tool::ExtractPages => "Keep only the pages you list, e.g. 1,3,5-7",
            Tool::Rotate => "Rotate all or selected pages by 90, 180 or 270 degrees",
            Tool::Reorder => "Rearrange pages, e.g. 3,1,2",
            Tool::Watermark => "Stamp semi-transparent text across every page",
            Tool::ExtractText => "Pull the text out of every page",
            Tool::ExtractImages => "Download the images embedded in the PDF",
            Tool::Compress => "Shrink the file with one of three quality levels",
            Tool::Rasterize => "Render pages as PNG or JPEG images",
            Tool::Highlight => "Draw a translucent colored box on a page",
            Tool::Sign => "Place a signature image on one or all pages",
            Tool::ExtractInvoice => "Read GST invoice fields into a spreadsheet",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitMode {
    /// One PDF per page, zipped
    All,
    /// One PDF with the inclusive range
    Range { start: u32, end: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum PdfCommand {
    Merge {
        files: Vec<InputFile>,
    },
    Split {
        file: InputFile,
        mode: SplitMode,
    },
    ExtractPages {
        file: InputFile,
        pages: String,
    },
    Rotate {
        file: InputFile,
        angle: i32,
        #[serde(default)]
        pages: Option<String>,
    },
    Reorder {
        file: InputFile,
        order: String,
    },
    Watermark {
        file: InputFile,
        #[serde(default)]
        options: WatermarkOptions,
    },
    ExtractText {
        file: InputFile,
    },
    ExtractImages {
        file: InputFile,
    },
    Compress {
        file: InputFile,
        #[serde(default)]
        tier: CompressionTier,
    },
    Rasterize {
        file: InputFile,
        #[serde(default)]
        options: RasterOptions,
    },
    Highlight {
        file: InputFile,
        #[serde(default)]
        options: HighlightOptions,
    },
    Sign {
        file: InputFile,
        signature: InputFile,
        #[serde(default)]
        options: SignatureOptions,
    },
    ExtractInvoice {
        files: Vec<InputFile>,
    },
}

impl PdfCommand {
    pub fn tool(&self) -> Tool {
        match self {
            PdfCommand::Merge { .. } => Tool::Merge,
            PdfCommand::Split { .. } => Tool::Split,
            PdfCommand::ExtractPages { .. } => Tool::ExtractPages,
            PdfCommand::Rotate { .. } => Tool::Rotate,
            PdfCommand::Reorder { .. } => Tool::Reorder,
            PdfCommand::Watermark { .. } => Tool::Watermark,
            PdfCommand::ExtractText { .. } => Tool::ExtractText,
            PdfCommand::ExtractImages { .. } => Tool::ExtractImages,
            PdfCommand::Compress { .. } => Tool::Compress,
            PdfCommand::Rasterize { .. } => Tool::Rasterize,
            PdfCommand::Highlight { .. } => Tool::Highlight,
            PdfCommand::Sign { .. } => Tool::Sign,
            PdfCommand::ExtractInvoice { .. } => Tool::ExtractInvoice,
        }
    }

    /// Total bytes uploaded with the command
    pub fn input_size(&self) -> usize {
        match self {
            PdfCommand::Merge { files } | PdfCommand::ExtractInvoice { files } => {
                files.iter().map(|f| f.data.len()).sum()
            }
            PdfCommand::Sign {
                file, signature, ..
            } => file.data.len() + signature.data.len(),
            PdfCommand::Split { file, .. }
            | PdfCommand::ExtractPages { file, .. }
            | PdfCommand::Rotate { file, .. }
            | PdfCommand::Reorder { file, .. }
            | PdfCommand::Watermark { file, .. }
            | PdfCommand::ExtractText { file }
            | PdfCommand::ExtractImages { file }
            | PdfCommand::Compress { file, .. }
            | PdfCommand::Rasterize { file, .. }
            | PdfCommand::Highlight { file, .. } => file.data.len(),
        }
    }
}

/// A finished result, ready for download
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Pages in the output, for PDF results
    pub page_count: Option<u32>,
    /// Shown inline in the panel (extracted text, invoice summary)
    pub preview: Option<String>,
    /// Informational messages for the user
    pub notes: Vec<String>,
}

impl Artifact {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
            page_count: None,
            preview: None,
            notes: Vec::new(),
        }
    }

    pub fn pdf(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let page_count = get_page_count(&bytes).ok();
        Self {
            page_count,
            ..Self::new(filename, PDF_MIME, bytes)
        }
    }

    pub fn zip(filename: impl Into<String>, entries: &[BundleEntry]) -> Result<Self, PdfDeskError> {
        let mut artifact = Self::new(filename, ZIP_MIME, bundle(entries)?);
        artifact
            .notes
            .push(format!("{} files in archive", entries.len()));
        Ok(artifact)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

/// External engines the operations may need
#[derive(Clone)]
pub struct Toolbox {
    pub rasterizer: Arc<dyn Rasterizer>,
    pub ocr: Arc<dyn OcrEngine>,
}

impl Toolbox {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self { rasterizer, ocr }
    }
}

impl Default for Toolbox {
    fn default() -> Self {
        Self::new(
            Arc::new(PdfiumRasterizer::default()),
            Arc::new(TesseractCli::default()),
        )
    }
}

fn truncate_preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}\n…", &text[..idx]),
        None => text.to_string(),
    }
}

fn format_pages(pages: &[u32]) -> String {
    pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run one command
pub fn execute(command: &PdfCommand, toolbox: &Toolbox) -> Result<Artifact, PdfDeskError> {
    info!(tool = command.tool().id(), input_bytes = command.input_size(), "executing");

    match command {
        PdfCommand::Merge { files } => {
            let docs: Vec<Vec<u8>> = files.iter().map(|f| f.data.clone()).collect();
            let merged = merge_documents(&docs)?;
            Ok(Artifact::pdf("merged_document.pdf", merged)
                .with_note(format!("Merged {} files", files.len())))
        }

        PdfCommand::Split { file, mode } => match mode {
            SplitMode::All => {
                let entries: Vec<BundleEntry> = split_each(&file.data)?
                    .into_iter()
                    .enumerate()
                    .map(|(i, pdf)| BundleEntry::new(format!("page_{}.pdf", i + 1), pdf))
                    .collect();
                Artifact::zip("split_pages.zip", &entries)
            }
            SplitMode::Range { start, end } => {
                let pdf = split_range(&file.data, *start, *end)?;
                Ok(Artifact::pdf(format!("pages_{}_to_{}.pdf", start, end), pdf))
            }
        },

        PdfCommand::ExtractPages { file, pages } => {
            let (pdf, kept) = extract_pages(&file.data, pages)?;
            Ok(Artifact::pdf("extracted_pages.pdf", pdf)
                .with_note(format!("Extracted pages: {}", format_pages(&kept))))
        }

        PdfCommand::Rotate { file, angle, pages } => {
            let pdf = rotate_pages(&file.data, *angle, pages.as_deref().filter(|p| !p.trim().is_empty()))?;
            Ok(Artifact::pdf("rotated_document.pdf", pdf))
        }

        PdfCommand::Reorder { file, order } => {
            let pdf = reorder_pages(&file.data, order)?;
            Ok(Artifact::pdf("reordered_document.pdf", pdf))
        }

        PdfCommand::Watermark { file, options } => {
            let pdf = add_watermark(&file.data, options)?;
            Ok(Artifact::pdf("watermarked_document.pdf", pdf))
        }

        PdfCommand::ExtractText { file } => {
            let extracted = extract_text(&file.data)?;
            let mut artifact = Artifact::new(
                "extracted_text.txt",
                TEXT_MIME,
                extracted.text.clone().into_bytes(),
            );
            artifact.preview = Some(truncate_preview(&extracted.text));
            if !extracted.failed_pages.is_empty() {
                artifact.notes.push(format!(
                    "Text could not be decoded on pages: {}",
                    format_pages(&extracted.failed_pages)
                ));
            }
            Ok(artifact)
        }

        PdfCommand::ExtractImages { file } => {
            let extracted = extract_images(&file.data)?;
            if extracted.images.is_empty() {
                return Err(PdfDeskError::NothingFound(
                    "No extractable images found in this PDF".into(),
                ));
            }
            let mut artifact = Artifact::zip("extracted_images.zip", &extracted.images)?;
            if extracted.skipped > 0 {
                artifact.notes.push(format!(
                    "{} images use an unsupported encoding and were skipped",
                    extracted.skipped
                ));
            }
            Ok(artifact)
        }

        PdfCommand::Compress { file, tier } => {
            let outcome = compress_document(&file.data, *tier, toolbox.rasterizer.as_ref())?;
            let method = match outcome.method {
                CompressionMethod::Stream => "stream compression",
                CompressionMethod::Raster => "page rasterization",
            };
            let mut artifact = Artifact::pdf("compressed_document.pdf", outcome.bytes);
            artifact.notes = outcome.notes;
            artifact
                .notes
                .push(format!("{} used {}", tier.label(), method));
            Ok(artifact)
        }

        PdfCommand::Rasterize { file, options } => {
            let mut images = rasterize_pages(&file.data, options, toolbox.rasterizer.as_ref())?;
            if images.len() == 1 {
                let image = images.remove(0);
                Ok(Artifact::new(image.name, options.format.mime_type(), image.data))
            } else {
                Artifact::zip("pdf_images.zip", &images)
            }
        }

        PdfCommand::Highlight { file, options } => {
            let pdf = add_highlight(&file.data, options)?;
            Ok(Artifact::pdf("highlighted_document.pdf", pdf))
        }

        PdfCommand::Sign {
            file,
            signature,
            options,
        } => {
            let pdf = sign_document(&file.data, &signature.data, options)?;
            Ok(Artifact::pdf("signed_document.pdf", pdf))
        }

        PdfCommand::ExtractInvoice { files } => {
            let inputs: Vec<(String, Vec<u8>)> = files
                .iter()
                .map(|f| (f.name.clone(), f.data.clone()))
                .collect();
            let records = extract_invoices(
                &inputs,
                toolbox.rasterizer.as_ref(),
                toolbox.ocr.as_ref(),
            )?;

            let preview = records
                .iter()
                .map(|r| {
                    format!(
                        "{}: {}/{} fields{}",
                        r.source,
                        r.fields.len(),
                        InvoiceField::ALL.len(),
                        if r.used_ocr { " (OCR)" } else { "" }
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");

            let mut artifact = Artifact::new("invoice_data.xlsx", XLSX_MIME, invoice_workbook(&records)?);
            artifact.preview = Some(preview);
            Ok(artifact)
        }
    }
}

/// Run one command and measure it
pub fn execute_timed(
    command: &PdfCommand,
    toolbox: &Toolbox,
) -> Result<(Artifact, ProcessMetrics), PdfDeskError> {
    let start = Instant::now();
    let artifact = execute(command, toolbox)?;

    let metrics = ProcessMetrics {
        input_size_bytes: command.input_size(),
        output_size_bytes: artifact.bytes.len(),
        page_count: artifact.page_count.unwrap_or(0),
        processing_time_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        tool = command.tool().id(),
        output_bytes = metrics.output_size_bytes,
        elapsed_ms = metrics.processing_time_ms,
        "command complete"
    );

    Ok((artifact, metrics))
}
