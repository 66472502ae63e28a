//! PDF operations for the pdfdesk tool panel
//!
//! Every operation takes the uploaded bytes and returns new bytes; nothing
//! is written to disk. Structural edits go through lopdf. Operations that
//! need pixels (rasterize, raster compression, OCR) go through the
//! [`Rasterizer`] and [`OcrEngine`] traits, backed by pdfium and tesseract.

pub mod archive;
pub mod command;
pub mod compress;
pub mod document;
pub mod error;
pub mod highlight;
pub mod images;
pub mod invoice;
pub mod merge;
pub mod ocr;
mod overlay;
pub mod pages;
pub mod render;
pub mod reorder;
pub mod rotate;
pub mod sheet;
pub mod sign;
pub mod split;
pub mod text;
pub mod watermark;

#[cfg(test)]
mod test_support;

pub use command::{
    execute, execute_timed, Artifact, InputFile, PdfCommand, ProcessMetrics, SplitMode, Tool,
    Toolbox,
};
pub use compress::{compress_document, CompressionTier};
pub use document::{get_page_count, inspect, PdfInfo};
pub use error::PdfDeskError;
pub use highlight::{add_highlight, HighlightColor, HighlightOptions};
pub use images::extract_images;
pub use invoice::{extract_invoices, invoice_workbook, InvoiceField, InvoiceRecord};
pub use merge::merge_documents;
pub use ocr::{OcrEngine, TesseractCli};
pub use pages::{parse_page_order, parse_page_selection, parse_ranges};
pub use render::{rasterize_pages, PdfiumRasterizer, RasterFormat, RasterOptions, Rasterizer, RenderedPage};
pub use reorder::reorder_pages;
pub use rotate::rotate_pages;
pub use sign::{sign_document, SignatureOptions};
pub use split::{extract_pages, split_document, split_each, split_range};
pub use text::extract_text;
pub use watermark::{add_watermark, WatermarkOptions};
