//! Page rasterization
//!
//! Rendering goes through the [`Rasterizer`] trait so the operations that
//! need pixels (rasterize, raster compression, OCR) can run against pdfium
//! in production and a fake in tests.

use crate::archive::BundleEntry;
use crate::document::load_document;
use crate::error::PdfDeskError;
use crate::pages::parse_page_selection;
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::{debug, info};

pub const MIN_DPI: u32 = 72;
pub const MAX_DPI: u32 = 300;
pub const DEFAULT_DPI: u32 = 150;

/// JPEG quality used for rasterized page exports
pub const EXPORT_JPEG_QUALITY: u8 = 85;

const PDFIUM_HINT: &str =
    "install the pdfium shared library or point PDFDESK_PDFIUM_DIR at the directory containing it";

/// One rendered page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-indexed page number
    pub page: u32,
    pub image: DynamicImage,
}

/// Turns PDF pages into bitmaps
pub trait Rasterizer: Send + Sync {
    /// Render `pages` (1-indexed) at `dpi`
    fn render(&self, pdf: &[u8], pages: &[u32], dpi: u32) -> Result<Vec<RenderedPage>, PdfDeskError>;
}

/// Rasterizer backed by the pdfium shared library
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    /// Directories to try before the system library
    fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = &self.library_dir {
            paths.push(dir.clone());
        }
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        {
            paths.push(exe_dir.join("libs"));
            paths.push(exe_dir);
        }
        paths
    }

    fn bind(&self) -> Result<Pdfium, PdfDeskError> {
        for path in self.search_paths() {
            let lib_path = Pdfium::pdfium_platform_library_name_at_path(&path);
            debug!(path = ?lib_path, "trying pdfium");
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                return Ok(Pdfium::new(bindings));
            }
        }

        Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| PdfDeskError::MissingDependency {
                name: "pdfium",
                hint: format!("{} ({})", PDFIUM_HINT, e),
            })
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn render(&self, pdf: &[u8], pages: &[u32], dpi: u32) -> Result<Vec<RenderedPage>, PdfDeskError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PdfDeskError::ParseError(format!("pdfium could not open the PDF: {}", e)))?;

        let scale = dpi as f32 / 72.0;
        let mut rendered = Vec::with_capacity(pages.len());

        for &page_num in pages {
            let page = document
                .pages()
                .get(page_num.saturating_sub(1) as u16)
                .map_err(|e| PdfDeskError::OperationError(format!("Page {}: {}", page_num, e)))?;

            let target_width = (page.width().value * scale).round() as i32;
            let target_height = (page.height().value * scale).round() as i32;
            debug!(page = page_num, target_width, target_height, dpi, "rendering");

            let config = PdfRenderConfig::new()
                .set_target_width(target_width)
                .set_target_height(target_height);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| PdfDeskError::OperationError(format!("Rendering page {} failed: {}", page_num, e)))?;

            rendered.push(RenderedPage {
                page: page_num,
                image: bitmap.as_image(),
            });
        }

        Ok(rendered)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    #[default]
    Png,
    Jpeg,
}

impl RasterFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RasterOptions {
    pub format: RasterFormat,
    pub dpi: u32,
    /// Page-range expression; `None` renders every page
    pub pages: Option<String>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            format: RasterFormat::Png,
            dpi: DEFAULT_DPI,
            pages: None,
        }
    }
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, PdfDeskError> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// JPEG-encode as RGB; alpha is dropped
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, PdfDeskError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&image.to_rgb8())?;
    Ok(out)
}

/// Render the selected pages to image files named `page_<n>.<ext>`
pub fn rasterize_pages(
    bytes: &[u8],
    options: &RasterOptions,
    rasterizer: &dyn Rasterizer,
) -> Result<Vec<BundleEntry>, PdfDeskError> {
    if !(MIN_DPI..=MAX_DPI).contains(&options.dpi) {
        return Err(PdfDeskError::InvalidInput(format!(
            "DPI must be between {} and {}, got {}",
            MIN_DPI, MAX_DPI, options.dpi
        )));
    }

    let page_count = load_document(bytes)?.get_pages().len() as u32;
    let pages: Vec<u32> = match options.pages.as_deref() {
        Some(ranges) if !ranges.trim().is_empty() => parse_page_selection(ranges, page_count)?,
        _ => (1..=page_count).collect(),
    };

    info!(pages = pages.len(), dpi = options.dpi, format = ?options.format, "rasterizing");

    rasterizer
        .render(bytes, &pages, options.dpi)?
        .into_iter()
        .map(|rendered| {
            let data = match options.format {
                RasterFormat::Png => encode_png(&rendered.image)?,
                RasterFormat::Jpeg => encode_jpeg(&rendered.image, EXPORT_JPEG_QUALITY)?,
            };
            Ok(BundleEntry::new(
                format!("page_{}.{}", rendered.page, options.format.extension()),
                data,
            ))
        })
        .collect()
}
