//! Compression tiers
//!
//! Two candidates are built from the upload:
//! - stream: prune unreferenced objects and Flate-compress every stream
//! - raster: render each page and rebuild the document from JPEG images
//!
//! The tier decides which candidate is returned.

use crate::document::{load_document, save_document};
use crate::error::PdfDeskError;
use crate::render::{encode_jpeg, Rasterizer};
use lopdf::{
    content::{Content, Operation},
    dictionary, Dictionary, Document, Object, Stream,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionTier {
    /// Best quality: stream compression only
    Low,
    /// Balanced: smaller of stream and 150 DPI raster
    #[default]
    Medium,
    /// Smallest size: always 100 DPI raster
    High,
}

impl CompressionTier {
    pub fn label(&self) -> &'static str {
        match self {
            CompressionTier::Low => "Low (best quality)",
            CompressionTier::Medium => "Medium (balanced)",
            CompressionTier::High => "High (smallest size)",
        }
    }

    /// Raster settings as (dpi, jpeg quality), if the tier rasterizes
    fn raster_settings(&self) -> Option<(u32, u8)> {
        match self {
            CompressionTier::Low => None,
            CompressionTier::Medium => Some((150, 70)),
            CompressionTier::High => Some((100, 50)),
        }
    }
}

/// Which candidate won
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    Stream,
    Raster,
}

#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub bytes: Vec<u8>,
    pub method: CompressionMethod,
    pub original_size: usize,
    pub notes: Vec<String>,
}

impl CompressionOutcome {
    /// Size reduction in percent; negative when the output grew
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.bytes.len() as f64 / self.original_size as f64) * 100.0
    }
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

/// Candidate A: prune and Flate-compress
pub fn compress_streams(bytes: &[u8]) -> Result<Vec<u8>, PdfDeskError> {
    let mut doc = load_document(bytes)?;
    doc.prune_objects();
    doc.delete_zero_length_streams();
    save_document(&mut doc)
}

/// Candidate B: one full-page JPEG per page
pub fn compress_raster(
    bytes: &[u8],
    rasterizer: &dyn Rasterizer,
    dpi: u32,
    quality: u8,
) -> Result<Vec<u8>, PdfDeskError> {
    let page_count = load_document(bytes)?.get_pages().len() as u32;
    let pages: Vec<u32> = (1..=page_count).collect();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());

    for rendered in rasterizer.render(bytes, &pages, dpi)? {
        let (px_w, px_h) = (rendered.image.width(), rendered.image.height());
        let width_pt = px_w as f32 * 72.0 / dpi as f32;
        let height_pt = px_h as f32 * 72.0 / dpi as f32;

        let image_id = doc.add_object(
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => px_w as i64,
                    "Height" => px_h as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                encode_jpeg(&rendered.image, quality)?,
            )
            .with_compression(false),
        );

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(width_pt),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(height_pt),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width_pt),
                Object::Real(height_pt),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im1" => Object::Reference(image_id) },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    save_document(&mut doc)
}

/// Compress according to `tier`
pub fn compress_document(
    bytes: &[u8],
    tier: CompressionTier,
    rasterizer: &dyn Rasterizer,
) -> Result<CompressionOutcome, PdfDeskError> {
    let original_size = bytes.len();
    let stream = compress_streams(bytes)?;
    let mut notes = Vec::new();

    let (output, method) = match (tier, tier.raster_settings()) {
        (CompressionTier::Medium, Some((dpi, quality))) => {
            match compress_raster(bytes, rasterizer, dpi, quality) {
                Ok(raster) if raster.len() < stream.len() => (raster, CompressionMethod::Raster),
                Ok(_) => (stream, CompressionMethod::Stream),
                Err(PdfDeskError::MissingDependency { name, .. }) => {
                    warn!(dependency = name, "raster candidate unavailable");
                    notes.push(format!(
                        "{} is not installed, so only stream compression was tried",
                        name
                    ));
                    (stream, CompressionMethod::Stream)
                }
                Err(e) => return Err(e),
            }
        }
        (CompressionTier::High, Some((dpi, quality))) => {
            let raster = compress_raster(bytes, rasterizer, dpi, quality)?;
            if raster.len() > stream.len() {
                notes.push(
                    "Smallest-size mode always rasterizes pages; this document was smaller with stream compression"
                        .to_string(),
                );
            }
            (raster, CompressionMethod::Raster)
        }
        _ => (stream, CompressionMethod::Stream),
    };

    info!(
        tier = ?tier,
        method = ?method,
        original = original_size,
        compressed = output.len(),
        "compressed"
    );

    let mut outcome = CompressionOutcome {
        bytes: output,
        method,
        original_size,
        notes,
    };
    let summary = format!(
        "Original: {}, compressed: {} ({:.1}% reduction)",
        format_size(original_size),
        format_size(outcome.bytes.len()),
        outcome.reduction_percent()
    );
    outcome.notes.insert(0, summary);
    Ok(outcome)
}
