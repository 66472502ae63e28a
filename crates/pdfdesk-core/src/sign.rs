//! Signature placement
//!
//! The uploaded signature is keyed against a near-white background, embedded
//! once as an RGB image with a soft mask, and drawn on one or every page.

use crate::document::{load_document, media_box, page_id, save_document};
use crate::error::PdfDeskError;
use crate::overlay::{append_content, register_resource};
use flate2::{write::ZlibEncoder, Compression};
use image::RgbaImage;
use lopdf::{content::Operation, dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::debug;

/// Pixels whose R, G and B are all above this value become transparent
pub const BACKGROUND_THRESHOLD: u8 = 230;

/// Where the signature goes. Positions are percentages of the page with the
/// origin at the top-left, as the user clicked them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignatureOptions {
    pub x_pct: f32,
    pub y_pct: f32,
    /// Drawn width as a percentage of the page width
    pub width_pct: f32,
    /// 1-indexed page; `None` signs every page
    pub page: Option<u32>,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            x_pct: 70.0,
            y_pct: 85.0,
            width_pct: 25.0,
            page: None,
        }
    }
}

impl SignatureOptions {
    fn validate(&self) -> Result<(), PdfDeskError> {
        for (label, value) in [("X position", self.x_pct), ("Y position", self.y_pct)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(PdfDeskError::InvalidInput(format!(
                    "{} must be between 0 and 100%, got {}",
                    label, value
                )));
            }
        }
        if !(1.0..=100.0).contains(&self.width_pct) {
            return Err(PdfDeskError::InvalidInput(format!(
                "Signature width must be between 1 and 100%, got {}",
                self.width_pct
            )));
        }
        Ok(())
    }
}

/// Split RGBA pixels into RGB samples and an alpha mask, keying out the background
pub fn key_out_background(image: &RgbaImage) -> (Vec<u8>, Vec<u8>) {
    let pixel_count = (image.width() * image.height()) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);

    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        let background =
            r > BACKGROUND_THRESHOLD && g > BACKGROUND_THRESHOLD && b > BACKGROUND_THRESHOLD;
        alpha.push(if background { 0 } else { a });
    }

    (rgb, alpha)
}

/// Drawn rectangle `[x, y, width, height]` in PDF points.
///
/// The click becomes the center of the signature; the box is then pushed
/// back inside the MediaBox if it overhangs.
pub fn placement(
    media_box: [f32; 4],
    image_size: (u32, u32),
    options: &SignatureOptions,
) -> [f32; 4] {
    let [x0, y0, x1, y1] = [
        media_box[0].min(media_box[2]),
        media_box[1].min(media_box[3]),
        media_box[0].max(media_box[2]),
        media_box[1].max(media_box[3]),
    ];
    let page_w = x1 - x0;
    let page_h = y1 - y0;
    let (img_w, img_h) = image_size;

    let mut draw_w = page_w * options.width_pct / 100.0;
    let mut draw_h = draw_w * img_h as f32 / img_w.max(1) as f32;
    if draw_h > page_h {
        let scale = page_h / draw_h;
        draw_w *= scale;
        draw_h = page_h;
    }

    let cx = x0 + options.x_pct / 100.0 * page_w;
    let cy = y0 + page_h - options.y_pct / 100.0 * page_h;

    let x = (cx - draw_w / 2.0).clamp(x0, x1 - draw_w);
    let y = (cy - draw_h / 2.0).clamp(y0, y1 - draw_h);
    [x, y, draw_w, draw_h]
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfDeskError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn embed_signature(doc: &mut Document, image: &RgbaImage) -> Result<ObjectId, PdfDeskError> {
    let (rgb, alpha) = key_out_background(image);
    let (width, height) = image.dimensions();

    let mask_id = doc.add_object(
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        )
        .with_compression(false),
    );

    Ok(doc.add_object(
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
                "SMask" => Object::Reference(mask_id),
            },
            deflate(&rgb)?,
        )
        .with_compression(false),
    ))
}

/// Place `signature` (PNG or JPEG bytes) onto the PDF
pub fn sign_document(
    bytes: &[u8],
    signature: &[u8],
    options: &SignatureOptions,
) -> Result<Vec<u8>, PdfDeskError> {
    options.validate()?;

    let image = image::load_from_memory(signature)
        .map_err(|e| PdfDeskError::ImageError(format!("Could not read signature image: {}", e)))?
        .to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(PdfDeskError::ImageError("Signature image is empty".into()));
    }

    let mut doc = load_document(bytes)?;
    let targets: Vec<ObjectId> = match options.page {
        Some(page) => vec![page_id(&doc, page)?],
        None => doc.get_pages().into_values().collect(),
    };

    let image_id = embed_signature(&mut doc, &image)?;

    for target in targets {
        let [x, y, w, h] = placement(media_box(&doc, target), image.dimensions(), options);
        debug!(page = ?target, x, y, w, h, "placing signature");

        let name = register_resource(&mut doc, target, "XObject", "Sig", Object::Reference(image_id))?;
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(h),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ];
        append_content(&mut doc, target, ops)?;
    }

    save_document(&mut doc)
}
