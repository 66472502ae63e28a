//! Text watermark stamped on every page

use crate::document::{load_document, media_box, save_document};
use crate::error::PdfDeskError;
use crate::overlay::{alpha_state, append_content, register_resource};
use lopdf::{content::Operation, dictionary, Object, StringFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

const FONT_NAME: &str = "Helvetica-Bold";

/// Helvetica-Bold advance widths (1/1000 em) for ASCII 32..=126
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    333, 333, 584, 584, 584, 611, 975, // :;<=>?@
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    333, 278, 333, 584, 556, 333, // [\]^_`
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // a-m
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // n-z
    389, 280, 389, 584, // {|}~
];

const FALLBACK_WIDTH: u16 = 556;

/// Cap height of Helvetica-Bold, used to center the text vertically
const CAP_HEIGHT: f32 = 0.718;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatermarkOptions {
    pub text: String,
    pub font_size: f32,
    pub opacity: f32,
    /// Counter-clockwise rotation in degrees
    pub rotation: f32,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 40.0,
            opacity: 0.3,
            rotation: 45.0,
        }
    }
}

impl WatermarkOptions {
    pub fn validate(&self) -> Result<(), PdfDeskError> {
        if self.text.trim().is_empty() {
            return Err(PdfDeskError::InvalidInput(
                "Please enter watermark text".into(),
            ));
        }
        if !(10.0..=100.0).contains(&self.font_size) {
            return Err(PdfDeskError::InvalidInput(format!(
                "Font size must be between 10 and 100, got {}",
                self.font_size
            )));
        }
        if !(0.1..=1.0).contains(&self.opacity) {
            return Err(PdfDeskError::InvalidInput(format!(
                "Opacity must be between 0.1 and 1.0, got {}",
                self.opacity
            )));
        }
        if !(-360.0..=360.0).contains(&self.rotation) {
            return Err(PdfDeskError::InvalidInput(format!(
                "Rotation must be between -360 and 360 degrees, got {}",
                self.rotation
            )));
        }
        Ok(())
    }
}

/// Width of `text` in points when set in Helvetica-Bold at `font_size`
pub fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| {
            let code = c as u32;
            if (32..=126).contains(&code) {
                HELVETICA_BOLD_WIDTHS[(code - 32) as usize] as u32
            } else {
                FALLBACK_WIDTH as u32
            }
        })
        .sum();
    units as f32 * font_size / 1000.0
}

/// WinAnsi bytes for the text; characters outside Latin-1 become '?'
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ 0x20..=0x7e | code @ 0xa0..=0xff => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Stamp `options.text` on every page, centered and rotated
pub fn add_watermark(bytes: &[u8], options: &WatermarkOptions) -> Result<Vec<u8>, PdfDeskError> {
    options.validate()?;

    let mut doc = load_document(bytes)?;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => FONT_NAME,
        "Encoding" => "WinAnsiEncoding",
    });
    let gs_id = alpha_state(&mut doc, options.opacity);

    let width = text_width(&options.text, options.font_size);
    let encoded = encode_win_ansi(&options.text);
    let (sin, cos) = options.rotation.to_radians().sin_cos();

    let pages: Vec<_> = doc.get_pages().into_values().collect();
    for page_id in pages {
        let [x0, y0, x1, y1] = media_box(&doc, page_id);
        let cx = (x0 + x1) / 2.0;
        let cy = (y0 + y1) / 2.0;

        let font = register_resource(&mut doc, page_id, "Font", "WmF", Object::Reference(font_id))?;
        let gs = register_resource(&mut doc, page_id, "ExtGState", "WmGS", Object::Reference(gs_id))?;

        debug!(page = ?page_id, cx, cy, "stamping watermark");

        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(gs.into_bytes())]),
            Operation::new("rg", vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(cos),
                    Object::Real(sin),
                    Object::Real(-sin),
                    Object::Real(cos),
                    Object::Real(cx),
                    Object::Real(cy),
                ],
            ),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font.into_bytes()), Object::Real(options.font_size)],
            ),
            Operation::new(
                "Td",
                vec![
                    Object::Real(-width / 2.0),
                    Object::Real(-options.font_size * CAP_HEIGHT / 2.0),
                ],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(encoded.clone(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ];
        append_content(&mut doc, page_id, ops)?;
    }

    save_document(&mut doc)
}
