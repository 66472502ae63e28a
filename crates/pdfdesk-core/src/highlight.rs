//! Translucent rectangle drawn over part of one page

use crate::document::{load_document, page_id, save_document};
use crate::error::PdfDeskError;
use crate::overlay::{alpha_state, append_content, register_resource};
use lopdf::{content::Operation, Object};
use serde::{Deserialize, Serialize};

const HIGHLIGHT_ALPHA: f32 = 0.3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Red,
    Blue,
}

impl HighlightColor {
    /// RGB fill components in 0..=1
    pub fn rgb(&self) -> (f32, f32, f32) {
        match self {
            HighlightColor::Yellow => (1.0, 1.0, 0.0),
            HighlightColor::Green => (0.0, 0.502, 0.0),
            HighlightColor::Red => (1.0, 0.0, 0.0),
            HighlightColor::Blue => (0.0, 0.0, 1.0),
        }
    }
}

/// Rectangle in PDF points, origin at the bottom-left of the page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HighlightOptions {
    /// 1-indexed page number
    pub page: u32,
    pub color: HighlightColor,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            page: 1,
            color: HighlightColor::Yellow,
            x: 100.0,
            y: 600.0,
            width: 200.0,
            height: 50.0,
        }
    }
}

pub fn add_highlight(bytes: &[u8], options: &HighlightOptions) -> Result<Vec<u8>, PdfDeskError> {
    if options.width <= 0.0 || options.height <= 0.0 {
        return Err(PdfDeskError::InvalidInput(
            "Highlight width and height must be positive".into(),
        ));
    }

    let mut doc = load_document(bytes)?;
    let target = page_id(&doc, options.page)?;

    let gs_id = alpha_state(&mut doc, HIGHLIGHT_ALPHA);
    let gs = register_resource(&mut doc, target, "ExtGState", "HlGS", Object::Reference(gs_id))?;

    let (r, g, b) = options.color.rgb();
    let ops = vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(gs.into_bytes())]),
        Operation::new(
            "rg",
            vec![Object::Real(r), Object::Real(g), Object::Real(b)],
        ),
        Operation::new(
            "re",
            vec![
                Object::Real(options.x),
                Object::Real(options.y),
                Object::Real(options.width),
                Object::Real(options.height),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ];
    append_content(&mut doc, target, ops)?;

    save_document(&mut doc)
}
