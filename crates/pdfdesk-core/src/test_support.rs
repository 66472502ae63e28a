//! Fixture PDFs shared by the unit tests

use crate::document::{media_box, page_id};
use crate::error::PdfDeskError;
use crate::ocr::OcrEngine;
use crate::render::{Rasterizer, RenderedPage};
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::{
    content::{Content, Operation},
    dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat,
};

fn page_content(text: &str) -> Vec<u8> {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
            Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
            Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ],
    };
    content.encode().unwrap()
}

fn helvetica(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Create a PDF with N letter-size pages whose text reads "<prefix>-Page-<n>"
pub fn create_test_pdf(num_pages: u32, content_prefix: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = helvetica(&mut doc);

    let mut page_ids = Vec::new();
    for i in 0..num_pages {
        let text = format!("{}-Page-{}", content_prefix, i + 1);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), page_content(&text)));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        });
        page_ids.push(Object::Reference(page_id));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => Object::Integer(num_pages as i64),
        "Kids" => page_ids,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Two A4 pages under an intermediate `Pages` node that carries MediaBox,
/// Rotate and Resources for its kids.
pub fn create_nested_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let root_id = doc.new_object_id();
    let middle_id = doc.new_object_id();
    let font_id = helvetica(&mut doc);

    let mut kids = Vec::new();
    for i in 0..2 {
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            page_content(&format!("Nested-Page-{}", i + 1)),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(middle_id),
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        middle_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Parent" => Object::Reference(root_id),
            "Kids" => kids,
            "Count" => 2,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Rotate" => 90,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        }),
    );
    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(middle_id)],
            "Count" => 2,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(root_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Overwrite each page's MediaBox with the matching entry of `boxes`, as written
pub fn with_media_boxes(bytes: &[u8], boxes: &[[f32; 4]]) -> Vec<u8> {
    let mut doc = Document::load_mem(bytes).unwrap();
    let ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for (id, rect) in ids.into_iter().zip(boxes) {
        let rect: Vec<Object> = rect.iter().map(|v| Object::Real(*v)).collect();
        doc.get_dictionary_mut(id)
            .unwrap()
            .set("MediaBox", Object::Array(rect));
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Decoded content of every page, in page order
pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
        .collect()
}

/// Page markers ("<prefix>-Page-<n>") in page order
pub fn page_markers(bytes: &[u8]) -> Vec<String> {
    page_texts(bytes)
        .iter()
        .map(|content| {
            let start = content.find('(').map(|i| i + 1).unwrap_or(0);
            let end = content[start..]
                .find(')')
                .map(|i| start + i)
                .unwrap_or(content.len());
            content[start..end].to_string()
        })
        .collect()
}

/// Renders every page as a blank white bitmap sized from its MediaBox
pub struct FakeRasterizer;

impl Rasterizer for FakeRasterizer {
    fn render(&self, pdf: &[u8], pages: &[u32], dpi: u32) -> Result<Vec<RenderedPage>, PdfDeskError> {
        let doc = Document::load_mem(pdf)?;
        let scale = dpi as f32 / 72.0;
        pages
            .iter()
            .map(|&page| {
                let id = page_id(&doc, page)?;
                let [x0, y0, x1, y1] = media_box(&doc, id);
                let width = ((x1 - x0) * scale).round() as u32;
                let height = ((y1 - y0) * scale).round() as u32;
                Ok(RenderedPage {
                    page,
                    image: DynamicImage::ImageRgb8(RgbImage::from_pixel(
                        width,
                        height,
                        Rgb([255, 255, 255]),
                    )),
                })
            })
            .collect()
    }
}

/// Behaves like a host without the pdfium library
pub struct MissingRasterizer;

impl Rasterizer for MissingRasterizer {
    fn render(&self, _: &[u8], _: &[u32], _: u32) -> Result<Vec<RenderedPage>, PdfDeskError> {
        Err(PdfDeskError::MissingDependency {
            name: "pdfium",
            hint: "not installed in tests".into(),
        })
    }
}

/// Returns canned text for every image
pub struct FakeOcr(pub String);

impl OcrEngine for FakeOcr {
    fn recognize(&self, _: &DynamicImage) -> Result<String, PdfDeskError> {
        Ok(self.0.clone())
    }
}

/// Behaves like a host without tesseract
pub struct MissingOcr;

impl OcrEngine for MissingOcr {
    fn recognize(&self, _: &DynamicImage) -> Result<String, PdfDeskError> {
        Err(PdfDeskError::MissingDependency {
            name: "tesseract",
            hint: "not installed in tests".into(),
        })
    }
}
