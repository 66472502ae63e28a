//! Minimal XLSX writer
//!
//! Produces a single-sheet SpreadsheetML package with inline strings, which
//! every spreadsheet application opens without a shared-strings table.

use crate::error::PdfDeskError;
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use std::borrow::Cow;
use std::io::{Cursor, Write};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn xml_writer() -> Result<XmlWriter, PdfDeskError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    Ok(writer)
}

/// Drop characters XML 1.0 cannot carry (OCR output often has form feeds)
fn xml_safe(value: &str) -> Cow<'_, str> {
    let allowed = |c: char| (c as u32) >= 0x20 || matches!(c, '\t' | '\n' | '\r');
    if value.chars().all(allowed) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(value.chars().filter(|&c| allowed(c)).collect())
    }
}

fn workbook_xml(sheet_name: &str) -> Result<Vec<u8>, PdfDeskError> {
    let mut writer = xml_writer()?;

    let mut workbook = BytesStart::new("workbook");
    workbook.push_attribute(("xmlns", SPREADSHEET_NS));
    workbook.push_attribute(("xmlns:r", RELATIONSHIPS_NS));
    writer.write_event(Event::Start(workbook))?;
    writer.write_event(Event::Start(BytesStart::new("sheets")))?;

    let name = xml_safe(sheet_name);
    let mut sheet = BytesStart::new("sheet");
    sheet.push_attribute(("name", name.as_ref()));
    sheet.push_attribute(("sheetId", "1"));
    sheet.push_attribute(("r:id", "rId1"));
    writer.write_event(Event::Empty(sheet))?;

    writer.write_event(Event::End(BytesEnd::new("sheets")))?;
    writer.write_event(Event::End(BytesEnd::new("workbook")))?;
    Ok(writer.into_inner().into_inner())
}

/// Spreadsheet column name for a 0-indexed column: 0 -> A, 25 -> Z, 26 -> AA
pub fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn sheet_xml(rows: &[Vec<Cell>]) -> Result<Vec<u8>, PdfDeskError> {
    let mut writer = xml_writer()?;

    let mut worksheet = BytesStart::new("worksheet");
    worksheet.push_attribute(("xmlns", SPREADSHEET_NS));
    writer.write_event(Event::Start(worksheet))?;
    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;

    for (r, row) in rows.iter().enumerate() {
        let row_number = (r + 1).to_string();
        let mut row_elem = BytesStart::new("row");
        row_elem.push_attribute(("r", row_number.as_str()));
        writer.write_event(Event::Start(row_elem))?;

        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(c), row_number);
            match cell {
                Cell::Text(text) => {
                    let mut cell_elem = BytesStart::new("c");
                    cell_elem.push_attribute(("r", reference.as_str()));
                    cell_elem.push_attribute(("t", "inlineStr"));
                    writer.write_event(Event::Start(cell_elem))?;
                    writer.write_event(Event::Start(BytesStart::new("is")))?;

                    let mut t = BytesStart::new("t");
                    t.push_attribute(("xml:space", "preserve"));
                    writer.write_event(Event::Start(t))?;
                    writer.write_event(Event::Text(BytesText::new(&xml_safe(text))))?;
                    writer.write_event(Event::End(BytesEnd::new("t")))?;

                    writer.write_event(Event::End(BytesEnd::new("is")))?;
                    writer.write_event(Event::End(BytesEnd::new("c")))?;
                }
                Cell::Number(value) if value.is_finite() => {
                    let mut cell_elem = BytesStart::new("c");
                    cell_elem.push_attribute(("r", reference.as_str()));
                    writer.write_event(Event::Start(cell_elem))?;
                    writer.write_event(Event::Start(BytesStart::new("v")))?;
                    writer.write_event(Event::Text(BytesText::new(&value.to_string())))?;
                    writer.write_event(Event::End(BytesEnd::new("v")))?;
                    writer.write_event(Event::End(BytesEnd::new("c")))?;
                }
                Cell::Number(_) | Cell::Empty => {}
            }
        }

        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(writer.into_inner().into_inner())
}

/// Write a one-sheet workbook
pub fn write_workbook(sheet_name: &str, rows: &[Vec<Cell>]) -> Result<Vec<u8>, PdfDeskError> {
    let parts: [(&str, Vec<u8>); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes().to_vec()),
        ("_rels/.rels", ROOT_RELS.as_bytes().to_vec()),
        ("xl/workbook.xml", workbook_xml(sheet_name)?),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes().to_vec()),
        ("xl/worksheets/sheet1.xml", sheet_xml(rows)?),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(&body)?;
    }

    Ok(zip.finish()?.into_inner())
}
