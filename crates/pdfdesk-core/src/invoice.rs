//! Invoice field extraction
//!
//! Each field has an ordered list of rules; the first rule that yields a
//! value wins. Early rules are labelled patterns ("Invoice No: ..."), later
//! ones fall back to positional heuristics over the whole text.

use crate::error::PdfDeskError;
use crate::ocr::OcrEngine;
use crate::render::Rasterizer;
use crate::sheet::{write_workbook, Cell};
use lazy_static::lazy_static;
use pdf_extract::extract_text_from_mem;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Pages are rendered at this resolution before OCR
pub const OCR_DPI: u32 = 300;

/// GSTIN: 2-digit state code, PAN, entity code, 'Z', check character
const GSTIN: &str = r"\d{2}[A-Z]{5}\d{4}[A-Z][0-9A-Z]Z[0-9A-Z]";

/// Optional currency marker before an amount
const CURRENCY: &str = r"(?:Rs\.?|INR|₹)?\s*";

/// Amount with optional thousands separators and decimals
const AMOUNT: &str = r"(\d[\d,]*(?:\.\d+)?)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceField {
    InvoiceNumber,
    InvoiceDate,
    SellerGstin,
    BuyerGstin,
    BuyerName,
    PoNumber,
    VehicleNumber,
    HsnCode,
    Quantity,
    Rate,
    TaxableValue,
    Cgst,
    Sgst,
    Igst,
    TotalAmount,
}

impl InvoiceField {
    /// Column order of the spreadsheet
    pub const ALL: [InvoiceField; 15] = [
        InvoiceField::InvoiceNumber,
        InvoiceField::InvoiceDate,
        InvoiceField::SellerGstin,
        InvoiceField::BuyerGstin,
        InvoiceField::BuyerName,
        InvoiceField::PoNumber,
        InvoiceField::VehicleNumber,
        InvoiceField::HsnCode,
        InvoiceField::Quantity,
        InvoiceField::Rate,
        InvoiceField::TaxableValue,
        InvoiceField::Cgst,
        InvoiceField::Sgst,
        InvoiceField::Igst,
        InvoiceField::TotalAmount,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            InvoiceField::InvoiceNumber => "Invoice No",
            InvoiceField::InvoiceDate => "Invoice Date",
            InvoiceField::SellerGstin => "Seller GSTIN",
            InvoiceField::BuyerGstin => "Buyer GSTIN",
            InvoiceField::BuyerName => "Buyer Name",
            InvoiceField::PoNumber => "PO No",
            InvoiceField::VehicleNumber => "Vehicle No",
            InvoiceField::HsnCode => "HSN Code",
            InvoiceField::Quantity => "Quantity",
            InvoiceField::Rate => "Rate",
            InvoiceField::TaxableValue => "Taxable Value",
            InvoiceField::Cgst => "CGST",
            InvoiceField::Sgst => "SGST",
            InvoiceField::Igst => "IGST",
            InvoiceField::TotalAmount => "Total Amount",
        }
    }

    /// Written to the spreadsheet as a number when it parses as one
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            InvoiceField::Quantity
                | InvoiceField::Rate
                | InvoiceField::TaxableValue
                | InvoiceField::Cgst
                | InvoiceField::Sgst
                | InvoiceField::Igst
                | InvoiceField::TotalAmount
        )
    }
}

enum Rule {
    /// First capture group of the first match
    Text(Regex),
    /// Like `Text`, but skips percentages and strips thousands separators
    Amount(Regex),
    /// The n-th distinct GSTIN in reading order
    NthGstin(usize),
    /// A 4-8 digit code on the lines below an "HSN" column header
    HsnNearHeader,
    /// The n-th number after the HSN code on its line (qty, rate, amount)
    LineItem(usize),
    /// The largest two-decimal amount anywhere in the text
    LargestAmount,
}

fn text(pattern: &str) -> Rule {
    Rule::Text(Regex::new(pattern).unwrap())
}

fn amount(label: &str) -> Rule {
    Rule::Amount(Regex::new(&format!(r"{}\s*[:\-]?\s*{}{}", label, CURRENCY, AMOUNT)).unwrap())
}

lazy_static! {
    static ref GSTIN_PATTERN: Regex = Regex::new(&format!(r"\b({})\b", GSTIN)).unwrap();

    static ref NUMBER_TOKEN: Regex = Regex::new(r"^\d[\d,]*(?:\.\d+)?$").unwrap();

    static ref MONEY_PATTERN: Regex = Regex::new(r"\b\d{1,3}(?:,\d{2,3})*\.\d{2}\b|\b\d+\.\d{2}\b").unwrap();

    static ref HSN_CODE: Regex = Regex::new(r"^\d{4,8}$").unwrap();

    /// Rules per field, in evaluation order. Order matters: later rules are
    /// broader and only run when the narrower ones found nothing.
    static ref RULES: Vec<(InvoiceField, Vec<Rule>)> = vec![
        (InvoiceField::InvoiceNumber, vec![
            text(r"(?i)invoice\s*(?:no|number|#)\.?\s*[:\-]?\s*([A-Z0-9][A-Z0-9/\-]*\d[A-Z0-9/\-]*)"),
            text(r"(?i)\binv\.?\s*no\.?\s*[:\-]?\s*([A-Z0-9][A-Z0-9/\-]*)"),
            text(r"(?i)\bbill\s*no\.?\s*[:\-]?\s*([A-Z0-9][A-Z0-9/\-]*)"),
        ]),
        (InvoiceField::InvoiceDate, vec![
            text(r"(?i)invoice\s*date\s*[:\-]?\s*(\d{1,2}[./\-]\d{1,2}[./\-]\d{2,4})"),
            text(r"(?i)invoice\s*date\s*[:\-]?\s*(\d{1,2}[\s\-][A-Za-z]{3,9}[\s\-,]+\d{2,4})"),
            text(r"(?i)\bdated?\s*[:\-]?\s*(\d{1,2}[./\-]\d{1,2}[./\-]\d{2,4})"),
            text(r"\b(\d{1,2}[./\-]\d{1,2}[./\-]\d{4})\b"),
        ]),
        (InvoiceField::SellerGstin, vec![
            text(&format!(r"(?s)(?i:seller|supplier|sold\s+by)\b.{{0,200}}?\b({})\b", GSTIN)),
            Rule::NthGstin(0),
        ]),
        (InvoiceField::BuyerGstin, vec![
            text(&format!(r"(?s)(?i:buyer|bill(?:ed)?\s+to|consignee|recipient)\b.{{0,200}}?\b({})\b", GSTIN)),
            Rule::NthGstin(1),
        ]),
        (InvoiceField::BuyerName, vec![
            text(r"(?im)^\s*(?:buyer|bill(?:ed)?\s+to|consignee)\s*(?:\([^)\n]*\))?\s*[:\-]\s*([A-Za-z][A-Za-z0-9 .,&'\-]{2,})$"),
            text(r"(?im)^\s*(?:buyer|bill(?:ed)?\s+to|consignee)[^\n]*\n\s*(?:M/s\.?\s*)?([A-Za-z][A-Za-z0-9 .,&'\-]{2,})$"),
            text(r"(?i)\bM/s\.?\s+([A-Za-z][A-Za-z0-9 .,&'\-]{2,})"),
        ]),
        (InvoiceField::PoNumber, vec![
            text(r"(?i)(?:\bP\.?\s*O\.?|purchase\s+order|buyer'?s\s+order)\s*(?:no|number|#)?\.?\s*[:\-]?\s*([A-Z0-9][A-Z0-9/\-]*\d[A-Z0-9/\-]*)"),
        ]),
        (InvoiceField::VehicleNumber, vec![
            text(r"(?i)vehicle\s*(?:no|number)?\.?\s*[:\-]?\s*([A-Z]{2}[\s\-]?\d{1,2}[\s\-]?[A-Z]{0,3}[\s\-]?\d{4})"),
            text(r"\b([A-Z]{2}[\s\-]?\d{2}[\s\-]?[A-Z]{1,3}[\s\-]?\d{4})\b"),
        ]),
        (InvoiceField::HsnCode, vec![
            text(r"(?i)\bHSN(?:/SAC)?\s*(?:code)?\s*[:\-]\s*(\d{4,8})\b"),
            Rule::HsnNearHeader,
        ]),
        (InvoiceField::Quantity, vec![
            amount(r"(?i)\b(?:qty|quantity)"),
            Rule::LineItem(0),
        ]),
        (InvoiceField::Rate, vec![
            Rule::Amount(Regex::new(&format!(r"(?i)\b(?:unit\s+price|rate)\s*[:\-]\s*{}{}", CURRENCY, AMOUNT)).unwrap()),
            Rule::LineItem(1),
        ]),
        (InvoiceField::TaxableValue, vec![
            amount(r"(?i)taxable\s*(?:value|amount|amt)"),
            amount(r"(?i)sub\s*-?\s*total"),
            Rule::LineItem(2),
        ]),
        (InvoiceField::Cgst, vec![
            amount(r"(?i)\bCGST\s*(?:@\s*[\d.]+\s*%)?"),
        ]),
        (InvoiceField::Sgst, vec![
            amount(r"(?i)\b(?:SGST|UTGST)\s*(?:@\s*[\d.]+\s*%)?"),
        ]),
        (InvoiceField::Igst, vec![
            amount(r"(?i)\bIGST\s*(?:@\s*[\d.]+\s*%)?"),
        ]),
        (InvoiceField::TotalAmount, vec![
            amount(r"(?i)(?:grand\s+total|total\s+amount|invoice\s+total|total\s+invoice\s+value|amount\s+payable|net\s+amount)\s*(?:\([^)\n]*\))?"),
            amount(r"(?im)^\s*total"),
            Rule::LargestAmount,
        ]),
    ];
}

/// Strip thousands separators
fn normalize_amount(raw: &str) -> String {
    raw.replace(',', "").trim_end_matches('.').to_string()
}

/// Distinct GSTINs in reading order
fn gstins(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in GSTIN_PATTERN.captures_iter(text) {
        let value = cap[1].to_string();
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

fn hsn_near_header(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let header = lines
        .iter()
        .position(|line| line.to_ascii_uppercase().contains("HSN"))?;

    lines[header..]
        .iter()
        .take(6)
        .flat_map(|line| line.split_whitespace())
        .find(|token| HSN_CODE.is_match(token))
        .map(|token| token.to_string())
}

/// Numbers after the HSN code on the line that contains it; percentages skipped
fn line_item_numbers(text: &str, hsn: &str) -> Vec<String> {
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let Some(pos) = tokens.iter().position(|t| *t == hsn) {
            return tokens[pos + 1..]
                .iter()
                .filter(|t| NUMBER_TOKEN.is_match(t))
                .map(|t| normalize_amount(t))
                .collect();
        }
    }
    Vec::new()
}

fn largest_amount(text: &str) -> Option<String> {
    MONEY_PATTERN
        .find_iter(text)
        .filter_map(|m| {
            let normalized = normalize_amount(m.as_str());
            normalized.parse::<f64>().ok().map(|value| (value, normalized))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, normalized)| normalized)
}

fn first_amount(pattern: &Regex, text: &str) -> Option<String> {
    pattern.captures_iter(text).find_map(|cap| {
        let m = cap.get(1)?;
        if text[m.end()..].trim_start().starts_with('%') {
            return None;
        }
        Some(normalize_amount(m.as_str()))
    })
}

/// Apply every field's rules to `text`
pub fn extract_fields(text: &str) -> BTreeMap<InvoiceField, String> {
    let all_gstins = gstins(text);
    let mut fields: BTreeMap<InvoiceField, String> = BTreeMap::new();

    for (field, rules) in RULES.iter() {
        let value = rules.iter().find_map(|rule| {
            let found = match rule {
                Rule::Text(pattern) => pattern
                    .captures(text)
                    .and_then(|cap| cap.get(1))
                    .map(|m| m.as_str().trim().to_string()),
                Rule::Amount(pattern) => first_amount(pattern, text),
                Rule::NthGstin(n) => all_gstins.get(*n).cloned(),
                Rule::HsnNearHeader => hsn_near_header(text),
                Rule::LineItem(n) => fields
                    .get(&InvoiceField::HsnCode)
                    .and_then(|hsn| line_item_numbers(text, hsn).into_iter().nth(*n)),
                Rule::LargestAmount => largest_amount(text),
            };
            found.filter(|v| !v.is_empty())
        });

        if let Some(value) = value {
            debug!(field = ?field, %value, "matched");
            fields.insert(*field, value);
        }
    }

    fields
}

/// One row of the output sheet
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceRecord {
    pub source: String,
    pub fields: BTreeMap<InvoiceField, String>,
    pub used_ocr: bool,
}

/// Too little extractable text means a scan
pub fn looks_scanned(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.chars().count() < 50 || trimmed.chars().filter(|c| !c.is_whitespace()).count() < 20
}

/// Text layer of the PDF, or OCR output when the PDF looks scanned
pub fn invoice_text(
    bytes: &[u8],
    rasterizer: &dyn Rasterizer,
    ocr: &dyn OcrEngine,
) -> Result<(String, bool), PdfDeskError> {
    let page_count = crate::document::get_page_count(bytes)?;

    // pdf-extract panics on some malformed font programs
    let text = match std::panic::catch_unwind(|| extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "text layer unreadable, falling back to OCR");
            String::new()
        }
        Err(_) => {
            warn!("text extraction panicked, falling back to OCR");
            String::new()
        }
    };
    if !looks_scanned(&text) {
        return Ok((text, false));
    }

    info!(pages = page_count, "document looks scanned, running OCR");
    let pages: Vec<u32> = (1..=page_count).collect();
    let mut recognized = String::new();
    for rendered in rasterizer.render(bytes, &pages, OCR_DPI)? {
        recognized.push_str(&ocr.recognize(&rendered.image)?);
        recognized.push('\n');
    }
    Ok((recognized, true))
}

/// Extract fields from every invoice
pub fn extract_invoices(
    files: &[(String, Vec<u8>)],
    rasterizer: &dyn Rasterizer,
    ocr: &dyn OcrEngine,
) -> Result<Vec<InvoiceRecord>, PdfDeskError> {
    if files.is_empty() {
        return Err(PdfDeskError::InvalidInput(
            "Please upload at least one invoice PDF".into(),
        ));
    }

    files
        .iter()
        .map(|(name, bytes)| {
            let (text, used_ocr) = invoice_text(bytes, rasterizer, ocr).map_err(|e| match e {
                PdfDeskError::ParseError(msg) => PdfDeskError::ParseError(format!("{}: {}", name, msg)),
                other => other,
            })?;
            let fields = extract_fields(&text);
            info!(file = %name, found = fields.len(), used_ocr, "invoice processed");
            Ok(InvoiceRecord {
                source: name.clone(),
                fields,
                used_ocr,
            })
        })
        .collect()
}

/// Header row plus one row per invoice
pub fn invoice_workbook(records: &[InvoiceRecord]) -> Result<Vec<u8>, PdfDeskError> {
    let mut rows = Vec::with_capacity(records.len() + 1);

    let mut header = vec![Cell::Text("Source File".into())];
    header.extend(InvoiceField::ALL.iter().map(|f| Cell::Text(f.label().into())));
    rows.push(header);

    for record in records {
        let mut row = vec![Cell::Text(record.source.clone())];
        row.extend(InvoiceField::ALL.iter().map(|field| {
            match record.fields.get(field) {
                Some(value) if field.is_numeric() => value
                    .parse::<f64>()
                    .map(Cell::Number)
                    .unwrap_or_else(|_| Cell::Text(value.clone())),
                Some(value) => Cell::Text(value.clone()),
                None => Cell::Empty,
            }
        }));
        rows.push(row);
    }

    write_workbook("Invoices", &rows)
}
