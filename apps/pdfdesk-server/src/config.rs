//! Command-line and environment configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pdfdesk_core::{PdfiumRasterizer, TesseractCli, Toolbox};

/// Base64 inflates uploads by 4/3; leave room for the JSON around them
const ENVELOPE_SLACK_BYTES: usize = 64 * 1024;

/// Command-line arguments for the pdfdesk server
#[derive(Parser, Debug, Clone)]
#[command(name = "pdfdesk-server")]
#[command(about = "Single-page PDF tool panel: merge, split, rotate, compress and more")]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, env = "PDFDESK_PORT", default_value = "3000")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "PDFDESK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Largest accepted upload, in megabytes
    #[arg(long, env = "PDFDESK_MAX_UPLOAD_MB", default_value = "50")]
    pub max_upload_mb: usize,

    /// Minutes before an idle session's cached result is dropped
    #[arg(long, env = "PDFDESK_SESSION_IDLE_MINUTES", default_value = "30")]
    pub session_idle_minutes: u64,

    /// Directory containing the pdfium shared library
    #[arg(long, env = "PDFDESK_PDFIUM_DIR")]
    pub pdfium_dir: Option<PathBuf>,

    /// tesseract executable used for scanned invoices
    #[arg(long, env = "PDFDESK_TESSERACT_BIN", default_value = "tesseract")]
    pub tesseract_bin: String,

    /// tesseract language pack
    #[arg(long, env = "PDFDESK_OCR_LANG", default_value = "eng")]
    pub ocr_lang: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn body_limit(&self) -> usize {
        self.max_upload_mb * 1024 * 1024 * 4 / 3 + ENVELOPE_SLACK_BYTES
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_minutes * 60)
    }

    pub fn toolbox(&self) -> Toolbox {
        Toolbox::new(
            Arc::new(PdfiumRasterizer::new(self.pdfium_dir.clone())),
            Arc::new(TesseractCli::new(&self.tesseract_bin, &self.ocr_lang)),
        )
    }
}
