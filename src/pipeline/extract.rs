//! PDF → text via the pdfium text layer.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and does CPU-heavy work while parsing. The whole load-and-extract
//! cycle runs on the blocking pool so Tokio worker threads never stall.
//!
//! ## Binding
//!
//! The library is located in this order:
//! 1. `PDFIUM_LIB_PATH` (a file, or a directory holding the platform library)
//! 2. the platform library name in the working directory
//! 3. the system library search path

use super::{cleanup, PdfExtractor};
use crate::error::PipelineError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Extracts the embedded text of every page with pdfium.
///
/// Scanned PDFs without a text layer produce an empty string, which the
/// action boundary reports as a failed conversion.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    password: Option<String>,
}

impl PdfiumExtractor {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }
}

#[async_trait]
impl PdfExtractor for PdfiumExtractor {
    async fn extract(&self, pdf_base64: &str) -> Result<String, PipelineError> {
        let bytes = STANDARD
            .decode(pdf_base64.trim())
            .map_err(|e| PipelineError::InvalidBase64(e.to_string()))?;
        check_pdf_magic(&bytes)?;
        debug!("Extracting text from {} byte PDF", bytes.len());

        let password = self.password.clone();
        let raw = tokio::task::spawn_blocking(move || {
            extract_text_blocking(&bytes, password.as_deref())
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("Extraction task panicked: {}", e)))??;

        Ok(cleanup::clean_extracted_text(&raw))
    }
}

/// Reject anything that does not start with `%PDF`.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), PipelineError> {
    if bytes.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(PipelineError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        })
    }
}

fn bind_pdfium() -> Result<Pdfium, PipelineError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => {
            let path = PathBuf::from(path);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| PipelineError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of text extraction.
fn extract_text_blocking(bytes: &[u8], password: Option<&str>) -> Result<String, PipelineError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| PipelineError::CorruptPdf(format!("{:?}", e)))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        match page.text() {
            Ok(text) => texts.push(text.all()),
            Err(e) => warn!("Page {}: no text layer ({:?})", idx + 1, e),
        }
    }

    Ok(texts.join("\n\n"))
}
