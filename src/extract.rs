//! PDF text extraction.
//!
//! Uploads arrive as raw bytes; this module turns them into plain UTF-8 text
//! plus a page count. Malformed input is reported as an [`ExtractError`],
//! never a panic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Text and page count pulled out of a PDF.
#[derive(Debug, Clone)]
pub struct ExtractedPdf {
    pub text: String,
    pub page_count: usize,
}

/// Extracts all page text from an in-memory PDF.
///
/// Each non-blank page contributes its text followed by a newline; blank
/// pages still count toward `page_count`.
pub fn extract_pdf(bytes: &[u8]) -> Result<ExtractedPdf, ExtractError> {
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked on malformed input".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    Ok(ExtractedPdf {
        text: join_pages(&pages),
        page_count: pages.len(),
    })
}

fn join_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for page in pages {
        if page.is_empty() {
            continue;
        }
        text.push_str(page);
        text.push('\n');
    }
    text
}
