//! Text extraction for source documents.
//!
//! Turns raw bytes into an [`ExtractedDocument`] carrying both the
//! original-case display text and the normalized matching copy. PDF content
//! is extracted page by page so one unreadable page only costs that page;
//! the document is excluded only when every page fails. Plain text passes
//! through unchanged.

use tracing::debug;

use crate::error::ExtractError;
use crate::models::{DocumentDescriptor, ExtractedDocument};

/// Extract a document's text, dispatching on file extension.
pub fn extract_document(
    descriptor: &DocumentDescriptor,
    bytes: &[u8],
) -> Result<ExtractedDocument, ExtractError> {
    let (display_text, page_offsets, diagnostics) = if is_pdf(&descriptor.name) {
        extract_pdf_pages(descriptor, bytes)?
    } else {
        let text = String::from_utf8_lossy(bytes).into_owned();
        (text, vec![0], Vec::new())
    };

    if display_text.trim().is_empty() {
        return Err(ExtractError::EmptyText);
    }

    Ok(ExtractedDocument {
        document_id: descriptor.id.clone(),
        normalized_text: normalize(&display_text),
        display_text,
        page_offsets,
        diagnostics,
    })
}

fn is_pdf(name: &str) -> bool {
    name.rsplit('.')
        .next()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Extract a PDF page by page. Returns the concatenated text, the start
/// offset of each extracted page, and one diagnostic per skipped page.
fn extract_pdf_pages(
    descriptor: &DocumentDescriptor,
    bytes: &[u8],
) -> Result<(String, Vec<usize>, Vec<String>), ExtractError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractError::Unreadable(e.to_string()))?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(ExtractError::Unreadable("no pages".to_string()));
    }

    let mut text = String::new();
    let mut offsets = Vec::new();
    let mut diagnostics = Vec::new();

    for &page_number in pages.keys() {
        match doc.extract_text(&[page_number]) {
            Ok(page_text) => {
                if !text.is_empty() {
                    text.push('\n');
                }
                offsets.push(text.len());
                text.push_str(page_text.trim_end());
            }
            Err(e) => {
                debug!(document = %descriptor.id, page = page_number, error = %e, "skipping unreadable page");
                diagnostics.push(format!("page {}: {}", page_number, e));
            }
        }
    }

    if offsets.is_empty() {
        return Err(ExtractError::AllPagesFailed(pages.len()));
    }

    Ok((text, offsets, diagnostics))
}

/// Lower-case a text and fold punctuation into spaces, collapsing runs of
/// whitespace. This is the matching-side normalization shared by the index
/// builder and the scorer; display text is never passed through it.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let folded: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
