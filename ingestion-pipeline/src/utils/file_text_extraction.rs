use common::error::AppError;

/// Text indexed for an uploaded document that yields no text layer.
pub const EMPTY_EXTRACTION_PLACEHOLDER: &str = "No text could be extracted from this document.";

/// Upload formats accepted for document ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    /// Detects the format from the declared content type, falling back to the file extension.
    pub fn detect(file_name: &str, content_type: Option<&str>) -> Option<Self> {
        let content_type = content_type.map(str::to_ascii_lowercase);
        match content_type.as_deref() {
            Some("application/pdf") => return Some(Self::Pdf),
            Some(ct) if ct.starts_with("text/plain") || ct.starts_with("text/markdown") => {
                return Some(Self::PlainText)
            }
            _ => {}
        }

        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if lower.ends_with(".txt") || lower.ends_with(".md") {
            Some(Self::PlainText)
        } else {
            None
        }
    }
}

/// Extracts text from an upload. PDF pages are separated by `--- Page N ---` markers.
pub async fn extract_text(kind: DocumentKind, bytes: Vec<u8>) -> Result<String, AppError> {
    let text = match kind {
        DocumentKind::PlainText => String::from_utf8_lossy(&bytes).trim().to_string(),
        DocumentKind::Pdf => {
            let pages = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem_by_pages(&bytes)
            })
            .await?
            .map_err(|err| AppError::Processing(format!("Failed to extract text from PDF: {err}")))?;

            pages
                .iter()
                .enumerate()
                .filter(|(_, page)| !page.trim().is_empty())
                .map(|(idx, page)| format!("--- Page {} ---\n{}", idx.saturating_add(1), page.trim()))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };

    if text.trim().is_empty() {
        return Ok(EMPTY_EXTRACTION_PLACEHOLDER.to_string());
    }

    Ok(text)
}
