use super::TextExtractor;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// [`TextExtractor`] backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_sync(path: PathBuf) -> Result<Vec<String>> {
        let bytes = std::fs::read(&path)?;
        pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| {
            tracing::error!("Failed to extract text from {}: {}", path.display(), e);
            Error::Pdf(format!("{}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn page_texts(&self, path: &Path) -> Result<Vec<String>> {
        let pages = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            move || Self::extract_sync(path)
        })
        .await
        .map_err(|e| Error::Invariant(format!("PDF extraction task join error: {}", e)))??;

        tracing::debug!("Extracted {} pages from {}", pages.len(), path.display());
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::concat_pages;

    /// Minimal PDF with one line of Helvetica text per page.
    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let first_page = 4;
        let kids: Vec<String> = (0..pages.len())
            .map(|i| format!("{} 0 R", first_page + i))
            .collect();

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                pages.len()
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];
        for i in 0..pages.len() {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                first_page + pages.len() + i
            ));
        }
        for text in pages {
            let stream = format!("BT /F1 24 Tf 72 700 Td ({}) Tj ET", text);
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                stream.len(),
                stream
            ));
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }

        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .as_bytes(),
        );
        pdf
    }

    #[tokio::test]
    async fn test_extracts_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two-pages.pdf");
        std::fs::write(&path, pdf_with_pages(&["Alpha", "Bravo"])).unwrap();

        let pages = PdfTextExtractor::new().page_texts(&path).await.unwrap();

        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("Alpha"));
        assert!(pages[1].contains("Bravo"));

        let text = concat_pages(vec![pages]);
        let alpha = text.find("Alpha").unwrap();
        let bravo = text.find("Bravo").unwrap();
        assert!(alpha < bravo);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = PdfTextExtractor::new()
            .page_texts(Path::new("/no/such/document.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = PdfTextExtractor::new().page_texts(&path).await.unwrap_err();
        assert!(matches!(err, Error::Pdf(_)));
    }
}
