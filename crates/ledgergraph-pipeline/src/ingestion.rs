//! Document ingestion: validation, blob persistence, id assignment.

use std::path::{Path, PathBuf};

use ledgergraph::ids;
use ledgergraph::models::Document;
use ledgergraph::{Error, Result};

/// Media types the pipeline accepts for upload.
const ACCEPTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.text",
    "application/vnd.oasis.opendocument.presentation",
    "image/jpeg",
    "image/png",
    "application/zip",
    "application/x-zip-compressed",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/csv",
];

/// Validates and persists uploaded documents.
pub struct Ingestor {
    upload_dir: PathBuf,
    max_upload_size: u64,
}

impl Ingestor {
    pub fn new(upload_dir: impl Into<PathBuf>, max_upload_size: u64) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_upload_size,
        }
    }

    /// Validate the upload, write the blob atomically under
    /// `{id}.{ext}` and return the Document with status `uploaded`.
    pub async fn ingest(
        &self,
        content: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<Document> {
        if !ACCEPTED_MIME_TYPES.contains(&mime_type) {
            return Err(Error::validation(format!(
                "Unsupported file type: {mime_type}"
            )));
        }
        let size = content.len() as u64;
        if size > self.max_upload_size {
            return Err(Error::validation(format!(
                "File too large: {size} bytes (max: {})",
                self.max_upload_size
            )));
        }

        let document_id = ids::document_id();
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let blob_path = self.upload_dir.join(format!("{document_id}.{extension}"));

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        // Write-then-rename keeps a crashed upload from leaving a partial
        // blob under the final name.
        let tmp_path = blob_path.with_extension(format!("{extension}.tmp"));
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &blob_path).await?;

        tracing::info!(
            document_id = %document_id,
            filename,
            size,
            "document ingested"
        );
        Ok(Document::new(
            document_id,
            filename.to_string(),
            blob_path.to_string_lossy().into_owned(),
            size,
            mime_type.to_string(),
        ))
    }

    /// Remove a document's blob. Missing blobs are not an error.
    pub async fn delete_blob(&self, file_path: &str) -> Result<()> {
        match tokio::fs::remove_file(file_path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgergraph::models::DocumentStatus;

    #[tokio::test]
    async fn valid_upload_writes_blob_and_assigns_id() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Ingestor::new(dir.path(), 1024);
        let document = ingestor
            .ingest(b"%PDF-1.4 test", "q4.pdf", "application/pdf")
            .await
            .unwrap();

        assert!(document.id.starts_with("doc_"));
        assert_eq!(document.status, DocumentStatus::Uploaded);
        assert_eq!(document.file_size, 13);
        assert!(document.file_path.ends_with(".pdf"));
        assert!(std::path::Path::new(&document.file_path).exists());
    }

    #[tokio::test]
    async fn unsupported_media_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Ingestor::new(dir.path(), 1024);
        let err = ingestor
            .ingest(b"binary", "tool.exe", "application/x-msdownload")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn size_boundary_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Ingestor::new(dir.path(), 8);

        // Exactly the limit succeeds.
        assert!(ingestor
            .ingest(b"12345678", "ok.csv", "text/csv")
            .await
            .is_ok());
        // One byte more fails validation.
        let err = ingestor
            .ingest(b"123456789", "big.csv", "text/csv")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
