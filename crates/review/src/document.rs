use std::fmt;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use scholarsight_llm::InlineDocument;
use snafu::{OptionExt, ResultExt, ensure};

use crate::error::{DecodePayloadSnafu, IngestResult, TooLargeSnafu, UnsupportedTypeSnafu};

pub const MAX_FILE_SIZE_MB: usize = 10;
const BYTES_PER_MB: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type.trim() {
            "application/pdf" => Some(Self::Pdf),
            "text/plain" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Best-effort MIME type from the file extension; unknown extensions map
    /// to `application/octet-stream` so validation rejects them.
    pub fn mime_for_path(path: &Path) -> &'static str {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => Self::Pdf.mime_type(),
            Some("txt") => Self::PlainText.mime_type(),
            _ => "application/octet-stream",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::PlainText => "text/plain",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.mime_type())
    }
}

/// A validated upload, encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub data: String,
    pub size: usize,
}

impl UploadedDocument {
    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    pub fn decode(&self) -> IngestResult<Vec<u8>> {
        general_purpose::STANDARD
            .decode(&self.data)
            .context(DecodePayloadSnafu {
                stage: "decode-document-payload",
            })
    }

    pub fn to_inline(&self) -> InlineDocument {
        InlineDocument::new(self.mime_type(), self.data.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentIngestor {
    max_size_mb: usize,
}

impl Default for DocumentIngestor {
    fn default() -> Self {
        Self::new(MAX_FILE_SIZE_MB)
    }
}

impl DocumentIngestor {
    pub fn new(max_size_mb: usize) -> Self {
        Self { max_size_mb }
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Validates size first, then type, and base64-encodes the bytes.
    pub fn ingest(
        &self,
        name: impl Into<String>,
        bytes: &[u8],
        mime_type: &str,
    ) -> IngestResult<UploadedDocument> {
        let name = name.into();

        ensure!(
            bytes.len() <= self.max_size_bytes(),
            TooLargeSnafu {
                stage: "validate-document-size",
                size: bytes.len(),
                max_mb: self.max_size_mb,
            }
        );

        let kind = DocumentKind::from_mime(mime_type).context(UnsupportedTypeSnafu {
            stage: "validate-document-type",
            mime_type,
        })?;

        tracing::debug!(name = %name, kind = %kind, size = bytes.len(), "document accepted");

        Ok(UploadedDocument {
            name,
            kind,
            data: general_purpose::STANDARD.encode(bytes),
            size: bytes.len(),
        })
    }

    pub fn ingest_path(&self, path: &Path, bytes: &[u8]) -> IngestResult<UploadedDocument> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.ingest(name, bytes, DocumentKind::mime_for_path(path))
    }
}
