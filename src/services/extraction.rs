use crate::models::{ObjectReference, ReferenceError};
use crate::services::dicom::{MetadataParser, MetadataResult, ParseError};
use crate::services::staging::{StagingArea, StagingError, StagingFile};
use crate::services::storage::{FetchError, ObjectFetcher};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure categories callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed request or reference. Not retryable.
    Validation,
    /// Remote store unreachable, object missing, permission denied.
    Transfer,
    /// Downloaded bytes are not a valid DICOM file.
    MalformedFile,
    /// Valid DICOM using an encoding the parser does not implement.
    UnsupportedEncoding,
    /// Local resources (staging, worker threads) failed.
    Internal,
}

/// An extraction failure, tagged with the stage that produced it.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Validation(#[from] ReferenceError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Metadata parser stopped unexpectedly: {0}")]
    ParserTask(String),
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::Validation(_) => ErrorKind::Validation,
            ExtractionError::Fetch(FetchError::LocalWrite(_)) => ErrorKind::Internal,
            ExtractionError::Fetch(_) => ErrorKind::Transfer,
            ExtractionError::Parse(ParseError::MalformedFile(_)) => ErrorKind::MalformedFile,
            ExtractionError::Parse(ParseError::UnsupportedEncoding(_)) => {
                ErrorKind::UnsupportedEncoding
            }
            ExtractionError::Staging(_) | ExtractionError::ParserTask(_) => ErrorKind::Internal,
        }
    }

    /// Only transfer failures can succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractionError::Fetch(e) if e.is_transient())
    }

    pub fn stage(&self) -> &'static str {
        match self {
            ExtractionError::Validation(_) => "validate",
            ExtractionError::Staging(_) => "stage",
            ExtractionError::Fetch(_) => "fetch",
            ExtractionError::Parse(_) | ExtractionError::ParserTask(_) => "parse",
        }
    }
}

/// Fetches a remote DICOM object into a staging file and parses it.
///
/// Holds no per-request state, so one instance serves any number of
/// concurrent extractions.
pub struct ExtractionService {
    fetcher: Arc<dyn ObjectFetcher>,
    parser: Arc<dyn MetadataParser>,
    staging: StagingArea,
}

impl ExtractionService {
    pub fn new(
        fetcher: Arc<dyn ObjectFetcher>,
        parser: Arc<dyn MetadataParser>,
        staging: StagingArea,
    ) -> Self {
        Self {
            fetcher,
            parser,
            staging,
        }
    }

    /// Returns the complete metadata of the object at `raw_reference` or an
    /// error; never a partial result. The staging file is gone by the time
    /// this returns, and also if the future is dropped early.
    pub async fn extract(&self, raw_reference: &str) -> Result<MetadataResult, ExtractionError> {
        let reference = ObjectReference::parse(raw_reference)?;
        let staged = self.staging.acquire()?;

        let outcome = self.fetch_and_parse(&reference, &staged).await;

        if let Err(e) = staged.release() {
            warn!(object = %reference, "⚠️  {}", e);
        }

        match &outcome {
            Ok(metadata) => info!(
                object = %reference,
                fields = metadata.len(),
                "✅ Metadata extracted"
            ),
            Err(e) => warn!(
                object = %reference,
                stage = e.stage(),
                kind = ?e.kind(),
                retryable = e.is_retryable(),
                "❌ Extraction failed: {}",
                e
            ),
        }
        outcome
    }

    async fn fetch_and_parse(
        &self,
        reference: &ObjectReference,
        staged: &StagingFile,
    ) -> Result<MetadataResult, ExtractionError> {
        let bytes = self.fetcher.fetch(reference, staged.path()).await?;
        info!(object = %reference, bytes, "📥 Object staged");

        let parser = Arc::clone(&self.parser);
        let path = staged.path().to_path_buf();
        let metadata = tokio::task::spawn_blocking(move || parser.parse(&path))
            .await
            .map_err(|e| ExtractionError::ParserTask(e.to_string()))??;

        Ok(metadata)
    }

    /// Downloads the object at `raw_reference` to `destination`, creating
    /// parent directories. Nothing is parsed.
    pub async fn download_to(
        &self,
        raw_reference: &str,
        destination: &Path,
    ) -> Result<u64, ExtractionError> {
        let reference = ObjectReference::parse(raw_reference)?;
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::LocalWrite(e.kind()))?;
        }
        let existed = tokio::fs::try_exists(destination).await.unwrap_or(true);
        match self.fetcher.fetch(&reference, destination).await {
            Ok(bytes) => {
                info!(object = %reference, bytes, "💾 Object saved");
                Ok(bytes)
            }
            Err(e) => {
                // Only files this call created are removed.
                if !existed {
                    remove_partial_download(destination).await;
                }
                Err(e.into())
            }
        }
    }
}

async fn remove_partial_download(destination: &Path) {
    match tokio::fs::remove_file(destination).await {
        Ok(()) => debug!("partial download removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("⚠️  Partial download could not be removed: {}", e.kind()),
    }
}
