use crate::models::ObjectReference;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use std::io;
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to download DICOM file from S3: object {bucket}/{key} does not exist")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Failed to download DICOM file from S3: {0}")]
    Transfer(String),

    #[error("Failed to download DICOM file from S3: object is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("Failed to write downloaded object to staging file: {0}")]
    LocalWrite(io::ErrorKind),
}

impl FetchError {
    /// Whether a caller-level retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transfer(_))
    }
}

/// Retrieves one remote object into a local file.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Writes the object named by `reference` into `destination`, truncating
    /// it first, and returns the number of bytes written. One attempt, no
    /// retries.
    async fn fetch(&self, reference: &ObjectReference, destination: &Path)
    -> Result<u64, FetchError>;
}

pub struct S3ObjectFetcher {
    client: Client,
    max_object_size: u64,
}

impl S3ObjectFetcher {
    pub fn new(client: Client, max_object_size: u64) -> Self {
        Self {
            client,
            max_object_size,
        }
    }

    /// Streams `body` into `file`, enforcing the size cap on the bytes seen.
    async fn write_body(
        &self,
        mut body: ByteStream,
        file: &mut tokio::fs::File,
    ) -> Result<u64, FetchError> {
        let mut written: u64 = 0;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| FetchError::Transfer(DisplayErrorContext(&e).to_string()))?
        {
            written += chunk.len() as u64;
            if written > self.max_object_size {
                return Err(FetchError::TooLarge {
                    size: written,
                    limit: self.max_object_size,
                });
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::LocalWrite(e.kind()))?;
        }

        file.flush()
            .await
            .map_err(|e| FetchError::LocalWrite(e.kind()))?;
        Ok(written)
    }
}

#[async_trait]
impl ObjectFetcher for S3ObjectFetcher {
    async fn fetch(
        &self,
        reference: &ObjectReference,
        destination: &Path,
    ) -> Result<u64, FetchError> {
        let output = self
            .client
            .get_object()
            .bucket(reference.bucket())
            .key(reference.key())
            .send()
            .await
            .map_err(|e| classify_get_object_error(e, reference))?;

        if let Some(advertised) = output.content_length().filter(|len| *len >= 0) {
            let advertised = advertised as u64;
            if advertised > self.max_object_size {
                return Err(FetchError::TooLarge {
                    size: advertised,
                    limit: self.max_object_size,
                });
            }
        }

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| FetchError::LocalWrite(e.kind()))?;

        let written = match self.write_body(output.body, &mut file).await {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(destination).await {
                    debug!(error = ?remove_err.kind(), "partial object not removed");
                }
                return Err(e);
            }
        };

        debug!(object = %reference, bytes = written, "object downloaded");
        Ok(written)
    }
}

fn classify_get_object_error(
    err: SdkError<GetObjectError, aws_sdk_s3::config::http::HttpResponse>,
    reference: &ObjectReference,
) -> FetchError {
    let not_found = match err.as_service_error() {
        Some(service_err) => {
            service_err.is_no_such_key() || service_err.code() == Some("NoSuchBucket")
        }
        None => false,
    } || err
        .raw_response()
        .map(|response| response.status().as_u16() == 404)
        .unwrap_or(false);

    if not_found {
        return FetchError::ObjectNotFound {
            bucket: reference.bucket().to_string(),
            key: reference.key().to_string(),
        };
    }

    let message = DisplayErrorContext(&err).to_string();
    warn!(object = %reference, "S3 get_object failed: {}", message);
    FetchError::Transfer(message)
}
