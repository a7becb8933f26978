use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("Invalid S3 path format. Expected format: 'bucket_name/key'")]
    MissingSeparator,

    #[error("Invalid S3 path format: bucket name is empty")]
    EmptyBucket,

    #[error("Invalid S3 path format: object key is empty")]
    EmptyKey,
}

/// A single object in remote storage, addressed as `bucket/key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectReference {
    bucket: String,
    key: String,
}

impl ObjectReference {
    /// Splits `raw` at the first `/`. Everything after it, further slashes
    /// included, is the key.
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let (bucket, key) = raw
            .split_once('/')
            .ok_or(ReferenceError::MissingSeparator)?;

        if bucket.is_empty() {
            return Err(ReferenceError::EmptyBucket);
        }
        if key.is_empty() {
            return Err(ReferenceError::EmptyKey);
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Body of `POST /api/dicom-metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MetadataRequest {
    /// Object path in the form `bucket/key`
    #[schema(example = "bucket-a/scans/study1.dcm")]
    pub file_path: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
