use crate::models::MetadataRequest;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Request body must contain JSON data")]
    MissingBody,

    #[error("Invalid request format: {0}")]
    InvalidJson(String),

    #[error("file_path is required in request body")]
    MissingFilePath,

    #[error("file_path must be a non-empty string")]
    InvalidFilePath,
}

/// Validates a raw metadata request body. The content type is not checked;
/// any body that decodes as a JSON object is accepted.
pub fn parse_metadata_request(body: &[u8]) -> Result<MetadataRequest, RequestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(RequestError::MissingBody);
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| RequestError::InvalidJson(e.to_string()))?;

    let Value::Object(mut fields) = value else {
        return Err(RequestError::MissingBody);
    };

    match fields.remove("file_path") {
        None | Some(Value::Null) => Err(RequestError::MissingFilePath),
        Some(Value::String(file_path)) if !file_path.is_empty() => {
            Ok(MetadataRequest { file_path })
        }
        Some(_) => Err(RequestError::InvalidFilePath),
    }
}
