use crate::services::dicom::fields::{FieldSet, UnknownField};
use std::env;
use std::path::PathBuf;

/// Origins the bundled web viewers are served from during development.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8080",
    "http://localhost:8081",
    "http://127.0.0.1:8081",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:4173",
    "http://127.0.0.1:4173",
];

/// Connection settings for the S3-compatible object store.
///
/// Static credentials are optional; when absent the default AWS provider
/// chain is used.
#[derive(Clone, Default)]
pub struct StorageConfig {
    /// AWS region (default: "us-east-1")
    pub region: String,

    /// Custom endpoint, e.g. MinIO. Enables path-style addressing.
    pub endpoint_url: Option<String>,

    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("static_credentials", &self.has_static_credentials())
            .finish()
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint_url: non_empty_var("S3_ENDPOINT_URL"),
            access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),
            session_token: non_empty_var("AWS_SESSION_TOKEN"),
        }
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind address (default: "127.0.0.1")
    pub host: String,

    /// Listen port (default: 5000)
    pub port: u16,

    /// Directory for staging files (default: system temp dir)
    pub staging_dir: Option<PathBuf>,

    /// Largest object that will be downloaded, in bytes (default: 512 MB)
    pub max_object_size: u64,

    /// Subset of metadata fields to report (default: all)
    pub metadata_fields: Option<Vec<String>>,

    /// Origins allowed by CORS
    pub cors_allowed_origins: Vec<String>,

    pub storage: StorageConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            staging_dir: None,
            max_object_size: 512 * 1024 * 1024, // 512 MB
            metadata_fields: None,
            cors_allowed_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
            storage: StorageConfig {
                region: "us-east-1".to_string(),
                ..StorageConfig::default()
            },
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            host: env::var("HOST").unwrap_or(default.host),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            staging_dir: non_empty_var("STAGING_DIR").map(PathBuf::from),

            max_object_size: env::var("MAX_OBJECT_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_object_size),

            metadata_fields: non_empty_var("METADATA_FIELDS").map(|v| split_list(&v)),

            cors_allowed_origins: non_empty_var("CORS_ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or(default.cors_allowed_origins),

            storage: StorageConfig::from_env(),
        }
    }

    /// Fields the parser reports: `metadata_fields` if set, otherwise all.
    pub fn field_set(&self) -> Result<FieldSet, UnknownField> {
        match &self.metadata_fields {
            Some(names) => FieldSet::from_names(names.as_slice()),
            None => Ok(FieldSet::default()),
        }
    }

    /// Local MinIO with its stock credentials
    pub fn development() -> Self {
        Self {
            storage: StorageConfig {
                region: "us-east-1".to_string(),
                endpoint_url: Some("http://127.0.0.1:9000".to_string()),
                access_key_id: Some("minioadmin".to_string()),
                secret_access_key: Some("minioadmin".to_string()),
                session_token: None,
            },
            ..Self::default()
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
