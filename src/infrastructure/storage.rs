use crate::config::StorageConfig;
use aws_config::retry::RetryConfig;
use aws_sdk_s3::config::{Credentials, Region};
use tracing::info;

/// Builds the shared S3 client. Retries are disabled so that every fetch is
/// a single request.
pub async fn setup_storage(config: &StorageConfig) -> aws_sdk_s3::Client {
    let mut loader = aws_config::from_env()
        .region(Region::new(config.region.clone()))
        .retry_config(RetryConfig::disabled());

    if let Some(endpoint_url) = &config.endpoint_url {
        info!("☁️  S3 Storage: {} (path-style)", endpoint_url);
        loader = loader.endpoint_url(endpoint_url);
    } else {
        info!("☁️  S3 Storage: AWS ({})", config.region);
    }

    if let (Some(access_key), Some(secret_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        loader = loader.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            config.session_token.clone(),
            None,
            "static",
        ));
    }

    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
