pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::ServiceConfig;
use crate::services::extraction::ExtractionService;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::dicom::get_dicom_metadata,
        api::handlers::dicom::dicom_metadata_options,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            models::MetadataRequest,
            models::ErrorResponse,
            services::dicom::MetadataResult,
        )
    ),
    tags(
        (name = "system", description = "Service status"),
        (name = "dicom", description = "DICOM metadata extraction")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub extraction: Arc<ExtractionService>,
    pub config: ServiceConfig,
}

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/dicom-metadata",
            post(api::handlers::dicom::get_dicom_metadata)
                .options(api::handlers::dicom::dicom_metadata_options),
        )
        .layer(cors)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("⚠️  Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}
