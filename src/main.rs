use anyhow::Context;
use clap::{Parser, Subcommand};
use dicom_metadata_service::api::middleware::request_id::REQUEST_ID_HEADER;
use dicom_metadata_service::config::ServiceConfig;
use dicom_metadata_service::infrastructure::storage;
use dicom_metadata_service::services::dicom::{DicomParser, MetadataParser};
use dicom_metadata_service::services::extraction::ExtractionService;
use dicom_metadata_service::services::staging::StagingArea;
use dicom_metadata_service::services::storage::S3ObjectFetcher;
use dicom_metadata_service::{AppState, create_app};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        /// Bind address, overrides HOST
        #[arg(long)]
        host: Option<String>,

        /// Listen port, overrides PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Parse a local DICOM file and print its metadata as JSON
    Inspect { path: PathBuf },
    /// Download an object (`bucket/key`) to a local path
    Fetch { reference: String, destination: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dicom_metadata_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = ServiceConfig::from_env();

    match args.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Inspect { path } => inspect(&config, path).await,
        Command::Fetch {
            reference,
            destination,
        } => fetch(config, &reference, &destination).await,
    }
}

async fn build_service(config: &ServiceConfig) -> anyhow::Result<ExtractionService> {
    let parser = DicomParser::new(config.field_set().context("invalid METADATA_FIELDS")?);
    let client = storage::setup_storage(&config.storage).await;
    let fetcher = S3ObjectFetcher::new(client, config.max_object_size);

    Ok(ExtractionService::new(
        Arc::new(fetcher),
        Arc::new(parser),
        StagingArea::new(config.staging_dir.clone()),
    ))
}

async fn serve(
    mut config: ServiceConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    info!("🚀 Starting DICOM Metadata Service...");

    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    info!(
        "🛡️  Service Config: Max Object Size={}MB, Fields={}, Staging={}",
        config.max_object_size / 1024 / 1024,
        config
            .metadata_fields
            .as_ref()
            .map_or_else(|| "all".to_string(), |f| f.len().to_string()),
        config
            .staging_dir
            .as_ref()
            .map_or_else(|| "system temp".to_string(), |d| d.display().to_string()),
    );

    let extraction = Arc::new(build_service(&config).await?);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;

    let state = AppState {
        extraction,
        config,
    };

    let app = create_app(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn inspect(config: &ServiceConfig, path: PathBuf) -> anyhow::Result<()> {
    let parser = DicomParser::new(config.field_set().context("invalid METADATA_FIELDS")?);
    let display = path.display().to_string();
    let metadata = tokio::task::spawn_blocking(move || parser.parse(&path))
        .await?
        .with_context(|| format!("failed to parse {}", display))?;

    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

async fn fetch(
    config: ServiceConfig,
    reference: &str,
    destination: &std::path::Path,
) -> anyhow::Result<()> {
    let service = build_service(&config).await?;
    let bytes = service.download_to(reference, destination).await?;
    info!("💾 Wrote {} bytes to {}", bytes, destination.display());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
