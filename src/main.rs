use api_rest::{router, AppState};
use api_shared::TokenKeys;
use libris_core::{
    config::{flag_from_env_value, upload_roles_from_env_value},
    constants::DEFAULT_STORAGE_DIR,
    open_store, CoreConfig, SizeLimits,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the Libris upload server
///
/// Resolves configuration once from the environment (after loading `.env`) and serves the
/// REST API.
///
/// # Environment Variables
/// - `LIBRIS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `LIBRIS_STORAGE_DIR`: Private storage root (default: "private_uploads", created if missing)
/// - `LIBRIS_JWT_SECRET`: HS256 secret shared with the library backend (required)
/// - `LIBRIS_UPLOAD_ROLES`: Roles allowed to upload (default: "1,2")
/// - `LIBRIS_ENFORCE_OWNER_PATHS`: Restrict readers to their own uploads (default: false)
/// - `LIBRIS_MAX_IMAGE_MB`, `LIBRIS_MAX_DOCUMENT_MB`, `LIBRIS_MAX_GENERIC_MB`: Size limits
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - any configuration value is missing or invalid,
/// - the storage root cannot be created, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("libris_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("libris_core=info".parse()?)
                .add_directive("libris_files=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("LIBRIS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let storage_dir = std::env::var("LIBRIS_STORAGE_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));

    let secret = std::env::var("LIBRIS_JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("LIBRIS_JWT_SECRET must be set"))?;
    let keys = TokenKeys::from_secret(&secret)?;

    let cfg = Arc::new(CoreConfig::new(
        storage_dir,
        upload_roles_from_env_value(std::env::var("LIBRIS_UPLOAD_ROLES").ok())?,
        flag_from_env_value(
            "LIBRIS_ENFORCE_OWNER_PATHS",
            std::env::var("LIBRIS_ENFORCE_OWNER_PATHS").ok(),
        )?,
        SizeLimits::from_env_values(
            std::env::var("LIBRIS_MAX_IMAGE_MB").ok(),
            std::env::var("LIBRIS_MAX_DOCUMENT_MB").ok(),
            std::env::var("LIBRIS_MAX_GENERIC_MB").ok(),
        )?,
    )?);

    let store = open_store(&cfg)?;

    tracing::info!(
        storage_root = %store.root_directory().display(),
        upload_roles = ?cfg.upload_roles(),
        enforce_owner_paths = cfg.enforce_owner_paths(),
        "++ Starting Libris REST on {}",
        rest_addr
    );

    let app = router(AppState::new(cfg, keys, store));

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
