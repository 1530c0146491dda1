use clap::Parser;
use identity_search::api::{self, ApiDoc, AppState};
use identity_search::config::AppConfig;
use identity_search::definitions::Catalog;
use identity_search::migration::Migrator;
use identity_search::search::SessionStore;
use identity_search::search::service::SearchServices;
use identity_search::tasks::DatabaseTaskLauncher;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

#[derive(Parser)]
#[command(name = "identity-search", about = "Advanced analytics search service")]
struct Cli {
    /// TOML configuration file layered over the defaults.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Address to listen on, overriding `server.bind`.
    #[arg(long)]
    bind: Option<String>,
    /// Database URL, overriding `database.url`.
    #[arg(long)]
    database_url: Option<String>,
    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    let db: DatabaseConnection = Database::connect(&config.database.url).await?;
    Migrator::up(&db, None).await?;
    let catalog = Catalog::load(config.catalog.path.as_deref())?;
    info!(types = catalog.types.len(), definitions = catalog.definitions.len(), "Loaded search catalog");

    let sessions = SessionStore::with_idle_timeout(config.session.idle_timeout());
    sessions.spawn_sweeper(config.session.sweep_interval());

    let config = Arc::new(config);
    let state = AppState {
        search: SearchServices {
            db: db.clone(),
            sessions,
            catalog: Arc::new(catalog),
            settings: config.search.clone(),
        },
        config: config.clone(),
        launcher: Arc::new(DatabaseTaskLauncher::new(db)),
    };

    let (router, apidocs) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api/v1", api::router(state))
        .split_for_parts();
    let app = router
        .merge(Scalar::with_url("/docs", apidocs))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "API at /api/v1, docs at /docs");
    axum::serve(listener, app).await?;
    Ok(())
}
