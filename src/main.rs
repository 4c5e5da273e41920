use std::{process, sync::Arc};

use rostra::{
    application::{Services, error::AppError, lending::LendingConfig},
    cache::{self, CacheConfig, CacheConsumer, CacheStore},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::InMemoryRepositories,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::FlushCache(args) => run_flush_cache(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let store = cache::build_store(&cache_config)
        .await
        .map_err(InfraError::from)?;
    let lending = LendingConfig::from(&settings.lending);

    let services = match init_repositories(&settings).await? {
        Some(repositories) => Services::new(repositories, store, &cache_config, lending),
        None => Services::new(
            Arc::new(InMemoryRepositories::new()),
            store,
            &cache_config,
            lending,
        ),
    };

    serve_http(&settings, HttpState::new(services)).await
}

/// Connects to Postgres unless the run is ephemeral. A missing URL falls
/// back to in-process repositories.
async fn init_repositories(
    settings: &config::Settings,
) -> Result<Option<Arc<PostgresRepositories>>, AppError> {
    if settings.database.ephemeral {
        info!("Ephemeral run; records live in process memory");
        return Ok(None);
    }
    let Some(database_url) = settings.database.url.as_deref() else {
        warn!("database.url is not configured; records live in process memory");
        return Ok(None);
    };

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    let repositories = PostgresRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(InfraError::from)?;
    info!(
        max_connections = settings.database.max_connections.get(),
        "Postgres repositories ready"
    );
    Ok(Some(Arc::new(repositories)))
}

async fn run_flush_cache(
    settings: config::Settings,
    args: config::FlushCacheArgs,
) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let store: Arc<dyn CacheStore> = cache::build_store(&cache_config)
        .await
        .map_err(InfraError::from)?;
    let consumer = CacheConsumer::new(store, cache_config.policy);

    let removed = consumer.purge_scope(args.kind).await;
    info!(
        scope = args.kind.map(|kind| kind.as_str()).unwrap_or("all"),
        removed,
        "Cache flushed"
    );
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "HTTP listener bound");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!("HTTP listener stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
