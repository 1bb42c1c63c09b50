//! farm-analytics server entry point.
//!
//! Wires the event bus, the analytics projection, the weather refresh
//! worker and the read API, then serves HTTP until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use farm_analytics::api;
use farm_analytics::app_state::AppState;
use farm_analytics::bus::{BusOptions, EventNotifier, EventPublisher, InMemoryEventBus};
use farm_analytics::cache::{Cache, MemoryCache};
use farm_analytics::config::AppConfig;
use farm_analytics::domain::WeatherSnapshot;
use farm_analytics::persistence::{
    AnalyticsRepository, FarmDirectory, MemoryStore, PostgresStore,
};
use farm_analytics::projection::FarmAnalyticsProjection;
use farm_analytics::service::AnalyticsService;
use farm_analytics::weather::{CachedWeatherFetcher, OpenWeatherMapFetcher, WeatherFetcher};
use farm_analytics::worker::{WeatherUpdater, WeatherUpdaterOptions};

/// Upper bound on a single HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on flushing queued notifications at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Load configuration
    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::info!(addr = %config.listen_addr, "starting farm-analytics");

    // Build persistence layer
    let (repository, directory) = open_store(&config).await?;

    // Build event bus and write-path notifier
    let bus = InMemoryEventBus::new(BusOptions {
        max_redeliveries: config.event_max_redeliveries,
    });
    let publisher: Arc<dyn EventPublisher> = Arc::new(bus.clone());
    let (notifier, notifier_task) =
        EventNotifier::spawn(Arc::clone(&publisher), config.event_notify_queue_capacity);

    // Start projection (fatal on failure)
    let projection = Arc::new(FarmAnalyticsProjection::new(Arc::clone(&repository)));
    projection
        .start(&bus)
        .await
        .context("starting farm analytics projection")?;

    // Build weather fetcher shared by the worker and the read API
    let cache = Arc::new(MemoryCache::<WeatherSnapshot>::new(config.weather_cache_ttl));
    let janitor = cache.spawn_janitor(config.weather_cache_cleanup_interval);
    if config.openweather_api_key.is_empty() {
        tracing::warn!("OPENWEATHER_API_KEY is not set, weather fetches will fail");
    }
    let provider = OpenWeatherMapFetcher::new(
        config.openweather_api_key.clone(),
        &config.openweather_base_url,
        config.openweather_timeout,
    )?;
    let fetcher: Arc<dyn WeatherFetcher> = Arc::new(CachedWeatherFetcher::new(
        Arc::new(provider),
        Arc::clone(&cache) as Arc<dyn Cache<WeatherSnapshot>>,
    ));

    // Start weather refresh worker
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker = WeatherUpdater::new(
        directory,
        Arc::clone(&fetcher),
        publisher,
        WeatherUpdaterOptions {
            interval: config.weather_fetch_interval,
            concurrency: config.weather_fetch_concurrency,
        },
    );
    worker.start(shutdown_rx)?;

    // Build application state
    let app_state = AppState {
        service: Arc::new(AnalyticsService::new(repository, fetcher)),
        bus: bus.clone(),
        notifier,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Shut down in dependency order: producers first, then the transport
    tracing::info!("shutting down");
    shutdown_tx.send_replace(true);
    worker.stop().await;
    janitor.abort();
    if tokio::time::timeout(DRAIN_TIMEOUT, notifier_task).await.is_err() {
        tracing::warn!("notification queue not drained before shutdown");
    }
    bus.close();

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn open_store(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn AnalyticsRepository>, Arc<dyn FarmDirectory>)> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled, analytics are kept in memory");
        let store = Arc::new(MemoryStore::new());
        return Ok((
            Arc::clone(&store) as Arc<dyn AnalyticsRepository>,
            store as Arc<dyn FarmDirectory>,
        ));
    }

    let store = PostgresStore::connect(
        &config.database_url,
        config.database_max_connections,
        config.database_min_connections,
        config.database_connect_timeout(),
    )
    .await
    .context("connecting to database")?;
    if config.run_migrations {
        store.migrate().await?;
        tracing::info!("database migrations applied");
    }
    let store = Arc::new(store);
    Ok((
        Arc::clone(&store) as Arc<dyn AnalyticsRepository>,
        store as Arc<dyn FarmDirectory>,
    ))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
