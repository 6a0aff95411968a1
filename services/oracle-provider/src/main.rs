//! Process entrypoint: loads configuration, wires the core pipeline
//! components together, spawns one ingest task per enabled exchange adapter,
//! and serves the HTTP surface until shutdown.

mod http;
mod orchestrator;
mod state;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use adapters::config::ExchangeAdapterConfig;
use adapters::{AdapterSinks, BinanceAdapter, CoinbaseAdapter, ExchangeAdapter, KrakenAdapter};
use provider_config::catalogue::{ExchangesFile, FeedsCatalogue};
use provider_config::ProviderSettings;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::orchestrator::Orchestrator;
use crate::state::{ApiMetrics, AppState};

const UPDATE_CHANNEL_CAPACITY: usize = 1_024;

#[tokio::main]
async fn main() {
    let settings = ProviderSettings::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = settings.validate() {
        tracing::error!(%err, "invalid configuration, refusing to start");
        std::process::exit(1);
    }

    if let Err(err) = run(settings).await {
        tracing::error!(%err, "oracle-provider exited with an error");
        std::process::exit(1);
    }
}

async fn run(settings: ProviderSettings) -> anyhow::Result<()> {
    let catalogue_path = std::env::var("FEEDS_CATALOGUE_PATH").unwrap_or_else(|_| "config/feeds.toml".to_string());
    let exchanges_path = std::env::var("EXCHANGES_FILE_PATH").unwrap_or_else(|_| "config/exchanges.toml".to_string());
    let catalogue = FeedsCatalogue::load(Path::new(&catalogue_path)).unwrap_or_else(|err| {
        tracing::warn!(%err, path = %catalogue_path, "no feeds catalogue found, starting with an empty one");
        FeedsCatalogue::default()
    });
    let exchanges = ExchangesFile::load(Path::new(&exchanges_path)).unwrap_or_else(|err| {
        tracing::warn!(%err, path = %exchanges_path, "no exchanges file found, starting with none enabled");
        ExchangesFile::default()
    });

    let validator = Arc::new(validator::Validator::new(validator::ValidatorConfig::default()));
    let cache = Arc::new(cache::Cache::new(cache::CacheConfig {
        max_entries: settings.cache_max_entries,
        current_view_max_ttl_ms: settings.cache_ttl_ms,
    }));
    let warmer = Arc::new(warmer::Warmer::new(warmer::WarmerConfig::default()));
    let failover = Arc::new(failover::FailoverCoordinator::new(failover::FailoverConfig::default()));
    let rate_limiter = Arc::new(ratelimit::RateLimiter::new(ratelimit::RateLimitConfig {
        window_ms: settings.rate_limit_window_ms,
        max_requests: settings.rate_limit_max_requests,
        ..ratelimit::RateLimitConfig::default()
    }));
    let performance_monitor = Arc::new(performance_monitor::PerformanceMonitor::new(
        performance_monitor::PerformanceThresholds::default(),
    ));

    let now_ms = chrono::Utc::now().timestamp_millis();
    for entry in &catalogue.feeds {
        let source_ids: Vec<String> = entry.sources.iter().map(|s| s.exchange.clone()).collect();
        failover.register_candidates(&entry.feed, &source_ids, now_ms);
    }

    let orchestrator = Arc::new(Orchestrator::new(
        catalogue,
        validator,
        aggregator::AggregatorConfig::default(),
        cache.clone(),
        warmer.clone(),
        failover.clone(),
    ));

    let cancel = CancellationToken::new();
    let mut adapter_tasks = Vec::new();

    for exchange in enabled_exchanges(&exchanges) {
        let config = ExchangeAdapterConfig::from_env(&exchange.to_uppercase());
        if !config.enabled {
            continue;
        }
        let adapter: Arc<dyn ExchangeAdapter> = match exchange.as_str() {
            "binance" => Arc::new(BinanceAdapter::new(config)),
            "coinbase" => Arc::new(CoinbaseAdapter::new(config)),
            "kraken" => Arc::new(KrakenAdapter::new(config)),
            other => {
                tracing::warn!(exchange = other, "no adapter implementation for this exchange, skipping");
                continue;
            }
        };

        let (update_tx, update_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let (error_tx, mut error_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let sinks = AdapterSinks { updates: update_tx, errors: error_tx };

        let connect_adapter = adapter.clone();
        let connect_cancel = cancel.clone();
        adapter_tasks.push(tokio::spawn(async move {
            tokio::select! {
                result = connect_adapter.connect(sinks) => {
                    if let Err(err) = result {
                        tracing::error!(%err, "adapter connection ended");
                    }
                }
                _ = connect_cancel.cancelled() => {}
            }
        }));

        let ingest_orchestrator = orchestrator.clone();
        let ingest_cancel = cancel.clone();
        adapter_tasks.push(tokio::spawn(orchestrator::run_ingest_loop(
            ingest_orchestrator,
            update_rx,
            ingest_cancel,
        )));

        let error_exchange = exchange.clone();
        let error_failover = failover.clone();
        let error_orchestrator = orchestrator.clone();
        adapter_tasks.push(tokio::spawn(async move {
            while let Some(err) = error_rx.recv().await {
                tracing::warn!(exchange = %error_exchange, %err, "adapter reported an error");
                let now_ms = chrono::Utc::now().timestamp_millis();
                for entry in &error_orchestrator.catalogue().feeds {
                    if entry.sources.iter().any(|s| s.exchange == error_exchange) {
                        error_failover.report_failure(&entry.feed, &error_exchange, now_ms);
                    }
                }
            }
        }));
    }

    let sweep_cancel = cancel.clone();
    let sweep_cache = cache.clone();
    adapter_tasks.push(tokio::spawn(orchestrator::run_cache_sweep(sweep_cache, 500, sweep_cancel)));

    let ratelimit_sweep_cancel = cancel.clone();
    let ratelimit_sweep_limiter = rate_limiter.clone();
    let ratelimit_sweep_window_ms = settings.rate_limit_window_ms;
    adapter_tasks.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(ratelimit_sweep_window_ms));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    ratelimit_sweep_limiter.sweep_idle(now_ms);
                }
                _ = ratelimit_sweep_cancel.cancelled() => break,
            }
        }
    }));

    let warm_orchestrator = orchestrator.clone();
    let warm_fetch: warmer::FetchCallback = Arc::new(move |feed| {
        let orchestrator = warm_orchestrator.clone();
        Box::pin(async move {
            let now_ms = chrono::Utc::now().timestamp_millis();
            orchestrator.refresh(&feed, now_ms)
        })
    });

    let app_state = AppState {
        settings: Arc::new(settings.clone()),
        orchestrator: orchestrator.clone(),
        rate_limiter,
        performance_monitor,
        api_metrics: Arc::new(ApiMetrics::default()),
        warm_fetch,
        started_at: Instant::now(),
    };

    let router = if settings.base_path == "/" {
        http::build_router(app_state)
    } else {
        axum::Router::new().nest(&settings.base_path, http::build_router(app_state))
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.listen_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "oracle-provider listening");

    let shutdown = {
        let cancel = cancel.clone();
        async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            cancel.cancel();
        }
    };

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await?;

    tokio::time::timeout(
        std::time::Duration::from_millis(settings.graceful_shutdown_ms),
        futures::future::join_all(adapter_tasks),
    )
    .await
    .ok();

    Ok(())
}

fn enabled_exchanges(exchanges: &ExchangesFile) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut all = Vec::new();
    for list in exchanges.categories.values() {
        for exchange in list {
            if seen.insert(exchange.clone()) {
                all.push(exchange.clone());
            }
        }
    }
    all
}
