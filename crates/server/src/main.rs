//! Kisan Voice server entry point

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use kisan_voice_config::{load_settings, Settings};
use kisan_voice_pipeline::RunLog;
use kisan_voice_server::{build_orchestrator, create_router, init_metrics, AppState, TelegramBot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win
    let _ = dotenvy::dotenv();

    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("KISAN_VOICE_ENV").ok();
    let config = load_settings(env.as_deref()).context("failed to load configuration")?;

    init_tracing(&config);

    tracing::info!("Starting Kisan Voice Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_env = env.as_deref().unwrap_or("default"),
        stt = ?config.providers.stt,
        tts = ?config.providers.tts,
        optimize = config.pipeline.optimize_enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        init_metrics().context("failed to install Prometheus recorder")?;
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    let run_log = match &config.observability.run_log_dir {
        Some(dir) => {
            let log = RunLog::open(dir)
                .await
                .with_context(|| format!("failed to open run log directory {}", dir))?;
            tracing::info!(dir = %dir, "Run log enabled");
            Some(log)
        }
        None => None,
    };

    let orchestrator = build_orchestrator(&config, run_log.as_ref().map(RunLog::sink))
        .context("failed to build voice pipeline")?;
    for (stage, model) in orchestrator.stage_models() {
        tracing::info!(stage = %stage, model = %model, "Stage configured");
    }

    let mut state = AppState::new(config.clone(), orchestrator);
    if config.telegram.enabled {
        match TelegramBot::new(&config.telegram) {
            Ok(bot) => {
                tracing::info!("Telegram webhook enabled at /api/webhook/telegram");
                state = state.with_telegram(bot);
            }
            Err(e) => tracing::warn!(error = %e, "Telegram webhook disabled"),
        }
    }

    let app = create_router(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server host {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(log) = run_log {
        log.shutdown().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("kisan_voice={},tower_http=debug", level).into()
    });

    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}
