mod bundles;
mod settings;

use tracing::{error, info};

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

fn listen_for_cancel(
    cancel_token: &tokio_util::sync::CancellationToken,
    task_tracker: &tokio_util::task::TaskTracker,
) {
    use trace_err::TraceErrResult;

    #[cfg(unix)]
    let mut term_handler =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .trace_expect("failed to register signal handler");
    #[cfg(not(unix))]
    let mut term_handler = std::future::pending::<()>();

    let cancel_token = cancel_token.clone();
    let task_tracker_cloned = task_tracker.clone();
    task_tracker.spawn(async move {
        tokio::select! {
            _ = term_handler.recv() => info!("received terminate signal, stopping..."),
            _ = tokio::signal::ctrl_c() => info!("received CTRL+C, stopping..."),
        }
        cancel_token.cancel();
        task_tracker_cloned.close();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some((config, config_source)) = settings::init() else {
        return Ok(());
    };

    let log_level = std::env::var("FORGE_SERVER_LOG_LEVEL")
        .ok()
        .and_then(|s| s.parse::<tracing::Level>().ok())
        .or_else(|| config.log.level.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);

    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
        let filter = EnvFilter::builder()
            .with_default_directive(
                tracing_subscriber::filter::LevelFilter::from_level(log_level).into(),
            )
            .from_env_lossy();
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(filter))
            .init();
    }

    info!("{PKG_NAME} version {PKG_VERSION} starting...");
    info!("{config_source}");

    inner_main(config).await.inspect_err(|e| error!("{e}"))
}

async fn inner_main(config: forge_core::config::FrameworkConfig) -> anyhow::Result<()> {
    let framework = forge_core::Framework::new(&config);

    let cancel_token = tokio_util::sync::CancellationToken::new();
    let task_tracker = tokio_util::task::TaskTracker::new();

    bundles::install_from_directory(&framework, &config.storage.location).await?;

    listen_for_cancel(&cancel_token, &task_tracker);

    info!("started successfully");

    cancel_token.cancelled().await;
    task_tracker.wait().await;

    framework.shutdown().await;

    info!("stopped");
    Ok(())
}
