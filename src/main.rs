use std::path::PathBuf;
use std::time::Duration;

use confsync::utils::file_io;
use confsync::{EngineBuilder, Result, Settings};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let settings = Settings::load(config_path.as_deref())?;

    // Initializing Logs
    let _guard = init_observability(settings.storage.log_dir.clone())?;

    // Build and start the engine
    let engine = EngineBuilder::new(settings)
        .on_change(|namespace, snapshot| {
            info!(
                "namespace '{}' refreshed ({} keys, release key '{}')",
                namespace,
                snapshot.len(),
                snapshot.release_key
            );
        })
        .build()?;
    engine.start().await?;

    info!("Application started. Waiting for CTRL+C signal...");
    wait_for_termination().await;

    // Flag-based shutdown: the loop confirms by flipping `stopped`.
    engine.stop();
    while !engine.is_stopped() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("Exiting program.");
    Ok(())
}

async fn wait_for_termination() {
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGINT handler: {}", e);
            return;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            return;
        }
    };
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }
}

fn init_observability(log_dir: Option<PathBuf>) -> Result<Option<WorkerGuard>> {
    match log_dir {
        Some(dir) => {
            let log_file = file_io::open_file_for_append(dir.join("confsync.log"))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
            let base_subscriber = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::from_default_env());
            tracing_subscriber::registry().with(base_subscriber).init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            Ok(None)
        }
    }
}
