//! Logging configuration.
//!
//! Sets up tracing-based logging to stdout, systemd's journal, or a daily
//! rolling file, depending on `[logging] target`.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogTarget, LoggingConfig};

/// Initialize the logging system.
///
/// Log level can be controlled via the `PHOTO_GALLERY_LOG` environment variable:
/// - `PHOTO_GALLERY_LOG=debug` for verbose output
/// - `PHOTO_GALLERY_LOG=info` for standard output (default)
/// - `PHOTO_GALLERY_LOG=warn` for warnings and errors only
/// - `PHOTO_GALLERY_LOG=error` for errors only
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("PHOTO_GALLERY_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.target {
        LogTarget::Stdout => init_stdout(env_filter),
        LogTarget::Journald => {
            #[cfg(target_os = "linux")]
            {
                if let Ok(journald_layer) = tracing_journald::layer() {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(journald_layer)
                        .try_init()?;

                    tracing::info!("Logging initialized with journald backend");
                    return Ok(());
                }
            }

            init_stdout(env_filter)?;
            tracing::warn!("journald unavailable, logging to stdout");
            Ok(())
        }
        LogTarget::File => {
            std::fs::create_dir_all(&config.dir)?;

            let file_appender = tracing_appender::rolling::daily(&config.dir, "photo-gallery.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // The writer stops flushing once the guard drops; init() runs once per process.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .try_init()?;

            tracing::info!("Logging initialized with file backend at {:?}", config.dir);
            Ok(())
        }
    }
}

fn init_stdout(env_filter: EnvFilter) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .try_init()?;
    Ok(())
}
