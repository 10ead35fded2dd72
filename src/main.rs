mod cli;

use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use lightbot_shell::app::App;
use lightbot_shell::backend::SidecarClient;
use lightbot_shell::config::ShellConfig;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse_args();

    let mut config = match &cli.config {
        Some(path) => ShellConfig::load_from(path)?,
        None => ShellConfig::load()?,
    };

    // CLI flags override the config file.
    if let Some(port) = cli.port {
        config.backend.port = Some(port);
    }
    if let Some(url) = &cli.base_url {
        config.backend.base_url = Some(url.clone());
    }
    if let Some(mode) = cli.search_mode {
        config.chat.search_mode = mode;
    }
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }

    let _log_guard = init_tracing(&config)?;

    let mut app = App::new(&config);

    match config.backend_base_url() {
        Some(base_url) => {
            let client = SidecarClient::new(base_url);
            if cli.no_health_check {
                app.connect_backend(client);
            } else {
                match client.health().await {
                    Ok(()) => {
                        tracing::info!(base_url = client.base_url(), "sidecar healthy");
                        app.connect_backend(client);
                    }
                    Err(err) => {
                        // Connect anyway; the sidecar may still be starting.
                        tracing::warn!(%err, "sidecar health probe failed");
                        app.connect_backend(client);
                    }
                }
            }
        }
        None => {
            tracing::warn!("no sidecar configured; sends will fail until one is set up");
        }
    }

    app.run().await?;

    Ok(())
}

/// Stderr logging by default; daily-rotated file logging when configured.
/// The returned guard must stay alive for the non-blocking writer to flush.
fn init_tracing(
    config: &ShellConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.general.log_level)
        .or_else(|_| EnvFilter::try_new("info"))?;

    match &config.general.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "lightbot-shell.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}
