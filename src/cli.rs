use clap::Parser;
use std::path::PathBuf;

use lightbot_shell::backend::SearchMode;

/// LightBot shell: multi-session streaming chat against a local sidecar
#[derive(Parser, Debug, Clone)]
#[command(name = "lightbot-shell")]
#[command(author = "RidgetopAI")]
#[command(version)]
#[command(about = "Multi-session streaming chat against a local AI sidecar", long_about = None)]
pub struct Cli {
    /// Port of an already-running sidecar. Overrides config.
    #[arg(long, env = "LIGHTBOT_SIDECAR_PORT")]
    pub port: Option<u16>,

    /// Full base URL of the sidecar (wins over --port). Overrides config.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Web search mode for sent messages (off, on, auto)
    #[arg(long)]
    pub search_mode: Option<SearchMode>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Alternate config file path
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Skip the startup sidecar health probe
    #[arg(long, default_value_t = false)]
    pub no_health_check: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
