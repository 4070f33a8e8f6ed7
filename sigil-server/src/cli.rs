use std::path::PathBuf;

use clap::Parser;

/// CLI for the sigil runtime server.
#[derive(Debug, Clone, Parser)]
#[command(name = "sigil-server", about = "Event runtime + realtime broadcast daemon for sigil apps")]
pub struct Cli {
    /// Listen address for HTTP/WS endpoints
    #[arg(long, env = "SIGIL_ADDR", default_value = "127.0.0.1:8900")]
    pub listen_addr: String,

    /// Storage backend: "memory" or "document"
    #[arg(long, env = "SIGIL_STORAGE", default_value = "memory")]
    pub storage: String,

    /// Root directory for the document store backend
    #[arg(long, env = "SIGIL_DATA_DIR", default_value = ".sigil-data")]
    pub data_dir: PathBuf,

    /// Deployment environment label, reported by /health
    #[arg(long, env = "SIGIL_ENV", default_value = "development")]
    pub environment: String,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
}
