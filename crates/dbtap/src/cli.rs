use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dbtap", version, about = "Transparent database wire-protocol audit proxy")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Listen address (overrides config file setting)
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Backend database address (overrides config file setting)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Path to the audit ledger file (overrides config file setting)
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Observer mode: "audit" or "dump" (overrides config file setting)
    #[arg(long)]
    pub observer: Option<String>,
}
