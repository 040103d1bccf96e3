//! Command-line argument definitions (clap) and help text.

use clap::Parser;

pub const HELP_TEXT: &str = "
nutwake - wake LAN clients after a UPS power event
Usage: nutwake [OPTIONS]

Runs the power monitor in the foreground when no command is given.

Options:
  -h, --help                    Print help
  -V, --version                 Print version
Run:
  -c, --config <PATH>           Config file (default: $NUTWAKE_CONFIG, /config/config.yaml, ./config.yaml)
      --state-file <PATH>       Override the state file location from the config
      --log-level <LOG_LEVEL>   Set log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
Status & Debug:
  -i, --status                  Show persisted UPS and client state
      --show-config             Print the resolved configuration
      --check                   Run health check (config, state file, UPS, clients)
      --test                    Query the UPS once and exit
";

#[derive(Parser, Debug)]
#[command(name = "nutwake")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Wake LAN clients after a UPS power event", long_about = None)]
pub struct Args {
    // === Run ===
    /// Config file path
    #[arg(short = 'c', long, help_heading = "Run")]
    pub config: Option<String>,

    /// Override the state file location from the config
    #[arg(long = "state-file", help_heading = "Run")]
    pub state_file: Option<String>,

    /// Set log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
    #[arg(long = "log-level", help_heading = "Run")]
    pub log_level: Option<String>,

    // === Status & Debug ===
    /// Show persisted UPS and client state
    #[arg(short = 'i', long = "status", help_heading = "Status & Debug")]
    pub status: bool,

    /// Print the resolved configuration
    #[arg(long = "show-config", help_heading = "Status & Debug")]
    pub show_config: bool,

    /// Run health check (config, state file, UPS, clients)
    #[arg(long, help_heading = "Status & Debug")]
    pub check: bool,

    /// Query the UPS once and exit
    #[arg(long, help_heading = "Status & Debug")]
    pub test: bool,
}
