//! CLI argument definitions for ironflow-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Ironflow flow enrichment daemon.
///
/// Classifies and enriches flow records with exporter, interface and
/// routing data, then forwards them to the message bus.
#[derive(Parser, Debug)]
#[command(name = "ironflow-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to ironflow.toml configuration file.
    #[arg(short, long, default_value = "/etc/ironflow/ironflow.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and classifier rules, then exit.
    #[arg(long)]
    pub validate: bool,

    /// Read JSON-encoded flows from standard input, one per line.
    #[arg(long)]
    pub flows_from_stdin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["ironflow-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/ironflow/ironflow.toml"));
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
        assert!(!cli.flows_from_stdin);
    }

    #[test]
    fn overrides() {
        let cli = DaemonCli::parse_from([
            "ironflow-daemon",
            "-c",
            "ironflow.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
            "--flows-from-stdin",
        ]);
        assert_eq!(cli.config, PathBuf::from("ironflow.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
        assert!(cli.flows_from_stdin);
    }
}
