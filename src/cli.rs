// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `flowloop`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "flowloop",
    version,
    about = "Run node-graph workflows once or continuously.",
    long_about = None
)]
pub struct CliArgs {
    /// Workflow file (JSON, `{nodes, edges}`).
    ///
    /// Optional only with `--list-nodes`.
    #[arg(value_name = "WORKFLOW", required_unless_present = "list_nodes")]
    pub workflow: Option<PathBuf>,

    /// Path to the engine config file (TOML).
    ///
    /// Default: `flowloop.toml` in the current working directory. A missing
    /// file means built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "flowloop.toml")]
    pub config: PathBuf,

    /// Run the workflow a single time and exit.
    #[arg(long)]
    pub once: bool,

    /// Seconds between continuous iterations (overrides the config).
    #[arg(long, value_name = "SECS")]
    pub interval: Option<f64>,

    /// Directory of node module manifests (overrides `[registry].node_dir`).
    #[arg(long, value_name = "DIR")]
    pub node_dir: Option<PathBuf>,

    /// Print the registered node types and exit.
    #[arg(long)]
    pub list_nodes: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLOWLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and compile the workflow, print the plan, but don't run it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = CliArgs::try_parse_from([
            "flowloop",
            "graph.json",
            "--once",
            "--interval",
            "0.5",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.workflow, Some(PathBuf::from("graph.json")));
        assert!(args.once);
        assert_eq!(args.interval, Some(0.5));
        assert_eq!(args.config, PathBuf::from("flowloop.toml"));
    }

    #[test]
    fn workflow_required_unless_listing() {
        assert!(CliArgs::try_parse_from(["flowloop"]).is_err());
        let args = CliArgs::try_parse_from(["flowloop", "--list-nodes"]).unwrap();
        assert!(args.list_nodes);
        assert!(args.workflow.is_none());
    }
}
