//! Conformance matrix runner.
//!
//! Loads a scenario suite and runs it against a record-management system
//! over every transport the suite names.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use engine::Transport;
use matrix::cli::{self, RunOptions};
use matrix::exit_codes;

#[derive(Parser)]
#[command(
    name = "matrix",
    version,
    about = "Run declarative conformance scenarios across transports"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the canonical string of every scenario in a suite.
    List { suite: PathBuf },
    /// Validate a suite file without running it.
    Check { suite: PathBuf },
    /// Run a suite and report pass, fail and error counts.
    Run {
        suite: PathBuf,
        /// Engine config; built-in defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Only run scenarios for these transports (repeatable).
        #[arg(short, long = "transport", value_parser = parse_transport)]
        transports: Vec<Transport>,
        /// Stop at the first scenario that does not pass.
        #[arg(long)]
        fail_fast: bool,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Write a default engine config.
    InitConfig {
        #[arg(default_value = "matrix.toml")]
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_transport(value: &str) -> Result<Transport, String> {
    value.parse().map_err(|err: engine::ScenarioError| err.to_string())
}

fn main() {
    engine::logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::List { suite } => cli::list(&suite),
        Command::Check { suite } => cli::check(&suite),
        Command::Run {
            suite,
            config,
            transports,
            fail_fast,
            json,
        } => cli::run(
            &suite,
            &RunOptions {
                config: config.as_deref(),
                transports,
                fail_fast,
                json,
            },
        ),
        Command::InitConfig { path, force } => cli::init_config(&path, force),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_filters() {
        let cli = Cli::parse_from([
            "matrix",
            "run",
            "suite.toml",
            "--transport",
            "web_api",
            "-t",
            "NRTM___",
            "--fail-fast",
        ]);
        match cli.command {
            Command::Run {
                transports,
                fail_fast,
                json,
                config,
                ..
            } => {
                assert_eq!(
                    transports,
                    vec![Transport::WebApi, Transport::ReplicationStream]
                );
                assert!(fail_fast);
                assert!(!json);
                assert_eq!(config, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn unknown_transport_is_rejected() {
        assert!(Cli::try_parse_from(["matrix", "run", "s.toml", "-t", "fax"]).is_err());
    }

    #[test]
    fn parse_init_config_defaults() {
        let cli = Cli::parse_from(["matrix", "init-config"]);
        assert!(matches!(
            cli.command,
            Command::InitConfig { ref path, force: false } if path == &PathBuf::from("matrix.toml")
        ));
    }
}
