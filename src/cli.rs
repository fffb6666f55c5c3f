// Command-line surface: `-r` / `-q` are required;
// everything else is optional and overrides the config file.

use crate::config::Overrides;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "vortexai",
    version,
    about = "Query Gemini AI with content from a file and a custom query string for structured vulnerability analysis."
)]
pub struct Cli {
    /// Path to the file containing results/content to analyze (e.g., Nmap scan)
    #[arg(short = 'r', long = "results-file", visible_alias = "results_file", value_name = "FILE")]
    pub results_file: PathBuf,

    /// The question or instruction for the AI (e.g., 'look for vulnerabilities here')
    #[arg(short = 'q', long)]
    pub query: String,

    /// Gemini model to use
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Config file (default: <config dir>/vortexai/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of API attempts
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Append to the log file instead of overwriting it
    #[arg(long)]
    pub append_log: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Increase diagnostic output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            model: self.model.clone(),
            timeout_secs: self.timeout,
            max_attempts: self.max_attempts,
            append_log: self.append_log,
        }
    }

    /// Colors are on unless `--no-color` is given or `NO_COLOR` is set.
    pub fn color_enabled(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none()
    }

    /// Default tracing filter for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_flags() {
        let cli = Cli::try_parse_from(["vortexai", "-r", "scan.txt", "-q", "find vulnerabilities"]).unwrap();
        assert_eq!(cli.results_file, PathBuf::from("scan.txt"));
        assert_eq!(cli.query, "find vulnerabilities");
        assert_eq!(cli.log_level(), "warn");
        assert!(!cli.overrides().append_log);
    }

    #[test]
    fn accepts_underscore_alias_and_overrides() {
        let cli = Cli::try_parse_from([
            "vortexai",
            "--results_file",
            "scan.txt",
            "--query",
            "q",
            "--model",
            "gemini-1.5-pro",
            "--max-attempts",
            "5",
            "--append-log",
            "-vv",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(overrides.max_attempts, Some(5));
        assert!(overrides.append_log);
        assert_eq!(cli.log_level(), "debug");
    }

    #[test]
    fn query_is_required() {
        assert!(Cli::try_parse_from(["vortexai", "-r", "scan.txt"]).is_err());
    }
}
