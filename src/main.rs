// Entrypoint for the CLI application.
// - Keeps `main` small: load settings, build the API client and hand both
//   to `app::run`.
// - Maps the outcome to an exit status: 0 on success (a failed log write is
//   only a warning), 2 for an empty query, 1 for every other failure.

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vortexai::api::ApiClient;
use vortexai::app::{self, Invocation, RunReport};
use vortexai::cli::Cli;
use vortexai::config::Settings;
use vortexai::ui;
use vortexai::VortexError;

fn init_tracing(default_level: &str, ansi: bool) {
    let filter = EnvFilter::try_from_env("VORTEXAI_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(ansi)
        .try_init();
}

fn execute(cli: &Cli, color: bool) -> anyhow::Result<RunReport> {
    let settings = Settings::load(cli.config.as_deref(), &cli.overrides()).context("failed to load settings")?;
    let mut client = ApiClient::from_settings(&settings)?;

    let invocation = Invocation {
        results_file: cli.results_file.clone(),
        query: cli.query.clone(),
        color,
    };
    let report = app::run(
        &settings,
        &invocation,
        |name| std::env::var(name).ok(),
        &mut client,
        &mut std::io::stdout().lock(),
    )?;
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let color = cli.color_enabled();
    init_tracing(cli.log_level(), color);

    match execute(&cli, color) {
        Ok(report) => {
            match &report.log {
                Ok(path) => ui::print_note(&format!("Analysis saved to: {}", path.display()), color),
                Err(err) => ui::print_warning(&err.to_string(), color),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            ui::print_error(&format!("{err:#}"), color);
            let code = err.downcast_ref::<VortexError>().map_or(1, VortexError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
