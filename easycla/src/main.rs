use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;
mod observability;

#[derive(Parser)]
#[command(about = "CLA metrics aggregation and composition engine")]
struct Cli {
    #[arg(long, default_value = "easycla.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the REST API and the admin endpoints.
    Api,
    /// Route one batch of change-stream records and print a summary.
    Stream {
        /// Batch file in DynamoDB Streams JSON; stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = observability::init_logging(&config.logging);
    if let Some(metrics) = &config.metrics {
        if let Err(e) = observability::init_metrics(metrics) {
            tracing::error!(error = %e, "metrics disabled");
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "could not start runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        match &cli.command {
            CliCommand::Api => {
                tracing::info!(stage = %config.stage, "starting api");
                commands::run_api(&config).await
            }
            CliCommand::Stream { input } => {
                let summary = commands::run_stream(&config, input.as_deref()).await?;
                match serde_json::to_string(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::warn!(error = %e, "could not render batch summary"),
                }
                Ok::<(), commands::CommandError>(())
            }
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}
