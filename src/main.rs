mod app;
mod catalog;
mod config;
mod error;
mod models;
mod report;
mod runner;
mod selection;
mod server;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use app::{App, Coordinator, Request, Response, handle_request};
use catalog::Catalog;
use config::Config;
use models::Severity;

/// Run discovered tests on request and report the results as JSON.
#[derive(Debug, Parser)]
#[command(name = "runway", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve requests over TCP (the default)
    Serve {
        /// Address to listen on, overriding the configuration
        #[arg(long)]
        listen: Option<String>,
    },
    /// Print the discovered tests
    List,
    /// Run a selection once and print the report
    Run(RunArgs),
}

#[derive(Debug, Args)]
#[group(multiple = false)]
struct RunArgs {
    /// Full name of a single test
    #[arg(long)]
    test: Option<String>,
    /// Every test of one fixture
    #[arg(long)]
    fixture: Option<String>,
    /// Comma separated categories
    #[arg(long)]
    categories: Option<String>,
}

impl RunArgs {
    fn into_request(self) -> Request {
        if let Some(id) = self.test {
            Request::RunTest { id }
        } else if let Some(name) = self.fixture {
            Request::RunFixture { name }
        } else if let Some(name) = self.categories {
            Request::RunCategories { name }
        } else {
            Request::RunAll
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries JSON.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("runway: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(&cli.config)?;
    tracing::info!(
        path = %cli.config.display(),
        assemblies = config.engine.assemblies.len(),
        "loaded configuration"
    );

    let engine = runner::detect(&config.engine);
    let tree = engine
        .discover()
        .await
        .with_context(|| format!("failed to discover tests with {}", engine.name()))?;
    let catalog = Catalog::build(&tree);
    tracing::info!(
        tests = catalog.len(),
        categories = catalog.categories().len(),
        "built test catalog"
    );

    let coordinator = Coordinator::new(engine, Arc::new(catalog), config.result_path.clone());
    let app = Arc::new(App::new(coordinator, config.listing()));

    match cli.command.unwrap_or(Command::Serve { listen: None }) {
        Command::Serve { listen } => {
            let addr = listen.unwrap_or_else(|| config.listen.clone());
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to listen on {addr}"))?;
            let shutdown = cancel_on_ctrl_c(app.coordinator.clone());
            server::serve(app, listener, shutdown).await?;
            Ok(ExitCode::SUCCESS)
        }

        Command::List => {
            print_json(&app.coordinator.catalog().listing())?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Run(args) => {
            cancel_on_ctrl_c(app.coordinator.clone());
            let response = handle_request(&app, args.into_request()).await;
            print_json(&response)?;

            let passed = match &response {
                Response::Run(reply) => reply
                    .report()
                    .is_some_and(|report| report.severity() != Severity::Danger),
                _ => false,
            };
            Ok(if passed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

/// On ctrl-c, cancel the active run and fire the returned token.
fn cancel_on_ctrl_c(coordinator: Coordinator) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("interrupted, stopping");
        coordinator.cancel();
        trigger.cancel();
    });

    token
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{json}");
    Ok(())
}
