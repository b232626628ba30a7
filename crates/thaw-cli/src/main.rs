//! thaw CLI - recall, verify and fetch archive-tier objects.
//!
//! The main entry point for the `thaw` binary.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use thaw_cli::commands::list::LIST_COMMANDS_ENTRY;
use thaw_cli::registry::CommandRegistry;
use thaw_cli::session::Session;
use thaw_cli::{Cli, Config, describe_error};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config();
    thaw_core::init_logging(config.log_format);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", describe_error(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let registry = CommandRegistry::builtin();
    let selector = config
        .command
        .clone()
        .unwrap_or_else(|| LIST_COMMANDS_ENTRY.0.to_string());
    let operation = registry.lookup(&selector)?;

    let session = if operation.requires_store() {
        Session::connect(config).await?
    } else {
        Session::offline(config)
    };
    watch_for_interrupt(session.cancellation().clone());

    tracing::debug!(command = operation.name(), "running");
    operation.run(&session).await?;

    if operation.requires_store() {
        println!("Ready");
    }
    Ok(())
}

fn watch_for_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling outstanding work");
            cancel.cancel();
        }
    });
}
