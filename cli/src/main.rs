//! neos-submit
//!
//! Command-line client for the NEOS Server for Optimization. Builds a job
//! document from AMPL model, data and command files, submits it, streams the
//! solver output to stdout and prints the final results.

mod args;
mod output;
mod payload;

use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use neos_client::{CancelFlag, Connection, NeosError};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neos_client=info,neos_submit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.client_config();

    let conn = Connection::open(&config)
        .await
        .with_context(|| format!("Failed to reach NEOS server at {}", config.endpoint()))?;
    if let Some(code) = payload::liveness_exit(&conn) {
        return Ok(code);
    }
    eprintln!(
        " Version : {}",
        conn.server_version().unwrap_or("unknown").trim_end()
    );

    if cli.wants_information() {
        show_information(&cli, &conn).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(payload) = payload::load_payload(&cli, &conn).await? else {
        return Ok(ExitCode::FAILURE);
    };

    submit_and_wait(&cli, &conn, &payload).await?;
    Ok(ExitCode::SUCCESS)
}

/// Print server information selected by the informational flags.
async fn show_information(cli: &Cli, conn: &Connection) -> Result<()> {
    if cli.help_server {
        eprintln!("{}", conn.server_help().await?);
    }
    if cli.help_methods {
        let methods = conn.server_methods().await?;
        output::print_methods(&methods, cli.json)?;
    }
    if cli.queue {
        eprintln!("{}", conn.queue().await?);
    }
    if cli.solvers_list {
        let index = conn.ampl_solvers_by_category().await?;
        output::print_index(&index, cli.json)?;
    }
    Ok(())
}

async fn submit_and_wait(cli: &Cli, conn: &Connection, payload: &str) -> Result<()> {
    let mut job = conn
        .submit(payload, &cli.submit_options())
        .await
        .context("Job submission failed")?;
    eprintln!("{}", payload::submission_line(&job));

    let cancel = CancelFlag::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping the wait");
            trigger.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    let result = conn
        .await_completion(&mut job, &cli.poll_config(), &cancel, |chunk| {
            // Streamed output is best-effort.
            let _ = stdout.write_all(chunk.as_bytes());
            let _ = stdout.flush();
        })
        .await;

    match result {
        Ok(final_output) => {
            stdout.write_all(final_output.as_bytes())?;
            stdout.flush()?;
            info!(job = %job.id, "Done");
            Ok(())
        }
        Err(err) => {
            if let Some(orphan) = err.orphaned_job() {
                eprintln!(
                    "Job {orphan} is still running on the server; its results can be fetched later with the password above"
                );
            }
            if let NeosError::UnknownStatus(status) = &err {
                eprintln!("Server reported job status {status:?}");
            }
            Err(err).context(format!("Waiting for job {} failed", job.id))
        }
    }
}
