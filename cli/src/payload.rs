//! Job document selection for a submission.

use std::process::ExitCode;

use anyhow::{Context, Result};
use neos_client::{Connection, Job, NeosService, PayloadPart};

use crate::args::Cli;

/// Exit status for a connection that failed the liveness check.
pub fn liveness_exit<S: NeosService>(conn: &Connection<S>) -> Option<ExitCode> {
    if conn.is_connected() {
        return None;
    }
    eprintln!("Either we are currently not connected or");
    eprintln!("Neos Server does not appear to be alive");
    Some(ExitCode::FAILURE)
}

/// The job document to submit: `--submit-xml` as-is, or built from the AMPL flags.
///
/// Returns `None` after reporting a missing required flag.
pub async fn load_payload<S: NeosService>(
    cli: &Cli,
    conn: &Connection<S>,
) -> Result<Option<String>> {
    match &cli.submit_xml {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job document {}", path.display()))
            .map(Some),
        None => build_payload(cli, conn).await,
    }
}

async fn build_payload<S: NeosService>(
    cli: &Cli,
    conn: &Connection<S>,
) -> Result<Option<String>> {
    cli.print_selection();

    let (Some(model), Some(category), Some(solver)) = (&cli.model, &cli.category, &cli.solver)
    else {
        eprintln!("{}", cli.missing_requirement());
        return Ok(None);
    };

    if cli.data.is_none() {
        eprintln!("It would be good usage to have model and data");
        eprintln!("in two different files. I will forward your model");
        eprintln!("to the server as-is anyways...");
    }

    let parts = [
        PayloadPart::from(model.as_str()),
        PayloadPart::from_option(cli.data.clone()),
        PayloadPart::from_option(cli.commands.clone()),
        PayloadPart::Literal(cli.comment.clone().unwrap_or_default()),
    ];
    let payload = conn
        .build_ampl_payload(category, solver, &parts)
        .await
        .with_context(|| format!("Failed to build job document for {category}:{solver}"))?;
    Ok(Some(payload))
}

/// Line announcing an accepted job.
///
/// The password is printed on purpose: it is the only way to fetch the
/// results of a job whose wait was interrupted.
pub fn submission_line(job: &Job) -> String {
    format!(
        "jobNumber = {}\tpassword = {}",
        job.id,
        job.credential.expose()
    )
}
