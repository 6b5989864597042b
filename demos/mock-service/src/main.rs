//! In-memory NEOS service driving a full job lifecycle.
//!
//! This example demonstrates how to implement the `NeosService` trait for a
//! local stand-in server. Each job advances one state per status poll:
//! `Waiting`, then `Running`, then `Done`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use neos_client::{
    ALIVE_SENTINEL, CancelFlag, Connection, JobCredential, JobId, NeosError, NeosResult,
    NeosService, PayloadPart, PollConfig, ResultChunk, SubmitOptions,
};

const TEMPLATE: &str = "<document>\n<category>nco</category>\n<solver>SNOPT</solver>\n\
<inputMethod>AMPL</inputMethod>\n<model><![CDATA[...Insert Value Here...]]></model>\n\
<data><![CDATA[...Insert Value Here...]]></data>\n\
<commands><![CDATA[...Insert Value Here...]]></commands>\n\
<comments><![CDATA[...Insert Value Here...]]></comments>\n</document>\n";

const STATES: [&str; 3] = ["Waiting", "Running", "Done"];

struct MockJob {
    password: String,
    polls: usize,
    output: String,
}

/// In-memory server.
struct MockService {
    jobs: Mutex<HashMap<u64, MockJob>>,
    next_id: Mutex<u64>,
}

impl MockService {
    fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1000),
        }
    }

    fn with_job<T>(
        &self,
        job: JobId,
        credential: &JobCredential,
        f: impl FnOnce(&mut MockJob) -> T,
    ) -> NeosResult<T> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&job.0) {
            Some(entry) if entry.password == credential.expose() => Ok(f(entry)),
            Some(_) => Err(NeosError::Fault {
                code: 2,
                message: "Password mismatch".into(),
            }),
            None => Err(NeosError::Fault {
                code: 1,
                message: format!("No such job {job}"),
            }),
        }
    }
}

#[async_trait]
impl NeosService for MockService {
    async fn ping(&self) -> NeosResult<String> {
        Ok(ALIVE_SENTINEL.to_string())
    }

    async fn version(&self) -> NeosResult<String> {
        Ok("neos-mock 1.0".into())
    }

    async fn print_queue(&self) -> NeosResult<String> {
        let jobs = self.jobs.lock().unwrap();
        Ok(format!("{} job(s) known", jobs.len()))
    }

    async fn email_help(&self) -> NeosResult<String> {
        Ok("Submit AMPL jobs to the nco category.".into())
    }

    async fn submit_job(
        &self,
        payload: &str,
        _options: &SubmitOptions,
    ) -> NeosResult<(i64, String)> {
        if !payload.contains("<model>") {
            return Ok((0, "Error: job document has no model".into()));
        }
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let password = format!("pw{id}");
        self.jobs.lock().unwrap().insert(
            id,
            MockJob {
                password: password.clone(),
                polls: 0,
                output: String::new(),
            },
        );
        Ok((id as i64, password))
    }

    async fn get_job_status(&self, job: JobId, credential: &JobCredential) -> NeosResult<String> {
        self.with_job(job, credential, |entry| {
            let state = STATES[entry.polls.min(STATES.len() - 1)];
            entry.polls += 1;
            entry.output.push_str(&format!("poll {}: {state}\n", entry.polls));
            state.to_string()
        })
    }

    async fn get_intermediate_results(
        &self,
        job: JobId,
        credential: &JobCredential,
        offset: u64,
    ) -> NeosResult<ResultChunk> {
        self.with_job(job, credential, |entry| {
            let start = (offset as usize).min(entry.output.len());
            ResultChunk::new(&entry.output[start..], entry.output.len() as u64)
        })
    }

    async fn get_final_results(&self, job: JobId, credential: &JobCredential) -> NeosResult<String> {
        self.with_job(job, credential, |_| {
            "SNOPT 7.2-8: Optimal solution found.\nc = 1.25\n".to_string()
        })
    }

    async fn list_categories(&self) -> NeosResult<BTreeMap<String, String>> {
        Ok(BTreeMap::from([(
            "nco".to_string(),
            "Nonlinearly Constrained Optimization".to_string(),
        )]))
    }

    async fn list_solvers_in_category(&self, category: &str) -> NeosResult<Vec<String>> {
        Ok(match category {
            "nco" => vec!["SNOPT:AMPL".into(), "MINOS:GAMS".into()],
            _ => Vec::new(),
        })
    }

    async fn list_all_solvers(&self) -> NeosResult<Vec<String>> {
        Ok(vec!["SNOPT:nco:AMPL".into(), "MINOS:nco:GAMS".into()])
    }

    async fn get_solver_template(
        &self,
        _category: &str,
        solver: &str,
        _input_format: &str,
    ) -> NeosResult<String> {
        if solver == "SNOPT" {
            Ok(TEMPLATE.to_string())
        } else {
            Ok(format!("Error: no template for {solver}"))
        }
    }

    async fn list_methods(&self) -> NeosResult<Vec<String>> {
        Ok(vec!["ping".into(), "submitJob".into()])
    }

    async fn method_help(&self, method: &str) -> NeosResult<String> {
        Ok(format!("{method}: see the NEOS manual"))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::connect(MockService::new()).await?;
    println!("Connected: {}", conn.is_connected());
    println!("Version:   {}", conn.server_version().unwrap_or("unknown"));
    println!();

    // Catalog
    for (category, solvers) in conn.ampl_solvers_by_category().await?.iter() {
        println!("{category}: {}", solvers.join(", "));
    }
    println!();

    // Build and submit
    let xml = conn
        .build_ampl_payload(
            "nco",
            "SNOPT",
            &[
                PayloadPart::Literal("var c >= 0;\nminimize obj: (c - 1.25)^2;".into()),
                PayloadPart::Empty,
                PayloadPart::Literal("solve;\ndisplay c;".into()),
                PayloadPart::Literal("mock run".into()),
            ],
        )
        .await?;
    let mut job = conn.submit(&xml, &SubmitOptions::default()).await?;
    println!("Job ID: {}", job.id);

    // Wait, streaming intermediate output
    let poll = PollConfig::default().with_interval(Duration::from_millis(50));
    let output = conn
        .await_completion(&mut job, &poll, &CancelFlag::new(), |chunk| print!("{chunk}"))
        .await?;
    println!();
    println!("Final results:\n{output}");

    Ok(())
}
