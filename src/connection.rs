//! Connection to a NEOS server and the job lifecycle driven over it.
//!
//! ```text
//!   connect() ──→ submit() ──→ await_completion() ──→ final results
//!    (ping)       (id, pw)     (sleep → fetch → poll)*
//! ```
//!
//! A [`Connection`] is opened once. If the server does not answer the
//! liveness probe with the exact sentinel, the connection is kept but marked
//! not connected; every later operation then fails with
//! [`NeosError::NotConnected`]. Transport failures during the probe are
//! returned as errors instead.

use chrono::Utc;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::catalog::{self, AMPL, Category, SolverEntry, SolverIndex};
use crate::config::ClientConfig;
use crate::error::{NeosError, NeosResult};
use crate::job::{Job, JobCredential, JobId, JobStatus, SubmitOptions};
use crate::poll::{CancelFlag, PollBudget, PollConfig};
use crate::result::ResultChunk;
use crate::service::{ALIVE_SENTINEL, NeosService};
use crate::template::{self, PLACEHOLDER, PayloadPart};
use crate::transport::XmlRpcService;

/// An opened connection to a NEOS server.
#[derive(Debug)]
pub struct Connection<S = XmlRpcService> {
    service: S,
    connected: bool,
    server_version: Option<String>,
}

impl Connection<XmlRpcService> {
    /// Open a connection to the server described by `config`.
    pub async fn open(config: &ClientConfig) -> NeosResult<Self> {
        let service = XmlRpcService::new(config)?;
        info!(endpoint = %service.endpoint(), "Connecting to NEOS server");
        Self::connect(service).await
    }
}

impl<S: NeosService> Connection<S> {
    /// Probe `service` for liveness and cache its version.
    pub async fn connect(service: S) -> NeosResult<Self> {
        let reply = service.ping().await?;
        if reply != ALIVE_SENTINEL {
            warn!(reply = %reply.trim_end(), "NEOS server did not report itself alive");
            return Ok(Self {
                service,
                connected: false,
                server_version: None,
            });
        }

        let version = service.version().await?;
        info!(version = %version.trim_end(), "Connected to NEOS server");
        Ok(Self {
            service,
            connected: true,
            server_version: Some(version),
        })
    }

    /// Whether the liveness probe succeeded.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Version reported by the server, if connected.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// The underlying service.
    pub fn service(&self) -> &S {
        &self.service
    }

    fn live(&self) -> NeosResult<&S> {
        if self.connected {
            Ok(&self.service)
        } else {
            Err(NeosError::NotConnected)
        }
    }

    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submit a job document.
    ///
    /// A job number of 0 from the server becomes
    /// [`NeosError::SubmissionRejected`] carrying the server's message.
    pub async fn submit(&self, payload: &str, options: &SubmitOptions) -> NeosResult<Job> {
        let service = self.live()?;
        let (id, credential) = service.submit_job(payload, options).await?;
        if id == 0 {
            warn!(reason = %credential, "Submission rejected");
            return Err(NeosError::SubmissionRejected(credential));
        }
        let id = u64::try_from(id)
            .map_err(|_| NeosError::malformed(format!("negative job number {id}")))?;

        let job = Job::submitted(JobId(id), JobCredential::new(credential));
        info!(job = %job.id, "Job submitted");
        Ok(job)
    }

    /// Ask the server for the job status and record it on `job`.
    pub async fn poll_status(&self, job: &mut Job) -> NeosResult<JobStatus> {
        let raw = self
            .live()?
            .get_job_status(job.id, &job.credential)
            .await?;
        let status = JobStatus::parse(&raw);
        debug!(job = %job.id, %status, "Job status");
        job.status = status.clone();
        Ok(status)
    }

    /// Fetch intermediate output past `job.result_offset` and advance it.
    pub async fn fetch_intermediate(&self, job: &mut Job) -> NeosResult<ResultChunk> {
        let requested = job.result_offset;
        let mut chunk = self
            .live()?
            .get_intermediate_results(job.id, &job.credential, requested)
            .await?;
        if !job.advance_offset(chunk.offset) {
            warn!(
                job = %job.id,
                requested,
                returned = chunk.offset,
                "Server moved the result offset backwards; keeping the current one"
            );
            chunk.offset = job.result_offset;
        }
        Ok(chunk)
    }

    /// Fetch the final output of a finished job.
    pub async fn fetch_final(&self, job: &Job) -> NeosResult<String> {
        self.live()?
            .get_final_results(job.id, &job.credential)
            .await
    }

    /// Poll `job` until it is done and return its final output.
    ///
    /// Each iteration sleeps `poll.interval`, hands new intermediate output
    /// to `sink`, then refreshes the status. Once the status is `Done` the
    /// final results are fetched exactly once.
    ///
    /// Cancellation and the `poll.timeout` deadline interrupt the sleep and
    /// any request in flight, so the wait never outlives its deadline.
    ///
    /// The wait ends early with [`NeosError::Cancelled`],
    /// [`NeosError::PollBudgetExhausted`] or [`NeosError::Timeout`]; in
    /// those cases the job keeps running on the server. A status other than
    /// `Waiting`, `Running` or `Done` fails with
    /// [`NeosError::UnknownStatus`].
    pub async fn await_completion(
        &self,
        job: &mut Job,
        poll: &PollConfig,
        cancel: &CancelFlag,
        mut sink: impl FnMut(&str),
    ) -> NeosResult<String> {
        self.live()?;
        let mut budget = PollBudget::start(poll);
        let id = job.id;

        loop {
            match &job.status {
                JobStatus::Waiting | JobStatus::Running => {}
                JobStatus::Done => {
                    let output = budget.guard(id, cancel, self.fetch_final(job)).await?;
                    info!(
                        job = %id,
                        polls = budget.polls(),
                        age_secs = job.age_at(Utc::now()).num_seconds(),
                        "Job finished"
                    );
                    return Ok(output);
                }
                JobStatus::Unknown(raw) => return Err(NeosError::UnknownStatus(raw.clone())),
            }

            let iteration = budget.next_poll(id, cancel)?;
            budget
                .guard(id, cancel, async {
                    tokio::time::sleep(poll.interval).await;
                    Ok(())
                })
                .await?;

            let chunk = budget.guard(id, cancel, self.fetch_intermediate(job)).await?;
            if !chunk.is_empty() {
                sink(&chunk.text);
            }
            budget.guard(id, cancel, self.poll_status(job)).await?;
            debug!(job = %id, iteration, offset = job.result_offset, "Poll iteration");
        }
    }

    /// Submit a job document and wait for its final output.
    pub async fn run(
        &self,
        payload: &str,
        options: &SubmitOptions,
        poll: &PollConfig,
        cancel: &CancelFlag,
        sink: impl FnMut(&str),
    ) -> NeosResult<String> {
        let mut job = self.submit(payload, options).await?;
        self.await_completion(&mut job, poll, cancel, sink).await
    }

    // =============================================================================
    // Service Introspection
    // =============================================================================

    /// Current job queue as text.
    pub async fn queue(&self) -> NeosResult<String> {
        self.live()?.print_queue().await
    }

    /// General help text of the server.
    pub async fn server_help(&self) -> NeosResult<String> {
        self.live()?.email_help().await
    }

    /// Every remote method with its help text.
    pub async fn server_methods(&self) -> NeosResult<FxHashMap<String, String>> {
        let service = self.live()?;
        let mut methods = FxHashMap::default();
        for method in service.list_methods().await? {
            let help = service.method_help(&method).await?;
            methods.insert(method, help);
        }
        Ok(methods)
    }

    /// Solver categories, ordered by code.
    pub async fn categories(&self) -> NeosResult<Vec<Category>> {
        let categories = self.live()?.list_categories().await?;
        Ok(categories
            .into_iter()
            .map(|(code, name)| Category { code, name })
            .collect())
    }

    /// Solvers of one category.
    pub async fn solvers_in_category(&self, category: &str) -> NeosResult<Vec<SolverEntry>> {
        self.live()?
            .list_solvers_in_category(category)
            .await?
            .iter()
            .map(|entry| SolverEntry::parse_in_category(category, entry))
            .collect()
    }

    /// Every solver the server knows.
    pub async fn all_solvers(&self) -> NeosResult<Vec<SolverEntry>> {
        self.live()?
            .list_all_solvers()
            .await?
            .iter()
            .map(|entry| SolverEntry::parse(entry))
            .collect()
    }

    /// Distinct input formats accepted by any solver.
    pub async fn input_formats(&self) -> NeosResult<Vec<String>> {
        let solvers = self.all_solvers().await?;
        Ok(catalog::input_formats(&solvers))
    }

    /// Category code → solvers accepting `input_format`.
    pub async fn solvers_for_format(&self, input_format: &str) -> NeosResult<SolverIndex> {
        let solvers = self.all_solvers().await?;
        Ok(SolverIndex::for_format(&solvers, input_format))
    }

    /// Category code → solvers accepting AMPL input.
    pub async fn ampl_solvers(&self) -> NeosResult<SolverIndex> {
        self.solvers_for_format(AMPL).await
    }

    /// `"Full Name (code)"` → AMPL solvers, one query per category.
    ///
    /// Categories without AMPL solvers are listed with no solvers.
    pub async fn ampl_solvers_by_category(&self) -> NeosResult<SolverIndex> {
        let mut index = SolverIndex::new();
        for category in self.categories().await? {
            let label = category.label();
            index.ensure_category(label.clone());
            for solver in self.solvers_in_category(&category.code).await? {
                if solver.accepts(AMPL) {
                    index.insert(label.clone(), solver.name);
                }
            }
        }
        Ok(index)
    }

    // =============================================================================
    // Job Documents
    // =============================================================================

    /// Build a job document for an AMPL solver.
    ///
    /// `parts` fill the template in order: model, data, commands, comments.
    pub async fn build_ampl_payload(
        &self,
        category: &str,
        solver: &str,
        parts: &[PayloadPart],
    ) -> NeosResult<String> {
        let template = self
            .live()?
            .get_solver_template(category, solver, AMPL)
            .await?;
        if !template.contains(PLACEHOLDER) {
            return Err(NeosError::InvalidSolverTemplate(format!(
                "{category}:{solver}:{AMPL}"
            )));
        }
        template::build_submission_payload(&template, parts)
    }

    /// Build a job document for any supported input format.
    pub async fn build_payload(
        &self,
        category: &str,
        solver: &str,
        input_format: &str,
        parts: &[PayloadPart],
    ) -> NeosResult<String> {
        self.live()?;
        match input_format {
            AMPL => self.build_ampl_payload(category, solver, parts).await,
            other => Err(NeosError::Unsupported(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedService;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    async fn connected(service: ScriptedService) -> Connection<ScriptedService> {
        let conn = Connection::connect(service).await.unwrap();
        assert!(conn.is_connected());
        conn
    }

    #[tokio::test]
    async fn test_connect_caches_version() {
        let conn = connected(ScriptedService::alive()).await;
        assert_eq!(conn.server_version(), Some("neos-5.0"));
        assert_eq!(conn.service().calls.version.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_soft_failure() {
        let conn = Connection::connect(ScriptedService::with_ping("NeosServer is sleeping\n"))
            .await
            .unwrap();
        assert!(!conn.is_connected());
        assert_eq!(conn.server_version(), None);
        assert_eq!(conn.service().calls.version.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sentinel_must_match_exactly() {
        let conn = Connection::connect(ScriptedService::with_ping("NeosServer is alive"))
            .await
            .unwrap();
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_connect_transport_failure_is_error() {
        let err = Connection::connect(ScriptedService::unreachable())
            .await
            .unwrap_err();
        assert!(matches!(err, NeosError::Http { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_submit_not_connected() {
        let conn = Connection::connect(ScriptedService::with_ping("down"))
            .await
            .unwrap();
        let err = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NeosError::NotConnected));
        assert_eq!(conn.service().calls.submit.load(Ordering::SeqCst), 0);

        assert!(matches!(conn.queue().await, Err(NeosError::NotConnected)));
        assert!(matches!(
            conn.ampl_solvers().await,
            Err(NeosError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_submit_rejected_carries_message() {
        let conn = connected(ScriptedService::alive().rejecting("Error: no solver named FOO")).await;
        let err = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap_err();
        match err {
            NeosError::SubmissionRejected(message) => {
                assert_eq!(message, "Error: no solver named FOO");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_accepted() {
        let conn = connected(ScriptedService::alive()).await;
        let job = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(job.id, JobId(4711));
        assert_eq!(job.credential.expose(), "pw4711");
        assert_eq!(job.status, JobStatus::Waiting);
        assert_eq!(job.result_offset, 0);
        assert_eq!(
            conn.service().last_payload().as_deref(),
            Some("<document/>")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_completion_polls_until_done() {
        let conn = connected(
            ScriptedService::alive().with_statuses(&["Waiting", "Running", "Running", "Done"]),
        )
        .await;
        let mut job = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap();

        let mut streamed = String::new();
        let output = conn
            .await_completion(&mut job, &PollConfig::default(), &CancelFlag::new(), |chunk| {
                streamed.push_str(chunk)
            })
            .await
            .unwrap();

        let calls = &conn.service().calls;
        assert_eq!(calls.intermediate.load(Ordering::SeqCst), 4);
        assert_eq!(calls.status.load(Ordering::SeqCst), 4);
        assert_eq!(calls.final_results.load(Ordering::SeqCst), 1);
        assert_eq!(output, "final answer");
        assert_eq!(streamed, "chunk1 chunk2 chunk3 chunk4 ");
        assert_eq!(job.status, JobStatus::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offsets_requested_are_monotonic() {
        let conn = connected(
            ScriptedService::alive()
                .with_statuses(&["Running", "Running", "Running", "Done"])
                .with_offsets(&[10, 4, 25, 25]),
        )
        .await;
        let mut job = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap();
        conn.await_completion(&mut job, &PollConfig::default(), &CancelFlag::new(), |_| {})
            .await
            .unwrap();

        let requested = conn.service().requested_offsets();
        assert_eq!(requested, vec![0, 10, 10, 25]);
        assert!(requested.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(job.result_offset, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_is_an_error() {
        let conn = connected(ScriptedService::alive().with_statuses(&["Running", "Failed"])).await;
        let mut job = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap();
        let err = conn
            .await_completion(&mut job, &PollConfig::default(), &CancelFlag::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, NeosError::UnknownStatus(ref s) if s == "Failed"));
        assert_eq!(conn.service().calls.final_results.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_budget_exhausted() {
        let conn = connected(ScriptedService::alive().with_statuses(&["Running"; 10])).await;
        let mut job = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap();
        let poll = PollConfig::default().with_max_polls(3);
        let err = conn
            .await_completion(&mut job, &poll, &CancelFlag::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NeosError::PollBudgetExhausted {
                job: JobId(4711),
                polls: 3
            }
        ));
        assert_eq!(conn.service().calls.status.load(Ordering::SeqCst), 3);
        assert_eq!(conn.service().calls.final_results.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cuts_the_last_sleep_short() {
        let conn = connected(ScriptedService::alive().with_statuses(&["Waiting"; 10])).await;
        let mut job = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap();
        let poll = PollConfig::default()
            .with_interval(Duration::from_secs(2))
            .with_timeout(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        let err = conn
            .await_completion(&mut job, &poll, &CancelFlag::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, NeosError::Timeout { job: JobId(4711) }));
        // Status polls at t=2 and t=4; the sleep started at t=4 ends at t=5.
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(conn.service().calls.status.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shorter_than_interval() {
        let conn = connected(ScriptedService::alive().with_statuses(&["Waiting"])).await;
        let mut job = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap();
        let poll = PollConfig::default()
            .with_interval(Duration::from_secs(30))
            .with_timeout(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        let err = conn
            .await_completion(&mut job, &poll, &CancelFlag::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, NeosError::Timeout { job: JobId(4711) }));
        assert!(started.elapsed() <= Duration::from_secs(5));
        assert_eq!(conn.service().calls.intermediate.load(Ordering::SeqCst), 0);
        assert_eq!(conn.service().calls.status.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let conn = connected(ScriptedService::alive().with_statuses(&["Running"])).await;
        let mut job = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap();
        let poll = PollConfig::default().with_interval(Duration::from_secs(60));
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let started = tokio::time::Instant::now();
        let err = conn
            .await_completion(&mut job, &poll, &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, NeosError::Cancelled { job: JobId(4711) }));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(conn.service().calls.intermediate.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_local_polling() {
        let conn = connected(ScriptedService::alive().with_statuses(&["Running"; 10])).await;
        let mut job = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap();
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let mut seen = 0;
        let err = conn
            .await_completion(&mut job, &PollConfig::default(), &cancel, |_| {
                seen += 1;
                if seen == 2 {
                    trigger.cancel();
                }
            })
            .await
            .unwrap_err();
        assert_eq!(err.orphaned_job(), Some(JobId(4711)));
        assert!(matches!(err, NeosError::Cancelled { .. }));
        assert_eq!(conn.service().calls.intermediate.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_done_fetches_final_once() {
        let conn = connected(ScriptedService::alive()).await;
        let mut job = conn
            .submit("<document/>", &SubmitOptions::default())
            .await
            .unwrap();
        job.status = JobStatus::Done;
        let output = conn
            .await_completion(&mut job, &PollConfig::default(), &CancelFlag::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(output, "final answer");
        assert_eq!(conn.service().calls.intermediate.load(Ordering::SeqCst), 0);
        assert_eq!(conn.service().calls.final_results.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_submits_and_waits() {
        let conn = connected(ScriptedService::alive().with_statuses(&["Done"])).await;
        let output = conn
            .run(
                "<document/>",
                &SubmitOptions::default(),
                &PollConfig::default(),
                &CancelFlag::new(),
                |_| {},
            )
            .await
            .unwrap();
        assert_eq!(output, "final answer");
    }

    #[tokio::test]
    async fn test_ampl_solvers_filter_by_format() {
        let conn = connected(
            ScriptedService::alive().with_all_solvers(&["solverA:cat1:AMPL", "solverB:cat1:OTHER"]),
        )
        .await;
        let index = conn.ampl_solvers().await.unwrap();
        assert!(index.contains("cat1", "solverA"));
        assert!(!index.contains("cat1", "solverB"));
        assert_eq!(conn.input_formats().await.unwrap(), ["AMPL", "OTHER"]);
    }

    #[tokio::test]
    async fn test_ampl_solvers_by_category_labels() {
        let conn = connected(ScriptedService::alive()).await;
        let index = conn.ampl_solvers_by_category().await.unwrap();
        assert_eq!(
            index.solvers("Nonlinearly Constrained Optimization (nco)"),
            ["KNITRO", "SNOPT"]
        );
        assert!(index.solvers("Linear Programming (lp)").is_empty());
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_server_methods_collects_help() {
        let conn = connected(ScriptedService::alive()).await;
        let methods = conn.server_methods().await.unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods["ping"], "help for ping");
    }

    #[tokio::test]
    async fn test_build_ampl_payload() {
        let conn = connected(ScriptedService::alive()).await;
        let payload = conn
            .build_ampl_payload(
                "nco",
                "SNOPT",
                &[
                    PayloadPart::Literal("var x;".into()),
                    PayloadPart::Empty,
                    PayloadPart::Literal("solve;".into()),
                    PayloadPart::Literal("lifecycle".into()),
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            payload,
            "<document><category>nco</category><solver>SNOPT</solver><inputMethod>AMPL</inputMethod>\
             <model>var x;</model><data></data><commands>solve;</commands><comments>lifecycle</comments></document>"
        );
    }

    #[tokio::test]
    async fn test_build_payload_rejects_bad_template_and_format() {
        let conn = connected(ScriptedService::alive()).await;
        let err = conn
            .build_ampl_payload("nco", "NOSUCH", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NeosError::InvalidSolverTemplate(_)));

        let err = conn
            .build_payload("nco", "SNOPT", "GAMS", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NeosError::Unsupported(ref f) if f == "GAMS"));
    }
}
