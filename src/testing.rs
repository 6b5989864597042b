//! Scripted [`NeosService`] for unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{NeosError, NeosResult};
use crate::job::{JobCredential, JobId, SubmitOptions};
use crate::result::ResultChunk;
use crate::service::{ALIVE_SENTINEL, NeosService};
use crate::template::PLACEHOLDER;

#[derive(Debug, Default)]
pub(crate) struct Calls {
    pub version: AtomicUsize,
    pub submit: AtomicUsize,
    pub status: AtomicUsize,
    pub intermediate: AtomicUsize,
    pub final_results: AtomicUsize,
}

#[derive(Debug)]
enum Ping {
    Reply(String),
    Unreachable,
}

#[derive(Debug)]
pub(crate) struct ScriptedService {
    ping: Ping,
    rejection: Option<String>,
    statuses: Mutex<VecDeque<String>>,
    offsets: Mutex<VecDeque<u64>>,
    all_solvers: Vec<String>,
    requested: Mutex<Vec<u64>>,
    payloads: Mutex<Vec<String>>,
    pub calls: Calls,
}

impl ScriptedService {
    pub fn alive() -> Self {
        Self::with_ping(ALIVE_SENTINEL)
    }

    pub fn with_ping(reply: &str) -> Self {
        Self {
            ping: Ping::Reply(reply.to_string()),
            rejection: None,
            statuses: Mutex::new(VecDeque::from(vec!["Done".to_string()])),
            offsets: Mutex::new(VecDeque::new()),
            all_solvers: vec![
                "SNOPT:nco:AMPL".into(),
                "KNITRO:nco:AMPL".into(),
                "MINOS:nco:GAMS".into(),
                "PCx:lp:MPS".into(),
            ],
            requested: Mutex::new(Vec::new()),
            payloads: Mutex::new(Vec::new()),
            calls: Calls::default(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            ping: Ping::Unreachable,
            ..Self::alive()
        }
    }

    pub fn rejecting(mut self, message: &str) -> Self {
        self.rejection = Some(message.to_string());
        self
    }

    /// Replies of successive `getJobStatus` calls; the last one repeats.
    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        *self.statuses.lock().unwrap() = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Offsets returned by successive `getIntermediateResults` calls.
    pub fn with_offsets(self, offsets: &[u64]) -> Self {
        *self.offsets.lock().unwrap() = offsets.iter().copied().collect();
        self
    }

    pub fn with_all_solvers(mut self, solvers: &[&str]) -> Self {
        self.all_solvers = solvers.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn requested_offsets(&self) -> Vec<u64> {
        self.requested.lock().unwrap().clone()
    }

    pub fn last_payload(&self) -> Option<String> {
        self.payloads.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl NeosService for ScriptedService {
    async fn ping(&self) -> NeosResult<String> {
        match &self.ping {
            Ping::Reply(reply) => Ok(reply.clone()),
            Ping::Unreachable => Err(NeosError::Http {
                status: 502,
                message: "Bad Gateway".into(),
            }),
        }
    }

    async fn version(&self) -> NeosResult<String> {
        self.calls.version.fetch_add(1, Ordering::SeqCst);
        Ok("neos-5.0".into())
    }

    async fn print_queue(&self) -> NeosResult<String> {
        Ok("Running:\n  4711 SNOPT\n".into())
    }

    async fn email_help(&self) -> NeosResult<String> {
        Ok("Submit jobs by email or XML-RPC.".into())
    }

    async fn submit_job(
        &self,
        payload: &str,
        _options: &SubmitOptions,
    ) -> NeosResult<(i64, String)> {
        self.calls.submit.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.to_string());
        match &self.rejection {
            Some(message) => Ok((0, message.clone())),
            None => Ok((4711, "pw4711".into())),
        }
    }

    async fn get_job_status(&self, _job: JobId, _credential: &JobCredential) -> NeosResult<String> {
        self.calls.status.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        Ok(status.unwrap_or_else(|| "Done".into()))
    }

    async fn get_intermediate_results(
        &self,
        _job: JobId,
        _credential: &JobCredential,
        offset: u64,
    ) -> NeosResult<ResultChunk> {
        let n = self.calls.intermediate.fetch_add(1, Ordering::SeqCst) + 1;
        self.requested.lock().unwrap().push(offset);
        let text = format!("chunk{n} ");
        let next = self
            .offsets
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(offset + text.len() as u64);
        Ok(ResultChunk::new(text, next))
    }

    async fn get_final_results(
        &self,
        _job: JobId,
        _credential: &JobCredential,
    ) -> NeosResult<String> {
        self.calls.final_results.fetch_add(1, Ordering::SeqCst);
        Ok("final answer".into())
    }

    async fn list_categories(&self) -> NeosResult<BTreeMap<String, String>> {
        Ok(BTreeMap::from([
            ("lp".to_string(), "Linear Programming".to_string()),
            (
                "nco".to_string(),
                "Nonlinearly Constrained Optimization".to_string(),
            ),
        ]))
    }

    async fn list_solvers_in_category(&self, category: &str) -> NeosResult<Vec<String>> {
        Ok(match category {
            "nco" => vec!["SNOPT:AMPL".into(), "MINOS:GAMS".into(), "KNITRO:AMPL".into()],
            "lp" => vec!["PCx:MPS".into()],
            _ => vec![],
        })
    }

    async fn list_all_solvers(&self) -> NeosResult<Vec<String>> {
        Ok(self.all_solvers.clone())
    }

    async fn get_solver_template(
        &self,
        category: &str,
        solver: &str,
        input_format: &str,
    ) -> NeosResult<String> {
        if solver != "SNOPT" {
            return Ok(format!("Error: no template for {solver}"));
        }
        let p = PLACEHOLDER;
        Ok(format!(
            "<document><category>{category}</category><solver>{solver}</solver>\
             <inputMethod>{input_format}</inputMethod><model>{p}</model><data>{p}</data>\
             <commands>{p}</commands><comments>{p}</comments></document>"
        ))
    }

    async fn list_methods(&self) -> NeosResult<Vec<String>> {
        Ok(vec!["ping".into(), "version".into()])
    }

    async fn method_help(&self, method: &str) -> NeosResult<String> {
        Ok(format!("help for {method}"))
    }
}
