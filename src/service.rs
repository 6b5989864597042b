//! The remote service contract.
//!
//! The [`NeosService`] trait is the raw surface of the NEOS server: one
//! method per remote procedure, returning what the server sent with only the
//! wire encoding removed. Interpretation (status parsing, rejection
//! handling, catalog parsing, the poll loop) lives in
//! [`Connection`](crate::connection::Connection), so a test double only has
//! to script server replies.
//!
//! ## Method table
//!
//! | Method | Remote call | Returns |
//! |--------|-------------|---------|
//! | `ping()` | `ping` | liveness sentinel |
//! | `version()` | `version` | version string |
//! | `print_queue()` | `printQueue` | queue listing |
//! | `email_help()` | `emailHelp` | help text |
//! | `submit_job()` | `submitJob` | `(job number, password or error)` |
//! | `get_job_status()` | `getJobStatus` | raw status string |
//! | `get_intermediate_results()` | `getIntermediateResults` | [`ResultChunk`] |
//! | `get_final_results()` | `getFinalResults` | final text |
//! | `list_categories()` | `listCategories` | code → name |
//! | `list_solvers_in_category()` | `listSolversInCategory` | `"solver:format"` |
//! | `list_all_solvers()` | `listAllSolvers` | `"solver:category:format"` |
//! | `get_solver_template()` | `getSolverTemplate` | job template |
//! | `list_methods()` | `system.listMethods` | method names |
//! | `method_help()` | `system.methodHelp` | help text |

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::NeosResult;
use crate::job::{JobCredential, JobId, SubmitOptions};
use crate::result::ResultChunk;

/// Exact reply of `ping` from a live server.
pub const ALIVE_SENTINEL: &str = "NeosServer is alive\n";

/// Raw remote procedures exposed by a NEOS server.
///
/// Every method is a single round trip. Implementations MUST NOT retry.
#[async_trait]
pub trait NeosService: Send + Sync {
    /// Liveness probe. A live server answers [`ALIVE_SENTINEL`].
    async fn ping(&self) -> NeosResult<String>;

    /// Server version string.
    async fn version(&self) -> NeosResult<String>;

    /// Current job queue as text.
    async fn print_queue(&self) -> NeosResult<String>;

    /// General help text of the server.
    async fn email_help(&self) -> NeosResult<String>;

    /// Submit a job document.
    ///
    /// Returns the job number and the password. A job number of 0 means the
    /// submission was rejected and the second field carries the reason.
    async fn submit_job(&self, payload: &str, options: &SubmitOptions)
    -> NeosResult<(i64, String)>;

    /// Current status of a job, verbatim.
    async fn get_job_status(&self, job: JobId, credential: &JobCredential) -> NeosResult<String>;

    /// Intermediate output from `offset` on.
    async fn get_intermediate_results(
        &self,
        job: JobId,
        credential: &JobCredential,
        offset: u64,
    ) -> NeosResult<ResultChunk>;

    /// Final output of a finished job.
    async fn get_final_results(&self, job: JobId, credential: &JobCredential)
    -> NeosResult<String>;

    /// Solver categories, keyed by category code.
    async fn list_categories(&self) -> NeosResult<BTreeMap<String, String>>;

    /// Solvers in one category, as `"solver:format"` entries.
    async fn list_solvers_in_category(&self, category: &str) -> NeosResult<Vec<String>>;

    /// All solvers, as `"solver:category:format"` entries.
    async fn list_all_solvers(&self) -> NeosResult<Vec<String>>;

    /// Job template for a solver, with placeholder markers.
    async fn get_solver_template(
        &self,
        category: &str,
        solver: &str,
        input_format: &str,
    ) -> NeosResult<String>;

    /// Names of all remote-callable methods.
    async fn list_methods(&self) -> NeosResult<Vec<String>>;

    /// Help text for one method.
    async fn method_help(&self, method: &str) -> NeosResult<String>;
}
