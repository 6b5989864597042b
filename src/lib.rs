//! NEOS Client: remote job submission to the NEOS Server for Optimization
//!
//! This crate submits optimization jobs (typically AMPL models wrapped in a
//! NEOS XML job document) to a NEOS server over XML-RPC, polls them, streams
//! their intermediate output and returns their final results.
//!
//! # Overview
//!
//! The crate provides:
//! - A [`NeosService`] trait with one method per remote procedure, and
//!   [`XmlRpcService`], its XML-RPC-over-HTTP implementation
//! - A [`Connection`] that checks liveness once and drives the job lifecycle
//! - [`Job`] / [`JobStatus`] / [`JobCredential`] for job tracking
//! - [`PollConfig`] / [`CancelFlag`] to bound or stop a wait
//! - [`SolverEntry`] / [`SolverIndex`] for solver catalog queries
//! - [`build_submission_payload`] to fill solver templates
//! - [`NeosError`] for every failure mode
//!
//! # Lifecycle
//!
//! ```text
//!   connect() ──→ submit() ──→ await_completion() ──→ final results
//!    (ping)       (id, pw)     (sleep → fetch → poll)*
//! ```
//!
//! ```no_run
//! use neos_client::{CancelFlag, ClientConfig, Connection, PayloadPart, SubmitOptions};
//!
//! # async fn example() -> neos_client::NeosResult<()> {
//! let config = ClientConfig::default();
//! let conn = Connection::open(&config).await?;
//! if !conn.is_connected() {
//!     return Ok(());
//! }
//!
//! let xml = conn
//!     .build_ampl_payload(
//!         "nco",
//!         "SNOPT",
//!         &[
//!             PayloadPart::from("lifecycle.mod"),
//!             PayloadPart::from("lifecycle.dat"),
//!             PayloadPart::from("solve;\ndisplay c;"),
//!             PayloadPart::Empty,
//!         ],
//!     )
//!     .await?;
//!
//! let mut job = conn.submit(&xml, &SubmitOptions::default()).await?;
//! let output = conn
//!     .await_completion(&mut job, &config.poll, &CancelFlag::new(), |chunk| print!("{chunk}"))
//!     .await?;
//! println!("{output}");
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod connection;
pub mod error;
pub mod job;
pub mod poll;
pub mod result;
pub mod service;
pub mod template;
pub mod transport;
pub mod xmlrpc;

#[cfg(test)]
mod testing;

pub use catalog::{AMPL, Category, SolverEntry, SolverIndex};
pub use config::ClientConfig;
pub use connection::Connection;
pub use error::{NeosError, NeosResult};
pub use job::{Job, JobCredential, JobId, JobStatus, Priority, SubmitOptions};
pub use poll::{CancelFlag, PollConfig};
pub use result::ResultChunk;
pub use service::{ALIVE_SENTINEL, NeosService};
pub use template::{PLACEHOLDER, PayloadPart, build_submission_payload};
pub use transport::XmlRpcService;
