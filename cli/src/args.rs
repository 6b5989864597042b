//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use neos_client::config::{DEFAULT_HOST, DEFAULT_PORT};
use neos_client::{ClientConfig, PollConfig, Priority, SubmitOptions};

#[derive(Parser, Debug)]
#[command(name = "neos-submit")]
#[command(about = "Submit AMPL models to the NEOS Server for Optimization", long_about = None)]
pub struct Cli {
    /// NEOS server host
    #[arg(long, env = "NEOS_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// NEOS server XML-RPC port
    #[arg(long, env = "NEOS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Specify AMPL model file
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Specify AMPL data file
    #[arg(short = 'd', long = "data")]
    pub data: Option<String>,

    /// Specify optional AMPL commands file
    #[arg(short = 'c', long = "commands")]
    pub commands: Option<String>,

    /// Specify solver category
    #[arg(short = 'k', long = "category")]
    pub category: Option<String>,

    /// Specify solver to use
    #[arg(short = 's', long = "solver")]
    pub solver: Option<String>,

    /// Specify comments as a string
    #[arg(short = 'C', long = "comment")]
    pub comment: Option<String>,

    /// Submit a ready-made NEOS job document instead of building one
    #[arg(long, value_name = "FILE", conflicts_with_all = ["model", "data", "commands", "category", "solver"])]
    pub submit_xml: Option<PathBuf>,

    /// Queue to submit to (short or long)
    #[arg(long)]
    pub priority: Option<Priority>,

    /// Address notified by email when the job finishes
    #[arg(long)]
    pub email: Option<String>,

    /// Seconds between status polls
    #[arg(
        long,
        env = "NEOS_POLL_INTERVAL_SECS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: u64,

    /// Give up after this many polls
    #[arg(long, env = "NEOS_MAX_POLLS")]
    pub max_polls: Option<u32>,

    /// Give up after this many seconds
    #[arg(long, env = "NEOS_TIMEOUT_SECS")]
    pub timeout: Option<u64>,

    /// Print listings as JSON
    #[arg(long)]
    pub json: bool,

    /// Display help message from server
    #[arg(long)]
    pub help_server: bool,

    /// Display list of methods exported by server
    #[arg(long)]
    pub help_methods: bool,

    /// Display current queue
    #[arg(long)]
    pub queue: bool,

    /// Display list of available solvers
    #[arg(long)]
    pub solvers_list: bool,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            poll: self.poll_config(),
            ..ClientConfig::new(self.host.clone(), self.port)
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll_interval),
            max_polls: self.max_polls,
            timeout: self.timeout.map(Duration::from_secs),
        }
    }

    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            priority: self.priority,
            email: self.email.clone(),
            user: None,
        }
    }

    pub fn wants_information(&self) -> bool {
        self.help_server || self.help_methods || self.queue || self.solvers_list
    }

    /// Echo the selected files and solver to stderr.
    pub fn print_selection(&self) {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "None".to_string());
        eprintln!(" modfile =  {}", show(&self.model));
        eprintln!(" datfile =  {}", show(&self.data));
        eprintln!(" comfile =  {}", show(&self.commands));
        eprintln!(" solver  =  {}", show(&self.solver));
        eprintln!(" categ   =  {}", show(&self.category));
        eprintln!(" comment =  {}", show(&self.comment));
    }

    /// Message for the first missing required flag.
    pub fn missing_requirement(&self) -> &'static str {
        if self.model.is_none() {
            "Please specify a model file"
        } else if self.category.is_none() {
            "Please specify solver category"
        } else {
            "Please specify a solver"
        }
    }
}
