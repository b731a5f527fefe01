//! CLI parse: clap types for genrelay. No behavior; definitions only.

use crate::types::GenerationRequest;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// genrelay - research content generation over a fallback chain of providers
#[derive(Parser)]
#[command(name = "genrelay")]
#[command(about = "Generate research content through a provider fallback chain")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (defaults to ./genrelay.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate synchronously and print the result
    Run {
        #[command(flatten)]
        request: RequestArgs,
        /// Trace id to attach (generated when omitted)
        #[arg(long)]
        trace_id: Option<String>,
    },
    /// Create a generation job
    Submit {
        #[command(flatten)]
        request: RequestArgs,
        /// Replay the original job when this key was used before
        #[arg(long)]
        idempotency_key: Option<String>,
        /// Wait for the job to finish and print its result
        #[arg(long)]
        wait: bool,
        /// Maximum seconds to wait with --wait
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },
    /// Show a job's status
    Status {
        job_id: String,
    },
    /// Show a job's result or error
    Result {
        job_id: String,
    },
    /// Cancel a queued or running job
    Cancel {
        job_id: String,
    },
    /// Show configured providers and their validation state
    Providers {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// Generation request parameters shared by `run` and `submit`
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Subject keyword
    pub keyword: String,
    #[arg(long, default_value = "ko")]
    pub language: String,
    #[arg(long, default_value = "KR")]
    pub country: String,
    #[arg(long, default_value = "24h")]
    pub time_range: String,
    #[arg(long, default_value = "5")]
    pub max_items: u32,
    #[arg(long, default_value = "standard")]
    pub summary_level: String,
    #[arg(long, default_value = "strict")]
    pub factcheck_mode: String,
}

impl RequestArgs {
    pub fn to_request(&self) -> GenerationRequest {
        GenerationRequest {
            keyword: self.keyword.clone(),
            language: self.language.clone(),
            country: self.country.clone(),
            time_range: self.time_range.clone(),
            max_items: self.max_items,
            summary_level: self.summary_level.clone(),
            factcheck_mode: self.factcheck_mode.clone(),
        }
    }
}
