//! genrelay: Research Content Generation Relay
//!
//! Turns a keyword-driven generation request into structured research content by calling
//! external generation providers through an ordered fallback chain, and exposes the work as
//! idempotent, cancellable asynchronous jobs with result reuse for identical requests.

pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod provider;
pub mod service;
pub mod types;
