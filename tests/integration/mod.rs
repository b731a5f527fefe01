//! Integration tests for the genrelay generation relay

mod config_integration;
mod fallback_chain;
mod job_orchestrator;
mod sled_store;
