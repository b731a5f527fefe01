//! Property-based tests

mod determinism;
