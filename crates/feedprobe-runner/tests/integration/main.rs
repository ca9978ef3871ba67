//! Integration test entry point for the feedprobe runner.
//!
//! Run with: cargo test -p feedprobe-runner --test integration

mod content_flow;
