//! # db-chaos-scenarios
//!
//! End-to-end scenarios for db-chaos.
//!
//! Each scenario drives a full [`chaos_core::Harness`] run, workload loop
//! and chaos sequencer together, against in-memory collaborators with
//! tokio's clock paused, then checks the run-level invariants:
//! - every submitted experiment is withdrawn
//! - experiments never overlap
//! - failures are attributed to the experiment that caused them
//! - totals agree with the per-experiment breakdown
//!
//! Scenarios that need a real cluster are `#[ignore]`d and read their
//! targets from the environment.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assertions;
pub mod flaky;

pub mod scenarios;
