#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! EchoBeats — an autonomous cognitive scheduler.
//!
//! Four subsystems compose into one process: a fixed 12-step cognitive
//! loop (`core::cognitive_loop`) driven by a trio of engines
//! (`engines`), a wake/rest/dream lifecycle manager (`lifecycle`), a
//! priority event scheduler (`queue`), and hypergraph memory with
//! durable state (`memory`, `persistence`). `runtime` is the
//! composition root that wires all of it together and owns the
//! cadence tasks.

pub mod config;
pub mod core;
pub mod dreaming;
pub mod engines;
pub mod interface;
pub mod lifecycle;
pub mod memory;
pub mod persistence;
pub mod queue;
pub mod runtime;
