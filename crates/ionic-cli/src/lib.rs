//! ionic CLI crate
//!
//! Command-line front end to the ionic model layer and runtime:
//! - check: load and validate a model file, printing what it resolves to
//! - run: simulate one model variant and write its traces
//! - tables: dump the tabulated steady states and time constants of a channel
//! - clocks: show the slot, timestep and element categories each clock drives
//! - sweep: run a parameter study on a worker pool
//!
//! The binary (src/main.rs) wires up logging and argument parsing, calling
//! `IonicCli::execute()`. The library surface exists so commands can be driven
//! from integration tests without spawning a process.

pub mod commands;
pub mod config;
pub mod error;

pub use commands::IonicCli;
