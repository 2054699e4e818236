//! BGS Tally - tick-bounded Background Simulation activity engine

#[macro_use]
mod macros;

pub mod activity;
pub mod core;
pub mod engine;
pub mod persistence;
pub mod poller;
pub mod runner;
pub mod state;
pub mod tick;
