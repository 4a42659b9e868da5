//! Flight-data coordination core for RADARSCOPE.
//!
//! Enroute and terminal facility computers exchange flight-plan, handoff and
//! track messages over an in-process bus. `NasEngine` owns them all, advances
//! them one tick at a time and produces `ScopeSnapshot`s for the scope.

pub mod adaptation;
pub mod bus;
pub mod computers;
pub mod config;
pub mod controller;
pub mod engine;
pub mod id_alloc;
pub mod resolver;
pub mod snapshot;
pub mod store;

pub use engine::NasEngine;
pub use radarscope_core as core;

#[cfg(test)]
mod tests;
