//! Core types and definitions for the RADARSCOPE flight-data coordination core.
//!
//! This crate defines the vocabulary shared across all other crates:
//! identifiers, the flight-plan record, wire messages, controller commands,
//! events, snapshot views, errors and constants.
//! It has no dependency on any runtime or display framework.

pub mod altitude;
pub mod commands;
pub mod components;
pub mod constants;
pub mod enums;
pub mod errors;
pub mod events;
pub mod flight_plan;
pub mod message;
pub mod state;
pub mod types;

pub use errors::{Result, ScopeError};
