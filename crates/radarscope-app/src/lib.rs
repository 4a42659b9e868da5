//! RADARSCOPE host application.
//!
//! Runs the NAS coordination engine on its own thread, feeds it controller
//! commands and publishes the snapshots it produces.

pub mod scope_loop;
pub mod state;

pub use radarscope_core as core;
pub use radarscope_nas as nas;
