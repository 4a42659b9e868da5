//! Scope loop thread: ticks the NAS engine at a fixed real-time interval
//! and publishes snapshots.
//!
//! The engine is moved into the thread. Commands arrive via an `mpsc`
//! channel. Each snapshot goes to the `publish` callback and into shared
//! state for synchronous polling.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use radarscope_core::state::ScopeSnapshot;
use radarscope_nas::NasEngine;

use crate::state::{AppError, LoopCommand};

/// Real-time duration of one tick of `tick_secs` simulated seconds.
/// A non-positive scale runs at 1x.
pub fn tick_interval(tick_secs: u32, time_scale: f64) -> Duration {
    let nominal = Duration::from_secs(u64::from(tick_secs));
    if time_scale > 0.001 {
        nominal.div_f64(time_scale)
    } else {
        nominal
    }
}

/// Spawns the scope loop in a new thread.
///
/// Returns the command sender for the input side to use.
pub fn spawn_scope_loop(
    engine: NasEngine,
    interval: Duration,
    latest_snapshot: Arc<Mutex<Option<ScopeSnapshot>>>,
    publish: impl FnMut(&ScopeSnapshot) + Send + 'static,
) -> Result<mpsc::Sender<LoopCommand>, AppError> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<LoopCommand>();

    std::thread::Builder::new()
        .name("radarscope-scope-loop".into())
        .spawn(move || {
            run_scope_loop(engine, interval, cmd_rx, &latest_snapshot, publish);
        })?;

    Ok(cmd_tx)
}

/// The scope loop. Runs until Shutdown or channel disconnect.
fn run_scope_loop(
    mut engine: NasEngine,
    interval: Duration,
    cmd_rx: mpsc::Receiver<LoopCommand>,
    latest_snapshot: &Mutex<Option<ScopeSnapshot>>,
    mut publish: impl FnMut(&ScopeSnapshot),
) {
    info!(?interval, "scope loop started");
    let mut next_tick_time = Instant::now();

    loop {
        // 1. Drain all pending commands
        loop {
            match cmd_rx.try_recv() {
                Ok(LoopCommand::Execute { position, command }) => {
                    engine.queue_command(&position, command);
                }
                Ok(LoopCommand::ExecuteText { position, text }) => {
                    if let Err(err) = engine.queue_text(&position, &text) {
                        engine.reject_command(&position, &err);
                    }
                }
                Ok(LoopCommand::Shutdown) | Err(mpsc::TryRecvError::Disconnected) => {
                    info!(tick = engine.time().tick, "scope loop stopped");
                    return;
                }
                Err(mpsc::TryRecvError::Empty) => break,
            }
        }

        // 2. Advance one tick (the engine handles pause itself)
        let snapshot = engine.tick();

        // 3. Publish, then keep the latest for polling
        publish(&snapshot);
        if let Ok(mut lock) = latest_snapshot.lock() {
            *lock = Some(snapshot);
        }

        // 4. Sleep until the next tick
        next_tick_time += interval;
        let now = Instant::now();
        if next_tick_time > now {
            std::thread::sleep(next_tick_time - now);
        } else if now - next_tick_time > interval * 2 {
            warn!(behind = ?(now - next_tick_time), "scope loop fell behind, resetting clock");
            next_tick_time = now;
        }
    }
}
