//! Application state shared between the input side and the scope loop thread.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use radarscope_core::commands::ControllerCommand;
use radarscope_core::errors::ScopeError;
use radarscope_core::state::ScopeSnapshot;
use radarscope_nas::NasEngine;

use crate::scope_loop;

/// Commands sent to the scope loop thread.
#[derive(Debug)]
pub enum LoopCommand {
    /// A parsed controller command for the engine's queue.
    Execute {
        position: String,
        command: ControllerCommand,
    },
    /// A command line still to be parsed by the engine.
    ExecuteText { position: String, text: String },
    /// Shut down the scope loop thread gracefully.
    Shutdown,
}

impl LoopCommand {
    /// Interpret one input line: `quit`, or `POSITION COMMAND...`.
    pub fn from_line(line: &str) -> Option<LoopCommand> {
        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") {
            return Some(LoopCommand::Shutdown);
        }
        let (position, text) = line.split_once(char::is_whitespace)?;
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(LoopCommand::ExecuteText {
            position: position.to_ascii_uppercase(),
            text: text.to_string(),
        })
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("scope loop already running")]
    AlreadyRunning,

    #[error("scope loop not started")]
    NotStarted,

    #[error("scope loop has stopped")]
    Disconnected,

    #[error("shared state lock poisoned")]
    Poisoned,

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Shared application state.
///
/// - `mpsc::Sender` sits behind a `Mutex` so the state is `Sync`
/// - the latest snapshot is shared with the loop thread through an `Arc`
pub struct AppState {
    /// Channel to the scope loop. `None` before `start`.
    pub command_tx: Mutex<Option<mpsc::Sender<LoopCommand>>>,
    /// Latest snapshot for synchronous polling. Updated after each tick.
    pub latest_snapshot: Arc<Mutex<Option<ScopeSnapshot>>>,
    pub running: Mutex<bool>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            command_tx: Mutex::new(None),
            latest_snapshot: Arc::new(Mutex::new(None)),
            running: Mutex::new(false),
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the scope loop for `engine`. Fails if one is already running.
    pub fn start(
        &self,
        engine: NasEngine,
        interval: Duration,
        publish: impl FnMut(&ScopeSnapshot) + Send + 'static,
    ) -> Result<(), AppError> {
        let mut running = self.running.lock().map_err(|_| AppError::Poisoned)?;
        if *running {
            return Err(AppError::AlreadyRunning);
        }

        let cmd_tx =
            scope_loop::spawn_scope_loop(engine, interval, self.latest_snapshot.clone(), publish)?;

        let mut tx_lock = self.command_tx.lock().map_err(|_| AppError::Poisoned)?;
        *tx_lock = Some(cmd_tx);
        *running = true;
        Ok(())
    }

    /// Forward a command to the loop.
    pub fn send(&self, command: LoopCommand) -> Result<(), AppError> {
        let tx_lock = self.command_tx.lock().map_err(|_| AppError::Poisoned)?;
        match tx_lock.as_ref() {
            Some(tx) => tx.send(command).map_err(|_| AppError::Disconnected),
            None => Err(AppError::NotStarted),
        }
    }

    pub fn get_snapshot(&self) -> Result<Option<ScopeSnapshot>, AppError> {
        let lock = self.latest_snapshot.lock().map_err(|_| AppError::Poisoned)?;
        Ok(lock.clone())
    }

    /// Stop the loop and forget its channel.
    pub fn shutdown(&self) -> Result<(), AppError> {
        let mut tx_lock = self.command_tx.lock().map_err(|_| AppError::Poisoned)?;
        if let Some(tx) = tx_lock.take() {
            // The loop may already be gone; either way it is stopped.
            let _ = tx.send(LoopCommand::Shutdown);
        }
        let mut running = self.running.lock().map_err(|_| AppError::Poisoned)?;
        *running = false;
        Ok(())
    }
}
