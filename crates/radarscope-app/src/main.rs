//! radarscope: runs the NAS coordination core behind a line-oriented console.
//!
//! Usage:
//!   radarscope [--config nas.json] [--time-scale 4]
//!   radarscope [--config nas.json] --ticks 600 < script.txt
//!
//! Input lines are `POSITION COMMAND`, e.g. `41 QZ 240 DAL99`; `quit` exits.
//! With `--ticks`, stdin is read as a script first (`tick [N]` lines advance
//! the clock) and the remaining ticks run without input. Events print to
//! stdout as JSON lines; logs go to stderr and follow `RUST_LOG`.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

use radarscope_app::scope_loop::tick_interval;
use radarscope_app::state::{AppError, AppState, LoopCommand};
use radarscope_core::state::ScopeSnapshot;
use radarscope_nas::config::NasConfig;
use radarscope_nas::NasEngine;

fn main() {
    init_logging();
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| matches!(a.as_str(), "help" | "--help" | "-h")) {
        print_usage();
        return;
    }

    let config = match parse_path(&args, "--config") {
        Some(path) => NasConfig::load(&path),
        None => Ok(NasConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    };

    let result = match parse_number::<u64>(&args, "--ticks") {
        Some(ticks) => run_script(config, ticks),
        None => {
            let time_scale = parse_number::<f64>(&args, "--time-scale").unwrap_or(1.0);
            run_interactive(config, time_scale)
        }
    };
    if let Err(err) = result {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Only succeeds if no global subscriber is set yet.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn print_usage() {
    eprintln!(
        "radarscope: flight-data coordination console\n\
         \n\
           --config <path>      NAS configuration JSON (default: built-in demo airspace)\n\
           --time-scale <x>     Real-time speed-up for interactive mode (default: 1)\n\
           --ticks <N>          Read a script from stdin, then run N more ticks and exit\n\
         \n\
         Input:\n\
         \n\
           41 FP DAL99 1234 41 B738/L 350\n\
           41 27 DAL99\n\
           tick 3          (script mode only)\n\
           quit\n"
    );
}

fn parse_path(args: &[String], flag: &str) -> Option<PathBuf> {
    for i in 0..args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(PathBuf::from(&args[i + 1]));
        }
    }
    None
}

fn parse_number<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    for i in 0..args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn print_events(snapshot: &ScopeSnapshot) {
    for event in &snapshot.events {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("Error: {err}"),
        }
    }
}

// --- Interactive mode ---

fn run_interactive(config: NasConfig, time_scale: f64) -> Result<(), AppError> {
    let interval = tick_interval(config.tick_secs, time_scale);
    let engine = NasEngine::new(config)?;
    let state = AppState::new();
    state.start(engine, interval, |snapshot| print_events(snapshot))?;
    info!(?interval, "console ready");

    for line in io::stdin().lock().lines() {
        let line = line?;
        match LoopCommand::from_line(&line) {
            Some(LoopCommand::Shutdown) => break,
            Some(command) => state.send(command)?,
            None if line.trim().is_empty() => {}
            None => eprintln!("FORMAT"),
        }
    }
    state.shutdown()
}

// --- Script mode ---

fn run_script(config: NasConfig, ticks: u64) -> Result<(), AppError> {
    let mut engine = NasEngine::new(config)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        if words.next().is_some_and(|w| w.eq_ignore_ascii_case("tick")) {
            let n = words.next().and_then(|n| n.parse().ok()).unwrap_or(1);
            for _ in 0..n {
                print_events(&engine.tick());
            }
            continue;
        }
        match LoopCommand::from_line(&line) {
            Some(LoopCommand::Shutdown) => break,
            Some(LoopCommand::ExecuteText { position, text }) => {
                if let Err(err) = engine.queue_text(&position, &text) {
                    engine.reject_command(&position, &err);
                }
            }
            Some(LoopCommand::Execute { position, command }) => engine.queue_command(&position, command),
            None => {}
        }
    }

    for _ in 0..ticks {
        print_events(&engine.tick());
    }
    info!(tick = engine.time().tick, "script finished");
    Ok(())
}
