//! adaptation-check: validates NAS configurations and resolves coordination fixes.
//!
//! Usage:
//!   adaptation-check validate --config nas.json
//!   adaptation-check resolve --config nas.json --facility ZNY --route "JFK J80 PHL" --altitude 350

use std::path::PathBuf;
use std::process;

use radarscope_core::enums::FacilityKind;
use radarscope_core::types::{FacilityId, Point2LL};
use radarscope_nas::config::NasConfig;
use radarscope_nas::resolver::resolve_for_route;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "validate" => cmd_validate(&args[2..]),
        "resolve" => cmd_resolve(&args[2..]),
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!(
        "adaptation-check: RADARSCOPE adaptation tool\n\
         \n\
         Commands:\n\
         \n\
         validate  Load a NAS configuration and summarize it\n\
         \n\
           --config <path>      NAS configuration JSON (default: built-in demo airspace)\n\
         \n\
         resolve   Find the coordination fix for a route and altitude\n\
         \n\
           --config <path>      NAS configuration JSON (default: built-in demo airspace)\n\
           --facility <id>      Enroute facility whose adaptation is used\n\
           --route <text>       Route string, e.g. \"JFK J80 PHL\"\n\
           --altitude <alt>     Filed altitude, e.g. 350 or VFR/170\n\
           --position <lat,lon> Aircraft position for zone fixes (optional)\n\
         \n\
         Examples:\n\
         \n\
           adaptation-check validate --config nas.json\n\
           adaptation-check resolve --facility ZDC --route \"DCA J80 PHL\" --altitude 170\n"
    );
}

fn parse_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    for i in 0..args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(&args[i + 1]);
        }
    }
    None
}

fn parse_position(args: &[String]) -> Option<Point2LL> {
    let parts: Vec<&str> = parse_value(args, "--position")?.split(',').collect();
    if parts.len() != 2 {
        return None;
    }
    let lat: f64 = parts[0].trim().parse().ok()?;
    let lon: f64 = parts[1].trim().parse().ok()?;
    Some(Point2LL::new(lat, lon))
}

fn load_config(args: &[String]) -> NasConfig {
    let result = match parse_value(args, "--config") {
        Some(path) => NasConfig::load(PathBuf::from(path)),
        None => Ok(NasConfig::default()),
    };
    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

// --- Validate command ---

fn cmd_validate(args: &[String]) {
    let config = load_config(args);
    // `load` already validates; the default config goes through the same checks.
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    eprintln!("Seed {}, {} s/tick, start {}", config.seed, config.tick_secs, config.start_time);
    for facility in &config.facilities {
        match facility.kind {
            FacilityKind::Enroute => {
                let adaptation = config.adaptation_for(&facility.id);
                let unlocated = adaptation
                    .iter()
                    .filter(|fix| fix.is_zone() && fix.location.is_none())
                    .count();
                eprintln!(
                    "  {:<4} enroute   {} coordination fixes ({} zone fixes without location)",
                    facility.id.as_str(),
                    adaptation.coordination_fixes.len(),
                    unlocated,
                );
            }
            FacilityKind::Terminal => {
                let positions: Vec<String> = config.positions_of(&facility.id).collect();
                eprintln!(
                    "  {:<4} terminal  parent {}, bank {}xx, positions [{}]",
                    facility.id.as_str(),
                    facility.parent.as_ref().map_or("-", |p| p.as_str()),
                    facility.beacon_bank,
                    positions.join(" "),
                );
            }
        }
    }
    eprintln!("OK");
}

// --- Resolve command ---

fn cmd_resolve(args: &[String]) {
    let config = load_config(args);

    let facility = match parse_value(args, "--facility") {
        Some(id) => FacilityId::new(id),
        None => {
            eprintln!("Error: --facility <id> is required");
            process::exit(1);
        }
    };
    if !config.enroute_ids().any(|id| *id == facility) {
        eprintln!("Error: {facility} is not an enroute facility");
        process::exit(1);
    }

    let route = parse_value(args, "--route").unwrap_or("");
    let altitude = match parse_value(args, "--altitude") {
        Some(alt) => alt,
        None => {
            eprintln!("Error: --altitude <alt> is required");
            process::exit(1);
        }
    };
    let position = parse_position(args);

    let adaptation = config.adaptation_for(&facility);
    match resolve_for_route(&adaptation, route, altitude, position) {
        Some(fix) => match adaptation.fix(&fix, altitude) {
            Some(entry) => println!("{fix} {:?} -> {}", entry.kind, entry.to_facility),
            None => println!("{fix}"),
        },
        None => {
            println!("none");
            process::exit(2);
        }
    }
}
