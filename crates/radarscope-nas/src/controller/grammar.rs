//! Free-text controller command grammar.
//!
//! | Entry | Command |
//! |---|---|
//! | `QQ [P\|L]ALT FLID` | interim altitude |
//! | `QZ ALT FLID` | assigned altitude |
//! | `QP J FLID` / `QP T FLID` | J-ring / reduced J-ring |
//! | `QU` / `QU /M FLID` / `QU FIX FLID` | clear route lines / show route / direct-to |
//! | `QX FLID` | drop track |
//! | `QB BCN` | request flight plan by beacon |
//! | `//FLID` | on-frequency indicator |
//! | `TG P` / `TG SUFFIX CMDS` | toggle pause / relay to aircraft |
//! | `FP TEXT` | abbreviated flight plan |
//! | `ST FLID` | start track |
//! | `AC FLID` / `RC FLID` | accept / recall handoff |
//! | `RH POS FLID` | redirect handoff |
//! | `PO POS FLID` / `PA FLID` / `PR FLID` | point out / acknowledge / reject |
//! | `RD FLID` | release departure |
//! | `POS FLID` | initiate handoff |
//! | `FLID` | accept handoff or force the datablock |

use radarscope_core::altitude::hundreds;
use radarscope_core::commands::ControllerCommand;
use radarscope_core::enums::InterimAltitudeKind;
use radarscope_core::errors::{Result, ScopeError};
use radarscope_core::types::Squawk;

/// Parse one command line.
pub fn parse_command(text: &str) -> Result<ControllerCommand> {
    use ControllerCommand::*;

    let text = text.trim().to_ascii_uppercase();
    if let Some(rest) = text.strip_prefix("//") {
        return Ok(ToggleOnFrequency { flid: single(rest)? });
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let flid = |i: usize| -> Result<String> {
        tokens
            .get(i)
            .map(|t| t.to_string())
            .ok_or(ScopeError::CommandFormat)
    };

    let command = match tokens.as_slice() {
        [] => return Err(ScopeError::CommandFormat),
        ["QQ", alt, _] => {
            let (feet, kind) = interim_altitude(alt)?;
            AmendInterimAltitude { flid: flid(2)?, feet, kind }
        }
        ["QZ", alt, _] => AmendAssignedAltitude {
            flid: flid(2)?,
            feet: altitude_feet(alt)?,
        },
        ["QP", "J", _] => ToggleJRing { flid: flid(2)? },
        ["QP", "T", _] => ToggleReducedJRing { flid: flid(2)? },
        ["QU"] => ClearRouteLines,
        ["QU", "/M", _] => ShowRouteLines { flid: flid(2)? },
        ["QU", fix, _] => DirectTo {
            flid: flid(2)?,
            fix: fix.to_string(),
        },
        ["QX", _] => DropTrack { flid: flid(1)? },
        ["QB", code] => RequestFlightPlan {
            beacon: Squawk::parse(code)?,
        },
        ["TG", "P"] => TogglePause,
        ["TG", suffix, rest @ ..] if !rest.is_empty() => RelayToAircraft {
            suffix: suffix.to_string(),
            commands: rest.join(" "),
        },
        ["FP", rest @ ..] if !rest.is_empty() => EnterFlightPlan {
            text: rest.join(" "),
        },
        ["ST", _] => StartTrack { flid: flid(1)? },
        ["AC", _] => AcceptHandoff { flid: flid(1)? },
        ["RC", _] => RecallHandoff { flid: flid(1)? },
        ["RH", pos, _] => RedirectHandoff {
            flid: flid(2)?,
            to_position: pos.to_string(),
        },
        ["PO", pos, _] => PointOut {
            flid: flid(2)?,
            to_position: pos.to_string(),
        },
        ["PA", _] => AcknowledgePointOut { flid: flid(1)? },
        ["PR", _] => RejectPointOut { flid: flid(1)? },
        ["RD", _] => ReleaseDeparture { flid: flid(1)? },
        [pos, _] if is_position(pos) => InitiateHandoff {
            flid: flid(1)?,
            to_position: pos.to_string(),
        },
        [_] => AcceptOrForceDatablock { flid: flid(0)? },
        _ => return Err(ScopeError::CommandFormat),
    };
    Ok(command)
}

fn single(text: &str) -> Result<String> {
    let mut tokens = text.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(flid), None) => Ok(flid.to_string()),
        _ => Err(ScopeError::CommandFormat),
    }
}

/// Controller positions are a digit followed by a digit or letter (`41`, `4A`).
fn is_position(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_digit() && bytes[1].is_ascii_alphanumeric()
}

fn altitude_feet(token: &str) -> Result<u32> {
    hundreds(token)
        .map(|h| h * 100)
        .ok_or_else(|| ScopeError::IllegalAltitude(token.to_string()))
}

fn interim_altitude(token: &str) -> Result<(u32, InterimAltitudeKind)> {
    let (kind, digits) = match token.as_bytes().first() {
        Some(b'P') => (InterimAltitudeKind::Procedure, &token[1..]),
        Some(b'L') => (InterimAltitudeKind::Local, &token[1..]),
        _ => (InterimAltitudeKind::Normal, token),
    };
    Ok((altitude_feet(digits)?, kind))
}
