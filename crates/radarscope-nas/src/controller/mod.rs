//! Controller surface: executes typed or free-text controller commands
//! against the terminal a position works in.
//!
//! `execute` runs a command now and returns its result; `queue_command`
//! defers it to the next tick boundary, where the result becomes a
//! `CommandAccepted` or `CommandRejected` event.

pub mod abbreviated;
pub mod grammar;

use tracing::info;

use radarscope_core::commands::{CommandOutput, ControllerCommand};
use radarscope_core::enums::EnginePhase;
use radarscope_core::errors::{Result, ScopeError};
use radarscope_core::events::Event;
use radarscope_core::flight_plan::{FlightPlanSpecifier, InterimAltitude};
use radarscope_core::types::{Acid, FacilityId};

use crate::computers::{TerminalComputer, TickContext};
use crate::engine::NasEngine;

pub use abbreviated::{parse_abbreviated_plan, AbbreviatedPlan};
pub use grammar::parse_command;

impl NasEngine {
    /// Parse and run one command line for `position`.
    pub fn execute_text(&mut self, position: &str, text: &str) -> Result<CommandOutput> {
        let command = parse_command(text)?;
        self.execute(position, command)
    }

    /// Parse one command line and queue it for the next tick.
    pub fn queue_text(&mut self, position: &str, text: &str) -> Result<()> {
        let command = parse_command(text)?;
        self.queue_command(position, command);
        Ok(())
    }

    /// Run a command for `position` immediately.
    pub fn execute(&mut self, position: &str, command: ControllerCommand) -> Result<CommandOutput> {
        use ControllerCommand::*;

        match command {
            Pause => {
                self.set_phase(EnginePhase::Paused);
                Ok(CommandOutput::empty())
            }
            Resume => {
                self.set_phase(EnginePhase::Running);
                Ok(CommandOutput::empty())
            }
            TogglePause => {
                let phase = match self.phase() {
                    EnginePhase::Running => EnginePhase::Paused,
                    EnginePhase::Paused => EnginePhase::Running,
                };
                self.set_phase(phase);
                Ok(CommandOutput::empty())
            }
            RelayToAircraft { suffix, commands } => {
                self.with_terminal(position, |terminal, ctx| {
                    relay_to_aircraft(terminal, &suffix, &commands, ctx)
                })
            }
            EnterFlightPlan { text } => self.enter_flight_plan(position, &text),
            RequestFlightPlan { beacon } => {
                self.with_terminal(position, |terminal, ctx| terminal.request_flight_plan(beacon, ctx))?;
                Ok(CommandOutput::empty())
            }
            ClearRouteLines => {
                self.with_terminal(position, |terminal, _| {
                    terminal.clear_route_lines();
                    Ok(())
                })?;
                Ok(CommandOutput::empty())
            }
            StartTrack { flid } => self.on_flight(position, &flid, "TRACK", |t, acid, ctx| {
                t.start_track(acid, position, ctx)
            }),
            InitiateHandoff { flid, to_position } => {
                let to_facility = self.facility_of(&to_position)?.clone();
                self.on_flight(position, &flid, "INITIATE H/O", |t, acid, ctx| {
                    t.initiate_handoff(acid, position, &to_position, &to_facility, ctx)
                })
            }
            AcceptHandoff { flid } => self.accept_handoff(position, &flid),
            AcceptOrForceDatablock { flid } => {
                let acid = self.resolve(position, &flid)?;
                let offered = self
                    .terminal_of(position)?
                    .offered_to(&acid, position);
                if offered {
                    self.accept_handoff(position, &flid)
                } else {
                    self.on_flight(position, &flid, "FORCED DATA BLOCK", |t, acid, _| {
                        t.toggle_forced_datablock(acid, position).map(|_| ())
                    })
                }
            }
            RecallHandoff { flid } => {
                let acid = self.resolve(position, &flid)?;
                let target_facility = self
                    .terminal_of(position)?
                    .track_information()
                    .get(acid.as_str())
                    .and_then(|info| info.handoff_target.as_deref())
                    .and_then(|target| self.controllers.get(target).cloned());
                self.on_flight(position, &flid, "RECALL H/O", |t, acid, ctx| {
                    t.recall_handoff(acid, position, target_facility, ctx)
                })
            }
            RedirectHandoff { flid, to_position } => {
                self.on_flight(position, &flid, "REDIRECT H/O", |t, acid, ctx| {
                    t.redirect_handoff(acid, position, &to_position, ctx)
                })
            }
            DropTrack { flid } => self.on_flight(position, &flid, "DROP TRACK", |t, acid, ctx| {
                t.drop_track(acid, position, ctx)
            }),
            PointOut { flid, to_position } => {
                self.on_flight(position, &flid, "POINT OUT", |t, acid, ctx| {
                    t.point_out(acid, position, &to_position, ctx)
                })
            }
            AcknowledgePointOut { flid } => {
                self.on_flight(position, &flid, "POINT OUT ACK", |t, acid, ctx| {
                    t.acknowledge_point_out(acid, position, ctx)
                })
            }
            RejectPointOut { flid } => {
                self.on_flight(position, &flid, "POINT OUT REJECT", |t, acid, ctx| {
                    t.reject_point_out(acid, position, ctx)
                })
            }
            AmendInterimAltitude { flid, feet, kind } => {
                let amendment = FlightPlanSpecifier {
                    interim_altitude: Some(Some(InterimAltitude { feet, kind })),
                    ..Default::default()
                };
                self.on_flight(position, &flid, "INTERIM ALT", |t, acid, ctx| {
                    t.amend(acid, &amendment, ctx)?;
                    climb_or_descend(t, acid, feet, ctx);
                    Ok(())
                })
            }
            AmendAssignedAltitude { flid, feet } => {
                let amendment = FlightPlanSpecifier {
                    assigned_altitude: Some(Some(feet)),
                    ..Default::default()
                };
                self.on_flight(position, &flid, "ASSIGNED ALT", |t, acid, ctx| {
                    t.amend(acid, &amendment, ctx)?;
                    climb_or_descend(t, acid, feet, ctx);
                    Ok(())
                })
            }
            DirectTo { flid, fix } => self.direct_to(position, &flid, &fix),
            ReleaseDeparture { flid } => self.on_flight(position, &flid, "RELEASE", |t, acid, _| {
                t.release_departure(acid)
            }),
            ToggleJRing { flid } => self.on_flight(position, &flid, "J-RING", |t, acid, _| {
                t.toggle_jring(acid);
                Ok(())
            }),
            ToggleReducedJRing { flid } => {
                self.on_flight(position, &flid, "REDUCED J-RING", |t, acid, _| {
                    t.toggle_reduced_jring(acid).map(|_| ())
                })
            }
            ShowRouteLines { flid } => self.on_flight(position, &flid, "ROUTE DISPLAY", |t, acid, _| {
                t.set_route_lines(acid, true);
                Ok(())
            }),
            ToggleOnFrequency { flid } => self.on_flight(position, &flid, "VCI", |t, acid, _| {
                t.toggle_on_frequency(acid);
                Ok(())
            }),
        }
    }

    fn terminal_of(&self, position: &str) -> Result<&TerminalComputer> {
        let facility = self.facility_of(position)?;
        self.terminal(facility.as_str())
            .ok_or_else(|| ScopeError::NoSuchTerminalFacility(facility.to_string()))
    }

    fn resolve(&self, position: &str, flid: &str) -> Result<Acid> {
        self.terminal_of(position)?.resolve_flid(flid)
    }

    /// Resolve `flid` at the position's terminal, run `f` and report acceptance.
    fn on_flight(
        &mut self,
        position: &str,
        flid: &str,
        action: &str,
        f: impl FnOnce(&mut TerminalComputer, &Acid, &mut TickContext) -> Result<()>,
    ) -> Result<CommandOutput> {
        self.with_terminal(position, |terminal, ctx| {
            let acid = terminal.resolve_flid(flid)?;
            f(terminal, &acid, ctx)?;
            info!(facility = %terminal.id(), position, acid = %acid, action, "command accepted");
            Ok(accepted(terminal, action, &acid))
        })
    }

    fn accept_handoff(&mut self, position: &str, flid: &str) -> Result<CommandOutput> {
        let acid = self.resolve(position, flid)?;
        let owner_facility: Option<FacilityId> = self
            .terminal_of(position)?
            .owner(&acid)
            .and_then(|owner| self.controllers.get(owner).cloned());
        self.on_flight(position, flid, "ACCEPT H/O", |t, acid, ctx| {
            t.accept_handoff(acid, position, owner_facility, ctx)
        })
    }

    fn enter_flight_plan(&mut self, position: &str, text: &str) -> Result<CommandOutput> {
        let entry = parse_abbreviated_plan(text, |apt| self.fix_location(apt).is_some())?;
        let facility = self.facility_of(position)?.clone();
        if let Some(tracker) = &entry.position {
            if self.controllers.get(tracker) != Some(&facility) {
                return Err(ScopeError::IllegalPosition(tracker.clone()));
            }
        }

        self.with_terminal(position, |terminal, ctx| {
            let acid = terminal.enter_flight_plan(entry.plan, ctx)?;
            if let Some(tracker) = &entry.position {
                terminal.start_track(&acid, tracker, ctx)?;
            }
            Ok(accepted(terminal, "FLIGHT PLAN", &acid))
        })
    }

    fn direct_to(&mut self, position: &str, flid: &str, fix: &str) -> Result<CommandOutput> {
        let location = self
            .fix_location(fix)
            .ok_or_else(|| ScopeError::IllegalAcid(fix.to_string()))?;
        let amendment = FlightPlanSpecifier {
            exit_fix: Some(fix.to_string()),
            ..Default::default()
        };

        self.on_flight(position, flid, "REROUTE", |t, acid, ctx| {
            t.amend(acid, &amendment, ctx)?;
            t.set_route_lines(acid, true);
            ctx.events.push(Event::AircraftCommand {
                callsign: callsign_of(t, acid),
                command: format!("D{fix}"),
            });
            ctx.events.push(Event::FixCoordinates {
                acid: acid.clone(),
                fixes: vec![(fix.to_string(), location)],
            });
            Ok(())
        })
    }
}

/// `ACCEPT\n<ACTION>\n<ACID>/<CID>`.
fn accepted(terminal: &TerminalComputer, action: &str, acid: &Acid) -> CommandOutput {
    let cid = terminal
        .cid(acid)
        .map_or_else(|| "---".to_string(), |cid| cid.to_string());
    CommandOutput::accept(action, &format!("{acid}/{cid}"))
}

fn callsign_of(terminal: &TerminalComputer, acid: &Acid) -> String {
    terminal
        .track_for(acid)
        .map_or_else(|| acid.to_string(), |t| t.callsign.clone())
}

/// Pilot instruction for a new altitude: descend when the aircraft is above it.
fn climb_or_descend(terminal: &TerminalComputer, acid: &Acid, feet: u32, ctx: &mut TickContext) {
    let current = terminal.track_for(acid).map_or(0, |t| t.altitude);
    let verb = if current > feet { 'D' } else { 'C' };
    ctx.events.push(Event::AircraftCommand {
        callsign: callsign_of(terminal, acid),
        command: format!("{verb}{:03}", feet / 100),
    });
}

fn relay_to_aircraft(
    terminal: &TerminalComputer,
    suffix: &str,
    commands: &str,
    ctx: &mut TickContext,
) -> Result<CommandOutput> {
    let mut matches = terminal.tracks_with_suffix(suffix);
    let track = matches
        .next()
        .ok_or_else(|| ScopeError::IllegalAcid(suffix.to_string()))?;
    if matches.next().is_some() {
        return Err(ScopeError::AmbiguousAcid(suffix.to_string()));
    }

    ctx.events.push(Event::RadioTransmission {
        callsign: track.callsign.clone(),
        text: commands.to_string(),
    });
    for command in commands.split_whitespace() {
        ctx.events.push(Event::AircraftCommand {
            callsign: track.callsign.clone(),
            command: command.to_string(),
        });
    }
    Ok(CommandOutput::empty())
}
