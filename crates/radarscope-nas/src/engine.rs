//! NAS engine: the tick driver of the coordination core.
//!
//! `NasEngine` owns every facility computer, the message bus, the NAS-wide
//! beacon pool and the seeded RNG. It processes queued controller commands,
//! runs the computers and produces `ScopeSnapshot`s. Completely headless,
//! enabling deterministic testing.

use std::collections::{BTreeMap, VecDeque};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use radarscope_core::commands::ControllerCommand;
use radarscope_core::enums::*;
use radarscope_core::errors::{Result, ScopeError};
use radarscope_core::events::Event;
use radarscope_core::flight_plan::FlightPlan;
use radarscope_core::message::{Message, RadarReturn};
use radarscope_core::state::ScopeSnapshot;
use radarscope_core::types::{FacilityId, Point2LL, SimTime, SourceId, Squawk};

use crate::bus::MessageBus;
use crate::computers::{EnrouteComputer, TerminalComputer, TickContext};
use crate::config::NasConfig;
use crate::id_alloc::BeaconPool;
use crate::snapshot;

/// A controller command waiting for the next tick boundary.
#[derive(Debug, Clone)]
pub(crate) struct QueuedCommand {
    pub position: String,
    pub command: ControllerCommand,
}

/// The coordination engine. Owns all facilities and simulation state.
pub struct NasEngine {
    pub(crate) time: SimTime,
    pub(crate) phase: EnginePhase,
    pub(crate) tick_secs: u32,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) bus: MessageBus,
    pub(crate) enroutes: BTreeMap<FacilityId, EnrouteComputer>,
    pub(crate) terminals: BTreeMap<FacilityId, TerminalComputer>,
    /// Controller position to the terminal facility it works in.
    pub(crate) controllers: BTreeMap<String, FacilityId>,
    pub(crate) fixes: BTreeMap<String, Point2LL>,
    pub(crate) nas_beacons: BeaconPool,
    pub(crate) command_queue: VecDeque<QueuedCommand>,
    pub(crate) events: Vec<Event>,
}

impl NasEngine {
    /// Build the facility graph described by `config`.
    pub fn new(config: NasConfig) -> Result<Self> {
        config.validate()?;

        let mut bus = MessageBus::new();
        let mut enroutes = BTreeMap::new();
        for id in config.enroute_ids() {
            bus.add_enroute(id.clone());
            enroutes.insert(id.clone(), EnrouteComputer::new(id.clone(), config.adaptation_for(id)));
        }

        let mut terminals = BTreeMap::new();
        for facility in config.terminals() {
            let parent = facility
                .parent
                .clone()
                .ok_or_else(|| ScopeError::InvalidConfig(format!("{} has no parent", facility.id)))?;
            bus.add_terminal(facility.id.clone(), parent.clone())?;
            let computer = TerminalComputer::new(
                facility.id.clone(),
                parent,
                config.positions_of(&facility.id),
                facility.beacon_bank,
            )?
            .with_supervisors(config.supervisors_of(&facility.id));
            terminals.insert(facility.id.clone(), computer);
        }

        let controllers = config
            .controllers
            .iter()
            .map(|c| (c.position.clone(), c.facility.clone()))
            .collect();

        info!(
            enroute = enroutes.len(),
            terminal = terminals.len(),
            seed = config.seed,
            "NAS engine ready"
        );

        Ok(Self {
            time: SimTime::starting_at(config.start_time),
            phase: EnginePhase::default(),
            tick_secs: config.tick_secs,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            bus,
            enroutes,
            terminals,
            controllers,
            fixes: config.fixes,
            nas_beacons: BeaconPool::nas(),
            command_queue: VecDeque::new(),
            events: Vec::new(),
        })
    }

    /// Queue a controller command for processing at the next tick boundary.
    pub fn queue_command(&mut self, position: &str, command: ControllerCommand) {
        self.command_queue.push_back(QueuedCommand {
            position: position.to_string(),
            command,
        });
    }

    /// Queue multiple commands from one position.
    pub fn queue_commands(&mut self, position: &str, commands: impl IntoIterator<Item = ControllerCommand>) {
        for command in commands {
            self.queue_command(position, command);
        }
    }

    /// Advance the simulation by one tick and return the resulting snapshot.
    pub fn tick(&mut self) -> ScopeSnapshot {
        self.process_commands();

        if self.phase == EnginePhase::Running {
            self.run_computers();
            self.time.advance(self.tick_secs);
        }

        let events = std::mem::take(&mut self.events);
        snapshot::build_snapshot(self, events)
    }

    /// Snapshot of the current state without consuming pending events.
    pub fn snapshot(&self) -> ScopeSnapshot {
        snapshot::build_snapshot(self, self.events.clone())
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: EnginePhase) {
        if self.phase != phase {
            info!(?phase, "engine phase");
        }
        self.phase = phase;
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn nas_beacons(&self) -> &BeaconPool {
        &self.nas_beacons
    }

    pub fn enroute(&self, id: &str) -> Option<&EnrouteComputer> {
        self.enroutes.get(id)
    }

    pub fn terminal(&self, id: &str) -> Option<&TerminalComputer> {
        self.terminals.get(id)
    }

    pub fn enroutes(&self) -> impl Iterator<Item = &EnrouteComputer> {
        self.enroutes.values()
    }

    pub fn terminals(&self) -> impl Iterator<Item = &TerminalComputer> {
        self.terminals.values()
    }

    /// Terminal facility a controller position works in.
    pub fn facility_of(&self, position: &str) -> Result<&FacilityId> {
        self.controllers
            .get(position)
            .ok_or_else(|| ScopeError::IllegalPosition(position.to_string()))
    }

    pub fn fix_location(&self, name: &str) -> Option<Point2LL> {
        self.fixes.get(name).copied().or_else(|| {
            self.enroutes
                .values()
                .find_map(|e| e.adaptation().coordination_fix(name)?.location)
        })
    }

    /// Post an externally produced message (radar feed, foreign facility) to an inbox.
    pub fn deliver(&mut self, facility: &str, msg: Message) -> Result<()> {
        self.bus.deliver(facility, msg)
    }

    /// Feed one radar return to a terminal facility.
    pub fn radar_return(&mut self, facility: &str, ret: RadarReturn) -> Result<()> {
        if !self.terminals.contains_key(facility) {
            return Err(ScopeError::NoSuchTerminalFacility(facility.to_string()));
        }
        let mut msg = Message::new(MessageKind::TrackUpdate, SourceId::raw(format!("RDR{}", self.time.hhmm())));
        msg.bcn = ret.beacon;
        msg.radar = Some(ret);
        self.bus.deliver(facility, msg)
    }

    /// File a plan directly at an enroute facility, allocating a NAS beacon
    /// when it carries the placeholder code.
    pub fn file_flight_plan(
        &mut self,
        facility: &str,
        plan: FlightPlan,
        location: Option<Point2LL>,
    ) -> Result<Squawk> {
        let Self {
            enroutes,
            bus,
            time,
            events,
            rng,
            nas_beacons,
            ..
        } = self;
        let enroute = enroutes
            .get_mut(facility)
            .ok_or_else(|| ScopeError::NoSuchEnrouteFacility(facility.to_string()))?;
        let mut ctx = TickContext {
            bus,
            time: *time,
            events,
            rng,
        };
        enroute.file_flight_plan(plan, location, &mut ctx, nas_beacons)
    }

    /// Run `f` against the terminal `position` works in.
    pub(crate) fn with_terminal<R>(
        &mut self,
        position: &str,
        f: impl FnOnce(&mut TerminalComputer, &mut TickContext) -> Result<R>,
    ) -> Result<R> {
        let facility = self.facility_of(position)?.clone();
        let Self {
            terminals,
            bus,
            time,
            events,
            rng,
            ..
        } = self;
        let terminal = terminals
            .get_mut(&facility)
            .ok_or_else(|| ScopeError::NoSuchTerminalFacility(facility.to_string()))?;
        let mut ctx = TickContext {
            bus,
            time: *time,
            events,
            rng,
        };
        f(terminal, &mut ctx)
    }

    /// Report a command that failed before it reached the queue. The
    /// rejection goes out with the next snapshot.
    pub fn reject_command(&mut self, position: &str, err: &ScopeError) {
        debug!(position, %err, "command rejected");
        self.events.push(Event::CommandRejected {
            position: position.to_string(),
            big_output: err.big_output().to_string(),
        });
    }

    /// Process all queued commands.
    fn process_commands(&mut self) {
        while let Some(QueuedCommand { position, command }) = self.command_queue.pop_front() {
            match self.execute(&position, command) {
                Ok(output) => self.events.push(Event::CommandAccepted {
                    position,
                    big_output: output.big_output,
                }),
                Err(err) => self.reject_command(&position, &err),
            }
        }
    }

    /// Each enroute computer sorts its inbox and pushes due plans, then its
    /// terminals drain theirs. Facilities run in id order.
    fn run_computers(&mut self) {
        let Self {
            enroutes,
            terminals,
            bus,
            time,
            events,
            rng,
            nas_beacons,
            ..
        } = self;
        let mut ctx = TickContext {
            bus,
            time: *time,
            events,
            rng,
        };

        for (id, enroute) in enroutes.iter_mut() {
            enroute.sort_messages(&mut ctx, nas_beacons);
            enroute.send_flight_plans(&mut ctx);

            let children: Vec<FacilityId> = ctx.bus.children(id.as_str()).cloned().collect();
            for child in children {
                if let Some(terminal) = terminals.get_mut(&child) {
                    terminal.sort_received_messages(&mut ctx);
                }
            }
        }
    }
}
