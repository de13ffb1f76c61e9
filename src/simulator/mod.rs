// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/cli/server/alarm_server.py

//! A software panel for exercising clients without hardware.
//!
//! [`PanelSimulator`] holds the arming state machine and zone states and
//! emits encoded frames for every change. [`SimulatorServer`] serves those
//! frames to TCP clients and routes their commands back into the simulator.

pub mod server;

use std::sync::Arc;

use chrono::Local;
use rand::Rng;
use tokio::sync::{Mutex, broadcast};
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::alarm::ArmingMode;
use crate::config::SimulatorConfig;
use crate::constants::ZONE_COUNT;
use crate::error::{NessError, Result};
use crate::event::{
    ArmingStatus, ArmingUpdate, AuxOutputs, AuxiliaryOutputsUpdate, Event, EventType,
    PanelVersionUpdate, StatusUpdate, SystemStatusEvent, ZoneBank, ZoneRequest, ZoneUpdate, Zones,
};

pub use server::SimulatorServer;

const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Arming state of the simulated panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedState {
    Disarmed,
    ExitDelay,
    Armed,
    EntryDelay,
    Tripped,
}

#[derive(Debug)]
struct SimState {
    arming: SimulatedState,
    mode: Option<ArmingMode>,
    /// Unsealed flag per zone, index 0 is zone 1
    zones: Vec<bool>,
    aux_outputs: AuxOutputs,
    /// Bumped whenever a delayed transition is scheduled or cancelled
    generation: u64,
    /// Random zone activity runs while disarmed until stopped
    simulating: bool,
    simulation_generation: u64,
}

struct SimInner {
    config: SimulatorConfig,
    state: Mutex<SimState>,
    frames: broadcast::Sender<String>,
}

/// Simulated Ness panel.
#[derive(Clone)]
pub struct PanelSimulator {
    inner: Arc<SimInner>,
}

impl PanelSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let state = SimState {
            arming: SimulatedState::Disarmed,
            mode: None,
            zones: vec![false; usize::from(config.num_zones).min(ZONE_COUNT)],
            aux_outputs: AuxOutputs::empty(),
            generation: 0,
            simulating: false,
            simulation_generation: 0,
        };
        Self {
            inner: Arc::new(SimInner {
                config,
                state: Mutex::new(state),
                frames,
            }),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.inner.config
    }

    /// Encoded frames (without CRLF) emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inner.frames.subscribe()
    }

    pub async fn state(&self) -> SimulatedState {
        self.inner.state.lock().await.arming
    }

    pub async fn arming_mode(&self) -> Option<ArmingMode> {
        self.inner.state.lock().await.mode
    }

    /// Whether zone `id` is unsealed. `None` for zones the panel does not have.
    pub async fn zone(&self, id: u8) -> Option<bool> {
        let state = self.inner.state.lock().await;
        state.zones.get((id as usize).wrapping_sub(1)).copied()
    }

    pub async fn aux_outputs(&self) -> AuxOutputs {
        self.inner.state.lock().await.aux_outputs
    }

    /// Enter the exit delay, then arm once it expires.
    pub async fn arm(&self, mode: ArmingMode) {
        let mut state = self.inner.state.lock().await;
        state.mode = Some(mode);
        self.inner.transition(&mut state, SimulatedState::ExitDelay);
        self.schedule(&mut state, self.inner.config.exit_delay(), SimulatedState::Armed);
    }

    pub async fn disarm(&self) {
        let mut state = self.inner.state.lock().await;
        state.generation += 1;
        state.mode = None;
        self.inner.transition(&mut state, SimulatedState::Disarmed);
    }

    /// Enter the entry delay, then trip once it expires.
    pub async fn trip(&self) {
        let mut state = self.inner.state.lock().await;
        self.trip_locked(&mut state);
    }

    /// Seal or unseal a zone. Unsealing or sealing while armed trips the panel.
    pub async fn set_zone(&self, id: u8, unsealed: bool) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        self.set_zone_locked(&mut state, id, unsealed)
    }

    /// Whether random zone activity is running.
    pub async fn is_simulating(&self) -> bool {
        self.inner.state.lock().await.simulating
    }

    /// Toggle a random zone every 1-5 seconds while the panel stays disarmed.
    ///
    /// Any transition out of `Disarmed` stops the activity; it does not
    /// resume on disarm until started again.
    pub async fn start_simulation(&self) {
        let generation = {
            let mut state = self.inner.state.lock().await;
            if state.simulating || state.zones.is_empty() {
                return;
            }
            state.simulating = true;
            state.simulation_generation += 1;
            state.simulation_generation
        };
        info!("Starting zone simulation");

        let sim = self.clone();
        tokio::spawn(async move {
            loop {
                {
                    let mut state = sim.inner.state.lock().await;
                    if !state.simulating || state.simulation_generation != generation {
                        break;
                    }
                    let index = random_zone_index(state.zones.len());
                    let unsealed = !state.zones[index];
                    let id = index as u8 + 1;
                    if let Err(e) = sim.set_zone_locked(&mut state, id, unsealed) {
                        debug!("Zone simulation failed: {}", e);
                        break;
                    }
                    info!("Toggled zone {} (unsealed: {})", id, unsealed);
                }
                sleep(random_pause()).await;
            }
            debug!("Zone simulation stopped");
        });
    }

    pub async fn stop_simulation(&self) {
        let mut state = self.inner.state.lock().await;
        SimInner::stop_simulation(&mut state);
    }

    fn set_zone_locked(&self, state: &mut SimState, id: u8, unsealed: bool) -> Result<()> {
        let num_zones = state.zones.len();
        let zone = state
            .zones
            .get_mut((id as usize).wrapping_sub(1))
            .ok_or_else(|| NessError::InvalidArgument {
                details: format!("zone {id} out of range 1..={num_zones}"),
            })?;
        *zone = unsealed;

        let event_type = if unsealed {
            EventType::Unsealed
        } else {
            EventType::Sealed
        };
        self.inner.emit_status(event_type, id);

        if state.arming == SimulatedState::Armed {
            self.trip_locked(state);
        }
        Ok(())
    }

    pub async fn set_aux_output(&self, id: u8, on: bool) -> Result<()> {
        let flag = AuxOutputs::output(id).ok_or_else(|| NessError::InvalidArgument {
            details: format!("aux output {id} out of range"),
        })?;
        let mut state = self.inner.state.lock().await;
        state.aux_outputs.set(flag, on);
        info!("Aux output {} is now {}", id, if on { "on" } else { "off" });
        Ok(())
    }

    /// Handle the payload of a user-interface request received from a client.
    pub async fn handle_command(&self, command: &str) {
        info!("Incoming user command: {}", command);
        let code = self.inner.config.user_code.as_str();

        match command {
            "AE" => self.arm(ArmingMode::ArmedAway).await,
            "HE" => self.arm(ArmingMode::ArmedHome).await,
            c if c == format!("A{code}E") => self.arm(ArmingMode::ArmedAway).await,
            c if c == format!("H{code}E") => self.arm(ArmingMode::ArmedHome).await,
            c if c == format!("{code}E") => self.disarm().await,
            "S00" => self.respond_zones(ZoneBank::Zones1To16).await,
            "S20" => self.respond_zones(ZoneBank::Zones17To32).await,
            "S14" => self.respond_arming().await,
            "S17" => self.respond(StatusUpdate::PanelVersion(PanelVersionUpdate {
                model: self.inner.config.model,
                major_version: self.inner.config.major_version,
                minor_version: self.inner.config.minor_version,
            })),
            "S18" => {
                let outputs = self.aux_outputs().await;
                self.respond(StatusUpdate::AuxiliaryOutputs(AuxiliaryOutputsUpdate {
                    outputs,
                }))
            }
            other => match parse_aux_command(other) {
                Some((id, on)) => {
                    if let Err(e) = self.set_aux_output(id, on).await {
                        debug!("Ignoring aux command '{}': {}", other, e);
                    }
                }
                None => info!("Unhandled command: {}", other),
            },
        }
    }

    fn trip_locked(&self, state: &mut SimState) {
        self.inner.transition(state, SimulatedState::EntryDelay);
        self.schedule(state, self.inner.config.entry_delay(), SimulatedState::Tripped);
    }

    /// Move to `next` after `delay`, unless superseded by another schedule
    /// or a disarm in the meantime.
    fn schedule(&self, state: &mut SimState, delay: Duration, next: SimulatedState) {
        state.generation += 1;
        let generation = state.generation;
        let inner = self.inner.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            let mut state = inner.state.lock().await;
            if state.generation == generation {
                debug!("Delayed transition to {:?}", next);
                inner.transition(&mut state, next);
            }
        });
    }

    async fn respond_zones(&self, bank: ZoneBank) {
        let included_zones = {
            let state = self.inner.state.lock().await;
            let first = bank.first_zone() as usize;
            (1..=16u8)
                .filter(|n| {
                    state
                        .zones
                        .get(first + *n as usize - 2)
                        .copied()
                        .unwrap_or(false)
                })
                .filter_map(Zones::nth)
                .collect::<Zones>()
        };
        self.respond(StatusUpdate::Zone(ZoneUpdate {
            bank,
            request: ZoneRequest::InputUnsealed,
            included_zones,
        }));
    }

    async fn respond_arming(&self) {
        let arming = self.state().await;
        self.respond(StatusUpdate::Arming(ArmingUpdate {
            status: arming_status(arming),
        }));
    }

    fn respond(&self, update: StatusUpdate) {
        self.inner.emit(Event::from(update).with_address(0));
    }
}

impl SimInner {
    fn transition(&self, state: &mut SimState, next: SimulatedState) {
        let prev = state.arming;
        debug!("Simulator state {:?} -> {:?}", prev, next);
        if next != SimulatedState::Disarmed {
            Self::stop_simulation(state);
        }
        state.arming = next;
        for event_type in events_for_transition(prev, next, state.mode) {
            self.emit_status(event_type, 0);
        }
    }

    fn stop_simulation(state: &mut SimState) {
        if state.simulating {
            info!("Stopping zone simulation");
            state.simulating = false;
        }
    }

    fn emit_status(&self, event_type: EventType, zone: u8) {
        let event = Event::from(SystemStatusEvent::new(event_type, zone, 0))
            .with_address(0)
            .with_timestamp(Local::now().naive_local());
        self.emit(event);
    }

    fn emit(&self, event: Event) {
        let line = match event.encode() {
            Ok(packet) => packet.encode(),
            Err(e) => {
                warn!("Dropping unencodable event {:?}: {}", event, e);
                return;
            }
        };
        debug!("Emitting frame {}", line);
        // No receivers just means no client is connected
        let _ = self.frames.send(line);
    }
}

/// System status events a panel emits when moving from `prev` to `next`.
pub fn events_for_transition(
    prev: SimulatedState,
    next: SimulatedState,
    mode: Option<ArmingMode>,
) -> Vec<EventType> {
    let mut events = Vec::new();
    if next == SimulatedState::Disarmed {
        events.push(EventType::Disarmed);
    }
    if next == SimulatedState::ExitDelay {
        if let Some(mode) = mode {
            events.push(mode.event_type());
        }
        events.push(EventType::ExitDelayStart);
    }
    if next == SimulatedState::Tripped {
        events.push(EventType::Alarm);
    }
    if (prev == SimulatedState::ExitDelay && next != prev) || next == SimulatedState::Armed {
        events.push(EventType::ExitDelayEnd);
    }
    if next == SimulatedState::EntryDelay {
        events.push(EventType::EntryDelayStart);
    }
    if prev == SimulatedState::EntryDelay && next != prev {
        events.push(EventType::EntryDelayEnd);
    }
    events
}

/// Arming status reported in response to `S14`.
pub fn arming_status(state: SimulatedState) -> ArmingStatus {
    match state {
        SimulatedState::Armed => ArmingStatus::AREA_1_ARMED | ArmingStatus::AREA_1_FULLY_ARMED,
        SimulatedState::ExitDelay => ArmingStatus::AREA_1_ARMED,
        _ => ArmingStatus::empty(),
    }
}

fn random_zone_index(num_zones: usize) -> usize {
    rand::rng().random_range(0..num_zones)
}

fn random_pause() -> Duration {
    Duration::from_secs(rand::rng().random_range(1..=5))
}

/// Parse `{n}{n}*` (on) or `{n}{n}#` (off).
fn parse_aux_command(command: &str) -> Option<(u8, bool)> {
    let bytes = command.as_bytes();
    let [a, b, action] = bytes else {
        return None;
    };
    if a != b || !a.is_ascii_digit() {
        return None;
    }
    let on = match *action {
        b'*' => true,
        b'#' => false,
        _ => return None,
    };
    Some((a - b'0', on))
}
