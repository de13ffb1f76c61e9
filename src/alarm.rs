// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/alarm.py

use tracing::debug;

use crate::constants::{AUX_OUTPUT_COUNT, ZONE_COUNT};
use crate::event::{
    ArmingStatus, ArmingUpdate, AuxiliaryOutputsUpdate, Event, EventKind, EventType, PanelModel,
    StatusUpdate, SystemStatusEvent, ZoneRequest, ZoneUpdate, Zones,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmingState {
    Unknown,
    Disarmed,
    Arming,
    ExitDelay,
    Armed,
    EntryDelay,
    Triggered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmingMode {
    ArmedAway,
    ArmedHome,
    ArmedDay,
    ArmedNight,
    ArmedVacation,
    ArmedHighest,
}

impl ArmingMode {
    pub fn from_event_type(event_type: EventType) -> Option<Self> {
        match event_type {
            EventType::ArmedAway => Some(Self::ArmedAway),
            EventType::ArmedHome => Some(Self::ArmedHome),
            EventType::ArmedDay => Some(Self::ArmedDay),
            EventType::ArmedNight => Some(Self::ArmedNight),
            EventType::ArmedVacation => Some(Self::ArmedVacation),
            EventType::ArmedHighest => Some(Self::ArmedHighest),
            _ => None,
        }
    }

    /// The system status event a panel emits when armed in this mode.
    pub fn event_type(self) -> EventType {
        match self {
            Self::ArmedAway => EventType::ArmedAway,
            Self::ArmedHome => EventType::ArmedHome,
            Self::ArmedDay => EventType::ArmedDay,
            Self::ArmedNight => EventType::ArmedNight,
            Self::ArmedVacation => EventType::ArmedVacation,
            Self::ArmedHighest => EventType::ArmedHighest,
        }
    }
}

/// A zone input. `triggered` is `None` until the panel reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    pub id: u8,
    pub triggered: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelInfo {
    pub model: PanelModel,
    pub version: String,
}

/// A state change produced by [`Alarm::handle_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmChange {
    ArmingState {
        state: ArmingState,
        mode: Option<ArmingMode>,
    },
    Zone {
        zone_id: u8,
        triggered: bool,
    },
    AuxOutput {
        output_id: u8,
        active: bool,
    },
}

/// In-memory representation of the state of the panel.
///
/// Only [`Alarm::handle_event`] mutates it. Each call returns the values
/// that actually changed; re-reporting a known value produces nothing.
#[derive(Debug, Clone)]
pub struct Alarm {
    infer_arming_state: bool,
    arming_state: ArmingState,
    arming_mode: Option<ArmingMode>,
    zones: [Option<bool>; ZONE_COUNT],
    aux_outputs: [Option<bool>; AUX_OUTPUT_COUNT],
    panel_info: Option<PanelInfo>,
}

impl Default for Alarm {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Alarm {
    /// With `infer_arming_state`, an empty arming status only disarms from
    /// `Unknown`. Panels before firmware 5.8 report an empty status while armed.
    pub fn new(infer_arming_state: bool) -> Self {
        Self {
            infer_arming_state,
            arming_state: ArmingState::Unknown,
            arming_mode: None,
            zones: [None; ZONE_COUNT],
            aux_outputs: [None; AUX_OUTPUT_COUNT],
            panel_info: None,
        }
    }

    pub fn arming_state(&self) -> ArmingState {
        self.arming_state
    }

    pub fn arming_mode(&self) -> Option<ArmingMode> {
        self.arming_mode
    }

    /// Get a specific zone by ID (1-indexed).
    pub fn zone(&self, id: u8) -> Option<Zone> {
        let triggered = *self.zones.get((id as usize).wrapping_sub(1))?;
        Some(Zone { id, triggered })
    }

    pub fn zones(&self) -> Vec<Zone> {
        self.zones
            .iter()
            .enumerate()
            .map(|(i, triggered)| Zone {
                id: i as u8 + 1,
                triggered: *triggered,
            })
            .collect()
    }

    /// Aux output states, index 0 is output 1.
    pub fn aux_outputs(&self) -> [Option<bool>; AUX_OUTPUT_COUNT] {
        self.aux_outputs
    }

    pub fn panel_info(&self) -> Option<&PanelInfo> {
        self.panel_info.as_ref()
    }

    pub fn handle_event(&mut self, event: &Event) -> Vec<AlarmChange> {
        let mut changes = Vec::new();
        match &event.kind {
            EventKind::StatusUpdate(StatusUpdate::Arming(update)) => {
                self.handle_arming_update(update, &mut changes)
            }
            EventKind::StatusUpdate(StatusUpdate::Zone(update))
                if update.request == ZoneRequest::InputUnsealed =>
            {
                self.handle_zone_input_update(update, &mut changes)
            }
            EventKind::StatusUpdate(StatusUpdate::PanelVersion(update)) => {
                if self.panel_info.is_none() {
                    self.panel_info = Some(PanelInfo {
                        model: update.model,
                        version: update.version(),
                    });
                }
            }
            EventKind::StatusUpdate(StatusUpdate::AuxiliaryOutputs(update)) => {
                self.handle_aux_outputs_update(update, &mut changes)
            }
            EventKind::SystemStatus(event) => self.handle_system_status_event(event, &mut changes),
            EventKind::StatusUpdate(_) => {}
        }
        changes
    }

    fn handle_arming_update(&mut self, update: &ArmingUpdate, changes: &mut Vec<AlarmChange>) {
        let armed_and_fully_armed = ArmingStatus::AREA_1_ARMED | ArmingStatus::AREA_1_FULLY_ARMED;
        if update.status == ArmingStatus::AREA_1_ARMED {
            self.update_arming_state(ArmingState::ExitDelay, changes);
        } else if update.status.contains(armed_and_fully_armed) {
            self.update_arming_state(ArmingState::Armed, changes);
        } else if !self.infer_arming_state || self.arming_state == ArmingState::Unknown {
            self.update_arming_state(ArmingState::Disarmed, changes);
        }
    }

    fn handle_zone_input_update(&mut self, update: &ZoneUpdate, changes: &mut Vec<AlarmChange>) {
        let first = update.bank.first_zone();
        for n in 1..=16u8 {
            let Some(flag) = Zones::nth(n) else { continue };
            self.update_zone(first + n - 1, update.included_zones.contains(flag), changes);
        }
    }

    fn handle_aux_outputs_update(
        &mut self,
        update: &AuxiliaryOutputsUpdate,
        changes: &mut Vec<AlarmChange>,
    ) {
        for (i, state) in self.aux_outputs.iter_mut().enumerate() {
            let output_id = i as u8 + 1;
            let active = crate::event::AuxOutputs::output(output_id)
                .is_some_and(|flag| update.outputs.contains(flag));
            if *state != Some(active) {
                *state = Some(active);
                changes.push(AlarmChange::AuxOutput { output_id, active });
            }
        }
    }

    /// Panel sequences:
    ///
    /// ```text
    /// DISARMED -> ARMED_AWAY -> EXIT_DELAY_START -> EXIT_DELAY_END
    ///  (trip): -> ALARM -> OUTPUT_ON -> ALARM_RESTORE
    ///     (disarm): -> DISARMED -> OUTPUT_OFF
    ///  (disarm): -> DISARMED
    ///  (disarm before EXIT_DELAY_END): -> DISARMED -> EXIT_DELAY_END
    /// ```
    fn handle_system_status_event(
        &mut self,
        event: &SystemStatusEvent,
        changes: &mut Vec<AlarmChange>,
    ) {
        match event.event_type {
            EventType::Unsealed => self.update_zone(event.zone, true, changes),
            EventType::Sealed => self.update_zone(event.zone, false, changes),
            EventType::Alarm => self.update_arming_state(ArmingState::Triggered, changes),
            EventType::AlarmRestore => {
                if self.arming_state != ArmingState::Disarmed {
                    self.update_arming_state(ArmingState::Armed, changes);
                }
            }
            EventType::EntryDelayStart => {
                self.update_arming_state(ArmingState::EntryDelay, changes)
            }
            EventType::ExitDelayStart => self.update_arming_state(ArmingState::ExitDelay, changes),
            EventType::ExitDelayEnd => {
                // Also sent when disarmed during the exit delay
                if self.arming_state == ArmingState::ExitDelay {
                    self.update_arming_state(ArmingState::Armed, changes);
                }
            }
            EventType::ArmedAway
            | EventType::ArmedHome
            | EventType::ArmedDay
            | EventType::ArmedNight
            | EventType::ArmedVacation
            | EventType::ArmedHighest => {
                self.arming_mode = ArmingMode::from_event_type(event.event_type);
                self.update_arming_state(ArmingState::Arming, changes);
            }
            EventType::Disarmed => {
                self.arming_mode = None;
                self.update_arming_state(ArmingState::Disarmed, changes);
            }
            // The state change is driven by the event that follows
            EventType::EntryDelayEnd | EventType::ArmingDelayed => {}
            other => debug!("System status event {:?} does not affect alarm state", other),
        }
    }

    fn update_arming_state(&mut self, state: ArmingState, changes: &mut Vec<AlarmChange>) {
        if self.arming_state != state {
            self.arming_state = state;
            changes.push(AlarmChange::ArmingState {
                state,
                mode: self.arming_mode,
            });
        }
    }

    fn update_zone(&mut self, zone_id: u8, triggered: bool, changes: &mut Vec<AlarmChange>) {
        let Some(zone) = self.zones.get_mut((zone_id as usize).wrapping_sub(1)) else {
            debug!("Ignoring update for zone {} outside 1..={}", zone_id, ZONE_COUNT);
            return;
        };
        if *zone != Some(triggered) {
            *zone = Some(triggered);
            changes.push(AlarmChange::Zone { zone_id, triggered });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{PanelVersionUpdate, ZoneBank};

    fn status(event_type: EventType, zone: u8) -> Event {
        Event::from(SystemStatusEvent::new(event_type, zone, 0))
    }

    fn arming(status: ArmingStatus) -> Event {
        Event::from(StatusUpdate::Arming(ArmingUpdate { status }))
    }

    fn zone_update(bank: ZoneBank, request: ZoneRequest, included_zones: Zones) -> Event {
        Event::from(StatusUpdate::Zone(ZoneUpdate {
            bank,
            request,
            included_zones,
        }))
    }

    fn alarm_in(state: EventType) -> Alarm {
        let mut alarm = Alarm::default();
        alarm.handle_event(&status(state, 0));
        alarm
    }

    #[test]
    fn test_initial_state() {
        let alarm = Alarm::default();
        assert_eq!(alarm.arming_state(), ArmingState::Unknown);
        assert_eq!(alarm.arming_mode(), None);
        assert_eq!(alarm.zones().len(), 32);
        assert!(alarm.zones().iter().all(|z| z.triggered.is_none()));
        assert!(alarm.panel_info().is_none());
    }

    #[test]
    fn test_zone_update() {
        let mut alarm = Alarm::default();
        let changes = alarm.handle_event(&zone_update(
            ZoneBank::Zones1To16,
            ZoneRequest::InputUnsealed,
            Zones::ZONE_1 | Zones::ZONE_3,
        ));
        assert_eq!(alarm.zone(1).unwrap().triggered, Some(true));
        assert_eq!(alarm.zone(2).unwrap().triggered, Some(false));
        assert_eq!(alarm.zone(3).unwrap().triggered, Some(true));
        assert_eq!(alarm.zone(17).unwrap().triggered, None);
        assert_eq!(changes.len(), 16);
    }

    #[test]
    fn test_zone_update_only_reports_changes() {
        let mut alarm = Alarm::default();
        alarm.handle_event(&zone_update(
            ZoneBank::Zones1To16,
            ZoneRequest::InputUnsealed,
            Zones::ZONE_4,
        ));
        let changes = alarm.handle_event(&zone_update(
            ZoneBank::Zones1To16,
            ZoneRequest::InputUnsealed,
            Zones::ZONE_1 | Zones::ZONE_3,
        ));
        assert_eq!(
            changes,
            vec![
                AlarmChange::Zone { zone_id: 1, triggered: true },
                AlarmChange::Zone { zone_id: 3, triggered: true },
                AlarmChange::Zone { zone_id: 4, triggered: false },
            ]
        );
    }

    #[test]
    fn test_zone_update_upper_bank_leaves_lower_untouched() {
        let mut alarm = Alarm::default();
        alarm.handle_event(&zone_update(
            ZoneBank::Zones17To32,
            ZoneRequest::InputUnsealed,
            Zones::ZONE_7,
        ));
        assert_eq!(alarm.zone(23).unwrap().triggered, Some(true));
        assert_eq!(alarm.zone(17).unwrap().triggered, Some(false));
        assert!((1..=16).all(|id| alarm.zone(id).unwrap().triggered.is_none()));
    }

    #[test]
    fn test_zone_update_other_requests_ignored() {
        let mut alarm = Alarm::default();
        let changes = alarm.handle_event(&zone_update(
            ZoneBank::Zones1To16,
            ZoneRequest::InAlarm,
            Zones::ZONE_1,
        ));
        assert!(changes.is_empty());
        assert_eq!(alarm.zone(1).unwrap().triggered, None);
    }

    #[test]
    fn test_zone_dedupe() {
        let mut alarm = Alarm::default();
        assert_eq!(
            alarm.handle_event(&status(EventType::Unsealed, 3)),
            vec![AlarmChange::Zone { zone_id: 3, triggered: true }]
        );
        assert!(alarm.handle_event(&status(EventType::Unsealed, 3)).is_empty());
        assert_eq!(
            alarm.handle_event(&status(EventType::Sealed, 3)),
            vec![AlarmChange::Zone { zone_id: 3, triggered: false }]
        );
    }

    #[test]
    fn test_zone_out_of_range_ignored() {
        let mut alarm = Alarm::default();
        assert!(alarm.handle_event(&status(EventType::Unsealed, 0)).is_empty());
        assert!(alarm.handle_event(&status(EventType::Unsealed, 33)).is_empty());
        assert_eq!(
            alarm.handle_event(&status(EventType::Unsealed, 32)),
            vec![AlarmChange::Zone { zone_id: 32, triggered: true }]
        );
    }

    #[test]
    fn test_arming_update_exit_delay() {
        let mut alarm = Alarm::default();
        alarm.handle_event(&arming(ArmingStatus::AREA_1_ARMED));
        assert_eq!(alarm.arming_state(), ArmingState::ExitDelay);
    }

    #[test]
    fn test_arming_update_armed() {
        let mut alarm = Alarm::default();
        let changes = alarm.handle_event(&arming(
            ArmingStatus::AREA_1_ARMED | ArmingStatus::AREA_1_FULLY_ARMED,
        ));
        assert_eq!(alarm.arming_state(), ArmingState::Armed);
        assert_eq!(
            changes,
            vec![AlarmChange::ArmingState { state: ArmingState::Armed, mode: None }]
        );
    }

    #[test]
    fn test_arming_update_empty_disarms() {
        let mut alarm = alarm_in(EventType::ArmedAway);
        alarm.handle_event(&arming(ArmingStatus::empty()));
        assert_eq!(alarm.arming_state(), ArmingState::Disarmed);
    }

    #[test]
    fn test_arming_update_infer_keeps_state() {
        let mut alarm = Alarm::new(true);
        alarm.handle_event(&status(EventType::ArmedAway, 0));
        alarm.handle_event(&arming(ArmingStatus::empty()));
        assert_eq!(alarm.arming_state(), ArmingState::Arming);
    }

    #[test]
    fn test_arming_update_infer_from_unknown() {
        let mut alarm = Alarm::new(true);
        alarm.handle_event(&arming(ArmingStatus::empty()));
        assert_eq!(alarm.arming_state(), ArmingState::Disarmed);
    }

    #[test]
    fn test_armed_events_from_disarmed() {
        let cases = [
            (EventType::ArmedAway, ArmingMode::ArmedAway),
            (EventType::ArmedHome, ArmingMode::ArmedHome),
            (EventType::ArmedDay, ArmingMode::ArmedDay),
            (EventType::ArmedNight, ArmingMode::ArmedNight),
            (EventType::ArmedVacation, ArmingMode::ArmedVacation),
            (EventType::ArmedHighest, ArmingMode::ArmedHighest),
        ];
        for (event_type, mode) in cases {
            let mut alarm = alarm_in(EventType::Disarmed);
            let changes = alarm.handle_event(&status(event_type, 0));
            assert_eq!(alarm.arming_state(), ArmingState::Arming);
            assert_eq!(alarm.arming_mode(), Some(mode));
            assert_eq!(
                changes,
                vec![AlarmChange::ArmingState { state: ArmingState::Arming, mode: Some(mode) }]
            );
        }
    }

    #[test]
    fn test_disarmed_clears_mode() {
        let mut alarm = alarm_in(EventType::ArmedHome);
        let changes = alarm.handle_event(&status(EventType::Disarmed, 0));
        assert_eq!(alarm.arming_state(), ArmingState::Disarmed);
        assert_eq!(alarm.arming_mode(), None);
        assert_eq!(
            changes,
            vec![AlarmChange::ArmingState { state: ArmingState::Disarmed, mode: None }]
        );
    }

    #[test]
    fn test_alarm_triggers() {
        let mut alarm = alarm_in(EventType::ArmedAway);
        alarm.handle_event(&status(EventType::Alarm, 1));
        assert_eq!(alarm.arming_state(), ArmingState::Triggered);
    }

    #[test]
    fn test_alarm_restore() {
        let mut alarm = alarm_in(EventType::Disarmed);
        alarm.handle_event(&status(EventType::AlarmRestore, 0));
        assert_eq!(alarm.arming_state(), ArmingState::Disarmed);

        let mut alarm = alarm_in(EventType::Alarm);
        assert_eq!(alarm.arming_state(), ArmingState::Triggered);
        alarm.handle_event(&status(EventType::AlarmRestore, 0));
        assert_eq!(alarm.arming_state(), ArmingState::Armed);
    }

    #[test]
    fn test_exit_delay_end() {
        let mut alarm = alarm_in(EventType::ExitDelayStart);
        assert_eq!(alarm.arming_state(), ArmingState::ExitDelay);
        alarm.handle_event(&status(EventType::ExitDelayEnd, 0));
        assert_eq!(alarm.arming_state(), ArmingState::Armed);

        let mut alarm = alarm_in(EventType::Disarmed);
        assert!(alarm.handle_event(&status(EventType::ExitDelayEnd, 0)).is_empty());
        assert_eq!(alarm.arming_state(), ArmingState::Disarmed);
    }

    #[test]
    fn test_entry_delay() {
        let mut alarm = alarm_in(EventType::ArmedAway);
        alarm.handle_event(&status(EventType::EntryDelayStart, 0));
        assert_eq!(alarm.arming_state(), ArmingState::EntryDelay);
        assert!(alarm.handle_event(&status(EventType::EntryDelayEnd, 0)).is_empty());
        assert_eq!(alarm.arming_state(), ArmingState::EntryDelay);
    }

    #[test]
    fn test_non_arming_events_ignored() {
        let mut alarm = alarm_in(EventType::Disarmed);
        for event_type in [
            EventType::ArmingDelayed,
            EventType::PowerFailure,
            EventType::TamperUnsealed,
            EventType::OutputOn,
        ] {
            assert!(alarm.handle_event(&status(event_type, 1)).is_empty());
        }
        assert_eq!(alarm.arming_state(), ArmingState::Disarmed);
    }

    #[test]
    fn test_state_change_reported_once() {
        let mut alarm = Alarm::default();
        assert_eq!(alarm.handle_event(&status(EventType::ExitDelayStart, 0)).len(), 1);
        assert!(alarm.handle_event(&status(EventType::ExitDelayStart, 0)).is_empty());
    }

    #[test]
    fn test_panel_info_latched() {
        let mut alarm = Alarm::default();
        let version = |major, minor| {
            Event::from(StatusUpdate::PanelVersion(PanelVersionUpdate {
                model: PanelModel::D16x,
                major_version: major,
                minor_version: minor,
            }))
        };
        alarm.handle_event(&version(8, 7));
        alarm.handle_event(&version(9, 1));
        let info = alarm.panel_info().unwrap();
        assert_eq!(info.model, PanelModel::D16x);
        assert_eq!(info.version, "8.7");
    }

    #[test]
    fn test_aux_outputs() {
        let mut alarm = Alarm::default();
        let update = |outputs| {
            Event::from(StatusUpdate::AuxiliaryOutputs(AuxiliaryOutputsUpdate { outputs }))
        };
        let changes = alarm.handle_event(&update(crate::event::AuxOutputs::AUX_3));
        assert_eq!(changes.len(), 8);
        assert_eq!(alarm.aux_outputs()[2], Some(true));
        assert_eq!(alarm.aux_outputs()[0], Some(false));

        let changes = alarm.handle_event(&update(crate::event::AuxOutputs::empty()));
        assert_eq!(
            changes,
            vec![AlarmChange::AuxOutput { output_id: 3, active: false }]
        );
    }
}
