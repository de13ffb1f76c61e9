// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/event.py

//! Typed view of decoded frames.

pub mod status_update;
pub mod system_status;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::packet::{CommandType, Packet};

pub use status_update::{
    ArmingStatus, ArmingUpdate, AuxOutputs, AuxiliaryOutputsUpdate, MiscAlarms,
    MiscellaneousAlarmsUpdate, Outputs, OutputsUpdate, PanelModel, PanelVersionUpdate, RequestId,
    StatusUpdate, ViewState, ViewStateUpdate, ZoneBank, ZoneRequest, ZoneUpdate, Zones,
};
pub use system_status::{EventType, SystemStatusEvent};

/// An event received from (or emitted by) the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub address: Option<u8>,
    pub timestamp: Option<NaiveDateTime>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    SystemStatus(SystemStatusEvent),
    StatusUpdate(StatusUpdate),
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            address: None,
            timestamp: None,
            kind,
        }
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn decode(packet: &Packet) -> Result<Self> {
        let kind = match packet.command {
            CommandType::SystemStatus => {
                EventKind::SystemStatus(SystemStatusEvent::decode(&packet.data)?)
            }
            CommandType::UserInterface => {
                EventKind::StatusUpdate(StatusUpdate::decode(&packet.data)?)
            }
        };
        Ok(Self {
            address: packet.address,
            timestamp: packet.timestamp,
            kind,
        })
    }

    /// Decode a line received from the panel (CRLF already stripped).
    pub fn decode_line(line: &str) -> Result<Self> {
        Self::decode(&Packet::decode(line)?)
    }

    pub fn encode(&self) -> Result<Packet> {
        let (command, data, is_user_interface_resp) = match &self.kind {
            EventKind::SystemStatus(event) => (CommandType::SystemStatus, event.encode()?, false),
            EventKind::StatusUpdate(update) => (CommandType::UserInterface, update.encode(), true),
        };
        Ok(Packet {
            address: self.address,
            seq: 0,
            command,
            data,
            timestamp: self.timestamp,
            is_user_interface_resp,
        })
    }

    pub fn status_update(&self) -> Option<&StatusUpdate> {
        match &self.kind {
            EventKind::StatusUpdate(update) => Some(update),
            EventKind::SystemStatus(_) => None,
        }
    }

    pub fn system_status(&self) -> Option<&SystemStatusEvent> {
        match &self.kind {
            EventKind::SystemStatus(event) => Some(event),
            EventKind::StatusUpdate(_) => None,
        }
    }
}

impl From<SystemStatusEvent> for Event {
    fn from(event: SystemStatusEvent) -> Self {
        Self::new(EventKind::SystemStatus(event))
    }
}

impl From<StatusUpdate> for Event {
    fn from(update: StatusUpdate) -> Self {
        Self::new(EventKind::StatusUpdate(update))
    }
}
