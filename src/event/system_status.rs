// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/event.py

use crate::error::{NessError, Result};
use crate::packet::{parse_dec, parse_hex};

/// Type code of an asynchronous system status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    // Zone/user events
    Unsealed,
    Sealed,
    Alarm,
    AlarmRestore,
    ManualExclude,
    ManualInclude,
    AutoExclude,
    AutoInclude,
    TamperUnsealed,
    TamperNormal,

    // System events
    PowerFailure,
    PowerNormal,
    BatteryFailure,
    BatteryNormal,
    ReportFailure,
    ReportNormal,
    SupervisionFailure,
    SupervisionNormal,
    RealTimeClock,

    // Area events
    EntryDelayStart,
    EntryDelayEnd,
    ExitDelayStart,
    ExitDelayEnd,
    ArmedAway,
    ArmedHome,
    ArmedDay,
    ArmedNight,
    ArmedVacation,
    ArmedHighest,
    Disarmed,
    ArmingDelayed,

    // Result events
    OutputOn,
    OutputOff,
}

impl EventType {
    pub fn code(self) -> u8 {
        match self {
            Self::Unsealed => 0x00,
            Self::Sealed => 0x01,
            Self::Alarm => 0x02,
            Self::AlarmRestore => 0x03,
            Self::ManualExclude => 0x04,
            Self::ManualInclude => 0x05,
            Self::AutoExclude => 0x06,
            Self::AutoInclude => 0x07,
            Self::TamperUnsealed => 0x08,
            Self::TamperNormal => 0x09,
            Self::PowerFailure => 0x10,
            Self::PowerNormal => 0x11,
            Self::BatteryFailure => 0x12,
            Self::BatteryNormal => 0x13,
            Self::ReportFailure => 0x14,
            Self::ReportNormal => 0x15,
            Self::SupervisionFailure => 0x16,
            Self::SupervisionNormal => 0x17,
            Self::RealTimeClock => 0x19,
            Self::EntryDelayStart => 0x20,
            Self::EntryDelayEnd => 0x21,
            Self::ExitDelayStart => 0x22,
            Self::ExitDelayEnd => 0x23,
            Self::ArmedAway => 0x24,
            Self::ArmedHome => 0x25,
            Self::ArmedDay => 0x26,
            Self::ArmedNight => 0x27,
            Self::ArmedVacation => 0x28,
            Self::ArmedHighest => 0x2e,
            Self::Disarmed => 0x2f,
            Self::ArmingDelayed => 0x30,
            Self::OutputOn => 0x31,
            Self::OutputOff => 0x32,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        let event_type = match code {
            0x00 => Self::Unsealed,
            0x01 => Self::Sealed,
            0x02 => Self::Alarm,
            0x03 => Self::AlarmRestore,
            0x04 => Self::ManualExclude,
            0x05 => Self::ManualInclude,
            0x06 => Self::AutoExclude,
            0x07 => Self::AutoInclude,
            0x08 => Self::TamperUnsealed,
            0x09 => Self::TamperNormal,
            0x10 => Self::PowerFailure,
            0x11 => Self::PowerNormal,
            0x12 => Self::BatteryFailure,
            0x13 => Self::BatteryNormal,
            0x14 => Self::ReportFailure,
            0x15 => Self::ReportNormal,
            0x16 => Self::SupervisionFailure,
            0x17 => Self::SupervisionNormal,
            0x19 => Self::RealTimeClock,
            0x20 => Self::EntryDelayStart,
            0x21 => Self::EntryDelayEnd,
            0x22 => Self::ExitDelayStart,
            0x23 => Self::ExitDelayEnd,
            0x24 => Self::ArmedAway,
            0x25 => Self::ArmedHome,
            0x26 => Self::ArmedDay,
            0x27 => Self::ArmedNight,
            0x28 => Self::ArmedVacation,
            0x2e => Self::ArmedHighest,
            0x2f => Self::Disarmed,
            0x30 => Self::ArmingDelayed,
            0x31 => Self::OutputOn,
            0x32 => Self::OutputOff,
            other => return Err(NessError::UnknownEventType(other)),
        };
        Ok(event_type)
    }
}

/// Asynchronous notification pushed by the panel.
///
/// `zone` is meaningful for zone events (`Unsealed` to `TamperNormal`),
/// `area` for area events (`EntryDelayStart` to `ArmingDelayed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemStatusEvent {
    pub event_type: EventType,
    pub zone: u8,
    pub area: u8,
}

impl SystemStatusEvent {
    pub fn new(event_type: EventType, zone: u8, area: u8) -> Self {
        Self {
            event_type,
            zone,
            area,
        }
    }

    /// Decode the `[type, zone, area]` payload. The panel sends the zone in decimal.
    pub fn decode(data: &str) -> Result<Self> {
        let field = |range: std::ops::Range<usize>| {
            data.get(range)
                .ok_or_else(|| NessError::format(format!("system status payload too short: '{data}'")))
        };
        let event_type = EventType::from_code(parse_hex(field(0..2)?)?)?;
        let zone = parse_dec(field(2..4)?)?;
        let area = parse_hex(field(4..6)?)?;
        Ok(Self {
            event_type,
            zone,
            area,
        })
    }

    /// Encode the payload. The zone field is two decimal digits, so zones
    /// above 99 cannot be represented.
    pub fn encode(&self) -> Result<String> {
        if self.zone > 99 {
            return Err(NessError::format(format!(
                "zone {} does not fit the two digit zone field",
                self.zone
            )));
        }
        Ok(format!(
            "{:02x}{:02}{:02x}",
            self.event_type.code(),
            self.zone,
            self.area
        ))
    }
}
