// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/event.py

//! Responses to `S<id>` status requests.
//!
//! Every response payload starts with the request id byte. Bitfield
//! responses carry a 16-bit big-endian value in payload bytes 1-2.

use bitflags::bitflags;

use crate::error::{NessError, Result};
use crate::packet::parse_hex;

/// Which 16-zone bank a zone request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneBank {
    /// Zones 1-16
    Zones1To16,
    /// Zones 17-32
    Zones17To32,
}

impl ZoneBank {
    /// Zone id of the first zone in this bank.
    pub fn first_zone(self) -> u8 {
        match self {
            Self::Zones1To16 => 1,
            Self::Zones17To32 => 17,
        }
    }

    fn offset(self) -> u8 {
        match self {
            Self::Zones1To16 => 0x00,
            Self::Zones17To32 => 0x20,
        }
    }
}

/// The zone-related status requests. Each exists once per [`ZoneBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneRequest {
    InputUnsealed,
    RadioUnsealed,
    CbusUnsealed,
    InDelay,
    InDoubleTrigger,
    InAlarm,
    Excluded,
    AutoExcluded,
    SupervisionFailPending,
    SupervisionFail,
    DoorsOpen,
    DetectorLowBattery,
    DetectorTamper,
}

impl ZoneRequest {
    fn code(self) -> u8 {
        match self {
            Self::InputUnsealed => 0x00,
            Self::RadioUnsealed => 0x01,
            Self::CbusUnsealed => 0x02,
            Self::InDelay => 0x03,
            Self::InDoubleTrigger => 0x04,
            Self::InAlarm => 0x05,
            Self::Excluded => 0x06,
            Self::AutoExcluded => 0x07,
            Self::SupervisionFailPending => 0x08,
            Self::SupervisionFail => 0x09,
            Self::DoorsOpen => 0x10,
            Self::DetectorLowBattery => 0x11,
            Self::DetectorTamper => 0x12,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        let request = match code {
            0x00 => Self::InputUnsealed,
            0x01 => Self::RadioUnsealed,
            0x02 => Self::CbusUnsealed,
            0x03 => Self::InDelay,
            0x04 => Self::InDoubleTrigger,
            0x05 => Self::InAlarm,
            0x06 => Self::Excluded,
            0x07 => Self::AutoExcluded,
            0x08 => Self::SupervisionFailPending,
            0x09 => Self::SupervisionFail,
            0x10 => Self::DoorsOpen,
            0x11 => Self::DetectorLowBattery,
            0x12 => Self::DetectorTamper,
            _ => return None,
        };
        Some(request)
    }
}

/// Status request id, the first payload byte of every status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestId {
    Zone(ZoneBank, ZoneRequest),
    MiscellaneousAlarms,
    Arming,
    Outputs,
    ViewState,
    PanelVersion,
    AuxiliaryOutputs,
}

impl RequestId {
    pub fn code(self) -> u8 {
        match self {
            Self::Zone(bank, request) => bank.offset() + request.code(),
            Self::MiscellaneousAlarms => 0x13,
            Self::Arming => 0x14,
            Self::Outputs => 0x15,
            Self::ViewState => 0x16,
            Self::PanelVersion => 0x17,
            Self::AuxiliaryOutputs => 0x18,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        let id = match code {
            0x13 => Self::MiscellaneousAlarms,
            0x14 => Self::Arming,
            0x15 => Self::Outputs,
            0x16 => Self::ViewState,
            0x17 => Self::PanelVersion,
            0x18 => Self::AuxiliaryOutputs,
            0x00..=0x12 => ZoneRequest::from_code(code)
                .map(|r| Self::Zone(ZoneBank::Zones1To16, r))
                .ok_or(NessError::UnknownRequestId(code))?,
            0x20..=0x32 => ZoneRequest::from_code(code - 0x20)
                .map(|r| Self::Zone(ZoneBank::Zones17To32, r))
                .ok_or(NessError::UnknownRequestId(code))?,
            other => return Err(NessError::UnknownRequestId(other)),
        };
        Ok(id)
    }

    /// The `S<id>` command that asks the panel for this status.
    pub fn command(self) -> String {
        format!("S{:02X}", self.code())
    }
}

bitflags! {
    /// Zones within one bank. `ZONE_1` is the bank's first zone.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Zones: u16 {
        const ZONE_1  = 0x0100;
        const ZONE_2  = 0x0200;
        const ZONE_3  = 0x0400;
        const ZONE_4  = 0x0800;
        const ZONE_5  = 0x1000;
        const ZONE_6  = 0x2000;
        const ZONE_7  = 0x4000;
        const ZONE_8  = 0x8000;
        const ZONE_9  = 0x0001;
        const ZONE_10 = 0x0002;
        const ZONE_11 = 0x0004;
        const ZONE_12 = 0x0008;
        const ZONE_13 = 0x0010;
        const ZONE_14 = 0x0020;
        const ZONE_15 = 0x0040;
        const ZONE_16 = 0x0080;
    }
}

impl Zones {
    /// Flag for the `n`th zone of a bank (1-16).
    pub fn nth(n: u8) -> Option<Self> {
        match n {
            1..=8 => Some(Self::from_bits_retain(0x0100 << (n - 1))),
            9..=16 => Some(Self::from_bits_retain(1 << (n - 9))),
            _ => None,
        }
    }
}

bitflags! {
    /// Miscellaneous alarm conditions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MiscAlarms: u16 {
        const DURESS             = 0x0100;
        const PANIC              = 0x0200;
        const MEDICAL            = 0x0400;
        const FIRE               = 0x0800;
        const INSTALL_END        = 0x1000;
        const EXT_TAMPER         = 0x2000;
        const PANEL_TAMPER       = 0x4000;
        const KEYPAD_TAMPER      = 0x8000;
        const PENDANT_PANIC      = 0x0001;
        const PANEL_BATTERY_LOW  = 0x0002;
        const PANEL_BATTERY_LOW2 = 0x0004;
        const MAINS_FAIL         = 0x0008;
        const CBUS_FAIL          = 0x0010;
    }
}

bitflags! {
    /// Arming status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ArmingStatus: u16 {
        const AREA_1_ARMED        = 0x0100;
        const AREA_2_ARMED        = 0x0200;
        const AREA_1_FULLY_ARMED  = 0x0400;
        const AREA_2_FULLY_ARMED  = 0x0800;
        const MONITOR_ARMED       = 0x1000;
        const DAY_MODE_ARMED      = 0x2000;
        const ENTRY_DELAY_1_ON    = 0x4000;
        const ENTRY_DELAY_2_ON    = 0x8000;
        const MANUAL_EXCLUDE_MODE = 0x0001;
        const MEMORY_MODE         = 0x0002;
        const DAY_ZONE_SELECT     = 0x0004;
    }
}

bitflags! {
    /// Panel output states.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Outputs: u16 {
        const SIREN_LOUD            = 0x0100;
        const SIREN_SOFT            = 0x0200;
        const SIREN_SOFT_MONITOR    = 0x0400;
        const SIREN_SOFT_FIRE       = 0x0800;
        const STROBE                = 0x1000;
        const RESET                 = 0x2000;
        const SONALART              = 0x4000;
        const KEYPAD_DISPLAY_ENABLE = 0x8000;
        const AUX1                  = 0x0001;
        const AUX2                  = 0x0002;
        const AUX3                  = 0x0004;
        const AUX4                  = 0x0008;
        const MONITOR_OUT           = 0x0010;
        const POWER_FAIL            = 0x0020;
        const PANEL_BATT_FAIL       = 0x0040;
        const TAMPER_XPAND          = 0x0080;
    }
}

bitflags! {
    /// Auxiliary output states.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AuxOutputs: u16 {
        const AUX_1 = 0x0001;
        const AUX_2 = 0x0002;
        const AUX_3 = 0x0004;
        const AUX_4 = 0x0008;
        const AUX_5 = 0x0010;
        const AUX_6 = 0x0020;
        const AUX_7 = 0x0040;
        const AUX_8 = 0x0080;
    }
}

impl AuxOutputs {
    /// Flag for auxiliary output `id` (1-8).
    pub fn output(id: u8) -> Option<Self> {
        match id {
            1..=8 => Some(Self::from_bits_retain(1 << (id - 1))),
            _ => None,
        }
    }
}

/// Keypad view state. A single value, not a bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
    Normal,
    BriefDayChime,
    Home,
    Memory,
    BriefDayZoneSelect,
    ExcludeSelect,
    UserProgram,
    InstallerProgram,
}

impl ViewState {
    pub fn value(self) -> u16 {
        match self {
            Self::Normal => 0xf000,
            Self::BriefDayChime => 0xe000,
            Self::Home => 0xd000,
            Self::Memory => 0xc000,
            Self::BriefDayZoneSelect => 0xb000,
            Self::ExcludeSelect => 0xa000,
            Self::UserProgram => 0x9000,
            Self::InstallerProgram => 0x8000,
        }
    }

    pub fn from_value(value: u16) -> Result<Self> {
        let state = match value {
            0xf000 => Self::Normal,
            0xe000 => Self::BriefDayChime,
            0xd000 => Self::Home,
            0xc000 => Self::Memory,
            0xb000 => Self::BriefDayZoneSelect,
            0xa000 => Self::ExcludeSelect,
            0x9000 => Self::UserProgram,
            0x8000 => Self::InstallerProgram,
            other => return Err(NessError::format(format!("unknown view state 0x{other:04x}"))),
        };
        Ok(state)
    }
}

/// Panel hardware model. D8X panels report as `D16x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
pub enum PanelModel {
    D16x,
    D16x3G,
    D16xCel,
}

impl PanelModel {
    pub fn code(self) -> u8 {
        match self {
            Self::D16x => 0x00,
            Self::D16x3G => 0x04,
            Self::D16xCel => 0x14,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(Self::D16x),
            0x04 => Ok(Self::D16x3G),
            0x14 => Ok(Self::D16xCel),
            other => Err(NessError::format(format!("unknown panel model 0x{other:02x}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneUpdate {
    pub bank: ZoneBank,
    pub request: ZoneRequest,
    pub included_zones: Zones,
}

impl ZoneUpdate {
    pub fn request_id(&self) -> RequestId {
        RequestId::Zone(self.bank, self.request)
    }

    /// Absolute ids (1-32) of the included zones.
    pub fn zone_ids(&self) -> Vec<u8> {
        (1..=16)
            .filter(|n| Zones::nth(*n).is_some_and(|z| self.included_zones.contains(z)))
            .map(|n| n + self.bank.first_zone() - 1)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmingUpdate {
    pub status: ArmingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiscellaneousAlarmsUpdate {
    pub included_alarms: MiscAlarms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputsUpdate {
    pub outputs: Outputs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewStateUpdate {
    pub state: ViewState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelVersionUpdate {
    pub model: PanelModel,
    pub major_version: u8,
    pub minor_version: u8,
}

impl PanelVersionUpdate {
    pub fn version(&self) -> String {
        format!("{}.{}", self.major_version, self.minor_version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxiliaryOutputsUpdate {
    pub outputs: AuxOutputs,
}

/// Response to a status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Zone(ZoneUpdate),
    Arming(ArmingUpdate),
    MiscellaneousAlarms(MiscellaneousAlarmsUpdate),
    Outputs(OutputsUpdate),
    ViewState(ViewStateUpdate),
    PanelVersion(PanelVersionUpdate),
    AuxiliaryOutputs(AuxiliaryOutputsUpdate),
}

impl StatusUpdate {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Zone(update) => update.request_id(),
            Self::Arming(_) => RequestId::Arming,
            Self::MiscellaneousAlarms(_) => RequestId::MiscellaneousAlarms,
            Self::Outputs(_) => RequestId::Outputs,
            Self::ViewState(_) => RequestId::ViewState,
            Self::PanelVersion(_) => RequestId::PanelVersion,
            Self::AuxiliaryOutputs(_) => RequestId::AuxiliaryOutputs,
        }
    }

    pub fn decode(data: &str) -> Result<Self> {
        let request_id = RequestId::from_code(parse_hex(payload_field(data, 0..2)?)?)?;
        let update = match request_id {
            RequestId::Zone(bank, request) => Self::Zone(ZoneUpdate {
                bank,
                request,
                included_zones: Zones::from_bits_truncate(unpack(data)?),
            }),
            RequestId::Arming => Self::Arming(ArmingUpdate {
                status: ArmingStatus::from_bits_truncate(unpack(data)?),
            }),
            RequestId::MiscellaneousAlarms => {
                Self::MiscellaneousAlarms(MiscellaneousAlarmsUpdate {
                    included_alarms: MiscAlarms::from_bits_truncate(unpack(data)?),
                })
            }
            RequestId::Outputs => Self::Outputs(OutputsUpdate {
                outputs: Outputs::from_bits_truncate(unpack(data)?),
            }),
            RequestId::ViewState => Self::ViewState(ViewStateUpdate {
                state: ViewState::from_value(unpack(data)?)?,
            }),
            RequestId::PanelVersion => Self::PanelVersion(PanelVersionUpdate {
                model: PanelModel::from_code(parse_hex(payload_field(data, 2..4)?)?)?,
                major_version: parse_hex(payload_field(data, 4..5)?)?,
                minor_version: parse_hex(payload_field(data, 5..6)?)?,
            }),
            RequestId::AuxiliaryOutputs => Self::AuxiliaryOutputs(AuxiliaryOutputsUpdate {
                outputs: AuxOutputs::from_bits_truncate(unpack(data)?),
            }),
        };
        Ok(update)
    }

    pub fn encode(&self) -> String {
        let id = self.request_id().code();
        match self {
            Self::Zone(u) => pack(id, u.included_zones.bits()),
            Self::Arming(u) => pack(id, u.status.bits()),
            Self::MiscellaneousAlarms(u) => pack(id, u.included_alarms.bits()),
            Self::Outputs(u) => pack(id, u.outputs.bits()),
            Self::ViewState(u) => pack(id, u.state.value()),
            Self::PanelVersion(u) => format!(
                "{id:02x}{:02x}{:x}{:x}",
                u.model.code(),
                u.major_version & 0x0f,
                u.minor_version & 0x0f
            ),
            Self::AuxiliaryOutputs(u) => pack(id, u.outputs.bits()),
        }
    }
}

fn payload_field(data: &str, range: std::ops::Range<usize>) -> Result<&str> {
    data.get(range)
        .ok_or_else(|| NessError::format(format!("status update payload too short: '{data}'")))
}

/// Read the 16-bit big-endian value in payload bytes 1-2.
fn unpack(data: &str) -> Result<u16> {
    let high = parse_hex(payload_field(data, 2..4)?)?;
    let low = parse_hex(payload_field(data, 4..6)?)?;
    Ok(u16::from_be_bytes([high, low]))
}

fn pack(id: u8, value: u16) -> String {
    format!("{id:02x}{value:04x}")
}
