// MIT License - Copyright (c) Nick Whyte
// Rust translation

use std::time::Duration;

/// Frame terminator on the wire.
pub const CRLF: &str = "\r\n";

/// Start byte bits.
pub const START_BASE: u8 = 0x82; // Always set
pub const START_ADDRESS: u8 = 0x01; // Address field present
pub const START_TIMESTAMP: u8 = 0x04; // Timestamp field present

/// Start byte of an outbound user-interface request (nibble address, literal payload).
pub const START_REQUEST: u8 = 0x83;
/// Start byte of a user-interface response.
pub const START_RESPONSE: u8 = 0x82;

/// Encoded length of a `0x82` frame that carries an address despite bit 0 being clear.
pub const ADDRESSED_RESPONSE_LEN: usize = 16;

/// Number of zones tracked, irrespective of panel model. Expansion modules
/// can add zones the panel has no command to enumerate.
pub const ZONE_COUNT: usize = 32;

// The frame length field holds 7 bits
pub const MAX_COMMAND_LEN: usize = 0x7f;

/// Number of auxiliary outputs.
pub const AUX_OUTPUT_COUNT: usize = 8;

/// Default panel TCP port used by IP-serial bridges.
pub const DEFAULT_PORT: u16 = 2401;

/// Status request commands.
pub const CMD_ZONES_1_16_UNSEALED: &str = "S00";
pub const CMD_ZONES_17_32_UNSEALED: &str = "S20";
pub const CMD_ARMING_STATUS: &str = "S14";
pub const CMD_PANEL_VERSION: &str = "S17";
pub const CMD_AUX_OUTPUTS: &str = "S18";

/// How long `close()` waits for the receive task before aborting it.
pub const CLOSE_GRACE: Duration = Duration::from_secs(2);
