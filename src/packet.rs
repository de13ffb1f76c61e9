// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/packet.py

//! Wire codec for a single Ness ASCII frame.
//!
//! ```text
//! +---------------------------------------------------------------------+
//! | start | address | length | command | data | timestamp | checksum    |
//! | hex   | hex     | hex    | hex     | str  | dec       | hex         |
//! | 1     | 0-1     | 1      | 1       | n    | 0 or 6    | 1           |
//! +---------------------------------------------------------------------+
//! ```
//!
//! Each byte takes two ASCII characters, except in outbound `0x83` request
//! frames where the address and the payload are one character per unit.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tracing::trace;

use crate::constants::{
    ADDRESSED_RESPONSE_LEN, START_ADDRESS, START_BASE, START_REQUEST, START_RESPONSE,
    START_TIMESTAMP,
};
use crate::error::{NessError, Result};

/// Frame command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// User commands sent to the panel, and the panel's responses to them.
    UserInterface,
    /// Asynchronous system status events.
    SystemStatus,
}

impl CommandType {
    pub fn code(self) -> u8 {
        match self {
            Self::UserInterface => 0x60,
            Self::SystemStatus => 0x61,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x60 => Ok(Self::UserInterface),
            0x61 => Ok(Self::SystemStatus),
            other => Err(NessError::UnknownCommand(other)),
        }
    }
}

/// One decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub address: Option<u8>,
    pub seq: u8,
    pub command: CommandType,
    pub data: String,
    pub timestamp: Option<NaiveDateTime>,
    /// Whether this is the panel's response to a user-interface request.
    pub is_user_interface_resp: bool,
}

impl Packet {
    /// Build an outbound user-interface request carrying literal command text.
    pub fn request(command: impl Into<String>) -> Self {
        Self {
            address: Some(0),
            seq: 0,
            command: CommandType::UserInterface,
            data: command.into(),
            timestamp: None,
            is_user_interface_resp: false,
        }
    }

    /// The start byte implied by the optional fields.
    pub fn start(&self) -> u8 {
        let mut start = START_BASE;
        if self.address.is_some() && !self.is_user_interface_resp {
            start |= START_ADDRESS;
        }
        if self.timestamp.is_some() {
            start |= START_TIMESTAMP;
        }
        start
    }

    /// Payload length: characters for request frames, bytes otherwise.
    pub fn length(&self) -> usize {
        if is_user_interface_req(self.start()) {
            self.data.len()
        } else {
            self.data.len() / 2
        }
    }

    pub fn length_field(&self) -> u8 {
        (self.length() as u8 & 0x7f) | ((self.seq & 0x01) << 7)
    }

    pub fn checksum(&self) -> u8 {
        checksum_of(&self.encode_body())
    }

    /// Encode into the wire representation, without the CRLF terminator.
    pub fn encode(&self) -> String {
        let body = self.encode_body();
        let checksum = checksum_of(&body);
        format!("{body}{checksum:02X}")
    }

    fn encode_body(&self) -> String {
        let start = self.start();
        let mut out = format!("{start:02x}");

        if let Some(address) = self.address {
            if is_user_interface_req(start) {
                out.push_str(&format!("{:01x}", address & 0x0f));
            } else {
                out.push_str(&format!("{address:02x}"));
            }
        }

        out.push_str(&format!("{:02x}", self.length_field()));
        out.push_str(&format!("{:02x}", self.command.code()));
        out.push_str(&self.data);
        if let Some(ts) = self.timestamp {
            out.push_str(&ts.format("%y%m%d%H%M%S").to_string());
        }
        out
    }

    /// Decode one line (without CRLF) received from the panel.
    ///
    /// The checksum byte is consumed but not verified.
    pub fn decode(line: &str) -> Result<Self> {
        trace!("Decoding frame: '{}'", line);
        if !line.is_ascii() {
            return Err(NessError::format("frame contains non-ASCII characters"));
        }

        let mut reader = FrameReader::new(line);
        let start = reader.take_hex(false)?;
        let half = is_user_interface_req(start);

        let address = if has_address(start, line.len()) {
            Some(reader.take_hex(half)?)
        } else {
            None
        };

        let length = reader.take_hex(false)?;
        let data_length = (length & 0x7f) as usize;
        let seq = length >> 7;
        let command = CommandType::from_code(reader.take_hex(false)?)?;
        let data = reader.take_bytes(data_length, half)?.to_string();

        let timestamp = if has_timestamp(start) {
            Some(decode_timestamp(reader.take_bytes(6, false)?)?)
        } else {
            None
        };

        let _checksum = reader.take_hex(false)?;

        if !reader.is_consumed() {
            return Err(NessError::format(format!(
                "{} trailing characters after checksum",
                reader.remaining()
            )));
        }

        Ok(Self {
            address,
            seq,
            command,
            data,
            timestamp,
            is_user_interface_resp: is_user_interface_resp(start)
                && command == CommandType::UserInterface,
        })
    }
}

/// Left-to-right cursor over an encoded frame.
struct FrameReader<'a> {
    data: &'a str,
    position: usize,
}

impl<'a> FrameReader<'a> {
    fn new(data: &'a str) -> Self {
        Self { data, position: 0 }
    }

    fn take_bytes(&mut self, n: usize, half: bool) -> Result<&'a str> {
        let width = if half { n } else { n * 2 };
        let end = self.position + width;
        let taken = self
            .data
            .get(self.position..end)
            .ok_or_else(|| NessError::format("unable to take more data than exists"))?;
        self.position = end;
        Ok(taken)
    }

    fn take_hex(&mut self, half: bool) -> Result<u8> {
        parse_hex(self.take_bytes(1, half)?)
    }

    fn is_consumed(&self) -> bool {
        self.position >= self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }
}

/// Whether a frame carries an address field.
///
/// Some `0x82` frames carry an address with bit 0 clear. They are only
/// distinguishable by their encoded length.
pub fn has_address(start: u8, encoded_len: usize) -> bool {
    start & START_ADDRESS != 0 || (start == START_RESPONSE && encoded_len == ADDRESSED_RESPONSE_LEN)
}

pub fn has_timestamp(start: u8) -> bool {
    start & START_TIMESTAMP != 0
}

pub fn is_user_interface_req(start: u8) -> bool {
    start == START_REQUEST
}

pub fn is_user_interface_resp(start: u8) -> bool {
    start == START_RESPONSE
}

pub(crate) fn parse_hex(s: &str) -> Result<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(NessError::format(format!("'{s}' is not hexadecimal")));
    }
    u8::from_str_radix(s, 16).map_err(|e| NessError::format(format!("'{s}': {e}")))
}

pub(crate) fn parse_dec(s: &str) -> Result<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NessError::format(format!("'{s}' is not decimal")));
    }
    s.parse::<u8>()
        .map_err(|e| NessError::format(format!("'{s}': {e}")))
}

fn checksum_of(encoded: &str) -> u8 {
    let total = encoded.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
    0u8.wrapping_sub(total)
}

/// Decode a `YYMMDDHHMMSS` timestamp.
///
/// P199E firmware sends minute `60` for events emitted on the hour; that
/// is read as minute 0 of the following hour.
fn decode_timestamp(s: &str) -> Result<NaiveDateTime> {
    let field = |i: usize| parse_dec(&s[i * 2..i * 2 + 2]);
    let year = 2000 + field(0)? as i32;
    let month = field(1)? as u32;
    let day = field(2)? as u32;
    let hour = field(3)? as u32;
    let mut minute = field(4)? as u32;
    let second = field(5)? as u32;

    let rollover = minute == 60;
    if rollover {
        minute = 0;
    }

    let ts = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| NessError::format(format!("invalid timestamp '{s}'")))?;

    Ok(if rollover { ts + TimeDelta::hours(1) } else { ts })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_decode_user_interface_request() {
        let pkt = Packet::decode("8300c6012345678912EE7").unwrap();
        assert_eq!(pkt.start(), 0x83);
        assert_eq!(pkt.address, Some(0x00));
        assert_eq!(pkt.length(), 12);
        assert_eq!(pkt.seq, 0);
        assert_eq!(pkt.command, CommandType::UserInterface);
        assert_eq!(pkt.data, "12345678912E");
        assert_eq!(pkt.timestamp, None);
        assert!(!pkt.is_user_interface_resp);
        assert_eq!(pkt.checksum(), 0xe7);
        assert_eq!(pkt.encode(), "8300c6012345678912EE7");
    }

    #[test]
    fn test_decode_system_status_with_timestamp() {
        let pkt = Packet::decode("8700036100070018092118370974").unwrap();
        assert_eq!(pkt.address, Some(0x00));
        assert_eq!(pkt.seq, 0);
        assert_eq!(pkt.command, CommandType::SystemStatus);
        assert_eq!(pkt.data, "000700");
        assert_eq!(pkt.timestamp, Some(ts(2018, 9, 21, 18, 37, 9)));
        assert!(!pkt.is_user_interface_resp);
    }

    #[test]
    fn test_decode_with_address() {
        let pkt = Packet::decode("8709036101050018122709413536").unwrap();
        assert_eq!(pkt.address, Some(0x09));
        assert_eq!(pkt.command, CommandType::SystemStatus);
        assert_eq!(pkt.data, "010500");
        assert_eq!(pkt.timestamp, Some(ts(2018, 12, 27, 9, 41, 35)));
        assert!(!pkt.is_user_interface_resp);
    }

    #[test]
    fn test_decode_without_address() {
        let pkt = Packet::decode("820361230001f6").unwrap();
        assert_eq!(pkt.address, None);
        assert_eq!(pkt.command, CommandType::SystemStatus);
        assert_eq!(pkt.data, "230001");
        assert_eq!(pkt.timestamp, None);
    }

    #[test]
    fn test_decode_response_with_undocumented_address() {
        let pkt = Packet::decode("820003600000001b").unwrap();
        assert_eq!(pkt.address, Some(0x00));
        assert_eq!(pkt.command, CommandType::UserInterface);
        assert_eq!(pkt.data, "000000");
        assert!(pkt.is_user_interface_resp);

        let pkt = Packet::decode("8207036020400013").unwrap();
        assert_eq!(pkt.address, Some(0x07));
        assert_eq!(pkt.data, "204000");
        assert!(pkt.is_user_interface_resp);
    }

    #[test]
    fn test_decode_minute_sixty() {
        let pkt = Packet::decode("8700036100070019022517600057").unwrap();
        assert_eq!(pkt.timestamp, Some(ts(2019, 2, 25, 18, 0, 0)));
    }

    #[test]
    fn test_minute_sixty_rolls_over_midnight() {
        let decoded = decode_timestamp("190225236000").unwrap();
        assert_eq!(decoded, ts(2019, 2, 26, 0, 0, 0));
    }

    #[test]
    fn test_decode_zone_sixteen() {
        let pkt = Packet::decode("8700036100160019022823032274").unwrap();
        assert_eq!(pkt.data, "001600");
    }

    #[test]
    fn test_encode_user_interface_request() {
        let pkt = Packet::request("A1234E");
        assert_eq!(pkt.encode(), "8300660A1234E49");
    }

    #[test]
    fn test_encode_status_requests() {
        assert_eq!(Packet::request("S00").encode(), "8300360S00E9");
        assert_eq!(Packet::request("S14").encode(), "8300360S14E4");
        assert_eq!(Packet::request("S17").encode(), "8300360S17E1");
        assert_eq!(Packet::request("1234E").encode(), "83005601234E8B");
    }

    #[test]
    fn test_encode_with_timestamp() {
        let pkt = Packet {
            address: Some(0),
            seq: 0,
            command: CommandType::UserInterface,
            data: "000100".into(),
            timestamp: Some(ts(2018, 5, 10, 15, 32, 55)),
            is_user_interface_resp: false,
        };
        assert_eq!(pkt.start(), 0x87);
        assert_eq!(pkt.length(), 3);
        assert_eq!(pkt.encode(), "87000360000100180510153255E3");
    }

    #[test]
    fn test_round_trip() {
        let frames = [
            Packet::request("A1234E"),
            Packet {
                address: Some(0),
                seq: 0,
                command: CommandType::UserInterface,
                data: "140500".into(),
                timestamp: None,
                is_user_interface_resp: true,
            },
            Packet {
                address: Some(2),
                seq: 0,
                command: CommandType::SystemStatus,
                data: "000301".into(),
                timestamp: Some(ts(2008, 5, 10, 23, 45, 0)),
                is_user_interface_resp: false,
            },
            Packet {
                address: None,
                seq: 1,
                command: CommandType::SystemStatus,
                data: "230001".into(),
                timestamp: None,
                is_user_interface_resp: false,
            },
        ];
        for frame in frames {
            let decoded = Packet::decode(&frame.encode()).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn test_checksum_sums_to_zero() {
        for line in ["8300660A1234E49", "8200036014050043", "87020361000301080510234500E5"] {
            let pkt = Packet::decode(line).unwrap();
            let encoded = pkt.encode();
            let (body, checksum) = encoded.split_at(encoded.len() - 2);
            let sum = body.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
            let checksum = u8::from_str_radix(checksum, 16).unwrap();
            assert_eq!(sum.wrapping_add(checksum), 0);
            assert_eq!(encoded, line);
        }
    }

    #[test]
    fn test_checksum_not_verified() {
        // Correct checksum would be E5
        let pkt = Packet::decode("870203610003010805102345008A").unwrap();
        assert_eq!(pkt.data, "000301");
    }

    #[test]
    fn test_decode_truncated() {
        let err = Packet::decode("8300660A12").unwrap_err();
        assert!(matches!(err, NessError::Format { .. }));
    }

    #[test]
    fn test_decode_trailing_data() {
        let err = Packet::decode("820361230001f6f").unwrap_err();
        assert!(matches!(err, NessError::Format { .. }));
    }

    #[test]
    fn test_decode_unknown_command() {
        let err = Packet::decode("820362230001f5").unwrap_err();
        assert!(matches!(err, NessError::UnknownCommand(0x62)));
    }

    #[test]
    fn test_decode_rejects_non_hex_and_non_ascii() {
        assert!(Packet::decode("zz0361230001f6").is_err());
        assert!(Packet::decode("82036123000é").is_err());
        assert!(Packet::decode("").is_err());
    }

    #[test]
    fn test_has_address() {
        assert!(has_address(0x83, 10));
        assert!(has_address(0x87, 28));
        assert!(has_address(0x82, 16));
        assert!(!has_address(0x82, 14));
        assert!(!has_address(0x86, 16));
    }
}
