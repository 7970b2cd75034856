/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Logical 802.11ah frame model shared by the access point and the stations.
//!
//! Only the field *semantics* the RAW mechanism depends on are modelled; the
//! compact element encoding used for round-trip checks lives in [`codec`].
//!
//! ```text
//! AP  ──Beacon{RawParams, TimParams}──►  STA
//! AP  ◄──ProbeRequest / AssocRequest───  STA
//! AP  ──ProbeResponse / AssocResponse─►  STA
//! AP  ◄────────────Data───────────────►  STA
//! ```

pub mod codec;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

// ── Addresses ─────────────────────────────────────────────────────────────────

/// 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// All-ones broadcast address, used for beacons and probe requests.
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// Locally administered unicast address whose two low octets carry `n`.
    ///
    /// Scenario files and tests use this to get addresses with a known
    /// association identifier (the low 13 bits).
    pub fn local(n: u16) -> Self {
        let [hi, lo] = n.to_be_bytes();
        MacAddress([0x02, 0x00, 0x00, 0x00, hi, lo])
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Error returned when a textual MAC address cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address '{0}' (expected six ':'-separated hex octets)")]
pub struct AddressParseError(pub String);

impl FromStr for MacAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| AddressParseError(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| AddressParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(AddressParseError(s.to_string()));
        }
        Ok(MacAddress(octets))
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ── Association identifier ────────────────────────────────────────────────────

/// Association identifier (AID).
///
/// Valid identifiers are `1..=8191`; `8192` marks a station that has not been
/// assigned one yet.  The raw value is kept as-is so that an address whose low
/// 13 bits are zero can still be represented (and refused) at association time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Aid(u16);

impl Aid {
    /// Largest assignable identifier.
    pub const MAX: u16 = 8191;

    /// Sentinel for "no identifier assigned".
    pub const UNASSIGNED: Aid = Aid(8192);

    pub const fn from_raw(value: u16) -> Self {
        Aid(value)
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// Assignable identifiers are `1..=8191`.
    pub fn is_valid(self) -> bool {
        (1..=Self::MAX).contains(&self.0)
    }

    /// Page index: bits 11..12 of the identifier.
    pub fn page(self) -> u8 {
        ((self.0 >> 11) & 0x0003) as u8
    }
}

impl fmt::Display for Aid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── RAW parameter set ─────────────────────────────────────────────────────────

/// Slot definition layout of the RAW assignment.
///
/// The 16-bit slot definition trades slot-count bits for duration bits:
///
/// | Format | Duration count | Slot count |
/// |---|---|---|
/// | 0 (`Compact`)  | 8 bits  (< 256)  | 6 bits (< 64) |
/// | 1 (`Extended`) | 11 bits (< 2048) | 3 bits (< 8)  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotFormat {
    Compact,
    #[default]
    Extended,
}

impl SlotFormat {
    pub fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            0 => Some(SlotFormat::Compact),
            1 => Some(SlotFormat::Extended),
            _ => None,
        }
    }

    pub fn bit(self) -> u8 {
        match self {
            SlotFormat::Compact => 0,
            SlotFormat::Extended => 1,
        }
    }

    /// Width of the slot-duration-count field.
    pub fn duration_bits(self) -> u8 {
        match self {
            SlotFormat::Compact => 8,
            SlotFormat::Extended => 11,
        }
    }

    /// Width of the slot-count field.
    pub fn slot_count_bits(self) -> u8 {
        14 - self.duration_bits()
    }

    pub fn max_slot_duration_count(self) -> u16 {
        (1u16 << self.duration_bits()) - 1
    }

    pub fn max_slot_count(self) -> u16 {
        (1u16 << self.slot_count_bits()) - 1
    }
}

/// RAW assignment carried by every beacon: the AID window of the group being
/// served and how its window is cut into slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawParams {
    pub slot_format: SlotFormat,
    pub slot_cross_boundary: bool,
    pub slot_duration_count: u16,
    pub slot_count: u16,
    /// Offset of the window start after the beacon, in µs (0 = immediately).
    pub raw_start_us: u8,
    pub group_start: u16,
    pub group_end: u16,
    pub page: u8,
}

impl RawParams {
    /// Width of the advertised AID window.
    pub fn group_size(&self) -> u16 {
        self.group_end.saturating_sub(self.group_start) + 1
    }
}

// ── TIM parameter set ─────────────────────────────────────────────────────────

/// Traffic indication map.  Only the DTIM beacon carries a non-empty bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimParams {
    /// Beacons per DTIM cycle (= number of groups).
    pub dtim_period: u8,
    /// `0` on the DTIM beacon, otherwise beacons remaining until the next one.
    pub dtim_count: u8,
    /// One bit per group (bit `g` set = group `g` has pending downlink data).
    pub partial_bitmap: u32,
}

impl TimParams {
    pub fn is_dtim(&self) -> bool {
        self.dtim_count == 0
    }

    pub fn group_flagged(&self, group: u16) -> bool {
        group < 32 && (self.partial_bitmap >> group) & 0x01 == 0x01
    }
}

// ── Frames ────────────────────────────────────────────────────────────────────

/// S1G beacon as transmitted by the access point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    /// Transmitting AP, which is also the BSSID.
    pub source: MacAddress,
    pub beacon_interval_us: u64,
    pub raw: RawParams,
    pub tim: TimParams,
}

/// Association response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    Failure,
}

impl StatusCode {
    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }
}

/// Every frame the MAC layers exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Beacon(Beacon),
    ProbeRequest {
        from: MacAddress,
    },
    ProbeResponse {
        from: MacAddress,
        beacon_interval_us: u64,
    },
    AssocRequest {
        from: MacAddress,
        bssid: MacAddress,
    },
    AssocResponse {
        from: MacAddress,
        status: StatusCode,
        aid: Aid,
    },
    Disassociation {
        from: MacAddress,
    },
    Data {
        from: MacAddress,
        to: MacAddress,
        payload: Vec<u8>,
    },
}

impl Frame {
    /// Address of the transmitting MAC.
    pub fn source(&self) -> MacAddress {
        match self {
            Frame::Beacon(b) => b.source,
            Frame::ProbeRequest { from }
            | Frame::ProbeResponse { from, .. }
            | Frame::AssocRequest { from, .. }
            | Frame::AssocResponse { from, .. }
            | Frame::Disassociation { from }
            | Frame::Data { from, .. } => *from,
        }
    }

    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Beacon(_) => "beacon",
            Frame::ProbeRequest { .. } => "probe-req",
            Frame::ProbeResponse { .. } => "probe-resp",
            Frame::AssocRequest { .. } => "assoc-req",
            Frame::AssocResponse { .. } => "assoc-resp",
            Frame::Disassociation { .. } => "disassoc",
            Frame::Data { .. } => "data",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── MacAddress ────────────────────────────────────────────────────────────

    #[test]
    fn mac_address_parses_and_displays() {
        let addr: MacAddress = "02:00:00:00:00:2a".parse().unwrap();
        assert_eq!(addr, MacAddress::local(42));
        assert_eq!(addr.to_string(), "02:00:00:00:00:2a");
    }

    #[test]
    fn mac_address_rejects_malformed_text() {
        assert!("02:00:00:00:2a".parse::<MacAddress>().is_err());
        assert!("02:00:00:00:00:2a:ff".parse::<MacAddress>().is_err());
        assert!("02:00:00:00:00:zz".parse::<MacAddress>().is_err());
        assert!("2:0:0:0:0:2a".parse::<MacAddress>().is_err());
    }

    #[test]
    fn broadcast_address_is_all_ones() {
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert!(!MacAddress::local(1).is_broadcast());
    }

    // ── Aid ───────────────────────────────────────────────────────────────────

    #[test]
    fn aid_valid_range_is_1_to_8191() {
        assert!(!Aid::from_raw(0).is_valid());
        assert!(Aid::from_raw(1).is_valid());
        assert!(Aid::from_raw(8191).is_valid());
        assert!(!Aid::from_raw(8192).is_valid());
        assert!(!Aid::UNASSIGNED.is_valid());
    }

    #[test]
    fn aid_page_is_bits_11_and_12() {
        assert_eq!(Aid::from_raw(42).page(), 0);
        assert_eq!(Aid::from_raw(2048).page(), 1);
        assert_eq!(Aid::from_raw(8191).page(), 3);
    }

    // ── SlotFormat ────────────────────────────────────────────────────────────

    #[test]
    fn slot_format_limits_match_field_widths() {
        assert_eq!(SlotFormat::Compact.max_slot_duration_count(), 255);
        assert_eq!(SlotFormat::Compact.max_slot_count(), 63);
        assert_eq!(SlotFormat::Extended.max_slot_duration_count(), 2047);
        assert_eq!(SlotFormat::Extended.max_slot_count(), 7);
        assert_eq!(SlotFormat::from_bit(2), None);
    }

    // ── TimParams ─────────────────────────────────────────────────────────────

    #[test]
    fn tim_group_flag_reads_bitmap_bit() {
        let tim = TimParams {
            dtim_period: 4,
            dtim_count: 0,
            partial_bitmap: 0b0100,
        };
        assert!(tim.is_dtim());
        assert!(tim.group_flagged(2));
        assert!(!tim.group_flagged(1));
        assert!(!tim.group_flagged(40), "groups beyond 32 are never flagged");
    }
}
