/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Group / slot derivation rules shared by the access point and the stations.
//!
//! Both sides must agree on these mappings without exchanging them, so they
//! are pure functions behind a narrow trait.  [`S1gStrategy`] is the only
//! implementation; it is injected as `Arc<dyn GroupSlotStrategy>`.
//!
//! ```text
//!   aid = low 13 bits of MAC
//!   group = (aid - 1) / group_size
//!   slot  = aid % slot_count
//!   slot duration = 500 µs + 120 µs × count
//! ```

use std::fmt;

use crate::frame::{Aid, MacAddress, RawParams};

/// Fixed part of a RAW slot, in µs.
pub const SLOT_BASE_US: u64 = 500;

/// Duration of one slot-duration-count unit, in µs.
pub const SLOT_UNIT_US: u64 = 120;

/// Radio sleep-to-receive transition margin, in µs.
pub const EARLY_WAKE_US: u64 = 10_000;

/// Largest contention window; a slot is split into this many backoff units.
pub const MAX_CONTENTION_WINDOW: u64 = 1023;

/// Backoff unit that keeps a full contention window inside one slot.
pub fn backoff_slot_us(slot_duration_us: u64) -> u64 {
    slot_duration_us / MAX_CONTENTION_WINDOW
}

/// Mapping from station identity to RAW group and slot.
pub trait GroupSlotStrategy: fmt::Debug + Send + Sync {
    /// Association identifier derived from a hardware address.
    fn aid_from_address(&self, address: MacAddress) -> Aid;

    fn group_of(&self, aid: Aid, group_size: u16) -> u16;

    fn slot_of(&self, aid: Aid, slot_count: u16) -> u16;

    fn slot_duration_us(&self, slot_duration_count: u16) -> u64;

    /// Whether the RAW window advertised in `raw` covers `aid`.
    fn belongs_to_group(&self, aid: Aid, raw: &RawParams) -> bool;

    /// How long before a wake deadline the radio must be powered up.
    fn early_wake_us(&self) -> u64;
}

/// Default 802.11ah rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct S1gStrategy;

impl GroupSlotStrategy for S1gStrategy {
    fn aid_from_address(&self, address: MacAddress) -> Aid {
        let o = address.octets();
        Aid::from_raw((u16::from(o[4] & 0x1f) << 8) | u16::from(o[5]))
    }

    fn group_of(&self, aid: Aid, group_size: u16) -> u16 {
        aid.value().saturating_sub(1) / group_size.max(1)
    }

    fn slot_of(&self, aid: Aid, slot_count: u16) -> u16 {
        if slot_count == 0 {
            return 0;
        }
        aid.value() % slot_count
    }

    fn slot_duration_us(&self, slot_duration_count: u16) -> u64 {
        SLOT_BASE_US + SLOT_UNIT_US * u64::from(slot_duration_count)
    }

    fn belongs_to_group(&self, aid: Aid, raw: &RawParams) -> bool {
        raw.page == aid.page() && (raw.group_start..=raw.group_end).contains(&aid.value())
    }

    fn early_wake_us(&self) -> u64 {
        EARLY_WAKE_US
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::SlotFormat;

    fn window(start: u16, end: u16, page: u8) -> RawParams {
        RawParams {
            slot_format: SlotFormat::Extended,
            slot_cross_boundary: false,
            slot_duration_count: 10,
            slot_count: 2,
            raw_start_us: 0,
            group_start: start,
            group_end: end,
            page,
        }
    }

    // ── aid_from_address ──────────────────────────────────────────────────────

    #[test]
    fn aid_is_low_13_bits_of_address() {
        let s = S1gStrategy;
        assert_eq!(s.aid_from_address(MacAddress::local(42)).value(), 42);
        let addr = MacAddress([0x02, 0, 0, 0, 0xff, 0x01]);
        assert_eq!(s.aid_from_address(addr).value(), 0x1f01);
    }

    #[test]
    fn address_with_zero_low_bits_yields_invalid_aid() {
        let addr = MacAddress([0x02, 0, 0, 0, 0x20, 0x00]);
        assert!(!S1gStrategy.aid_from_address(addr).is_valid());
    }

    // ── group_of / slot_of ────────────────────────────────────────────────────

    #[test]
    fn group_boundaries() {
        let s = S1gStrategy;
        assert_eq!(s.group_of(Aid::from_raw(1), 8), 0);
        assert_eq!(s.group_of(Aid::from_raw(8), 8), 0);
        assert_eq!(s.group_of(Aid::from_raw(9), 8), 1);
        assert_eq!(s.group_of(Aid::from_raw(32), 8), 3);
    }

    #[test]
    fn slot_is_aid_modulo_slot_count() {
        let s = S1gStrategy;
        assert_eq!(s.slot_of(Aid::from_raw(1), 2), 1);
        assert_eq!(s.slot_of(Aid::from_raw(8), 2), 0);
        assert_eq!(s.slot_of(Aid::from_raw(9), 3), 0);
        assert_eq!(s.slot_of(Aid::from_raw(9), 0), 0);
    }

    // ── slot_duration_us ──────────────────────────────────────────────────────

    #[test]
    fn slot_duration_formula() {
        let s = S1gStrategy;
        assert_eq!(s.slot_duration_us(0), 500);
        assert_eq!(s.slot_duration_us(10), 1_700);
        assert_eq!(s.slot_duration_us(2047), 246_140);
    }

    #[test]
    fn slot_duration_is_monotonic() {
        let s = S1gStrategy;
        let durations: Vec<u64> = (0..300).map(|c| s.slot_duration_us(c)).collect();
        assert!(durations.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn backoff_unit_fits_contention_window_in_slot() {
        assert_eq!(backoff_slot_us(1_700), 1);
        assert_eq!(backoff_slot_us(48_500), 47);
    }

    // ── belongs_to_group ──────────────────────────────────────────────────────

    #[test]
    fn belongs_requires_range_and_page() {
        let s = S1gStrategy;
        assert!(s.belongs_to_group(Aid::from_raw(9), &window(9, 16, 0)));
        assert!(s.belongs_to_group(Aid::from_raw(16), &window(9, 16, 0)));
        assert!(!s.belongs_to_group(Aid::from_raw(8), &window(9, 16, 0)));
        assert!(!s.belongs_to_group(Aid::from_raw(9), &window(9, 16, 1)));
        assert!(!s.belongs_to_group(Aid::from_raw(2049), &window(1, 2047, 0)));
    }
}
