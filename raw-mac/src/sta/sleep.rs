/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Beacon-driven sleep decisions of an associated station.
//!
//! ```text
//! DTIM beacon
//!   own bit set or uplink pending ─► own group 0 ? own slot now
//!                                                : sleep own_group·BI
//!   otherwise                     ─► sleep dtim_period·BI
//! other beacon
//!   window covers own AID         ─► own slot
//!   beacon group < own group      ─► sleep (own − beacon)·BI
//!   otherwise                     ─► sleep dtim_count·BI   (DTIM comes first)
//! ```
//!
//! Every requested sleep is shortened by the strategy's early-wake margin.

use std::sync::Arc;

use crate::frame::{Aid, Beacon};
use crate::strategy::{backoff_slot_us, GroupSlotStrategy};

/// Timing of the station's own slot, relative to the beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlan {
    pub slot: u16,
    pub slot_offset_us: u64,
    pub slot_duration_us: u64,
    /// Requested sleep once the slot closes: up to the next beacon the
    /// station has to hear.
    pub sleep_after_slot_us: u64,
    pub backoff_slot_us: u64,
}

impl SlotPlan {
    pub fn slot_end_us(&self) -> u64 {
        self.slot_offset_us + self.slot_duration_us
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDecision {
    /// DTIM with nothing for the station in either direction.
    SleepFullCycle { duration_us: u64 },
    /// DTIM announced traffic; the station's own beacon comes later.
    SleepUntilOwnBeacon { duration_us: u64 },
    OwnSlot(SlotPlan),
    /// Beacon for an earlier group of this cycle.
    OwnGroupAhead { duration_us: u64 },
    /// Beacon for a later group; the next DTIM comes before the own group.
    DtimFirst { duration_us: u64 },
}

#[derive(Debug, Clone)]
pub struct SleepScheduler {
    strategy: Arc<dyn GroupSlotStrategy>,
}

impl SleepScheduler {
    pub fn new(strategy: Arc<dyn GroupSlotStrategy>) -> Self {
        Self { strategy }
    }

    pub fn decide(&self, aid: Aid, beacon: &Beacon, pending_uplink: bool) -> SleepDecision {
        let raw = &beacon.raw;
        let tim = &beacon.tim;
        let bi = beacon.beacon_interval_us;
        let group_size = raw.group_size();
        let own_group = self.strategy.group_of(aid, group_size);

        if tim.is_dtim() {
            if tim.group_flagged(own_group) || pending_uplink {
                if own_group == 0 {
                    SleepDecision::OwnSlot(self.slot_plan(aid, beacon))
                } else {
                    SleepDecision::SleepUntilOwnBeacon {
                        duration_us: bi.saturating_mul(u64::from(own_group)),
                    }
                }
            } else {
                SleepDecision::SleepFullCycle {
                    duration_us: bi.saturating_mul(u64::from(tim.dtim_period)),
                }
            }
        } else if self.strategy.belongs_to_group(aid, raw) {
            SleepDecision::OwnSlot(self.slot_plan(aid, beacon))
        } else {
            let beacon_group = self.strategy.group_of(Aid::from_raw(raw.group_start), group_size);
            if beacon_group < own_group {
                SleepDecision::OwnGroupAhead {
                    duration_us: bi.saturating_mul(u64::from(own_group - beacon_group)),
                }
            } else {
                SleepDecision::DtimFirst {
                    duration_us: bi.saturating_mul(u64::from(tim.dtim_count)),
                }
            }
        }
    }

    pub fn slot_plan(&self, aid: Aid, beacon: &Beacon) -> SlotPlan {
        let raw = &beacon.raw;
        let tim = &beacon.tim;
        let slot = self.strategy.slot_of(aid, raw.slot_count);
        let slot_duration_us = self.strategy.slot_duration_us(raw.slot_duration_count);
        let slot_offset_us = u64::from(raw.raw_start_us) + u64::from(slot) * slot_duration_us;

        let beacons_left = if tim.is_dtim() { tim.dtim_period } else { tim.dtim_count };
        let sleep_after_slot_us = beacon
            .beacon_interval_us
            .saturating_mul(u64::from(beacons_left))
            .saturating_sub(slot_offset_us + slot_duration_us);

        SlotPlan {
            slot,
            slot_offset_us,
            slot_duration_us,
            sleep_after_slot_us,
            backoff_slot_us: backoff_slot_us(slot_duration_us),
        }
    }

    /// Time the radio actually sleeps for a requested duration, or `None`
    /// when the request does not exceed the early-wake margin.
    pub fn sleep_window(&self, requested_us: u64) -> Option<u64> {
        let margin = self.strategy.early_wake_us();
        (requested_us > margin).then(|| requested_us - margin)
    }
}
