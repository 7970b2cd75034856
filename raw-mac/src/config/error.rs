/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Configuration range errors.
//!
//! All of these are detected before the first beacon is scheduled; a
//! [`BeaconScheduler`](crate::ap::BeaconScheduler) is never built from a
//! configuration that fails here.
//!
//! | Variant | Field(s) |
//! |---|---|
//! | `ZeroBeaconInterval` | `access_point.beacon_interval_us` |
//! | `ZeroGroupSize` / `ZeroCapacity` | `group_size`, `station_capacity` |
//! | `CapacityExceedsPage` / `CapacityNotMultipleOfGroupSize` | `station_capacity` |
//! | `TooManyGroups` | `station_capacity / group_size` |
//! | `InvalidSlotFormat` | `slot_format` |
//! | `SlotCountOutOfRange` / `SlotDurationCountOutOfRange` | slot definition |
//! | `RawWindowExceedsBeaconInterval` | slot definition vs beacon interval |
//! | `ZeroQueueCapacity` | `slot_queue_capacity` |
//! | `WatchdogNotLongerThanCycle` | `station.max_missed_beacons` |
//! | `DuplicateStation` / `StationIsAccessPoint` / `UnknownTrafficStation` | scenario lists |

use thiserror::Error;

use crate::frame::MacAddress;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("beacon interval must be greater than zero")]
    ZeroBeaconInterval,

    #[error("group size must be greater than zero")]
    ZeroGroupSize,

    #[error("station capacity must be greater than zero")]
    ZeroCapacity,

    /// Group windows are carried as 11-bit AIDs on a single page.
    #[error("station capacity {capacity} exceeds one AID page ({max})")]
    CapacityExceedsPage { capacity: u16, max: u16 },

    #[error("station capacity {capacity} is not a multiple of group size {group_size}")]
    CapacityNotMultipleOfGroupSize { capacity: u16, group_size: u16 },

    /// The TIM partial bitmap carries one bit per group.
    #[error("{groups} groups configured, at most {max} fit in the TIM bitmap")]
    TooManyGroups { groups: u16, max: u16 },

    #[error("slot format {0} is invalid (expected 0 or 1)")]
    InvalidSlotFormat(u8),

    #[error("slot count {slot_count} out of range for slot format {format} (1..={max})")]
    SlotCountOutOfRange { slot_count: u16, format: u8, max: u16 },

    #[error("slot duration count {count} out of range for slot format {format} (max {max})")]
    SlotDurationCountOutOfRange { count: u16, format: u8, max: u16 },

    #[error("RAW window of {window_us}µs is longer than the {beacon_interval_us}µs beacon interval")]
    RawWindowExceedsBeaconInterval { window_us: u64, beacon_interval_us: u64 },

    #[error("slot queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    /// A station that sleeps through a whole DTIM cycle must not trip its
    /// beacon watchdog.
    #[error("max_missed_beacons {max_missed_beacons} must exceed the {group_count}-beacon DTIM cycle")]
    WatchdogNotLongerThanCycle {
        max_missed_beacons: u32,
        group_count: u16,
    },

    #[error("station {0} is listed more than once")]
    DuplicateStation(MacAddress),

    #[error("station {0} uses the access point's address")]
    StationIsAccessPoint(MacAddress),

    #[error("traffic entry refers to unknown station {0}")]
    UnknownTrafficStation(MacAddress),
}
