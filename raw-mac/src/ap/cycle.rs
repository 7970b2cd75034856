/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Rotating group cycle of the access point.
//!
//! One beacon per group; the beacon of group 0 is the DTIM beacon.  The cycle
//! starts parked on the last group so that the first [`advance`] lands on the
//! DTIM beacon of group 0 with window `[1, group_size]`.
//!
//! [`advance`]: AccessPointCycle::advance

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointCycle {
    group_count: u16,
    group_size: u16,
    capacity: u16,
    current_group: u16,
    window_start: u16,
    window_end: u16,
}

impl AccessPointCycle {
    /// `group_count * group_size` must equal `capacity` (enforced by config
    /// validation).
    pub fn new(group_count: u16, group_size: u16, capacity: u16) -> Self {
        let group_count = group_count.max(1);
        Self {
            group_count,
            group_size,
            capacity,
            current_group: group_count - 1,
            window_start: capacity.saturating_sub(group_size) + 1,
            window_end: capacity,
        }
    }

    /// Move to the next group.  Returns `true` when the new group is 0.
    pub fn advance(&mut self) -> bool {
        self.current_group = (self.current_group + 1) % self.group_count;
        self.window_start += self.group_size;
        self.window_end += self.group_size;
        if self.window_end > self.capacity {
            self.window_start = 1;
            self.window_end = self.group_size;
        }
        self.is_dtim()
    }

    pub fn group_count(&self) -> u16 {
        self.group_count
    }

    pub fn group_size(&self) -> u16 {
        self.group_size
    }

    pub fn current_group(&self) -> u16 {
        self.current_group
    }

    pub fn window_start(&self) -> u16 {
        self.window_start
    }

    pub fn window_end(&self) -> u16 {
        self.window_end
    }

    pub fn is_dtim(&self) -> bool {
        self.current_group == 0
    }

    /// 0 on the DTIM beacon, otherwise beacons left until the next DTIM.
    pub fn dtim_count(&self) -> u16 {
        if self.is_dtim() {
            0
        } else {
            self.group_count - self.current_group
        }
    }

    /// Beacons from the current one until `target`'s beacon in the cycle that
    /// follows the next DTIM.
    pub fn beacons_until_next_cycle_group(&self, target: u16) -> u64 {
        u64::from(self.group_count - self.current_group) + u64::from(target)
    }
}
