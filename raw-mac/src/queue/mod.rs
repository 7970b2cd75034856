/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-(group, slot) gated downlink queues.
//!
//! The access point only talks to the [`SlotQueues`] contract: it opens and
//! closes gates at slot boundaries, asks whether a slot has work when building
//! the TIM bitmap, and enqueues frames.  It never looks inside a queue.
//!
//! [`GatedSlotQueues`] is a deliberately small implementation: a bounded FIFO
//! per slot whose frames age out after `max_time_in_queue_us`, drained by the
//! medium while the gate is open.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, warn};

use crate::frame::{Frame, MacAddress};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("slot queue (group {group}, slot {slot}) is full ({capacity} frames)")]
    Full { group: u16, slot: u16, capacity: usize },

    #[error("no slot queue for group {group}, slot {slot}")]
    UnknownSlot { group: u16, slot: u16 },
}

/// Gate and enqueue operations the access point drives.
pub trait SlotQueues {
    fn gate_open(&mut self, group: u16, slot: u16);
    fn gate_close(&mut self, group: u16, slot: u16);
    fn has_pending_work(&self, group: u16, slot: u16) -> bool;
    fn enqueue(
        &mut self,
        group: u16,
        slot: u16,
        to: MacAddress,
        frame: Frame,
        now_us: u64,
    ) -> Result<(), QueueError>;
}

#[derive(Debug)]
struct QueuedFrame {
    to: MacAddress,
    frame: Frame,
    enqueued_us: u64,
}

#[derive(Debug, Default)]
struct SlotQueue {
    open: bool,
    frames: VecDeque<QueuedFrame>,
}

#[derive(Debug)]
pub struct GatedSlotQueues {
    group_count: u16,
    slot_count: u16,
    capacity: usize,
    max_time_in_queue_us: u64,
    slots: Vec<SlotQueue>,
    aged_out: u64,
}

impl GatedSlotQueues {
    pub fn new(group_count: u16, slot_count: u16, capacity: usize, max_time_in_queue_us: u64) -> Self {
        let total = usize::from(group_count) * usize::from(slot_count);
        Self {
            group_count,
            slot_count,
            capacity,
            max_time_in_queue_us,
            slots: (0..total).map(|_| SlotQueue::default()).collect(),
            aged_out: 0,
        }
    }

    fn index(&self, group: u16, slot: u16) -> Option<usize> {
        (group < self.group_count && slot < self.slot_count)
            .then(|| usize::from(group) * usize::from(self.slot_count) + usize::from(slot))
    }

    pub fn is_open(&self, group: u16, slot: u16) -> bool {
        self.index(group, slot)
            .map(|i| self.slots[i].open)
            .unwrap_or(false)
    }

    /// Number of gates currently open.
    pub fn open_gates(&self) -> usize {
        self.slots.iter().filter(|q| q.open).count()
    }

    pub fn len(&self, group: u16, slot: u16) -> usize {
        self.index(group, slot)
            .map(|i| self.slots[i].frames.len())
            .unwrap_or(0)
    }

    /// Frames discarded for exceeding the maximum time in queue.
    pub fn aged_out(&self) -> u64 {
        self.aged_out
    }

    /// Remove aged frames everywhere, then hand out every frame whose gate is
    /// open, in FIFO order per slot.
    pub fn drain_open(&mut self, now_us: u64) -> Vec<(MacAddress, Frame)> {
        let limit = self.max_time_in_queue_us;
        let mut aged = 0u64;
        let mut out = Vec::new();
        for q in &mut self.slots {
            let before = q.frames.len();
            q.frames
                .retain(|f| now_us.saturating_sub(f.enqueued_us) <= limit);
            aged += (before - q.frames.len()) as u64;
            if q.open {
                out.extend(q.frames.drain(..).map(|f| (f.to, f.frame)));
            }
        }
        if aged > 0 {
            warn!(aged, "slot queue frames exceeded max time in queue");
            self.aged_out += aged;
        }
        out
    }
}

impl SlotQueues for GatedSlotQueues {
    fn gate_open(&mut self, group: u16, slot: u16) {
        if let Some(i) = self.index(group, slot) {
            self.slots[i].open = true;
        }
    }

    fn gate_close(&mut self, group: u16, slot: u16) {
        if let Some(i) = self.index(group, slot) {
            self.slots[i].open = false;
        }
    }

    fn has_pending_work(&self, group: u16, slot: u16) -> bool {
        self.len(group, slot) > 0
    }

    fn enqueue(
        &mut self,
        group: u16,
        slot: u16,
        to: MacAddress,
        frame: Frame,
        now_us: u64,
    ) -> Result<(), QueueError> {
        let i = self
            .index(group, slot)
            .ok_or(QueueError::UnknownSlot { group, slot })?;
        let capacity = self.capacity;
        let q = &mut self.slots[i];
        if q.frames.len() >= capacity {
            return Err(QueueError::Full {
                group,
                slot,
                capacity,
            });
        }
        q.frames.push_back(QueuedFrame {
            to,
            frame,
            enqueued_us: now_us,
        });
        debug!(group, slot, to = %to, depth = q.frames.len(), "frame queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: u8) -> Frame {
        Frame::Data {
            from: MacAddress::local(0xfffe),
            to: MacAddress::local(1),
            payload: vec![n],
        }
    }

    #[test]
    fn closed_gate_holds_frames() {
        let mut q = GatedSlotQueues::new(4, 2, 8, 1_000_000);
        q.enqueue(1, 0, MacAddress::local(9), data(1), 0).unwrap();
        assert!(q.has_pending_work(1, 0));
        assert!(q.drain_open(10).is_empty());
        assert_eq!(q.len(1, 0), 1);
    }

    #[test]
    fn open_gate_drains_fifo() {
        let mut q = GatedSlotQueues::new(4, 2, 8, 1_000_000);
        let to = MacAddress::local(9);
        q.enqueue(1, 1, to, data(1), 0).unwrap();
        q.enqueue(1, 1, to, data(2), 0).unwrap();
        q.gate_open(1, 1);
        assert_eq!(q.open_gates(), 1);
        let out = q.drain_open(5);
        assert_eq!(out, vec![(to, data(1)), (to, data(2))]);
        assert!(!q.has_pending_work(1, 1));
        q.gate_close(1, 1);
        assert!(!q.is_open(1, 1));
    }

    #[test]
    fn full_queue_rejects() {
        let mut q = GatedSlotQueues::new(1, 1, 1, 1_000_000);
        let to = MacAddress::local(1);
        q.enqueue(0, 0, to, data(1), 0).unwrap();
        assert_eq!(
            q.enqueue(0, 0, to, data(2), 0),
            Err(QueueError::Full {
                group: 0,
                slot: 0,
                capacity: 1
            })
        );
    }

    #[test]
    fn unknown_slot_rejects() {
        let mut q = GatedSlotQueues::new(2, 2, 4, 1_000_000);
        assert_eq!(
            q.enqueue(2, 0, MacAddress::local(1), data(1), 0),
            Err(QueueError::UnknownSlot { group: 2, slot: 0 })
        );
    }

    #[test]
    fn stale_frames_age_out() {
        let mut q = GatedSlotQueues::new(1, 1, 4, 100);
        let to = MacAddress::local(1);
        q.enqueue(0, 0, to, data(1), 0).unwrap();
        q.enqueue(0, 0, to, data(2), 150).unwrap();
        q.gate_open(0, 0);
        let out = q.drain_open(200);
        assert_eq!(out, vec![(to, data(2))]);
        assert_eq!(q.aged_out(), 1);
    }
}
