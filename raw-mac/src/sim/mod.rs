/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Single-threaded discrete-event scheduler.
//!
//! Events are plain values ordered by `(time, sequence)`, so two events due at
//! the same instant run in the order they were scheduled.  Every scheduled
//! event gets an [`EventToken`]; a cancelled token's event is skipped when it
//! reaches the head of the queue.
//!
//! Components never see the global event type.  They schedule through
//! [`EventScheduler<E>`] with their own event enum, and the owner wraps it via
//! [`Simulator::scoped`].

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Handle of a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventToken(u64);

/// Scheduling interface handed to a component.
pub trait EventScheduler<E> {
    /// Current simulated time, in µs.
    fn now_us(&self) -> u64;

    /// Schedule `event` to run `delay_us` from now.
    fn schedule(&mut self, delay_us: u64, event: E) -> EventToken;

    /// Cancel a pending event.  Unknown or already-run tokens are ignored.
    fn cancel(&mut self, token: EventToken);

    fn is_pending(&self, token: EventToken) -> bool;
}

struct Scheduled<E> {
    at_us: u64,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at_us == other.at_us && self.seq == other.seq
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we pop the earliest first.
        (other.at_us, other.seq).cmp(&(self.at_us, self.seq))
    }
}

/// Time-ordered event queue and simulated clock.
pub struct Simulator<E> {
    now_us: u64,
    next_seq: u64,
    queue: BinaryHeap<Scheduled<E>>,
    pending: HashSet<u64>,
}

impl<E> Default for Simulator<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Simulator<E> {
    pub fn new() -> Self {
        Self {
            now_us: 0,
            next_seq: 0,
            queue: BinaryHeap::new(),
            pending: HashSet::new(),
        }
    }

    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    /// Schedule at an absolute time.  Times in the past are clamped to now.
    pub fn schedule_at(&mut self, at_us: u64, event: E) -> EventToken {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled {
            at_us: at_us.max(self.now_us),
            seq,
            event,
        });
        self.pending.insert(seq);
        EventToken(seq)
    }

    /// Number of scheduled events that have not run or been cancelled.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Due time of the next live event.
    pub fn peek_time(&mut self) -> Option<u64> {
        self.discard_cancelled();
        self.queue.peek().map(|s| s.at_us)
    }

    /// Pop the next live event and advance the clock to its due time.
    pub fn next_event(&mut self) -> Option<(u64, E)> {
        self.discard_cancelled();
        let next = self.queue.pop()?;
        self.pending.remove(&next.seq);
        self.now_us = next.at_us;
        Some((next.at_us, next.event))
    }

    /// Move the clock forward without running anything.  Never goes back.
    pub fn advance_to(&mut self, at_us: u64) {
        self.now_us = self.now_us.max(at_us);
    }

    /// Borrow the simulator as a scheduler for a component's own event type.
    pub fn scoped<C, F>(&mut self, wrap: F) -> Scoped<'_, E, F>
    where
        F: Fn(C) -> E,
    {
        Scoped { sim: self, wrap }
    }

    fn discard_cancelled(&mut self) {
        while let Some(head) = self.queue.peek() {
            if self.pending.contains(&head.seq) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl<E> EventScheduler<E> for Simulator<E> {
    fn now_us(&self) -> u64 {
        self.now_us
    }

    fn schedule(&mut self, delay_us: u64, event: E) -> EventToken {
        let at = self.now_us.saturating_add(delay_us);
        self.schedule_at(at, event)
    }

    fn cancel(&mut self, token: EventToken) {
        self.pending.remove(&token.0);
    }

    fn is_pending(&self, token: EventToken) -> bool {
        self.pending.contains(&token.0)
    }
}

/// A [`Simulator`] seen through a component's event type.
pub struct Scoped<'a, E, F> {
    sim: &'a mut Simulator<E>,
    wrap: F,
}

impl<E, C, F> EventScheduler<C> for Scoped<'_, E, F>
where
    F: Fn(C) -> E,
{
    fn now_us(&self) -> u64 {
        self.sim.now_us
    }

    fn schedule(&mut self, delay_us: u64, event: C) -> EventToken {
        let wrapped = (self.wrap)(event);
        self.sim.schedule(delay_us, wrapped)
    }

    fn cancel(&mut self, token: EventToken) {
        self.sim.cancel(token);
    }

    fn is_pending(&self, token: EventToken) -> bool {
        self.sim.is_pending(token)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
