/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Instrumentation hook points.
//!
//! The access point and station MACs report what they do through
//! [`MacObserver::on_event`].  [`TracingObserver`] turns every event into a
//! `tracing` record; [`RecordingObserver`] keeps them for assertions.

use tracing::{debug, info, warn};

use crate::frame::{Aid, MacAddress, RawParams, TimParams};

/// How a downlink frame was routed by the access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardKind {
    /// Handed to the station's open slot queue right away.
    Immediate,
    /// Deferred to the station's slot after the next DTIM.
    Scheduled,
    /// Destination not associated; sent without slot gating.
    Unscheduled,
}

/// Why a frame never reached the medium (or its receiver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    SlotQueueFull,
    TransportRejected,
    NotAssociated,
    ReceiverAsleep,
    /// Beacon parameters that do not fit the element encoding.
    MalformedElements,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MacEvent {
    BeaconSent {
        group: u16,
        raw: RawParams,
        tim: TimParams,
    },
    SlotStarted {
        group: u16,
        slot: u16,
    },
    SlotEnded {
        group: u16,
        slot: u16,
    },
    Forwarded {
        to: MacAddress,
        aid: Aid,
        kind: ForwardKind,
        /// Slot time left at the decision; 0 unless `Immediate`.
        remaining_us: u64,
        /// Delivery delay; 0 unless `Scheduled`.
        delay_us: u64,
    },
    FrameDropped {
        to: MacAddress,
        reason: DropReason,
    },
    Associated {
        station: MacAddress,
        aid: Aid,
    },
    Deassociated {
        station: MacAddress,
    },
    AssociationRefused {
        station: MacAddress,
    },
    BeaconMissed {
        station: MacAddress,
    },
    /// An associated station heard a beacon for another group.
    ForeignBeacon {
        station: MacAddress,
        beacon_group_start: u16,
        dtim_first: bool,
    },
    Sleeping {
        station: MacAddress,
        requested_us: u64,
        sleep_us: u64,
    },
    SlotAccess {
        station: MacAddress,
        granted: bool,
    },
}

/// Receiver of MAC instrumentation events.
pub trait MacObserver {
    fn on_event(&mut self, now_us: u64, event: &MacEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MacObserver for TracingObserver {
    fn on_event(&mut self, now_us: u64, event: &MacEvent) {
        match event {
            MacEvent::BeaconSent { group, raw, tim } => debug!(
                now_us,
                group       = *group,
                aid_start   = raw.group_start,
                aid_end     = raw.group_end,
                dtim_count  = tim.dtim_count,
                bitmap      = tim.partial_bitmap,
                "beacon sent"
            ),
            MacEvent::SlotStarted { group, slot } => {
                debug!(now_us, group = *group, slot = *slot, "slot gate open")
            }
            MacEvent::SlotEnded { group, slot } => {
                debug!(now_us, group = *group, slot = *slot, "slot gate closed")
            }
            MacEvent::Forwarded {
                to,
                aid,
                kind,
                remaining_us,
                delay_us,
            } => debug!(
                now_us,
                to = %to,
                aid = %aid,
                kind = ?kind,
                remaining_us = *remaining_us,
                delay_us = *delay_us,
                "downlink forwarded"
            ),
            MacEvent::FrameDropped { to, reason } => {
                warn!(now_us, to = %to, reason = ?reason, "✗ frame dropped")
            }
            MacEvent::Associated { station, aid } => {
                info!(now_us, station = %station, aid = %aid, "✓ associated")
            }
            MacEvent::Deassociated { station } => {
                info!(now_us, station = %station, "deassociated")
            }
            MacEvent::AssociationRefused { station } => {
                warn!(now_us, station = %station, "✗ association refused")
            }
            MacEvent::BeaconMissed { station } => {
                warn!(now_us, station = %station, "beacon watchdog expired")
            }
            MacEvent::ForeignBeacon {
                station,
                beacon_group_start,
                dtim_first,
            } => debug!(
                now_us,
                station = %station,
                beacon_group_start = *beacon_group_start,
                dtim_first = *dtim_first,
                "beacon for another group"
            ),
            MacEvent::Sleeping {
                station,
                requested_us,
                sleep_us,
            } => debug!(
                now_us,
                station = %station,
                requested_us = *requested_us,
                sleep_us = *sleep_us,
                "radio sleeping"
            ),
            MacEvent::SlotAccess { station, granted } => {
                debug!(now_us, station = %station, granted = *granted, "slot access")
            }
        }
    }
}

/// Keeps every event with its timestamp.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub events: Vec<(u64, MacEvent)>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&MacEvent) -> bool) -> usize {
        self.events.iter().filter(|(_, e)| pred(e)).count()
    }

    /// Events matching `pred`, in emission order.
    pub fn matching(&self, pred: impl Fn(&MacEvent) -> bool) -> Vec<(u64, MacEvent)> {
        self.events
            .iter()
            .filter(|(_, e)| pred(e))
            .cloned()
            .collect()
    }
}

impl MacObserver for RecordingObserver {
    fn on_event(&mut self, now_us: u64, event: &MacEvent) {
        self.events.push((now_us, event.clone()));
    }
}

/// Fans one event out to two observers.
impl<A: MacObserver, B: MacObserver> MacObserver for (A, B) {
    fn on_event(&mut self, now_us: u64, event: &MacEvent) {
        self.0.on_event(now_us, event);
        self.1.on_event(now_us, event);
    }
}
