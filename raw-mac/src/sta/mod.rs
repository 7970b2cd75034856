/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Station side of the RAW MAC.
//!
//! [`StationMac`] glues the pure association and sleep logic to the
//! simulator, the transport and the radio:
//!
//! - association actions become frames and timers,
//! - every accepted beacon of an associated station goes through
//!   [`SleepScheduler::decide`] and the result is executed here,
//! - uplink data waits in a local queue until the own slot grants access.

pub mod association;
pub mod sleep;

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace, warn};

pub use association::{AssociationAction, AssociationState, AssociationStateMachine};
pub use sleep::{SleepDecision, SleepScheduler, SlotPlan};

use crate::config::StationConfig;
use crate::frame::{Aid, Beacon, Frame, MacAddress};
use crate::link::{Radio, Transport};
use crate::observe::{DropReason, MacEvent, MacObserver};
use crate::sim::{EventScheduler, EventToken};
use crate::strategy::GroupSlotStrategy;

/// Timer events of one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaEvent {
    ProbeTimeout,
    AssocTimeout,
    BeaconWatchdog,
    WakeUp,
    SlotStart,
    SlotEnd { sleep_after_us: u64 },
}

/// Local channel access of the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAccess {
    /// Not associated: best-effort contention.
    Free,
    /// Associated and inside the own slot.
    Granted,
    /// Associated and outside the own slot.
    Denied,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StaCounters {
    pub beacons_received: u64,
    pub beacons_rejected: u64,
    pub downlink_received: u64,
    pub uplink_sent: u64,
    pub uplink_dropped: u64,
    pub sleeps: u64,
    pub slept_us: u64,
}

/// Collaborators a station needs while handling one input.
pub struct StaContext<'a> {
    pub sched: &'a mut dyn EventScheduler<StaEvent>,
    pub tx: &'a mut dyn Transport,
    pub radio: &'a mut dyn Radio,
    pub obs: &'a mut dyn MacObserver,
}

#[derive(Debug)]
pub struct StationMac {
    address: MacAddress,
    association: AssociationStateMachine,
    sleep: SleepScheduler,
    access: ChannelAccess,
    uplink: VecDeque<Vec<u8>>,
    backoff_slot_us: u64,
    /// Backoff unit of the slot currently scheduled, applied when it closes.
    slot_backoff_us: u64,

    probe_timer: Option<EventToken>,
    assoc_timer: Option<EventToken>,
    watchdog_timer: Option<EventToken>,
    wake_timer: Option<EventToken>,
    slot_timers: Vec<EventToken>,

    counters: StaCounters,
}

fn cancel_timer(timer: &mut Option<EventToken>, sched: &mut dyn EventScheduler<StaEvent>) {
    if let Some(token) = timer.take() {
        sched.cancel(token);
    }
}

impl StationMac {
    pub fn new(address: MacAddress, config: &StationConfig, strategy: Arc<dyn GroupSlotStrategy>) -> Self {
        Self {
            address,
            association: AssociationStateMachine::new(config),
            sleep: SleepScheduler::new(strategy),
            access: ChannelAccess::Free,
            uplink: VecDeque::new(),
            backoff_slot_us: 0,
            slot_backoff_us: 0,
            probe_timer: None,
            assoc_timer: None,
            watchdog_timer: None,
            wake_timer: None,
            slot_timers: Vec::new(),
            counters: StaCounters::default(),
        }
    }

    /// Kick off discovery.  Without active probing the station just listens
    /// for the next beacon.
    pub fn start(&mut self, ctx: &mut StaContext<'_>) {
        let actions = self.association.try_to_ensure_associated();
        self.apply(actions, ctx);
    }

    pub fn set_active_probing(&mut self, enable: bool, ctx: &mut StaContext<'_>) {
        let actions = self.association.set_active_probing(enable);
        self.apply(actions, ctx);
    }

    pub fn handle_event(&mut self, event: StaEvent, ctx: &mut StaContext<'_>) {
        let now = ctx.sched.now_us();
        let actions = match event {
            StaEvent::ProbeTimeout => {
                self.probe_timer = None;
                self.association.on_probe_timeout()
            }
            StaEvent::AssocTimeout => {
                self.assoc_timer = None;
                self.association.on_assoc_timeout()
            }
            StaEvent::BeaconWatchdog => {
                self.watchdog_timer = None;
                self.association.on_watchdog(now)
            }
            StaEvent::WakeUp => {
                self.wake_timer = None;
                ctx.radio.wake();
                trace!(station = %self.address, now, "radio awake");
                return;
            }
            StaEvent::SlotStart => {
                self.open_slot(ctx);
                return;
            }
            StaEvent::SlotEnd { sleep_after_us } => {
                self.close_slot(sleep_after_us, ctx);
                return;
            }
        };
        self.apply(actions, ctx);
    }

    pub fn receive(&mut self, frame: Frame, ctx: &mut StaContext<'_>) {
        let now = ctx.sched.now_us();
        match frame {
            Frame::Beacon(beacon) => self.on_beacon(beacon, ctx),
            Frame::ProbeResponse {
                from,
                beacon_interval_us,
            } => {
                let actions = self.association.on_probe_response(from, beacon_interval_us, now);
                self.apply(actions, ctx);
            }
            Frame::AssocResponse { from, status, aid } => {
                let actions = self.association.on_assoc_response(from, status, aid);
                self.apply(actions, ctx);
            }
            Frame::Data { from, to, .. }
                if to == self.address && self.association.bssid() == Some(from) =>
            {
                self.counters.downlink_received += 1;
                trace!(station = %self.address, now, "downlink received");
            }
            other => trace!(
                station = %self.address,
                kind = other.kind(),
                from = %other.source(),
                "frame ignored"
            ),
        }
    }

    /// Queue an uplink frame for the AP.  Returns `false` when the frame was
    /// dropped because the station is not associated; association is then
    /// re-attempted.
    pub fn enqueue_uplink(&mut self, payload: Vec<u8>, ctx: &mut StaContext<'_>) -> bool {
        let now = ctx.sched.now_us();
        if !self.association.is_associated() {
            self.counters.uplink_dropped += 1;
            let to = self.association.bssid().unwrap_or(MacAddress::BROADCAST);
            ctx.obs.on_event(
                now,
                &MacEvent::FrameDropped {
                    to,
                    reason: DropReason::NotAssociated,
                },
            );
            let actions = self.association.try_to_ensure_associated();
            self.apply(actions, ctx);
            return false;
        }

        self.uplink.push_back(payload);
        if self.access == ChannelAccess::Granted {
            self.flush_uplink(ctx);
        }
        true
    }

    // ── Association actions ───────────────────────────────────────────────────

    fn apply(&mut self, actions: Vec<AssociationAction>, ctx: &mut StaContext<'_>) {
        let now = ctx.sched.now_us();
        for action in actions {
            match action {
                AssociationAction::SendProbeRequest => {
                    let frame = Frame::ProbeRequest { from: self.address };
                    self.send_management(MacAddress::BROADCAST, frame, ctx);
                }
                AssociationAction::SendAssocRequest { bssid } => {
                    let frame = Frame::AssocRequest {
                        from: self.address,
                        bssid,
                    };
                    self.send_management(bssid, frame, ctx);
                }
                AssociationAction::ArmProbeTimeout { delay_us } => {
                    cancel_timer(&mut self.probe_timer, ctx.sched);
                    self.probe_timer = Some(ctx.sched.schedule(delay_us, StaEvent::ProbeTimeout));
                }
                AssociationAction::CancelProbeTimeout => cancel_timer(&mut self.probe_timer, ctx.sched),
                AssociationAction::ArmAssocTimeout { delay_us } => {
                    cancel_timer(&mut self.assoc_timer, ctx.sched);
                    self.assoc_timer = Some(ctx.sched.schedule(delay_us, StaEvent::AssocTimeout));
                }
                AssociationAction::CancelAssocTimeout => cancel_timer(&mut self.assoc_timer, ctx.sched),
                AssociationAction::ArmWatchdog { delay_us } => {
                    cancel_timer(&mut self.watchdog_timer, ctx.sched);
                    self.watchdog_timer = Some(ctx.sched.schedule(delay_us, StaEvent::BeaconWatchdog));
                }
                AssociationAction::LinkUp { aid } => {
                    self.access = ChannelAccess::Denied;
                    ctx.obs.on_event(
                        now,
                        &MacEvent::Associated {
                            station: self.address,
                            aid,
                        },
                    );
                }
                AssociationAction::LinkDown => {
                    self.access = ChannelAccess::Free;
                    self.cancel_slot_timers(ctx);
                    ctx.obs.on_event(now, &MacEvent::Deassociated { station: self.address });
                }
                AssociationAction::Refused => {
                    ctx.obs.on_event(now, &MacEvent::AssociationRefused { station: self.address });
                }
                AssociationAction::BeaconMissed => {
                    ctx.obs.on_event(now, &MacEvent::BeaconMissed { station: self.address });
                }
            }
        }
    }

    fn send_management(&mut self, to: MacAddress, frame: Frame, ctx: &mut StaContext<'_>) {
        let kind = frame.kind();
        if let Err(e) = ctx.tx.send(to, frame) {
            warn!(station = %self.address, kind, error = %e, "✗ management frame rejected");
            ctx.obs.on_event(
                ctx.sched.now_us(),
                &MacEvent::FrameDropped {
                    to,
                    reason: DropReason::TransportRejected,
                },
            );
        }
    }

    // ── Beacon handling ───────────────────────────────────────────────────────

    fn on_beacon(&mut self, beacon: Beacon, ctx: &mut StaContext<'_>) {
        let now = ctx.sched.now_us();
        let Some(actions) = self
            .association
            .on_beacon(beacon.source, beacon.beacon_interval_us, now)
        else {
            self.counters.beacons_rejected += 1;
            trace!(station = %self.address, from = %beacon.source, "beacon from foreign BSS");
            return;
        };
        self.counters.beacons_received += 1;
        self.apply(actions, ctx);

        if !self.association.is_associated() {
            return;
        }

        let aid = self.association.aid();
        match self.sleep.decide(aid, &beacon, !self.uplink.is_empty()) {
            SleepDecision::OwnSlot(plan) => self.schedule_own_slot(plan, ctx),
            SleepDecision::SleepFullCycle { duration_us }
            | SleepDecision::SleepUntilOwnBeacon { duration_us } => self.go_to_sleep(duration_us, ctx),
            SleepDecision::OwnGroupAhead { duration_us } => {
                self.report_foreign(&beacon, false, now, ctx);
                self.go_to_sleep(duration_us, ctx);
            }
            SleepDecision::DtimFirst { duration_us } => {
                self.report_foreign(&beacon, true, now, ctx);
                self.go_to_sleep(duration_us, ctx);
            }
        }
    }

    fn report_foreign(&self, beacon: &Beacon, dtim_first: bool, now: u64, ctx: &mut StaContext<'_>) {
        ctx.obs.on_event(
            now,
            &MacEvent::ForeignBeacon {
                station: self.address,
                beacon_group_start: beacon.raw.group_start,
                dtim_first,
            },
        );
    }

    fn schedule_own_slot(&mut self, plan: SlotPlan, ctx: &mut StaContext<'_>) {
        self.cancel_slot_timers(ctx);
        if plan.slot_offset_us > 0 {
            self.go_to_sleep(plan.slot_offset_us, ctx);
        }
        let start = ctx.sched.schedule(plan.slot_offset_us, StaEvent::SlotStart);
        let end = ctx.sched.schedule(
            plan.slot_end_us(),
            StaEvent::SlotEnd {
                sleep_after_us: plan.sleep_after_slot_us,
            },
        );
        self.slot_timers = vec![start, end];
        self.slot_backoff_us = plan.backoff_slot_us;
        debug!(
            station = %self.address,
            slot = plan.slot,
            offset_us = plan.slot_offset_us,
            duration_us = plan.slot_duration_us,
            "own slot scheduled"
        );
    }

    fn cancel_slot_timers(&mut self, ctx: &mut StaContext<'_>) {
        for token in self.slot_timers.drain(..) {
            ctx.sched.cancel(token);
        }
    }

    // ── Slot access ───────────────────────────────────────────────────────────

    fn open_slot(&mut self, ctx: &mut StaContext<'_>) {
        self.access = ChannelAccess::Granted;
        ctx.obs.on_event(
            ctx.sched.now_us(),
            &MacEvent::SlotAccess {
                station: self.address,
                granted: true,
            },
        );
        self.flush_uplink(ctx);
    }

    fn close_slot(&mut self, sleep_after_us: u64, ctx: &mut StaContext<'_>) {
        self.slot_timers.clear();
        self.access = ChannelAccess::Denied;
        self.backoff_slot_us = self.slot_backoff_us;
        ctx.obs.on_event(
            ctx.sched.now_us(),
            &MacEvent::SlotAccess {
                station: self.address,
                granted: false,
            },
        );
        self.go_to_sleep(sleep_after_us, ctx);
    }

    fn flush_uplink(&mut self, ctx: &mut StaContext<'_>) {
        let Some(bssid) = self.association.bssid() else {
            return;
        };
        while let Some(payload) = self.uplink.pop_front() {
            let frame = Frame::Data {
                from: self.address,
                to: bssid,
                payload,
            };
            match ctx.tx.send(bssid, frame) {
                Ok(()) => self.counters.uplink_sent += 1,
                Err(e) => {
                    self.counters.uplink_dropped += 1;
                    warn!(station = %self.address, error = %e, "✗ uplink rejected");
                    ctx.obs.on_event(
                        ctx.sched.now_us(),
                        &MacEvent::FrameDropped {
                            to: bssid,
                            reason: DropReason::TransportRejected,
                        },
                    );
                }
            }
        }
    }

    // ── Power save ────────────────────────────────────────────────────────────

    fn go_to_sleep(&mut self, requested_us: u64, ctx: &mut StaContext<'_>) {
        let Some(sleep_us) = self.sleep.sleep_window(requested_us) else {
            return;
        };
        ctx.radio.sleep(sleep_us);
        cancel_timer(&mut self.wake_timer, ctx.sched);
        self.wake_timer = Some(ctx.sched.schedule(sleep_us, StaEvent::WakeUp));
        self.counters.sleeps += 1;
        self.counters.slept_us += sleep_us;
        ctx.obs.on_event(
            ctx.sched.now_us(),
            &MacEvent::Sleeping {
                station: self.address,
                requested_us,
                sleep_us,
            },
        );
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn state(&self) -> AssociationState {
        self.association.state()
    }

    pub fn aid(&self) -> Aid {
        self.association.aid()
    }

    pub fn access(&self) -> ChannelAccess {
        self.access
    }

    /// Backoff unit derived from the slot duration of the last accepted
    /// beacon.
    pub fn backoff_slot_us(&self) -> u64 {
        self.backoff_slot_us
    }

    pub fn pending_uplink(&self) -> usize {
        self.uplink.len()
    }

    pub fn counters(&self) -> StaCounters {
        self.counters
    }
}
