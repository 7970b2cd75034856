/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Access point side of the RAW MAC.
//!
//! [`BeaconScheduler`] owns the rotating group cycle.  Every beacon interval
//! it advances to the next group, builds the RAW and TIM parameters, and
//! schedules the open/close events of the group's slot gates.  Downlink
//! frames are either handed to the destination's open slot queue right away
//! or deferred to the destination's slot in the cycle after the next DTIM.
//!
//! # Beacon tick
//! ```text
//! advance group ─► DTIM? ─yes─► bitmap = groups with queued work or pending frames
//!                    │            active_this_cycle = own group's bit
//!                    no ─► bitmap = 0, dtim_count = groups left
//! send beacon, origin = now
//! for slot i: SlotStart @ origin + i·d, SlotEnd @ origin + (i+1)·d
//! SendBeacon @ now + beacon interval
//! ```
//!
//! # Forwarding decision
//! A frame goes out immediately only if the destination is marked active for
//! this cycle, its group is being served, its slot window is open, and more
//! than `schedule_next_slot_if_less_than_us` of the slot remains.  Otherwise
//! it is delivered `N·interval + slot offset` after the current cycle origin,
//! where `N = (group_count − current_group) + station_group`.

pub mod cycle;
pub mod error;
pub mod station;

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

pub use cycle::AccessPointCycle;
pub use error::AdmissionReason;
pub use station::{Station, StationTable};

use crate::config::{AccessPointConfig, ConfigError, RawLayout};
use crate::frame::codec::{decode_elements, encode_elements};
use crate::frame::{Aid, Beacon, Frame, MacAddress, RawParams, StatusCode, TimParams};
use crate::link::Transport;
use crate::observe::{DropReason, ForwardKind, MacEvent, MacObserver};
use crate::queue::{QueueError, SlotQueues};
use crate::sim::{EventScheduler, EventToken};
use crate::strategy::GroupSlotStrategy;

/// Timer events of the access point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApEvent {
    SendBeacon,
    SlotStart { group: u16, slot: u16 },
    SlotEnd { group: u16, slot: u16 },
    DeferredForward { to: MacAddress, frame: Frame },
}

/// Result of [`BeaconScheduler::enqueue_downlink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    Immediate { remaining_us: u64 },
    Scheduled { delay_us: u64 },
    Unscheduled,
    Dropped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApCounters {
    pub beacons_sent: u64,
    pub immediate: u64,
    pub scheduled: u64,
    pub unscheduled: u64,
    pub dropped: u64,
    pub uplink_received: u64,
    pub associations: u64,
    pub refusals: u64,
}

pub struct BeaconScheduler<Q> {
    address: MacAddress,
    slot_cross_boundary: bool,
    always_schedule_for_next_slot: bool,
    immediate_threshold_us: u64,
    beacon_generation: bool,
    layout: RawLayout,
    strategy: Arc<dyn GroupSlotStrategy>,
    cycle: AccessPointCycle,
    stations: StationTable,
    queues: Q,
    /// Transmission time of the latest beacon.
    cycle_origin_us: u64,
    open_slot: Option<(u16, u16)>,
    beacon_token: Option<EventToken>,
    counters: ApCounters,
}

impl<Q: SlotQueues> BeaconScheduler<Q> {
    /// Validate `config` and build an idle scheduler.  Nothing is scheduled
    /// until [`start`](Self::start).
    ///
    /// `queues` must provide one queue per (group, slot) of the resulting
    /// layout.
    pub fn new(
        config: &AccessPointConfig,
        strategy: Arc<dyn GroupSlotStrategy>,
        queues: Q,
    ) -> Result<Self, ConfigError> {
        let layout = config.layout(strategy.as_ref())?;

        info!(
            address          = %config.address,
            groups           = layout.group_count,
            group_size       = layout.group_size,
            slots            = layout.slot_count,
            slot_duration_us = layout.slot_duration_us,
            backoff_slot_us  = layout.backoff_slot_us,
            "=== Access point RAW layout ==="
        );

        Ok(Self {
            address: config.address,
            slot_cross_boundary: config.slot_cross_boundary,
            always_schedule_for_next_slot: config.always_schedule_for_next_slot,
            immediate_threshold_us: config.schedule_next_slot_if_less_than_us,
            beacon_generation: config.beacon_generation,
            layout,
            strategy,
            cycle: AccessPointCycle::new(layout.group_count, layout.group_size, layout.station_capacity),
            stations: StationTable::new(layout.station_capacity),
            queues,
            cycle_origin_us: 0,
            open_slot: None,
            beacon_token: None,
            counters: ApCounters::default(),
        })
    }

    /// Schedule the first beacon (now) if beacon generation is enabled.
    pub fn start(&mut self, sched: &mut dyn EventScheduler<ApEvent>) {
        let beacon_pending = self.beacon_token.is_some_and(|token| sched.is_pending(token));
        if self.beacon_generation && !beacon_pending {
            self.beacon_token = Some(sched.schedule(0, ApEvent::SendBeacon));
        }
    }

    /// Turn periodic beacons on or off.  Disabling cancels the pending beacon.
    pub fn set_beacon_generation(&mut self, enable: bool, sched: &mut dyn EventScheduler<ApEvent>) {
        self.beacon_generation = enable;
        if enable {
            self.start(sched);
        } else if let Some(token) = self.beacon_token.take() {
            sched.cancel(token);
            info!("beacon generation disabled");
        }
    }

    pub fn handle_event(
        &mut self,
        event: ApEvent,
        sched: &mut dyn EventScheduler<ApEvent>,
        tx: &mut dyn Transport,
        obs: &mut dyn MacObserver,
    ) {
        let now = sched.now_us();
        match event {
            ApEvent::SendBeacon => self.send_beacon(sched, tx, obs),
            ApEvent::SlotStart { group, slot } => self.on_slot_start(group, slot, now, obs),
            ApEvent::SlotEnd { group, slot } => self.on_slot_end(group, slot, now, obs),
            ApEvent::DeferredForward { to, frame } => {
                self.forward_down(to, frame, now, obs);
            }
        }
    }

    // ── Beacon tick ───────────────────────────────────────────────────────────

    fn send_beacon(
        &mut self,
        sched: &mut dyn EventScheduler<ApEvent>,
        tx: &mut dyn Transport,
        obs: &mut dyn MacObserver,
    ) {
        let now = sched.now_us();
        let is_dtim = self.cycle.advance();
        let group = self.cycle.current_group();
        let bitmap = if is_dtim { self.refresh_traffic_indication() } else { 0 };

        let raw = RawParams {
            slot_format: self.layout.slot_format,
            slot_cross_boundary: self.slot_cross_boundary,
            slot_duration_count: self.layout.slot_duration_count,
            slot_count: self.layout.slot_count,
            raw_start_us: 0,
            group_start: self.cycle.window_start(),
            group_end: self.cycle.window_end(),
            page: 0,
        };
        let tim = TimParams {
            dtim_period: self.layout.group_count as u8,
            dtim_count: self.cycle.dtim_count() as u8,
            partial_bitmap: bitmap,
        };

        self.cycle_origin_us = now;
        // stations only ever see what survives the element encoding
        let sent = encode_elements(&raw, &tim)
            .and_then(|buf| decode_elements(&buf))
            .map_err(|e| {
                warn!(group, error = %e, "✗ beacon elements out of range");
                DropReason::MalformedElements
            })
            .and_then(|(raw, tim)| {
                let beacon = Beacon {
                    source: self.address,
                    beacon_interval_us: self.layout.beacon_interval_us,
                    raw,
                    tim,
                };
                tx.send(MacAddress::BROADCAST, Frame::Beacon(beacon))
                    .map(|()| (raw, tim))
                    .map_err(|e| {
                        warn!(group, error = %e, "✗ beacon transmission failed");
                        DropReason::TransportRejected
                    })
            });
        match sent {
            Ok((raw, tim)) => {
                self.counters.beacons_sent += 1;
                obs.on_event(now, &MacEvent::BeaconSent { group, raw, tim });
            }
            Err(reason) => {
                self.counters.dropped += 1;
                obs.on_event(
                    now,
                    &MacEvent::FrameDropped {
                        to: MacAddress::BROADCAST,
                        reason,
                    },
                );
            }
        }

        let slot_us = self.layout.slot_duration_us;
        for slot in 0..self.layout.slot_count {
            let offset = u64::from(slot) * slot_us;
            sched.schedule(offset, ApEvent::SlotStart { group, slot });
            sched.schedule(offset + slot_us, ApEvent::SlotEnd { group, slot });
        }

        self.beacon_token = Some(sched.schedule(self.layout.beacon_interval_us, ApEvent::SendBeacon));
    }

    /// Build the DTIM bitmap and refresh every station's `active_this_cycle`.
    fn refresh_traffic_indication(&mut self) -> u32 {
        let mut bitmap = 0u32;
        for group in 0..self.layout.group_count {
            if (0..self.layout.slot_count).any(|slot| self.queues.has_pending_work(group, slot)) {
                bitmap |= 1 << group;
            }
        }
        for station in self.stations.iter().filter(|s| s.pending_outbound > 0) {
            bitmap |= 1 << station.group;
        }
        for station in self.stations.iter_mut() {
            station.active_this_cycle = (bitmap >> station.group) & 0x01 == 0x01;
        }
        trace!(bitmap, "DTIM traffic indication");
        bitmap
    }

    // ── Slot gates ────────────────────────────────────────────────────────────

    fn on_slot_start(&mut self, group: u16, slot: u16, now: u64, obs: &mut dyn MacObserver) {
        if let Some((g, s)) = self.open_slot.take() {
            warn!(group = g, slot = s, "slot gate still open at next slot start, closing");
            self.queues.gate_close(g, s);
        }
        self.queues.gate_open(group, slot);
        self.open_slot = Some((group, slot));
        obs.on_event(now, &MacEvent::SlotStarted { group, slot });
    }

    fn on_slot_end(&mut self, group: u16, slot: u16, now: u64, obs: &mut dyn MacObserver) {
        self.queues.gate_close(group, slot);
        if self.open_slot == Some((group, slot)) {
            self.open_slot = None;
        }
        obs.on_event(now, &MacEvent::SlotEnded { group, slot });
    }

    // ── Downlink ──────────────────────────────────────────────────────────────

    /// Accept a downlink frame for `to` and decide when it goes out.
    pub fn enqueue_downlink(
        &mut self,
        to: MacAddress,
        payload: Vec<u8>,
        sched: &mut dyn EventScheduler<ApEvent>,
        tx: &mut dyn Transport,
        obs: &mut dyn MacObserver,
    ) -> ForwardOutcome {
        let now = sched.now_us();
        let frame = Frame::Data {
            from: self.address,
            to,
            payload,
        };

        let Some(station) = self
            .stations
            .by_address_mut(&to)
            .filter(|s| s.is_associated())
        else {
            return self.send_unscheduled(to, frame, now, tx, obs);
        };
        station.pending_outbound += 1;
        let (aid, group, slot, active) = (
            station.aid,
            station.group,
            station.slot,
            station.active_this_cycle,
        );

        let slot_us = self.layout.slot_duration_us;
        let slot_offset = u64::from(slot) * slot_us;
        let elapsed = now.saturating_sub(self.cycle_origin_us);

        let in_own_slot = active
            && group == self.cycle.current_group()
            && elapsed >= slot_offset
            && elapsed < slot_offset + slot_us;
        if !self.always_schedule_for_next_slot && in_own_slot {
            let remaining_us = slot_offset + slot_us - elapsed;
            if remaining_us > self.immediate_threshold_us {
                self.counters.immediate += 1;
                debug!(aid = %aid, group, slot, remaining_us, "✓ forwarding in current slot");
                obs.on_event(
                    now,
                    &MacEvent::Forwarded {
                        to,
                        aid,
                        kind: ForwardKind::Immediate,
                        remaining_us,
                        delay_us: 0,
                    },
                );
                return if self.forward_down(to, frame, now, obs) {
                    ForwardOutcome::Immediate { remaining_us }
                } else {
                    ForwardOutcome::Dropped
                };
            }
        }

        let beacons = self.cycle.beacons_until_next_cycle_group(group);
        let delay_us = beacons
            .saturating_mul(self.layout.beacon_interval_us)
            .saturating_add(slot_offset)
            .saturating_sub(elapsed);
        sched.schedule(delay_us, ApEvent::DeferredForward { to, frame });
        self.counters.scheduled += 1;
        debug!(aid = %aid, group, slot, beacons, delay_us, "scheduled for next cycle");
        obs.on_event(
            now,
            &MacEvent::Forwarded {
                to,
                aid,
                kind: ForwardKind::Scheduled,
                remaining_us: 0,
                delay_us,
            },
        );
        ForwardOutcome::Scheduled { delay_us }
    }

    /// Hand a frame to the destination's slot queue.  The pending count drops
    /// whether or not the queue accepts it.
    fn forward_down(&mut self, to: MacAddress, frame: Frame, now: u64, obs: &mut dyn MacObserver) -> bool {
        let Some(station) = self.stations.by_address_mut(&to) else {
            warn!(to = %to, "✗ no station entry for queued frame");
            self.record_drop(to, DropReason::TransportRejected, now, obs);
            return false;
        };
        station.pending_outbound = station.pending_outbound.saturating_sub(1);
        let (group, slot) = (station.group, station.slot);

        match self.queues.enqueue(group, slot, to, frame, now) {
            Ok(()) => true,
            Err(e) => {
                warn!(to = %to, error = %e, "✗ slot queue rejected frame");
                let reason = match e {
                    QueueError::Full { .. } => DropReason::SlotQueueFull,
                    QueueError::UnknownSlot { .. } => DropReason::TransportRejected,
                };
                self.record_drop(to, reason, now, obs);
                false
            }
        }
    }

    fn send_unscheduled(
        &mut self,
        to: MacAddress,
        frame: Frame,
        now: u64,
        tx: &mut dyn Transport,
        obs: &mut dyn MacObserver,
    ) -> ForwardOutcome {
        let aid = self
            .stations
            .by_address(&to)
            .map(|s| s.aid)
            .unwrap_or(Aid::UNASSIGNED);
        self.counters.unscheduled += 1;
        debug!(to = %to, "destination not associated, sending without slot gating");
        obs.on_event(
            now,
            &MacEvent::Forwarded {
                to,
                aid,
                kind: ForwardKind::Unscheduled,
                remaining_us: 0,
                delay_us: 0,
            },
        );
        match tx.send(to, frame) {
            Ok(()) => ForwardOutcome::Unscheduled,
            Err(e) => {
                warn!(to = %to, error = %e, "✗ unscheduled frame rejected");
                self.record_drop(to, DropReason::TransportRejected, now, obs);
                ForwardOutcome::Dropped
            }
        }
    }

    fn record_drop(&mut self, to: MacAddress, reason: DropReason, now: u64, obs: &mut dyn MacObserver) {
        self.counters.dropped += 1;
        obs.on_event(now, &MacEvent::FrameDropped { to, reason });
    }

    // ── Received frames ───────────────────────────────────────────────────────

    pub fn receive(
        &mut self,
        frame: Frame,
        sched: &mut dyn EventScheduler<ApEvent>,
        tx: &mut dyn Transport,
        obs: &mut dyn MacObserver,
    ) {
        let now = sched.now_us();
        match frame {
            Frame::ProbeRequest { from } => {
                let resp = Frame::ProbeResponse {
                    from: self.address,
                    beacon_interval_us: self.layout.beacon_interval_us,
                };
                self.reply(from, resp, now, tx, obs);
            }
            Frame::AssocRequest { from, bssid } if bssid == self.address => {
                self.handle_assoc_request(from, now, tx, obs);
            }
            Frame::Disassociation { from } => {
                if self.stations.mark_unassociated(&from) {
                    info!(station = %from, "station disassociated");
                }
            }
            Frame::Data { from, to, .. } if to == self.address => {
                match self.stations.by_address_mut(&from) {
                    Some(station) if station.is_associated() => {
                        station.active_this_cycle = true;
                        self.counters.uplink_received += 1;
                        trace!(from = %from, "uplink received");
                    }
                    _ => debug!(from = %from, "uplink from unassociated station ignored"),
                }
            }
            other => trace!(kind = other.kind(), from = %other.source(), "frame ignored"),
        }
    }

    fn handle_assoc_request(
        &mut self,
        from: MacAddress,
        now: u64,
        tx: &mut dyn Transport,
        obs: &mut dyn MacObserver,
    ) {
        // A station that lost our beacons re-associates while we still hold
        // its entry; answer again with the AID it already has.
        let known = self
            .stations
            .by_address(&from)
            .filter(|s| s.is_associated())
            .map(|s| s.aid);
        if let Some(aid) = known {
            debug!(station = %from, aid = %aid, "repeated association request, re-sending response");
            let resp = Frame::AssocResponse {
                from: self.address,
                status: StatusCode::Success,
                aid,
            };
            self.reply(from, resp, now, tx, obs);
            return;
        }

        let aid = self.strategy.aid_from_address(from);
        let group = self.strategy.group_of(aid, self.layout.group_size);
        let slot = self.strategy.slot_of(aid, self.layout.slot_count);

        let (status, assigned) = match self.stations.admit(from, aid, group, slot) {
            Ok(_) => {
                self.counters.associations += 1;
                info!(station = %from, aid = %aid, group, slot, "✓ association accepted");
                (StatusCode::Success, aid)
            }
            Err(reason) => {
                self.counters.refusals += 1;
                warn!(station = %from, reason = %reason, "✗ association refused");
                (StatusCode::Failure, Aid::UNASSIGNED)
            }
        };
        let resp = Frame::AssocResponse {
            from: self.address,
            status,
            aid: assigned,
        };
        self.reply(from, resp, now, tx, obs);
    }

    fn reply(
        &mut self,
        to: MacAddress,
        frame: Frame,
        now: u64,
        tx: &mut dyn Transport,
        obs: &mut dyn MacObserver,
    ) {
        let kind = frame.kind();
        if let Err(e) = tx.send(to, frame) {
            warn!(to = %to, kind, error = %e, "✗ management frame rejected");
            self.record_drop(to, DropReason::TransportRejected, now, obs);
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn layout(&self) -> &RawLayout {
        &self.layout
    }

    pub fn cycle(&self) -> &AccessPointCycle {
        &self.cycle
    }

    pub fn cycle_origin_us(&self) -> u64 {
        self.cycle_origin_us
    }

    pub fn stations(&self) -> &StationTable {
        &self.stations
    }

    pub fn queues(&self) -> &Q {
        &self.queues
    }

    pub fn queues_mut(&mut self) -> &mut Q {
        &mut self.queues
    }

    pub fn counters(&self) -> ApCounters {
        self.counters
    }

    pub fn open_slot(&self) -> Option<(u16, u16)> {
        self.open_slot
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
