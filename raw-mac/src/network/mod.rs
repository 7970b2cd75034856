/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! One access point and its stations on an ideal shared medium.
//!
//! Every component runs on the same [`Simulator`]; its timer events are
//! wrapped into the network-wide [`Event`].  Transmissions are collected in an
//! [`Outbox`] per handler call and delivered as zero-delay `Deliver` events,
//! so no component is re-entered while it is still handling an input.
//!
//! Delivery rules:
//! - broadcast reaches the AP and every awake station except the sender,
//! - unicast to a sleeping station is lost and reported as
//!   [`DropReason::ReceiverAsleep`],
//! - open slot queues of the AP are drained onto the medium after every event.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::ap::{ApCounters, ApEvent, BeaconScheduler};
use crate::config::{ConfigError, RawLayout, ScenarioConfig, TrafficKind};
use crate::frame::{Frame, MacAddress};
use crate::link::{Outbox, Radio};
use crate::observe::{DropReason, MacEvent, MacObserver};
use crate::queue::GatedSlotQueues;
use crate::sim::Simulator;
use crate::sta::{AssociationState, StaContext, StaCounters, StaEvent, StationMac};
use crate::strategy::{GroupSlotStrategy, S1gStrategy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Ap(ApEvent),
    Sta { index: usize, event: StaEvent },
    Deliver { to: MacAddress, frame: Frame },
    Downlink { to: MacAddress, payload: Vec<u8> },
    Uplink { index: usize, payload: Vec<u8> },
}

/// Radio power state of a simulated station.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimRadio {
    asleep: bool,
    wake_ups: u64,
}

impl SimRadio {
    pub fn wake_ups(&self) -> u64 {
        self.wake_ups
    }
}

impl Radio for SimRadio {
    fn sleep(&mut self, _duration_us: u64) {
        self.asleep = true;
    }

    fn wake(&mut self) {
        if self.asleep {
            self.wake_ups += 1;
        }
        self.asleep = false;
    }

    fn is_asleep(&self) -> bool {
        self.asleep
    }
}

#[derive(Debug)]
struct StationNode {
    mac: StationMac,
    radio: SimRadio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationReport {
    pub address: MacAddress,
    pub state: AssociationState,
    pub counters: StaCounters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkReport {
    pub now_us: u64,
    pub ap: ApCounters,
    pub stations: Vec<StationReport>,
    /// Unicast frames lost because the receiver was asleep.
    pub lost_asleep: u64,
    pub aged_out: u64,
}

pub struct Network<O> {
    sim: Simulator<Event>,
    ap: BeaconScheduler<GatedSlotQueues>,
    stations: Vec<StationNode>,
    by_address: HashMap<MacAddress, usize>,
    observer: O,
    lost_asleep: u64,
}

impl<O: MacObserver> Network<O> {
    /// Validate `config`, build every MAC, schedule the traffic script and
    /// start beaconing at time 0.
    pub fn new(config: &ScenarioConfig, observer: O) -> Result<Self, ConfigError> {
        let strategy: Arc<dyn GroupSlotStrategy> = Arc::new(S1gStrategy);
        let layout = config.validate(strategy.as_ref())?;

        let ap_config = &config.access_point;
        let queues = GatedSlotQueues::new(
            layout.group_count,
            layout.slot_count,
            ap_config.slot_queue_capacity,
            ap_config.max_time_in_queue_us,
        );
        let ap = BeaconScheduler::new(ap_config, Arc::clone(&strategy), queues)?;

        let stations: Vec<StationNode> = config
            .stations
            .iter()
            .map(|&address| StationNode {
                mac: StationMac::new(address, &config.station, Arc::clone(&strategy)),
                radio: SimRadio::default(),
            })
            .collect();
        let by_address = stations
            .iter()
            .enumerate()
            .map(|(i, node)| (node.mac.address(), i))
            .collect::<HashMap<_, _>>();

        let mut sim = Simulator::new();
        for t in &config.traffic {
            let payload = vec![0u8; t.payload_len];
            let event = match t.kind {
                TrafficKind::Downlink => Event::Downlink {
                    to: t.station,
                    payload,
                },
                TrafficKind::Uplink => match by_address.get(&t.station) {
                    Some(&index) => Event::Uplink { index, payload },
                    None => return Err(ConfigError::UnknownTrafficStation(t.station)),
                },
            };
            sim.schedule_at(t.at_us, event);
        }

        let mut network = Self {
            sim,
            ap,
            stations,
            by_address,
            observer,
            lost_asleep: 0,
        };

        {
            let mut sched = network.sim.scoped(Event::Ap);
            network.ap.start(&mut sched);
        }
        for index in 0..network.stations.len() {
            network.with_station(index, |sta, ctx| sta.start(ctx));
        }
        debug!(stations = network.stations.len(), "network started");
        Ok(network)
    }

    /// Run every event due at or before `end_us`, then move the clock there.
    pub fn run_until(&mut self, end_us: u64) {
        while let Some(t) = self.sim.peek_time() {
            if t > end_us {
                break;
            }
            let Some((_, event)) = self.sim.next_event() else {
                break;
            };
            self.dispatch(event);
            self.drain_slot_queues();
        }
        self.sim.advance_to(end_us);
    }

    /// Switch the access point's beacons on or off at the current time.
    pub fn set_beacon_generation(&mut self, enable: bool) {
        let mut sched = self.sim.scoped(Event::Ap);
        self.ap.set_beacon_generation(enable, &mut sched);
    }

    pub fn report(&self) -> NetworkReport {
        NetworkReport {
            now_us: self.sim.now_us(),
            ap: self.ap.counters(),
            stations: self
                .stations
                .iter()
                .map(|node| StationReport {
                    address: node.mac.address(),
                    state: node.mac.state(),
                    counters: node.mac.counters(),
                })
                .collect(),
            lost_asleep: self.lost_asleep,
            aged_out: self.ap.queues().aged_out(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn now_us(&self) -> u64 {
        self.sim.now_us()
    }

    pub fn layout(&self) -> &RawLayout {
        self.ap.layout()
    }

    pub fn access_point(&self) -> &BeaconScheduler<GatedSlotQueues> {
        &self.ap
    }

    pub fn station(&self, address: &MacAddress) -> Option<&StationMac> {
        self.by_address.get(address).map(|&i| &self.stations[i].mac)
    }

    pub fn radio(&self, address: &MacAddress) -> Option<&SimRadio> {
        self.by_address.get(address).map(|&i| &self.stations[i].radio)
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Ap(ev) => {
                let mut tx = Outbox::new();
                let mut sched = self.sim.scoped(Event::Ap);
                self.ap.handle_event(ev, &mut sched, &mut tx, &mut self.observer);
                self.post(tx.take());
            }
            Event::Sta { index, event } => {
                self.with_station(index, |sta, ctx| sta.handle_event(event, ctx));
            }
            Event::Deliver { to, frame } => self.deliver(to, frame),
            Event::Downlink { to, payload } => {
                let mut tx = Outbox::new();
                let mut sched = self.sim.scoped(Event::Ap);
                let outcome = self
                    .ap
                    .enqueue_downlink(to, payload, &mut sched, &mut tx, &mut self.observer);
                trace!(to = %to, outcome = ?outcome, "downlink submitted");
                self.post(tx.take());
            }
            Event::Uplink { index, payload } => {
                self.with_station(index, |sta, ctx| sta.enqueue_uplink(payload, ctx));
            }
        }
    }

    fn deliver(&mut self, to: MacAddress, frame: Frame) {
        let from = frame.source();
        let ap_address = self.ap.address();

        if to.is_broadcast() {
            if from != ap_address {
                self.ap_receive(frame.clone());
            }
            for index in 0..self.stations.len() {
                let node = &self.stations[index];
                if node.mac.address() == from || node.radio.is_asleep() {
                    continue;
                }
                let copy = frame.clone();
                self.with_station(index, |sta, ctx| sta.receive(copy, ctx));
            }
        } else if to == ap_address {
            self.ap_receive(frame);
        } else if let Some(&index) = self.by_address.get(&to) {
            if self.stations[index].radio.is_asleep() {
                self.lost_asleep += 1;
                trace!(to = %to, kind = frame.kind(), "receiver asleep, frame lost");
                self.observer.on_event(
                    self.sim.now_us(),
                    &MacEvent::FrameDropped {
                        to,
                        reason: DropReason::ReceiverAsleep,
                    },
                );
                return;
            }
            self.with_station(index, |sta, ctx| sta.receive(frame, ctx));
        } else {
            trace!(to = %to, kind = frame.kind(), "no receiver on the medium");
        }
    }

    fn ap_receive(&mut self, frame: Frame) {
        let mut tx = Outbox::new();
        let mut sched = self.sim.scoped(Event::Ap);
        self.ap.receive(frame, &mut sched, &mut tx, &mut self.observer);
        self.post(tx.take());
    }

    fn with_station<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut StationMac, &mut StaContext<'_>) -> R,
    ) -> Option<R> {
        let mut tx = Outbox::new();
        let node = self.stations.get_mut(index)?;
        let mut sched = self.sim.scoped(move |event| Event::Sta { index, event });
        let mut ctx = StaContext {
            sched: &mut sched,
            tx: &mut tx,
            radio: &mut node.radio,
            obs: &mut self.observer,
        };
        let result = f(&mut node.mac, &mut ctx);
        self.post(tx.take());
        Some(result)
    }

    fn drain_slot_queues(&mut self) {
        let now = self.sim.now_us();
        let frames = self.ap.queues_mut().drain_open(now);
        self.post(frames);
    }

    fn post(&mut self, frames: Vec<(MacAddress, Frame)>) {
        for (to, frame) in frames {
            self.sim.schedule_at(self.sim.now_us(), Event::Deliver { to, frame });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccessPointConfig, StationConfig, TrafficEvent};
    use crate::frame::Aid;
    use crate::observe::{ForwardKind, RecordingObserver};
    use crate::strategy::EARLY_WAKE_US;

    const BI: u64 = 102_400;

    /// 4 groups of 8, two 1700 µs slots.
    fn scenario(stations: &[u16], traffic: Vec<TrafficEvent>) -> ScenarioConfig {
        ScenarioConfig {
            access_point: AccessPointConfig {
                slot_duration_count: 10,
                slot_count: 2,
                schedule_next_slot_if_less_than_us: 300,
                ..AccessPointConfig::default()
            },
            station: StationConfig::default(),
            stations: stations.iter().map(|&n| MacAddress::local(n)).collect(),
            traffic,
        }
    }

    fn traffic(kind: TrafficKind, n: u16, at_us: u64) -> TrafficEvent {
        TrafficEvent {
            kind,
            station: MacAddress::local(n),
            at_us,
            payload_len: 16,
        }
    }

    fn network(config: &ScenarioConfig) -> Network<RecordingObserver> {
        Network::new(config, RecordingObserver::new()).unwrap()
    }

    // ── Setup ─────────────────────────────────────────────────────────────────

    #[test]
    fn invalid_layout_is_rejected_before_start() {
        let mut config = scenario(&[1], vec![]);
        config.access_point.group_size = 0;
        assert!(matches!(
            Network::new(&config, RecordingObserver::new()),
            Err(ConfigError::ZeroGroupSize)
        ));
    }

    #[test]
    fn stations_associate_on_first_beacon() {
        let config = scenario(&[1, 11, 27], vec![]);
        let mut net = network(&config);
        net.run_until(0);

        for n in [1u16, 11, 27] {
            let sta = net.station(&MacAddress::local(n)).unwrap();
            assert_eq!(sta.state(), AssociationState::Associated);
            assert_eq!(sta.aid(), Aid::from_raw(n));
        }
        assert_eq!(net.access_point().counters().associations, 3);
        assert_eq!(net.access_point().stations().len(), 3);
    }

    #[test]
    fn station_outside_capacity_is_refused() {
        let config = scenario(&[40], vec![]);
        let mut net = network(&config);
        net.run_until(BI);
        let sta = net.station(&MacAddress::local(40)).unwrap();
        assert_eq!(sta.state(), AssociationState::Refused);
        assert_eq!(net.report().ap.refusals, 1);
    }

    #[test]
    fn station_reassociates_after_beacon_outage() {
        let config = scenario(&[11], vec![]);
        let mut net = network(&config);
        let addr = MacAddress::local(11);
        net.run_until(2 * BI + 1);
        assert_eq!(net.station(&addr).unwrap().state(), AssociationState::Associated);

        // long enough for the watchdog to give up on the AP
        net.set_beacon_generation(false);
        net.run_until(20 * BI);
        assert_eq!(net.station(&addr).unwrap().state(), AssociationState::BeaconMissed);
        assert_eq!(net.observer().count(|e| matches!(e, MacEvent::BeaconMissed { .. })), 1);

        // the AP still holds the station and answers its new request
        net.set_beacon_generation(true);
        net.run_until(25 * BI);
        let sta = net.station(&addr).unwrap();
        assert_eq!(sta.state(), AssociationState::Associated);
        assert_eq!(sta.aid(), Aid::from_raw(11));
        let ap = net.report().ap;
        assert_eq!(ap.associations, 1);
        assert_eq!(ap.refusals, 0);
    }

    #[test]
    fn active_probing_finds_the_ap_between_beacons() {
        let mut config = scenario(&[5], vec![]);
        config.access_point.beacon_generation = false;
        config.station.active_probing = true;
        let mut net = network(&config);
        net.run_until(10);
        let sta = net.station(&MacAddress::local(5)).unwrap();
        assert_eq!(sta.state(), AssociationState::Associated);
        assert_eq!(net.report().ap.beacons_sent, 0);
    }

    // ── Power save ────────────────────────────────────────────────────────────

    #[test]
    fn idle_station_sleeps_full_cycles() {
        let config = scenario(&[11], vec![]);
        let mut net = network(&config);
        net.run_until(8 * BI);

        let addr = MacAddress::local(11);
        let report = net.report();
        assert_eq!(report.stations[0].state, AssociationState::Associated);
        assert!(report.stations[0].counters.sleeps >= 2);
        // every DTIM after association is followed by a full-cycle sleep
        let full_cycle = net.observer().count(|e| {
            matches!(e, MacEvent::Sleeping { station, requested_us, .. }
                if *station == addr && *requested_us == 4 * BI)
        });
        assert!(full_cycle >= 1);
        // the station keeps hearing its DTIM beacons, so the link stays up
        assert_eq!(net.observer().count(|e| matches!(e, MacEvent::BeaconMissed { .. })), 0);
    }

    #[test]
    fn sleeping_station_misses_unicast() {
        // AID 27 is in group 3 and sleeps through the group 1 beacon
        let config = scenario(&[27], vec![]);
        let mut net = network(&config);
        net.run_until(BI + 1);
        let addr = MacAddress::local(27);
        assert!(net.radio(&addr).unwrap().is_asleep());

        let frame = Frame::Data {
            from: net.access_point().address(),
            to: addr,
            payload: vec![1],
        };
        net.sim.schedule_at(BI + 10, Event::Deliver { to: addr, frame });
        net.run_until(BI + 20);

        assert_eq!(net.report().lost_asleep, 1);
        assert_eq!(
            net.observer().count(|e| matches!(
                e,
                MacEvent::FrameDropped { reason: DropReason::ReceiverAsleep, .. }
            )),
            1
        );
        assert_eq!(net.station(&addr).unwrap().counters().downlink_received, 0);
    }

    // ── Traffic ───────────────────────────────────────────────────────────────

    #[test]
    fn deferred_downlink_reaches_station_in_its_slot() {
        // AID 18: group 2, slot 0.  Downlink arrives during group 0.
        let config = scenario(&[18], vec![traffic(TrafficKind::Downlink, 18, 1_000)]);
        let mut net = network(&config);
        net.run_until(10 * BI);

        let forwarded = net
            .observer()
            .matching(|e| matches!(e, MacEvent::Forwarded { kind: ForwardKind::Scheduled, .. }));
        let [(_, MacEvent::Forwarded { delay_us, .. })] = forwarded.as_slice() else {
            panic!("expected one scheduled forward, got {forwarded:?}");
        };
        // four beacons to the next DTIM, two more to group 2, slot 0
        assert_eq!(*delay_us, 6 * BI - 1_000);

        let report = net.report();
        assert_eq!(report.stations[0].counters.downlink_received, 1);
        assert_eq!(report.lost_asleep, 0);
    }

    #[test]
    fn uplink_waits_for_own_slot() {
        // AID 9: group 1, slot 1 at 1700 µs
        let config = scenario(&[9], vec![traffic(TrafficKind::Uplink, 9, 2 * BI)]);
        let mut net = network(&config);
        net.run_until(2 * BI);
        assert_eq!(net.station(&MacAddress::local(9)).unwrap().pending_uplink(), 1);

        net.run_until(5 * BI + 3_400);
        let report = net.report();
        assert_eq!(report.stations[0].counters.uplink_sent, 1);
        assert_eq!(report.ap.uplink_received, 1);
        let station = net.station(&MacAddress::local(9)).unwrap();
        assert_eq!(station.pending_uplink(), 0);
        assert_eq!(station.backoff_slot_us(), 1);
    }

    #[test]
    fn default_scenario_delivers_both_frames() {
        let config = ScenarioConfig::default_scenario();
        let mut net = network(&config);
        net.run_until(1_000_000);
        let report = net.report();
        let sta = &report.stations[0];
        assert_eq!(sta.state, AssociationState::Associated);
        assert_eq!(sta.counters.downlink_received, 1);
        assert_eq!(sta.counters.uplink_sent, 1);
        assert_eq!(report.ap.uplink_received, 1);
        assert_eq!(report.ap.dropped, 0);
        assert!(sta.counters.slept_us > 0);
    }

    #[test]
    fn wake_margin_precedes_dtim() {
        let config = scenario(&[11], vec![]);
        let mut net = network(&config);
        net.run_until(4 * BI - EARLY_WAKE_US);
        let radio = net.radio(&MacAddress::local(11)).unwrap();
        assert!(!radio.is_asleep());
        assert!(radio.wake_ups() >= 1);
    }
}
