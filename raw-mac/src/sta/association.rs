/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Station discovery and association protocol.
//!
//! The state machine is pure: every input returns the list of
//! [`AssociationAction`]s the station MAC has to carry out (send a frame,
//! arm or cancel a timer, report a link change).
//!
//! ```text
//!               good beacon                    success
//! BeaconMissed ─────────────► WaitAssocResponse ──────► Associated
//!      │ active probing             ▲      │ failure          │
//!      ▼                            │      ▼                  │ watchdog
//! WaitProbeResponse ── response ────┘    Refused              ▼
//!                                                       BeaconMissed
//! ```

use tracing::{debug, info};

use crate::config::StationConfig;
use crate::frame::{Aid, MacAddress, StatusCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssociationState {
    Associated,
    WaitProbeResponse,
    WaitAssocResponse,
    #[default]
    BeaconMissed,
    Refused,
}

/// Side effect requested by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationAction {
    SendProbeRequest,
    SendAssocRequest { bssid: MacAddress },
    ArmProbeTimeout { delay_us: u64 },
    CancelProbeTimeout,
    ArmAssocTimeout { delay_us: u64 },
    CancelAssocTimeout,
    ArmWatchdog { delay_us: u64 },
    /// Entered `Associated`: channel access becomes slot-gated.
    LinkUp { aid: Aid },
    /// Left `Associated`: channel access becomes free.
    LinkDown,
    Refused,
    BeaconMissed,
}

#[derive(Debug, Clone)]
pub struct AssociationStateMachine {
    state: AssociationState,
    aid: Aid,
    bssid: Option<MacAddress>,
    active_probing: bool,
    max_missed_beacons: u32,
    probe_timeout_us: u64,
    assoc_timeout_us: u64,
    /// Latest time by which a good beacon must have been seen.
    watchdog_deadline_us: u64,
    watchdog_armed: bool,
}

impl AssociationStateMachine {
    pub fn new(config: &StationConfig) -> Self {
        Self {
            state: AssociationState::default(),
            aid: Aid::UNASSIGNED,
            bssid: None,
            active_probing: config.active_probing,
            max_missed_beacons: config.max_missed_beacons,
            probe_timeout_us: config.probe_request_timeout_us,
            assoc_timeout_us: config.assoc_request_timeout_us,
            watchdog_deadline_us: 0,
            watchdog_armed: false,
        }
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    pub fn is_associated(&self) -> bool {
        self.state == AssociationState::Associated
    }

    /// AID from the last successful association, or [`Aid::UNASSIGNED`].
    pub fn aid(&self) -> Aid {
        self.aid
    }

    pub fn bssid(&self) -> Option<MacAddress> {
        self.bssid
    }

    pub fn active_probing(&self) -> bool {
        self.active_probing
    }

    pub fn watchdog_deadline_us(&self) -> u64 {
        self.watchdog_deadline_us
    }

    pub fn set_active_probing(&mut self, enable: bool) -> Vec<AssociationAction> {
        self.active_probing = enable;
        if enable {
            self.try_to_ensure_associated()
        } else {
            vec![AssociationAction::CancelProbeTimeout]
        }
    }

    /// Start probing if the link is down and active probing is on.  In every
    /// other state an exchange is already in progress (or refused) and nothing
    /// is sent.
    pub fn try_to_ensure_associated(&mut self) -> Vec<AssociationAction> {
        let mut actions = Vec::new();
        if self.state == AssociationState::BeaconMissed && self.active_probing {
            self.request_probe(&mut actions);
        }
        actions
    }

    /// Process a beacon from `from`.  Returns `None` when the beacon is not a
    /// good one: while waiting for, or holding, an association only beacons
    /// from the current BSSID count.
    pub fn on_beacon(
        &mut self,
        from: MacAddress,
        beacon_interval_us: u64,
        now_us: u64,
    ) -> Option<Vec<AssociationAction>> {
        let bound = matches!(
            self.state,
            AssociationState::WaitAssocResponse | AssociationState::Associated
        );
        if bound && self.bssid != Some(from) {
            return None;
        }

        let mut actions = Vec::new();
        self.restart_watchdog(beacon_interval_us, now_us, &mut actions);
        self.bssid = Some(from);
        if self.state == AssociationState::BeaconMissed {
            self.request_association(&mut actions);
        }
        Some(actions)
    }

    pub fn on_probe_response(
        &mut self,
        from: MacAddress,
        beacon_interval_us: u64,
        now_us: u64,
    ) -> Vec<AssociationAction> {
        let mut actions = Vec::new();
        if self.state != AssociationState::WaitProbeResponse {
            return actions;
        }
        self.bssid = Some(from);
        self.restart_watchdog(beacon_interval_us, now_us, &mut actions);
        actions.push(AssociationAction::CancelProbeTimeout);
        self.request_association(&mut actions);
        actions
    }

    pub fn on_assoc_response(
        &mut self,
        from: MacAddress,
        status: StatusCode,
        aid: Aid,
    ) -> Vec<AssociationAction> {
        let mut actions = Vec::new();
        if self.state != AssociationState::WaitAssocResponse || self.bssid != Some(from) {
            return actions;
        }
        actions.push(AssociationAction::CancelAssocTimeout);
        if status.is_success() && aid.is_valid() {
            self.aid = aid;
            self.set_state(AssociationState::Associated, &mut actions);
        } else {
            info!(bssid = %from, "association refused");
            self.set_state(AssociationState::Refused, &mut actions);
            actions.push(AssociationAction::Refused);
        }
        actions
    }

    pub fn on_probe_timeout(&mut self) -> Vec<AssociationAction> {
        let mut actions = Vec::new();
        if self.state == AssociationState::WaitProbeResponse {
            debug!("probe request timed out, retrying");
            self.request_probe(&mut actions);
        }
        actions
    }

    pub fn on_assoc_timeout(&mut self) -> Vec<AssociationAction> {
        let mut actions = Vec::new();
        if self.state == AssociationState::WaitAssocResponse {
            debug!("association request timed out, retrying");
            self.request_association(&mut actions);
        }
        actions
    }

    /// Watchdog timer fired.  If good beacons moved the deadline while it was
    /// pending, re-arm for the remainder instead of dropping the link.  Only an
    /// associated station has a link to drop; in every other state the timer
    /// just lapses until the next good beacon re-arms it.
    pub fn on_watchdog(&mut self, now_us: u64) -> Vec<AssociationAction> {
        let mut actions = Vec::new();
        self.watchdog_armed = false;
        if !self.is_associated() {
            return actions;
        }
        if self.watchdog_deadline_us > now_us {
            self.watchdog_armed = true;
            actions.push(AssociationAction::ArmWatchdog {
                delay_us: self.watchdog_deadline_us - now_us,
            });
            return actions;
        }

        actions.push(AssociationAction::BeaconMissed);
        self.set_state(AssociationState::BeaconMissed, &mut actions);
        actions.extend(self.try_to_ensure_associated());
        actions
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn restart_watchdog(&mut self, beacon_interval_us: u64, now_us: u64, actions: &mut Vec<AssociationAction>) {
        let delay_us = beacon_interval_us.saturating_mul(u64::from(self.max_missed_beacons));
        self.watchdog_deadline_us = self.watchdog_deadline_us.max(now_us.saturating_add(delay_us));
        if !self.watchdog_armed {
            self.watchdog_armed = true;
            actions.push(AssociationAction::ArmWatchdog { delay_us });
        }
    }

    fn request_probe(&mut self, actions: &mut Vec<AssociationAction>) {
        self.set_state(AssociationState::WaitProbeResponse, actions);
        actions.push(AssociationAction::SendProbeRequest);
        actions.push(AssociationAction::ArmProbeTimeout {
            delay_us: self.probe_timeout_us,
        });
    }

    fn request_association(&mut self, actions: &mut Vec<AssociationAction>) {
        self.set_state(AssociationState::WaitAssocResponse, actions);
        if let Some(bssid) = self.bssid {
            actions.push(AssociationAction::SendAssocRequest { bssid });
            actions.push(AssociationAction::ArmAssocTimeout {
                delay_us: self.assoc_timeout_us,
            });
        }
    }

    fn set_state(&mut self, next: AssociationState, actions: &mut Vec<AssociationAction>) {
        let was_associated = self.is_associated();
        self.state = next;
        match (was_associated, self.is_associated()) {
            (false, true) => actions.push(AssociationAction::LinkUp { aid: self.aid }),
            (true, false) => actions.push(AssociationAction::LinkDown),
            _ => {}
        }
    }
}
