/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Collaborator interfaces below the MAC: frame transmission and radio power.

use thiserror::Error;

use crate::frame::{Frame, MacAddress};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("medium rejected {kind} frame for {to}")]
    Rejected { to: MacAddress, kind: &'static str },
}

/// Ungated transmission path.  Failures are reported, never retried.
pub trait Transport {
    fn send(&mut self, to: MacAddress, frame: Frame) -> Result<(), TransportError>;
}

/// Radio power control of a station.
pub trait Radio {
    fn sleep(&mut self, duration_us: u64);
    fn wake(&mut self);
    fn is_asleep(&self) -> bool;
}

/// Transport that keeps frames in send order until the owner collects them.
#[derive(Debug, Default)]
pub struct Outbox {
    frames: Vec<(MacAddress, Frame)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn take(&mut self) -> Vec<(MacAddress, Frame)> {
        std::mem::take(&mut self.frames)
    }
}

impl Transport for Outbox {
    fn send(&mut self, to: MacAddress, frame: Frame) -> Result<(), TransportError> {
        self.frames.push((to, frame));
        Ok(())
    }
}
