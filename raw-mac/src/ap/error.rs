/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Association admission errors of the access point.
//!
//! A refused association is answered with an association response carrying
//! the unassigned AID; the reason is only logged.

use crate::frame::{Aid, MacAddress};

/// Why an association request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionReason {
    /// The AID derived from the address is 0 or above 8191.
    InvalidAid { aid: Aid },

    /// The AID is valid but beyond the configured station capacity, so it
    /// would belong to no group.
    OutsideCapacity { aid: Aid, capacity: u16 },

    /// Another station already holds the AID derived from this address.
    AidCollision { aid: Aid, holder: MacAddress },
}

impl std::fmt::Display for AdmissionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionReason::InvalidAid { aid } => {
                write!(f, "derived AID {} is not assignable", aid)
            }

            AdmissionReason::OutsideCapacity { aid, capacity } => write!(
                f,
                "derived AID {} is beyond the station capacity of {}",
                aid, capacity
            ),

            AdmissionReason::AidCollision { aid, holder } => {
                write!(f, "AID {} is already held by {}", aid, holder)
            }
        }
    }
}

impl std::error::Error for AdmissionReason {}
