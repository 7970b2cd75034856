/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The access point's view of its stations.
//!
//! Entries are created when an association is accepted and are never
//! removed; disassociation only flips the association state.  The table is
//! keyed by AID (`BTreeMap` for deterministic iteration when the TIM bitmap
//! is built) with a secondary address index.

use std::collections::{BTreeMap, HashMap};

use super::error::AdmissionReason;
use crate::frame::{Aid, MacAddress};
use crate::sta::AssociationState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub aid: Aid,
    pub address: MacAddress,
    pub group: u16,
    pub slot: u16,
    pub association: AssociationState,
    /// Downlink frames accepted but not yet handed to a slot queue.
    pub pending_outbound: u32,
    /// Known to be awake and listening in the current DTIM cycle.
    pub active_this_cycle: bool,
}

impl Station {
    pub fn is_associated(&self) -> bool {
        self.association == AssociationState::Associated
    }
}

#[derive(Debug, Clone)]
pub struct StationTable {
    capacity: u16,
    stations: BTreeMap<Aid, Station>,
    by_address: HashMap<MacAddress, Aid>,
}

impl StationTable {
    pub fn new(capacity: u16) -> Self {
        Self {
            capacity,
            stations: BTreeMap::new(),
            by_address: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Accept `address` under `aid`, or re-associate a known station.
    pub fn admit(
        &mut self,
        address: MacAddress,
        aid: Aid,
        group: u16,
        slot: u16,
    ) -> Result<&mut Station, AdmissionReason> {
        if !aid.is_valid() {
            return Err(AdmissionReason::InvalidAid { aid });
        }
        if aid.value() > self.capacity {
            return Err(AdmissionReason::OutsideCapacity {
                aid,
                capacity: self.capacity,
            });
        }
        if let Some(existing) = self.stations.get(&aid) {
            if existing.address != address {
                return Err(AdmissionReason::AidCollision {
                    aid,
                    holder: existing.address,
                });
            }
        }

        self.by_address.insert(address, aid);
        let station = self.stations.entry(aid).or_insert_with(|| Station {
            aid,
            address,
            group,
            slot,
            association: AssociationState::BeaconMissed,
            pending_outbound: 0,
            active_this_cycle: false,
        });
        station.association = AssociationState::Associated;
        Ok(station)
    }

    pub fn get(&self, aid: Aid) -> Option<&Station> {
        self.stations.get(&aid)
    }

    pub fn by_address(&self, address: &MacAddress) -> Option<&Station> {
        self.by_address.get(address).and_then(|aid| self.stations.get(aid))
    }

    pub fn by_address_mut(&mut self, address: &MacAddress) -> Option<&mut Station> {
        let aid = self.by_address.get(address)?;
        self.stations.get_mut(aid)
    }

    /// Mark a station unassociated.  Returns `false` for unknown addresses.
    pub fn mark_unassociated(&mut self, address: &MacAddress) -> bool {
        match self.by_address_mut(address) {
            Some(station) => {
                station.association = AssociationState::BeaconMissed;
                station.active_this_cycle = false;
                true
            }
            None => false,
        }
    }

    /// Stations in AID order.
    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Station> {
        self.stations.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admit_creates_associated_entry() {
        let mut t = StationTable::new(32);
        let addr = MacAddress::local(9);
        let s = t.admit(addr, Aid::from_raw(9), 1, 1).unwrap();
        assert!(s.is_associated());
        assert_eq!(s.pending_outbound, 0);
        assert!(!s.active_this_cycle);
        assert_eq!(t.by_address(&addr).map(|s| s.aid), Some(Aid::from_raw(9)));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn admit_rejects_ids_outside_capacity() {
        let mut t = StationTable::new(32);
        assert_eq!(
            t.admit(MacAddress::local(0), Aid::from_raw(0), 0, 0).unwrap_err(),
            AdmissionReason::InvalidAid { aid: Aid::from_raw(0) }
        );
        assert_eq!(
            t.admit(MacAddress::local(33), Aid::from_raw(33), 4, 1).unwrap_err(),
            AdmissionReason::OutsideCapacity {
                aid: Aid::from_raw(33),
                capacity: 32
            }
        );
        assert!(t.is_empty());
    }

    #[test]
    fn admit_rejects_aid_collision() {
        let mut t = StationTable::new(32);
        t.admit(MacAddress::local(5), Aid::from_raw(5), 0, 1).unwrap();
        let other = MacAddress([0x06, 0, 0, 0, 0, 5]);
        assert!(matches!(
            t.admit(other, Aid::from_raw(5), 0, 1),
            Err(AdmissionReason::AidCollision { .. })
        ));
    }

    #[test]
    fn disassociation_keeps_entry_and_pending_count() {
        let mut t = StationTable::new(32);
        let addr = MacAddress::local(3);
        t.admit(addr, Aid::from_raw(3), 0, 1).unwrap().pending_outbound = 2;
        assert!(t.mark_unassociated(&addr));
        let s = t.by_address(&addr).unwrap();
        assert!(!s.is_associated());
        assert_eq!(s.pending_outbound, 2);

        let s = t.admit(addr, Aid::from_raw(3), 0, 1).unwrap();
        assert!(s.is_associated());
        assert_eq!(s.pending_outbound, 2);
        assert!(!t.mark_unassociated(&MacAddress::local(4)));
    }

    #[test]
    fn iteration_is_in_aid_order() {
        let mut t = StationTable::new(32);
        for n in [17u16, 2, 9] {
            t.admit(MacAddress::local(n), Aid::from_raw(n), 0, 0).unwrap();
        }
        let aids: Vec<u16> = t.iter().map(|s| s.aid.value()).collect();
        assert_eq!(aids, vec![2, 9, 17]);
    }
}
