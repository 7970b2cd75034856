//! Scenario configuration loading and validation.
//!
//! A scenario describes one access point, the station MAC parameters shared by
//! every station, the station list, and scripted traffic.  Every field is
//! optional; missing values take the defaults shown below.
//!
//! The expected YAML structure is:
//! ```yaml
//! access_point:
//!   address: "02:00:00:00:ff:fe"
//!   beacon_interval_us: 102400
//!   station_capacity: 32
//!   group_size: 8
//!   slot_format: 1
//!   slot_duration_count: 400
//!   slot_count: 2
//! station:
//!   max_missed_beacons: 10
//!   active_probing: false
//! stations:
//!   - address: "02:00:00:00:00:01"
//! traffic:
//!   - { kind: downlink, station: "02:00:00:00:00:01", at_us: 250000 }
//! ```
//!
//! Loading only checks that the file parses.  Range checks happen in
//! [`AccessPointConfig::layout`] and [`ScenarioConfig::validate`], which turn
//! the raw numbers into a [`RawLayout`].

pub mod error;

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub use error::ConfigError;

use crate::frame::{MacAddress, SlotFormat};
use crate::strategy::{backoff_slot_us, GroupSlotStrategy};

/// Highest AID usable on page 0 (11-bit group window fields).
pub const MAX_PAGE_CAPACITY: u16 = 2047;

/// One bit per group in the TIM partial bitmap.
pub const MAX_GROUPS: u16 = 32;

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ScenarioFile {
    access_point: AccessPointConfig,
    station: StationConfig,
    stations: Vec<StationEntry>,
    traffic: Vec<TrafficEntry>,
}

#[derive(Debug, Deserialize)]
struct StationEntry {
    address: MacAddress,
}

#[derive(Debug, Deserialize)]
struct TrafficEntry {
    kind: TrafficKind,
    station: MacAddress,
    at_us: u64,
    #[serde(default = "default_payload_len")]
    payload_len: usize,
}

fn default_payload_len() -> usize {
    64
}

// ── Public data structures ────────────────────────────────────────────────────

/// Access point parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessPointConfig {
    pub address: MacAddress,
    pub beacon_interval_us: u64,
    /// Highest AID the AP hands out; must be a multiple of `group_size`.
    pub station_capacity: u16,
    pub group_size: u16,
    pub slot_format: u8,
    pub slot_cross_boundary: bool,
    pub slot_duration_count: u16,
    pub slot_count: u16,
    /// Disable immediate forwarding: every downlink waits for the next cycle.
    pub always_schedule_for_next_slot: bool,
    /// Forward immediately only if more than this much slot time is left.
    pub schedule_next_slot_if_less_than_us: u64,
    pub slot_queue_capacity: usize,
    pub max_time_in_queue_us: u64,
    pub beacon_generation: bool,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            address: MacAddress([0x02, 0x00, 0x00, 0x00, 0xff, 0xfe]),
            beacon_interval_us: 102_400,
            station_capacity: 32,
            group_size: 8,
            slot_format: 1,
            slot_cross_boundary: false,
            slot_duration_count: 400,
            slot_count: 2,
            always_schedule_for_next_slot: false,
            schedule_next_slot_if_less_than_us: 5_000,
            slot_queue_capacity: 400,
            max_time_in_queue_us: 10_000_000,
            beacon_generation: true,
        }
    }
}

/// Station MAC parameters, shared by every station in the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationConfig {
    /// Beacon intervals without a good beacon before the link is dropped.
    pub max_missed_beacons: u32,
    pub active_probing: bool,
    pub probe_request_timeout_us: u64,
    pub assoc_request_timeout_us: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            max_missed_beacons: 10,
            active_probing: false,
            probe_request_timeout_us: 50_000,
            assoc_request_timeout_us: 500_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficKind {
    /// AP → station.
    Downlink,
    /// Station → AP.
    Uplink,
}

/// One scripted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficEvent {
    pub kind: TrafficKind,
    pub station: MacAddress,
    pub at_us: u64,
    pub payload_len: usize,
}

/// Parameters derived from a validated [`AccessPointConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLayout {
    pub beacon_interval_us: u64,
    pub station_capacity: u16,
    pub group_size: u16,
    pub group_count: u16,
    pub slot_format: SlotFormat,
    pub slot_count: u16,
    pub slot_duration_count: u16,
    pub slot_duration_us: u64,
    /// Contention backoff unit: `slot_duration_us / 1023`.
    pub backoff_slot_us: u64,
}

impl RawLayout {
    /// Length of one full DTIM cycle (one beacon per group).
    pub fn dtim_cycle_us(&self) -> u64 {
        u64::from(self.group_count) * self.beacon_interval_us
    }

    pub fn raw_window_us(&self) -> u64 {
        u64::from(self.slot_count) * self.slot_duration_us
    }
}

impl AccessPointConfig {
    /// Range-check the RAW parameters and derive the cycle layout.
    pub fn layout(&self, strategy: &dyn GroupSlotStrategy) -> Result<RawLayout, ConfigError> {
        if self.beacon_interval_us == 0 {
            return Err(ConfigError::ZeroBeaconInterval);
        }
        if self.group_size == 0 {
            return Err(ConfigError::ZeroGroupSize);
        }
        if self.station_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.station_capacity > MAX_PAGE_CAPACITY {
            return Err(ConfigError::CapacityExceedsPage {
                capacity: self.station_capacity,
                max: MAX_PAGE_CAPACITY,
            });
        }
        if self.station_capacity % self.group_size != 0 {
            return Err(ConfigError::CapacityNotMultipleOfGroupSize {
                capacity: self.station_capacity,
                group_size: self.group_size,
            });
        }
        let group_count = self.station_capacity / self.group_size;
        if group_count > MAX_GROUPS {
            return Err(ConfigError::TooManyGroups {
                groups: group_count,
                max: MAX_GROUPS,
            });
        }

        let slot_format =
            SlotFormat::from_bit(self.slot_format).ok_or(ConfigError::InvalidSlotFormat(self.slot_format))?;
        if self.slot_count == 0 || self.slot_count > slot_format.max_slot_count() {
            return Err(ConfigError::SlotCountOutOfRange {
                slot_count: self.slot_count,
                format: self.slot_format,
                max: slot_format.max_slot_count(),
            });
        }
        if self.slot_duration_count > slot_format.max_slot_duration_count() {
            return Err(ConfigError::SlotDurationCountOutOfRange {
                count: self.slot_duration_count,
                format: self.slot_format,
                max: slot_format.max_slot_duration_count(),
            });
        }

        let slot_duration_us = strategy.slot_duration_us(self.slot_duration_count);
        let window_us = u64::from(self.slot_count) * slot_duration_us;
        if window_us > self.beacon_interval_us {
            return Err(ConfigError::RawWindowExceedsBeaconInterval {
                window_us,
                beacon_interval_us: self.beacon_interval_us,
            });
        }
        if self.slot_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }

        Ok(RawLayout {
            beacon_interval_us: self.beacon_interval_us,
            station_capacity: self.station_capacity,
            group_size: self.group_size,
            group_count,
            slot_format,
            slot_count: self.slot_count,
            slot_duration_count: self.slot_duration_count,
            slot_duration_us,
            backoff_slot_us: backoff_slot_us(slot_duration_us),
        })
    }
}

// ── ScenarioConfig ────────────────────────────────────────────────────────────

/// Complete scenario: AP, station parameters, station list, traffic script.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScenarioConfig {
    pub access_point: AccessPointConfig,
    pub station: StationConfig,
    pub stations: Vec<MacAddress>,
    pub traffic: Vec<TrafficEvent>,
}

impl ScenarioConfig {
    /// Parses `path` as a scenario file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid.  Range errors are left to [`validate`](Self::validate).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading scenario configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let scenario = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        info!(
            stations = scenario.stations.len(),
            traffic = scenario.traffic.len(),
            "Successfully loaded scenario"
        );
        Ok(scenario)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ScenarioFile = serde_yaml::from_str(content)?;

        let stations: Vec<MacAddress> = file.stations.into_iter().map(|s| s.address).collect();
        for station in &stations {
            debug!("  Station: {}", station);
        }
        if stations.is_empty() {
            warn!("No stations found in configuration file");
        }

        let traffic = file
            .traffic
            .into_iter()
            .map(|t| TrafficEvent {
                kind: t.kind,
                station: t.station,
                at_us: t.at_us,
                payload_len: t.payload_len,
            })
            .collect();

        Ok(Self {
            access_point: file.access_point,
            station: file.station,
            stations,
            traffic,
        })
    }

    /// Scenario used when no file is supplied: one station (AID 1) with one
    /// downlink and one uplink frame.
    pub fn default_scenario() -> Self {
        let station = MacAddress::local(1);
        Self {
            access_point: AccessPointConfig::default(),
            station: StationConfig::default(),
            stations: vec![station],
            traffic: vec![
                TrafficEvent {
                    kind: TrafficKind::Downlink,
                    station,
                    at_us: 250_000,
                    payload_len: default_payload_len(),
                },
                TrafficEvent {
                    kind: TrafficKind::Uplink,
                    station,
                    at_us: 400_000,
                    payload_len: default_payload_len(),
                },
            ],
        }
    }

    /// Full range check: AP layout, station watchdog, station and traffic lists.
    pub fn validate(&self, strategy: &dyn GroupSlotStrategy) -> Result<RawLayout, ConfigError> {
        let layout = self.access_point.layout(strategy)?;

        if self.station.max_missed_beacons <= u32::from(layout.group_count) {
            return Err(ConfigError::WatchdogNotLongerThanCycle {
                max_missed_beacons: self.station.max_missed_beacons,
                group_count: layout.group_count,
            });
        }

        let mut seen = HashSet::new();
        for &station in &self.stations {
            if station == self.access_point.address {
                return Err(ConfigError::StationIsAccessPoint(station));
            }
            if !seen.insert(station) {
                return Err(ConfigError::DuplicateStation(station));
            }
        }
        if let Some(t) = self.traffic.iter().find(|t| !seen.contains(&t.station)) {
            return Err(ConfigError::UnknownTrafficStation(t.station));
        }

        Ok(layout)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::S1gStrategy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn ap() -> AccessPointConfig {
        AccessPointConfig::default()
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn default_layout_has_four_groups() {
        let layout = ap().layout(&S1gStrategy).unwrap();
        assert_eq!(layout.group_count, 4);
        assert_eq!(layout.slot_duration_us, 48_500);
        assert_eq!(layout.backoff_slot_us, 47);
        assert_eq!(layout.dtim_cycle_us(), 409_600);
        assert_eq!(layout.raw_window_us(), 97_000);
    }

    #[test]
    fn default_scenario_is_valid() {
        let scenario = ScenarioConfig::default_scenario();
        assert!(scenario.validate(&S1gStrategy).is_ok());
    }

    // ── load_from_file ────────────────────────────────────────────────────────

    #[test]
    fn load_full_yaml() {
        let yaml = r#"
access_point:
  address: "02:00:00:00:ff:fe"
  beacon_interval_us: 102400
  station_capacity: 16
  group_size: 4
  slot_format: 0
  slot_duration_count: 10
  slot_count: 2
  schedule_next_slot_if_less_than_us: 300
station:
  max_missed_beacons: 12
  active_probing: true
stations:
  - address: "02:00:00:00:00:01"
  - address: "02:00:00:00:00:0a"
traffic:
  - { kind: downlink, station: "02:00:00:00:00:0a", at_us: 250000 }
  - { kind: uplink, station: "02:00:00:00:00:01", at_us: 400000, payload_len: 10 }
"#;
        let f = yaml_tempfile(yaml);
        let scenario = ScenarioConfig::load_from_file(f.path()).unwrap();

        assert_eq!(scenario.access_point.station_capacity, 16);
        assert_eq!(scenario.access_point.slot_format, 0);
        assert_eq!(scenario.access_point.schedule_next_slot_if_less_than_us, 300);
        assert!(scenario.station.active_probing);
        assert_eq!(scenario.stations, vec![MacAddress::local(1), MacAddress::local(10)]);
        assert_eq!(scenario.traffic[0].kind, TrafficKind::Downlink);
        assert_eq!(scenario.traffic[0].payload_len, 64);
        assert_eq!(scenario.traffic[1].payload_len, 10);

        let layout = scenario.validate(&S1gStrategy).unwrap();
        assert_eq!(layout.group_count, 4);
        assert_eq!(layout.slot_duration_us, 1_700);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = yaml_tempfile("{}\n");
        let scenario = ScenarioConfig::load_from_file(f.path()).unwrap();
        assert_eq!(scenario.access_point, AccessPointConfig::default());
        assert_eq!(scenario.station, StationConfig::default());
        assert!(scenario.stations.is_empty());
    }

    #[test]
    fn missing_file_returns_error() {
        let result = ScenarioConfig::load_from_file(Path::new("/nonexistent/path/scenario.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(ScenarioConfig::load_from_file(f.path()).is_err());
    }

    #[test]
    fn bad_mac_address_returns_error() {
        let f = yaml_tempfile("stations:\n  - address: \"nope\"\n");
        let err = ScenarioConfig::load_from_file(f.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid MAC address"));
    }

    #[test]
    fn unknown_field_returns_error() {
        let f = yaml_tempfile("access_point:\n  beacon_interval: 100\n");
        assert!(ScenarioConfig::load_from_file(f.path()).is_err());
    }

    // ── layout: range errors ──────────────────────────────────────────────────

    #[test]
    fn zero_values_are_rejected() {
        let s = S1gStrategy;
        let cfg = AccessPointConfig { beacon_interval_us: 0, ..ap() };
        assert_eq!(cfg.layout(&s), Err(ConfigError::ZeroBeaconInterval));
        let cfg = AccessPointConfig { group_size: 0, ..ap() };
        assert_eq!(cfg.layout(&s), Err(ConfigError::ZeroGroupSize));
        let cfg = AccessPointConfig { station_capacity: 0, ..ap() };
        assert_eq!(cfg.layout(&s), Err(ConfigError::ZeroCapacity));
        let cfg = AccessPointConfig { slot_queue_capacity: 0, ..ap() };
        assert_eq!(cfg.layout(&s), Err(ConfigError::ZeroQueueCapacity));
    }

    #[test]
    fn capacity_must_divide_into_groups() {
        let cfg = AccessPointConfig {
            station_capacity: 30,
            ..ap()
        };
        assert_eq!(
            cfg.layout(&S1gStrategy),
            Err(ConfigError::CapacityNotMultipleOfGroupSize {
                capacity: 30,
                group_size: 8
            })
        );
    }

    #[test]
    fn capacity_beyond_page_is_rejected() {
        let cfg = AccessPointConfig {
            station_capacity: 2048,
            group_size: 64,
            ..ap()
        };
        assert!(matches!(
            cfg.layout(&S1gStrategy),
            Err(ConfigError::CapacityExceedsPage { capacity: 2048, .. })
        ));
    }

    #[test]
    fn more_than_32_groups_is_rejected() {
        let cfg = AccessPointConfig {
            station_capacity: 33,
            group_size: 1,
            ..ap()
        };
        assert_eq!(
            cfg.layout(&S1gStrategy),
            Err(ConfigError::TooManyGroups { groups: 33, max: 32 })
        );
    }

    #[test]
    fn slot_format_limits_are_enforced() {
        let s = S1gStrategy;
        let cfg = AccessPointConfig { slot_format: 2, ..ap() };
        assert_eq!(cfg.layout(&s), Err(ConfigError::InvalidSlotFormat(2)));

        let cfg = AccessPointConfig { slot_count: 8, ..ap() };
        assert!(matches!(cfg.layout(&s), Err(ConfigError::SlotCountOutOfRange { max: 7, .. })));

        let cfg = AccessPointConfig { slot_count: 0, ..ap() };
        assert!(matches!(cfg.layout(&s), Err(ConfigError::SlotCountOutOfRange { .. })));

        let cfg = AccessPointConfig {
            slot_format: 0,
            slot_duration_count: 256,
            ..ap()
        };
        assert!(matches!(
            cfg.layout(&s),
            Err(ConfigError::SlotDurationCountOutOfRange { max: 255, .. })
        ));

        let cfg = AccessPointConfig {
            slot_format: 0,
            slot_duration_count: 10,
            slot_count: 60,
            ..ap()
        };
        assert!(cfg.layout(&s).is_ok());
    }

    #[test]
    fn raw_window_longer_than_beacon_interval_is_rejected() {
        let cfg = AccessPointConfig {
            slot_duration_count: 2000,
            slot_count: 1,
            ..ap()
        };
        assert_eq!(
            cfg.layout(&S1gStrategy),
            Err(ConfigError::RawWindowExceedsBeaconInterval {
                window_us: 240_500,
                beacon_interval_us: 102_400
            })
        );
    }

    // ── validate: scenario-level errors ───────────────────────────────────────

    #[test]
    fn watchdog_must_outlast_dtim_cycle() {
        let scenario = ScenarioConfig {
            station: StationConfig {
                max_missed_beacons: 4,
                ..StationConfig::default()
            },
            ..ScenarioConfig::default_scenario()
        };
        assert_eq!(
            scenario.validate(&S1gStrategy),
            Err(ConfigError::WatchdogNotLongerThanCycle {
                max_missed_beacons: 4,
                group_count: 4
            })
        );
    }

    #[test]
    fn duplicate_and_unknown_stations_are_rejected() {
        let a = MacAddress::local(1);
        let mut scenario = ScenarioConfig::default_scenario();
        scenario.stations.push(a);
        assert_eq!(scenario.validate(&S1gStrategy), Err(ConfigError::DuplicateStation(a)));

        let mut scenario = ScenarioConfig::default_scenario();
        scenario.traffic[0].station = MacAddress::local(7);
        assert_eq!(
            scenario.validate(&S1gStrategy),
            Err(ConfigError::UnknownTrafficStation(MacAddress::local(7)))
        );

        let mut scenario = ScenarioConfig::default_scenario();
        let ap_addr = scenario.access_point.address;
        scenario.stations.push(ap_addr);
        assert_eq!(scenario.validate(&S1gStrategy), Err(ConfigError::StationIsAccessPoint(ap_addr)));
    }
}
