/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! raw-mac – 802.11ah Restricted Access Window scheduling
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── frame/      – addresses, AIDs, beacon RAW/TIM parameters, frame model
//! │   └── codec   – compact RAW/TIM element encoding
//! ├── strategy/   – AID → group / slot rules shared by AP and stations
//! ├── sim/        – discrete-event scheduler with cancellable tokens
//! ├── link        – transport and radio collaborator traits
//! ├── observe     – MAC instrumentation events and observers
//! ├── queue/      – gated per-(group, slot) downlink queues
//! ├── config/     – YAML scenario loading and RAW layout validation
//! ├── ap/         – beacon cycle, station table, forwarding decision
//! ├── sta/        – association state machine and sleep scheduling
//! └── network/    – AP + stations on an ideal medium
//! ```

pub mod ap;
pub mod config;
pub mod frame;
pub mod link;
pub mod network;
pub mod observe;
pub mod queue;
pub mod sim;
pub mod sta;
pub mod strategy;
