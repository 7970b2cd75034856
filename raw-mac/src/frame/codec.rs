/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Compact encoding of the RAW and TIM beacon elements.
//!
//! This is not the over-the-air 802.11ah layout; it packs exactly the logical
//! fields the scheduler relies on so they can be checked for range and
//! carried through byte buffers.
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0  | 1 | RAW control (bit 0: slot cross boundary) |
//! | 1  | 2 | slot definition (LE): format, duration count, slot count |
//! | 3  | 1 | RAW start offset (µs) |
//! | 4  | 3 | group info (LE): `page | start << 2 | end << 13` |
//! | 7  | 1 | DTIM count |
//! | 8  | 1 | DTIM period |
//! | 9  | 4 | partial virtual bitmap (LE) |

use thiserror::Error;

use super::{RawParams, SlotFormat, TimParams};

/// Encoded size of the RAW + TIM elements.
pub const ELEMENTS_LEN: usize = 13;

const GROUP_AID_MASK: u16 = 0x07ff;

/// Errors produced while encoding or decoding beacon elements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("buffer too short: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("{field} = {value} does not fit in {bits} bits")]
    FieldOutOfRange {
        field: &'static str,
        value: u32,
        bits: u8,
    },
}

fn check(field: &'static str, value: u32, bits: u8) -> Result<(), CodecError> {
    if value >> bits != 0 {
        return Err(CodecError::FieldOutOfRange { field, value, bits });
    }
    Ok(())
}

/// Packs the RAW and TIM parameters of one beacon.
pub fn encode_elements(raw: &RawParams, tim: &TimParams) -> Result<[u8; ELEMENTS_LEN], CodecError> {
    let format = raw.slot_format;
    let duration_bits = format.duration_bits();
    let count_bits = format.slot_count_bits();

    check("slot_duration_count", raw.slot_duration_count.into(), duration_bits)?;
    check("slot_count", raw.slot_count.into(), count_bits)?;
    check("group_start", raw.group_start.into(), 11)?;
    check("group_end", raw.group_end.into(), 11)?;
    check("page", raw.page.into(), 2)?;

    let slot_def: u16 = u16::from(format.bit())
        | (u16::from(raw.slot_cross_boundary) << 1)
        | (raw.slot_duration_count << 2)
        | (raw.slot_count << (2 + duration_bits));
    let group_info: u32 = u32::from(raw.page)
        | (u32::from(raw.group_start) << 2)
        | (u32::from(raw.group_end) << 13);

    let mut out = [0u8; ELEMENTS_LEN];
    out[0] = u8::from(raw.slot_cross_boundary);
    out[1..3].copy_from_slice(&slot_def.to_le_bytes());
    out[3] = raw.raw_start_us;
    out[4..7].copy_from_slice(&group_info.to_le_bytes()[..3]);
    out[7] = tim.dtim_count;
    out[8] = tim.dtim_period;
    out[9..13].copy_from_slice(&tim.partial_bitmap.to_le_bytes());
    Ok(out)
}

/// Unpacks buffers produced by [`encode_elements`].  Trailing bytes are ignored.
pub fn decode_elements(buf: &[u8]) -> Result<(RawParams, TimParams), CodecError> {
    if buf.len() < ELEMENTS_LEN {
        return Err(CodecError::Truncated {
            needed: ELEMENTS_LEN,
            got: buf.len(),
        });
    }

    let slot_def = u16::from_le_bytes([buf[1], buf[2]]);
    let slot_format = if slot_def & 0x0001 == 0 {
        SlotFormat::Compact
    } else {
        SlotFormat::Extended
    };
    let duration_bits = slot_format.duration_bits();
    let duration_mask = slot_format.max_slot_duration_count();
    let group_info = u32::from_le_bytes([buf[4], buf[5], buf[6], 0]);

    let raw = RawParams {
        slot_format,
        slot_cross_boundary: slot_def & 0x0002 != 0,
        slot_duration_count: (slot_def >> 2) & duration_mask,
        slot_count: slot_def >> (2 + duration_bits),
        raw_start_us: buf[3],
        group_start: (group_info >> 2) as u16 & GROUP_AID_MASK,
        group_end: (group_info >> 13) as u16 & GROUP_AID_MASK,
        page: (group_info & 0x03) as u8,
    };
    let tim = TimParams {
        dtim_count: buf[7],
        dtim_period: buf[8],
        partial_bitmap: u32::from_le_bytes([buf[9], buf[10], buf[11], buf[12]]),
    };
    Ok((raw, tim))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extended_raw() -> RawParams {
        RawParams {
            slot_format: SlotFormat::Extended,
            slot_cross_boundary: true,
            slot_duration_count: 2047,
            slot_count: 7,
            raw_start_us: 0,
            group_start: 2041,
            group_end: 2047,
            page: 3,
        }
    }

    #[test]
    fn extended_format_elements_survive_encoding() {
        let raw = extended_raw();
        let tim = TimParams {
            dtim_period: 32,
            dtim_count: 5,
            partial_bitmap: 0x8000_0001,
        };
        let bytes = encode_elements(&raw, &tim).unwrap();
        assert_eq!(decode_elements(&bytes).unwrap(), (raw, tim));
    }

    #[test]
    fn compact_format_keeps_wide_slot_count() {
        let raw = RawParams {
            slot_format: SlotFormat::Compact,
            slot_cross_boundary: false,
            slot_duration_count: 10,
            slot_count: 63,
            raw_start_us: 12,
            group_start: 9,
            group_end: 16,
            page: 0,
        };
        let tim = TimParams {
            dtim_period: 4,
            dtim_count: 0,
            partial_bitmap: 0b0101,
        };
        let bytes = encode_elements(&raw, &tim).unwrap();
        let (decoded_raw, decoded_tim) = decode_elements(&bytes).unwrap();
        assert_eq!(decoded_raw.slot_count, 63);
        assert_eq!(decoded_raw.slot_duration_count, 10);
        assert_eq!(decoded_raw, raw);
        assert_eq!(decoded_tim, tim);
    }

    #[test]
    fn group_info_packs_end_start_page() {
        let raw = RawParams {
            group_start: 1,
            group_end: 8,
            page: 0,
            ..extended_raw()
        };
        let tim = TimParams {
            dtim_period: 4,
            dtim_count: 0,
            partial_bitmap: 0,
        };
        let bytes = encode_elements(&raw, &tim).unwrap();
        let packed = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], 0]);
        assert_eq!(packed, (8 << 13) | (1 << 2));
    }

    #[test]
    fn slot_count_beyond_format_is_rejected() {
        let raw = RawParams {
            slot_count: 8,
            ..extended_raw()
        };
        let tim = TimParams {
            dtim_period: 1,
            dtim_count: 0,
            partial_bitmap: 0,
        };
        let err = encode_elements(&raw, &tim).unwrap_err();
        assert_eq!(
            err,
            CodecError::FieldOutOfRange {
                field: "slot_count",
                value: 8,
                bits: 3
            }
        );
    }

    #[test]
    fn duration_count_beyond_compact_format_is_rejected() {
        let raw = RawParams {
            slot_format: SlotFormat::Compact,
            slot_duration_count: 256,
            slot_count: 1,
            ..extended_raw()
        };
        let tim = TimParams {
            dtim_period: 1,
            dtim_count: 0,
            partial_bitmap: 0,
        };
        assert!(matches!(
            encode_elements(&raw, &tim),
            Err(CodecError::FieldOutOfRange {
                field: "slot_duration_count",
                ..
            })
        ));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let err = decode_elements(&[0u8; 7]).unwrap_err();
        assert_eq!(err, CodecError::Truncated { needed: 13, got: 7 });
    }
}
