//! # Annex B NAL Unit Scanner
//!
//! Splits one encoded H.264 frame into its NAL units. Units are delimited by
//! start codes `00 00 01` or `00 00 00 01`; the returned ranges exclude the
//! start codes. Bytes before the first start code do not belong to any unit
//! and are skipped.

use std::ops::Range;

/// Access unit delimiter.
pub const NAL_TYPE_AUD: u8 = 9;

/// Forbidden/unspecified type; never valid in a stream.
pub const NAL_TYPE_UNSPECIFIED: u8 = 0;

/// One NAL unit found in a frame buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaluRecord {
    /// Low 5 bits of the first payload byte, 0 for an empty unit.
    pub unit_type: u8,
    /// Payload range in the scanned buffer, start code excluded.
    pub range: Range<usize>,
}

impl NaluRecord {
    pub fn payload<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        &frame[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Lazy iterator over the NAL units of a buffer.
///
/// Every call to [`scan`] starts from scratch; nothing is shared between
/// scans.
#[derive(Debug, Clone)]
pub struct NaluScanner<'a> {
    data: &'a [u8],
    next_start: Option<usize>,
}

pub fn scan(data: &[u8]) -> NaluScanner<'_> {
    let next_start = find_start_code(data).map(|sc| sc.next);
    NaluScanner { data, next_start }
}

/// Location of a start code relative to the searched slice.
struct StartCode {
    /// Length of the unit that precedes the start code.
    prev_len: usize,
    /// First byte after the start code.
    next: usize,
}

/// Finds the first start code in `data`.
///
/// A 32-bit shift register holds the last four bytes. When its low 24 bits
/// read `00 00 01` the start code ends at the current byte; if the byte
/// before it is also zero the code is the 4-byte form and that zero is not
/// part of the preceding unit. The register starts all-ones so the first
/// bytes of the slice can never be mistaken for leading zeros.
fn find_start_code(data: &[u8]) -> Option<StartCode> {
    let mut window: u32 = 0xFFFF_FFFF;
    for (pos, &byte) in data.iter().enumerate() {
        window = (window << 8) | u32::from(byte);
        if window & 0x00FF_FFFF == 1 {
            let code_len = if window == 1 { 4 } else { 3 };
            return Some(StartCode {
                prev_len: pos + 1 - code_len,
                next: pos + 1,
            });
        }
    }
    None
}

impl Iterator for NaluScanner<'_> {
    type Item = NaluRecord;

    fn next(&mut self) -> Option<NaluRecord> {
        let start = self.next_start.take()?;
        let rest = self.data.get(start..)?;

        let end = match find_start_code(rest) {
            Some(sc) => {
                self.next_start = Some(start + sc.next);
                start + sc.prev_len
            }
            None => self.data.len(),
        };

        let unit_type = if end > start {
            self.data[start] & 0x1F
        } else {
            NAL_TYPE_UNSPECIFIED
        };

        Some(NaluRecord {
            unit_type,
            range: start..end,
        })
    }
}

impl std::iter::FusedIterator for NaluScanner<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(data: &[u8]) -> Vec<u8> {
        scan(data).map(|r| r.unit_type).collect()
    }

    #[test]
    fn three_byte_start_codes() {
        let data = [
            0x00, 0x00, 0x01, 0x67, 0xAA, // SPS
            0x00, 0x00, 0x01, 0x68, 0xBB, // PPS
            0x00, 0x00, 0x01, 0x65, 0xCC, 0xDD, // IDR
        ];
        let records: Vec<_> = scan(&data).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].payload(&data), &[0x67, 0xAA]);
        assert_eq!(records[1].payload(&data), &[0x68, 0xBB]);
        assert_eq!(records[2].payload(&data), &[0x65, 0xCC, 0xDD]);
        assert_eq!(types(&data), vec![7, 8, 5]);
    }

    #[test]
    fn four_byte_start_codes_do_not_leak_zero() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x09, 0xF0, // AUD
            0x00, 0x00, 0x00, 0x01, 0x41, 0x9A, // slice
        ];
        let records: Vec<_> = scan(&data).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payload(&data), &[0x09, 0xF0]);
        assert_eq!(records[1].payload(&data), &[0x41, 0x9A]);
    }

    #[test]
    fn mixed_start_code_lengths() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, // SPS, 4-byte
            0x00, 0x00, 0x01, 0x68, 0xCE, // PPS, 3-byte
            0x00, 0x00, 0x00, 0x01, 0x65, 0x88, // IDR, 4-byte
        ];
        let records: Vec<_> = scan(&data).collect();
        assert_eq!(records[0].range, 4..6);
        assert_eq!(records[1].range, 9..11);
        assert_eq!(records[2].range, 15..17);
    }

    #[test]
    fn leading_garbage_is_skipped() {
        let data = [0xDE, 0xAD, 0x00, 0x00, 0x01, 0x65, 0x01];
        let records: Vec<_> = scan(&data).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].range, 5..7);
    }

    #[test]
    fn no_start_code_yields_nothing() {
        assert_eq!(scan(&[]).count(), 0);
        assert_eq!(scan(&[0x65, 0x88, 0x84, 0x00]).count(), 0);
        assert_eq!(scan(&[0x00, 0x00]).count(), 0);
    }

    #[test]
    fn trailing_start_code_yields_empty_unit() {
        let data = [0x00, 0x00, 0x01, 0x41, 0x00, 0x00, 0x01];
        let records: Vec<_> = scan(&data).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].range, 7..7);
        assert!(records[1].is_empty());
        assert_eq!(records[1].unit_type, NAL_TYPE_UNSPECIFIED);
    }

    #[test]
    fn back_to_back_start_codes_yield_empty_unit() {
        let data = [0x00, 0x00, 0x01, 0x00, 0x00, 0x01, 0x65];
        let records: Vec<_> = scan(&data).collect();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_empty());
        assert_eq!(records[0].unit_type, NAL_TYPE_UNSPECIFIED);
        assert_eq!(records[1].unit_type, 5);
    }

    #[test]
    fn rescanning_is_independent() {
        let data = [0x00, 0x00, 0x01, 0x41, 0x00, 0x00, 0x01, 0x01];
        let first: Vec<_> = scan(&data).collect();
        let second: Vec<_> = scan(&data).collect();
        assert_eq!(first, second);
    }
}
