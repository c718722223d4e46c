//! `cmdMap` delta codec (spec §4.5): the one bit-exact on-disk format in
//! scope.
//!
//! Grounded on spec §4.5 directly and on `tclDisassemble.c`'s
//! `GetLocationFromPc`/command-location table encoding
//! (`examples/original_source/generic/tclDisassemble.c`), which walks
//! exactly this kind of delta-coded quad table to answer "which command
//! owns pc X".

use crate::error::DisassembleError;
use crate::object::CommandRange;

/// One raw `(codeOffsetDelta, codeLen, srcOffsetDelta, srcLen)` tuple,
/// as stored (deltas, not absolute offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdMapDelta {
    pub code_offset_delta: i32,
    pub code_len: i32,
    pub src_offset_delta: i32,
    pub src_len: i32,
}

const ESCAPE: u8 = 0xFF;

/// Encode one signed delta: 1 byte if it fits `i8`'s range, otherwise an
/// `0xFF` marker followed by a 4-byte big-endian `i32`. A value exactly
/// equal to `0xFF` (255) must take the escape form even though as an
/// unsigned byte it would "fit" — the boundary rule spec §8 calls out
/// explicitly exists so the decoder can always tell the two forms apart
/// by looking at the first byte alone.
fn encode_delta(out: &mut Vec<u8>, value: i32) {
    if value != i32::from(ESCAPE) && (i8::MIN as i32..=i8::MAX as i32).contains(&value) {
        out.push(value as i8 as u8);
    } else {
        out.push(ESCAPE);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

fn decode_delta(bytes: &[u8], pos: &mut usize) -> Result<i32, DisassembleError> {
    let first = *bytes.get(*pos).ok_or_else(|| DisassembleError::MalformedCmdMap {
        reason: "truncated cmdMap: expected a delta byte".to_string(),
    })?;
    if first == ESCAPE {
        let wide = bytes.get(*pos + 1..*pos + 5).ok_or_else(|| DisassembleError::MalformedCmdMap {
            reason: "truncated cmdMap: escape marker without 4 following bytes".to_string(),
        })?;
        *pos += 5;
        Ok(i32::from_be_bytes([wide[0], wide[1], wide[2], wide[3]]))
    } else {
        *pos += 1;
        Ok(first as i8 as i32)
    }
}

/// Encode a sequence of deltas into the on-disk byte form.
pub fn encode(deltas: &[CmdMapDelta]) -> Vec<u8> {
    let mut out = Vec::new();
    for d in deltas {
        encode_delta(&mut out, d.code_offset_delta);
        encode_delta(&mut out, d.code_len);
        encode_delta(&mut out, d.src_offset_delta);
        encode_delta(&mut out, d.src_len);
    }
    out
}

/// Decode the on-disk byte form back into deltas (the inverse of
/// [`encode`]; spec §8: "cmdMap delta codec is a bijection on the delta
/// domain").
pub fn decode(bytes: &[u8]) -> Result<Vec<CmdMapDelta>, DisassembleError> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let code_offset_delta = decode_delta(bytes, &mut pos)?;
        let code_len = decode_delta(bytes, &mut pos)?;
        let src_offset_delta = decode_delta(bytes, &mut pos)?;
        let src_len = decode_delta(bytes, &mut pos)?;
        out.push(CmdMapDelta {
            code_offset_delta,
            code_len,
            src_offset_delta,
            src_len,
        });
    }
    Ok(out)
}

/// Expand deltas into absolute `(pcStart, pcLen, srcStart, srcLen)`
/// command ranges by running sums (spec §3: "The absolute offsets are
/// reconstructed by running sums").
pub fn expand(deltas: &[CmdMapDelta]) -> Vec<CommandRange> {
    let mut pc = 0i64;
    let mut src = 0i64;
    let mut out = Vec::with_capacity(deltas.len());
    for d in deltas {
        pc += d.code_offset_delta as i64;
        src += d.src_offset_delta as i64;
        out.push(CommandRange {
            pc_start: pc as usize,
            pc_len: d.code_len as usize,
            src_start: src as usize,
            src_len: d.src_len as usize,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_7_roundtrip_with_escape_form() {
        let deltas = vec![
            CmdMapDelta {
                code_offset_delta: 3,
                code_len: 7,
                src_offset_delta: 0,
                src_len: 12,
            },
            CmdMapDelta {
                code_offset_delta: 0xFF,
                code_len: 300,
                src_offset_delta: 0xFF,
                src_len: 1000,
            },
            CmdMapDelta {
                code_offset_delta: 2,
                code_len: 4,
                src_offset_delta: 15,
                src_len: 3,
            },
        ];

        let bytes = encode(&deltas);
        // First tuple is 4 plain bytes (indices 0..4); the middle
        // tuple's first field (0xFF) must take the 5-byte escape form
        // starting right after.
        assert_eq!(bytes[4], ESCAPE);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, deltas);
    }

    #[test]
    fn value_255_always_escapes_even_though_it_fits_a_byte() {
        let mut out = Vec::new();
        encode_delta(&mut out, 0xFF);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], ESCAPE);
    }

    #[test]
    fn expand_runs_sums_from_deltas() {
        let deltas = vec![
            CmdMapDelta {
                code_offset_delta: 0,
                code_len: 2,
                src_offset_delta: 0,
                src_len: 10,
            },
            CmdMapDelta {
                code_offset_delta: 2,
                code_len: 2,
                src_offset_delta: 10,
                src_len: 5,
            },
        ];
        let ranges = expand(&deltas);
        assert_eq!(ranges[0].pc_start, 0);
        assert_eq!(ranges[1].pc_start, 2);
        assert_eq!(ranges[1].src_start, 10);
    }
}
