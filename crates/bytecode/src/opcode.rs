//! Opcode table and operand decoding (spec §4.5).
//!
//! Grounded on `other_examples/ddad38cf_wilson-anysphere-formula__crates-
//! formula-engine-src-bytecode-program.rs.rs`'s packed-instruction
//! `OpCode` shape: a byte discriminant followed by fixed-width operand
//! fields, decoded by table lookup rather than a hand-written match per
//! opcode. Adapted here to spec §4.5's closed operand-signature set
//! (fourteen signatures) instead of formula-engine's two-fixed-field
//! layout. Doc-comment density on the table itself follows the
//! teacher's `compiler/src/codegen/state.rs` convention of a one-line
//! comment per table row.

use crate::error::DisassembleError;

/// The closed set of operand shapes an opcode may carry (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSignature {
    Int1,
    Uint1,
    Int4,
    Uint4,
    Offset1,
    Offset4,
    Lit1,
    Lit4,
    Aux4,
    Idx4,
    Lvt1,
    Lvt4,
    Scls1,
    None,
}

impl OperandSignature {
    /// Number of bytes the operand occupies in `code[]`, not counting
    /// the opcode byte itself.
    pub const fn operand_len(self) -> usize {
        match self {
            OperandSignature::Int1
            | OperandSignature::Uint1
            | OperandSignature::Offset1
            | OperandSignature::Lit1
            | OperandSignature::Lvt1
            | OperandSignature::Scls1 => 1,
            OperandSignature::Int4
            | OperandSignature::Uint4
            | OperandSignature::Offset4
            | OperandSignature::Lit4
            | OperandSignature::Aux4
            | OperandSignature::Idx4
            | OperandSignature::Lvt4 => 4,
            OperandSignature::None => 0,
        }
    }

    /// Whether the operand's integer value should be sign-extended when
    /// decoded (`IDX4`'s `-1`/`-2`/`-(n+2)` sentinels and `OFFSET*`
    /// branch deltas both need this; plain counts and indices don't).
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            OperandSignature::Int1
                | OperandSignature::Int4
                | OperandSignature::Offset1
                | OperandSignature::Offset4
                | OperandSignature::Idx4
        )
    }
}

/// One row of the opcode table: byte value, mnemonic, operand shape.
pub struct OpcodeInfo {
    pub byte: u8,
    pub name: &'static str,
    pub signature: OperandSignature,
}

macro_rules! opcode_table {
    ($($byte:expr => $name:literal, $sig:expr;)*) => {
        pub static OPCODES: &[OpcodeInfo] = &[
            $(OpcodeInfo { byte: $byte, name: $name, signature: $sig },)*
        ];
    };
}

use OperandSignature::*;

opcode_table! {
    0  => "push1",        Lit1;      // push literals[idx] (1-byte index)
    1  => "push4",        Lit4;      // push literals[idx] (4-byte index)
    2  => "pop",          None;      // discard top of stack
    3  => "dup",          None;      // duplicate top of stack
    4  => "invoke1",      Uint1;     // invoke command, N args (1-byte count)
    5  => "invoke4",      Uint4;     // invoke command, N args (4-byte count)
    6  => "jump1",        Offset1;   // unconditional relative jump
    7  => "jump4",        Offset4;   // unconditional relative jump, wide
    8  => "jumptrue1",    Offset1;   // jump if top of stack is true, pop
    9  => "jumpfalse1",   Offset1;   // jump if top of stack is false, pop
    10 => "loadscalar1",  Lvt1;      // push locals[idx] value
    11 => "loadscalar4",  Lvt4;      // push locals[idx] value, wide
    12 => "storescalar1", Lvt1;      // pop, store into locals[idx]
    13 => "storescalar4", Lvt4;      // pop, store into locals[idx], wide
    14 => "incrscalar1",  Lvt1;      // increment locals[idx] by top of stack
    15 => "listindex",    Idx4;      // index top-of-stack list by encoded index
    16 => "auxload",      Aux4;      // push value built from aux[idx]
    17 => "strclass",     Scls1;     // test top of stack against character class
    18 => "done",          None;      // end of bytecode
}

pub fn opcode_info(byte: u8) -> Option<&'static OpcodeInfo> {
    OPCODES.iter().find(|o| o.byte == byte)
}

pub fn opcode_by_name(name: &str) -> Option<&'static OpcodeInfo> {
    OPCODES.iter().find(|o| o.name == name)
}

/// A decoded instruction: its opcode, the raw operand value (already
/// sign-extended per [`OperandSignature::is_signed`] if applicable), and
/// the total byte length consumed from `code[]` (opcode byte +
/// operand).
pub struct Decoded {
    pub info: &'static OpcodeInfo,
    pub operand: i64,
    pub len: usize,
}

/// Decode one instruction starting at `code[pc]`. Operands are stored
/// big-endian, matching the `cmdMap` delta codec's own 4-byte escape
/// encoding (spec §4.5).
pub fn decode_instruction(code: &[u8], pc: usize) -> Result<Decoded, DisassembleError> {
    let byte = *code.get(pc).ok_or_else(|| DisassembleError::MalformedCmdMap {
        reason: format!("pc {pc} past end of code[]"),
    })?;
    let info = opcode_info(byte).ok_or_else(|| DisassembleError::MalformedCmdMap {
        reason: format!("unknown opcode byte {byte} at pc {pc}"),
    })?;
    let operand_len = info.signature.operand_len();
    let operand_bytes = code.get(pc + 1..pc + 1 + operand_len).ok_or_else(|| {
        DisassembleError::MalformedCmdMap {
            reason: format!("truncated operand for '{}' at pc {pc}", info.name),
        }
    })?;
    let operand = decode_operand(operand_bytes, info.signature);
    Ok(Decoded {
        info,
        operand,
        len: 1 + operand_len,
    })
}

fn decode_operand(bytes: &[u8], sig: OperandSignature) -> i64 {
    match bytes.len() {
        0 => 0,
        1 => {
            let v = bytes[0];
            if sig.is_signed() {
                v as i8 as i64
            } else {
                v as i64
            }
        }
        4 => {
            let v = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if sig.is_signed() {
                v as i32 as i64
            } else {
                v as i64
            }
        }
        _ => unreachable!("operand_len only ever produces 0, 1, or 4"),
    }
}

/// Encode an instruction's operand back to bytes, the inverse of
/// [`decode_operand`]. Used by tests and by anything that assembles
/// `code[]` directly rather than going through a compiler front-end.
pub fn encode_operand(value: i64, sig: OperandSignature) -> Vec<u8> {
    match sig.operand_len() {
        0 => Vec::new(),
        1 => vec![value as u8],
        4 => (value as u32).to_be_bytes().to_vec(),
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_push1_and_invoke1_and_done() {
        // PUSH_LIT 0; INVOKE 1; DONE -- spec §8 scenario 8.
        let code = [0u8, 0, 4, 1, 18];
        let a = decode_instruction(&code, 0).unwrap();
        assert_eq!(a.info.name, "push1");
        assert_eq!(a.operand, 0);
        assert_eq!(a.len, 2);

        let b = decode_instruction(&code, 2).unwrap();
        assert_eq!(b.info.name, "invoke1");
        assert_eq!(b.operand, 1);
        assert_eq!(b.len, 2);

        let c = decode_instruction(&code, 4).unwrap();
        assert_eq!(c.info.name, "done");
        assert_eq!(c.len, 1);
    }

    #[test]
    fn idx4_sentinel_minus_one_decodes_signed() {
        let bytes = encode_operand(-1, Idx4);
        assert_eq!(decode_operand(&bytes, Idx4), -1);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let code = [255u8];
        let err = decode_instruction(&code, 0).unwrap_err();
        assert!(matches!(err, DisassembleError::MalformedCmdMap { .. }));
    }
}
