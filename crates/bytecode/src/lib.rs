pub mod aux;
pub mod cmdmap;
pub mod disasm;
pub mod error;
pub mod object;
pub mod opcode;

pub use aux::{AuxRegistry, AuxType};
pub use cmdmap::CmdMapDelta;
pub use disasm::{disassemble_dict, disassemble_text, DisasmDict, DisasmSink};
pub use error::DisassembleError;
pub use object::{
    AuxEntry, ByteCodeBuilder, ByteCodeObject, CommandRange, ExceptionKind, ExceptionRange,
    LocalFlags, LocalInfo,
};
pub use opcode::{decode_instruction, encode_operand, opcode_by_name, opcode_info, Decoded, OpcodeInfo, OperandSignature};
