//! Error type for the bytecode object model and disassembler.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DisassembleError {
    /// A bytecode object marked "prebuilt" was asked to disassemble
    /// itself (spec §6: returns `DISASSEMBLE BYTECODE`).
    #[error("disassembly not available for a prebuilt bytecode object")]
    Prebuilt,

    #[error("aux table index {index} out of range (len {len})")]
    BadAuxIndex { index: u32, len: usize },

    #[error("literal table index {index} out of range (len {len})")]
    BadLiteralIndex { index: u32, len: usize },

    #[error("malformed cmdMap: {reason}")]
    MalformedCmdMap { reason: String },

    #[error("compiled-local table index {index} out of range (len {len})")]
    BadLocalIndex { index: u32, len: usize },

    #[error("exception range table is malformed: {reason}")]
    MalformedExceptionRanges { reason: String },
}

impl DisassembleError {
    pub fn code(&self) -> &'static [&'static str] {
        match self {
            DisassembleError::Prebuilt => &["DISASSEMBLE", "BYTECODE"],
            DisassembleError::BadAuxIndex { .. } => &["DISASSEMBLE", "AUX"],
            DisassembleError::BadLiteralIndex { .. } => &["DISASSEMBLE", "LITERAL"],
            DisassembleError::MalformedCmdMap { .. } => &["DISASSEMBLE", "CMDMAP"],
            DisassembleError::BadLocalIndex { .. } => &["DISASSEMBLE", "LOCAL"],
            DisassembleError::MalformedExceptionRanges { .. } => &["DISASSEMBLE", "EXCEPTION"],
        }
    }
}
