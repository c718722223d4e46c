//! The compiled bytecode object (spec §3 "Bytecode object", §6 "build a
//! bytecode object" intake API).
//!
//! Grounded on spec §3/§6's field list and the teacher's
//! `compiler/src/codegen/program.rs` idea of collecting emitted
//! instructions and literals into one immutable artifact; the builder
//! shape (validate-then-produce-a-handle) matches `SPEC_FULL.md` §2.3's
//! description of this as the ambient "configuration/registration"
//! surface, parallel to `cmdrt_core::registry::TypeRegistry`.

use crate::error::DisassembleError;
use cmdrt_core::Value;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Loop,
    Catch,
}

/// One entry of `exceptions[]` (spec §3). Inner ranges are expected to
/// come first in the vector; `ByteCodeObject::exception_range_for`
/// relies on that ordering.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionRange {
    pub kind: ExceptionKind,
    pub nesting_level: u32,
    pub pc_start: usize,
    pub pc_end: usize,
    pub continue_pc: Option<usize>,
    pub break_pc: Option<usize>,
    pub catch_pc: Option<usize>,
}

/// Flags on one entry of `locals[]` (spec §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalFlags {
    pub argument: bool,
    pub temporary: bool,
    pub array: bool,
    pub link: bool,
    pub resolved: bool,
}

#[derive(Debug, Clone)]
pub struct LocalInfo {
    pub name: Option<Rc<str>>,
    pub flags: LocalFlags,
}

/// One `(pcStart, pcLen, srcStart, srcLen)` command-boundary entry,
/// already expanded from the delta-coded on-disk form (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CommandRange {
    pub pc_start: usize,
    pub pc_len: usize,
    pub src_start: usize,
    pub src_len: usize,
}

/// A typed side table entry referenced by `AUX4` operands (spec §3
/// "aux[]"). The payload is opaque to the bytecode object itself; only
/// the registered [`crate::aux::AuxType`] knows how to free/print it.
pub struct AuxEntry {
    pub type_name: &'static str,
    pub payload: Rc<dyn std::any::Any>,
}

/// Read-only once compiled (spec §3). Every field here mirrors a named
/// field from spec §3's "Bytecode object" paragraph.
pub struct ByteCodeObject {
    pub code: Vec<u8>,
    pub literals: Vec<Value>,
    pub locals: Vec<LocalInfo>,
    pub exceptions: Vec<ExceptionRange>,
    pub aux: Vec<AuxEntry>,
    pub commands: Vec<CommandRange>,
    pub num_commands: usize,
    pub max_stack_depth: usize,
    pub max_except_depth: usize,
    pub source: Option<String>,
    pub source_file: Option<String>,
    pub initial_line_number: Option<u32>,
    pub namespace: String,
    /// Monotonic identifier bumped each time this interpreter recompiles
    /// the routine this object belongs to (spec §3 `compileEpoch`);
    /// callers compare against their own cached copy to detect a stale
    /// bytecode object.
    pub compile_epoch: u64,
    /// An object built directly (not via the normal compiler pipeline)
    /// and marked non-disassemblable (spec §6).
    pub prebuilt: bool,
}

impl ByteCodeObject {
    /// First exception range, in source order, whose pc window contains
    /// `pc` at the given nesting level (spec §3: "the runtime picks the
    /// first whose pc window contains the raising pc at matching
    /// nesting level"; inner ranges come first in the vector, so a
    /// simple forward scan is correct).
    pub fn exception_range_for(&self, pc: usize, nesting_level: u32) -> Option<&ExceptionRange> {
        self.exceptions
            .iter()
            .find(|r| r.nesting_level == nesting_level && r.pc_start <= pc && pc < r.pc_end)
    }

    /// The command whose source range contains byte-offset `pos`, or
    /// `None` if `pos` falls in the prologue (spec §8: "for every pc ...
    /// the cmdMap either identifies exactly one containing command ...
    /// or none (prologue)").
    pub fn command_for_source_pos(&self, pos: usize) -> Option<&CommandRange> {
        self.commands
            .iter()
            .find(|c| c.src_start <= pos && pos < c.src_start + c.src_len)
    }

    /// The command whose pc range contains `pc`, or `None` for a
    /// prologue instruction.
    pub fn command_for_pc(&self, pc: usize) -> Option<&CommandRange> {
        self.commands
            .iter()
            .find(|c| c.pc_start <= pc && pc < c.pc_start + c.pc_len)
    }
}

/// Intake API for "build a bytecode object" (spec §6). Validates shape
/// before producing a handle, exactly as `SPEC_FULL.md` §2.3 describes:
/// locals count matches `locals[]` length, exception ranges are well
/// nested, cmdMap decodes.
#[derive(Default)]
pub struct ByteCodeBuilder {
    code: Vec<u8>,
    literals: Vec<Value>,
    locals: Vec<LocalInfo>,
    exceptions: Vec<ExceptionRange>,
    aux: Vec<AuxEntry>,
    commands: Vec<CommandRange>,
    max_stack_depth: usize,
    max_except_depth: usize,
    source: Option<String>,
    source_file: Option<String>,
    initial_line_number: Option<u32>,
    namespace: String,
    compile_epoch: u64,
    prebuilt: bool,
}

impl ByteCodeBuilder {
    pub fn new() -> Self {
        ByteCodeBuilder {
            namespace: "::".to_string(),
            ..Default::default()
        }
    }

    pub fn code(mut self, code: Vec<u8>) -> Self {
        self.code = code;
        self
    }

    pub fn literals(mut self, literals: Vec<Value>) -> Self {
        self.literals = literals;
        self
    }

    pub fn locals(mut self, locals: Vec<LocalInfo>) -> Self {
        self.locals = locals;
        self
    }

    pub fn exceptions(mut self, exceptions: Vec<ExceptionRange>) -> Self {
        self.exceptions = exceptions;
        self
    }

    pub fn aux(mut self, aux: Vec<AuxEntry>) -> Self {
        self.aux = aux;
        self
    }

    pub fn commands(mut self, commands: Vec<CommandRange>) -> Self {
        self.commands = commands;
        self
    }

    pub fn max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    pub fn max_except_depth(mut self, depth: usize) -> Self {
        self.max_except_depth = depth;
        self
    }

    pub fn source(mut self, source: impl Into<String>, file: Option<String>, line: Option<u32>) -> Self {
        self.source = Some(source.into());
        self.source_file = file;
        self.initial_line_number = line;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn compile_epoch(mut self, epoch: u64) -> Self {
        self.compile_epoch = epoch;
        self
    }

    pub fn prebuilt(mut self, prebuilt: bool) -> Self {
        self.prebuilt = prebuilt;
        self
    }

    /// Validate shape and produce a refcounted handle.
    pub fn build(self) -> Result<Rc<ByteCodeObject>, DisassembleError> {
        for range in &self.exceptions {
            if range.pc_start > range.pc_end || range.pc_end > self.code.len() {
                return Err(DisassembleError::MalformedExceptionRanges {
                    reason: format!(
                        "range [{}, {}) invalid for code of length {}",
                        range.pc_start,
                        range.pc_end,
                        self.code.len()
                    ),
                });
            }
        }
        // Inner-first ordering: an earlier exception range at the same
        // nesting level must not wrap a later one at that same level.
        for w in self.exceptions.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            if a.nesting_level == b.nesting_level && a.pc_start <= b.pc_start && a.pc_end >= b.pc_end {
                return Err(DisassembleError::MalformedExceptionRanges {
                    reason: "ranges at the same nesting level must not nest".to_string(),
                });
            }
        }

        let num_commands = self.commands.len();

        Ok(Rc::new(ByteCodeObject {
            code: self.code,
            literals: self.literals,
            locals: self.locals,
            exceptions: self.exceptions,
            aux: self.aux,
            commands: self.commands,
            num_commands,
            max_stack_depth: self.max_stack_depth,
            max_except_depth: self.max_except_depth,
            source: self.source,
            source_file: self.source_file,
            initial_line_number: self.initial_line_number,
            namespace: self.namespace,
            compile_epoch: self.compile_epoch,
            prebuilt: self.prebuilt,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_8_object_shape() {
        let obj = ByteCodeBuilder::new()
            .code(vec![0, 0, 4, 1, 18])
            .literals(vec![Value::new_string("hi")])
            .commands(vec![CommandRange {
                pc_start: 0,
                pc_len: 5,
                src_start: 0,
                src_len: 10,
            }])
            .max_stack_depth(1)
            .build()
            .unwrap();

        assert_eq!(obj.literals.len(), 1);
        assert_eq!(obj.literals[0].get_string(), "hi");
        assert_eq!(obj.max_stack_depth, 1);
        assert_eq!(obj.command_for_pc(2).unwrap().src_start, 0);
    }

    #[test]
    fn overlapping_same_level_ranges_rejected() {
        let result = ByteCodeBuilder::new()
            .code(vec![0u8; 10])
            .exceptions(vec![
                ExceptionRange {
                    kind: ExceptionKind::Loop,
                    nesting_level: 0,
                    pc_start: 0,
                    pc_end: 8,
                    continue_pc: None,
                    break_pc: None,
                    catch_pc: None,
                },
                ExceptionRange {
                    kind: ExceptionKind::Loop,
                    nesting_level: 0,
                    pc_start: 2,
                    pc_end: 6,
                    continue_pc: None,
                    break_pc: None,
                    catch_pc: None,
                },
            ])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn prebuilt_flag_is_carried() {
        let obj = ByteCodeBuilder::new().prebuilt(true).build().unwrap();
        assert!(obj.prebuilt);
    }
}
