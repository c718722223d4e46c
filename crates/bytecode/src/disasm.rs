//! Disassembler: structural dump of a bytecode object as text or a
//! structured dictionary (spec §4.5, §6, §9).
//!
//! Grounded on spec §9's explicit note ("the disassembler's text and
//! dictionary paths share almost all logic but diverge in output shape.
//! Factor as a single visitor that emits events... with two sinks") and
//! on `tclDisassemble.c`'s instruction-printing loop
//! (`examples/original_source/generic/tclDisassemble.c`), which walks
//! `code[]` exactly once and dispatches to either a `Tcl_Obj` append (the
//! analogue of our `DictSink`) or `fprintf`-style text (our `TextSink`).

use crate::error::DisassembleError;
use crate::object::{ByteCodeObject, CommandRange};
use crate::opcode::decode_instruction;
use std::collections::BTreeMap;

/// Events the walk emits, in order, once per instruction:
/// `begin_instruction`, zero or more `operand`/`suffix` pairs, then
/// `end_instruction`.
pub trait DisasmSink {
    fn begin_instruction(&mut self, pc: usize, name: &str, in_prologue: bool);
    fn operand(&mut self, raw: i64);
    fn suffix(&mut self, text: &str);
    fn end_instruction(&mut self);
}

/// Walk every instruction in `obj.code`, emitting events to `sink`.
/// Shared by both the text and dictionary disassemblers (spec §9).
pub fn walk(obj: &ByteCodeObject, sink: &mut dyn DisasmSink) -> Result<(), DisassembleError> {
    if obj.prebuilt {
        return Err(DisassembleError::Prebuilt);
    }

    let first_command_pc = obj.commands.iter().map(|c| c.pc_start).min();

    let mut pc = 0usize;
    while pc < obj.code.len() {
        let decoded = decode_instruction(&obj.code, pc)?;
        let in_prologue = match first_command_pc {
            Some(start) => pc < start,
            None => true,
        };
        sink.begin_instruction(pc, decoded.info.name, in_prologue);
        if decoded.info.signature != crate::opcode::OperandSignature::None {
            sink.operand(decoded.operand);
            sink.suffix(&operand_suffix(obj, decoded.info.signature, decoded.operand));
        }
        sink.end_instruction();
        pc += decoded.len;
    }

    if obj.code.len() > 64 {
        tracing::debug!(instructions = obj.code.len(), "disassembled large bytecode object");
    }

    Ok(())
}

fn operand_suffix(
    obj: &ByteCodeObject,
    sig: crate::opcode::OperandSignature,
    operand: i64,
) -> String {
    use crate::opcode::OperandSignature::*;
    match sig {
        Lit1 | Lit4 => obj
            .literals
            .get(operand as usize)
            .map(|v| escape_source(&v.get_string(), usize::MAX))
            .unwrap_or_default(),
        Lvt1 | Lvt4 => obj
            .locals
            .get(operand as usize)
            .and_then(|l| l.name.as_deref())
            .unwrap_or("%unnamed%")
            .to_string(),
        _ => String::new(),
    }
}

/// Apply spec §4.5's source-escaping rules to a string, truncating to
/// `max_len` bytes with a trailing `...` marker if needed.
pub fn escape_source(s: &str, max_len: usize) -> String {
    let mut out = String::new();
    let mut truncated = false;
    for (i, ch) in s.chars().enumerate() {
        if i >= max_len {
            truncated = true;
            break;
        }
        match ch {
            '"' => out.push_str("\\\""),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{000B}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || (0x7F..=0xFFFF).contains(&(c as u32)) => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c if (c as u32) > 0xFFFF => {
                out.push_str(&format!("\\U{:08X}", c as u32));
            }
            c => out.push(c),
        }
    }
    if truncated {
        out.push_str("...");
    }
    out
}

/// Text sink: one instruction per line, `<prologue>` label on
/// instructions preceding the first command's cmdMap entry (spec §3 of
/// `SPEC_FULL.md`).
pub struct TextSink {
    out: String,
    current_pc: usize,
}

impl TextSink {
    pub fn new() -> Self {
        TextSink {
            out: String::new(),
            current_pc: 0,
        }
    }

    pub fn into_text(self) -> String {
        self.out
    }
}

impl Default for TextSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DisasmSink for TextSink {
    fn begin_instruction(&mut self, pc: usize, name: &str, in_prologue: bool) {
        self.current_pc = pc;
        if in_prologue {
            self.out.push_str(&format!("{pc:06} <prologue> {name}"));
        } else {
            self.out.push_str(&format!("{pc:06} {name}"));
        }
    }

    fn operand(&mut self, raw: i64) {
        self.out.push_str(&format!(" {raw}"));
    }

    fn suffix(&mut self, text: &str) {
        if !text.is_empty() {
            self.out.push_str(&format!(" # \"{text}\""));
        }
    }

    fn end_instruction(&mut self) {
        self.out.push('\n');
        let _ = self.current_pc;
    }
}

/// Structured dictionary form of a disassembled bytecode object (spec
/// §4.5's "structured dictionary Value").
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DisasmDict {
    pub literals: Vec<String>,
    pub variables: Vec<String>,
    pub exception: Vec<String>,
    /// Keyed by pc; each entry is `[opcodeName, operand?, ...]` matching
    /// spec §8 scenario 8's `{0→["push1",0], 2→["invoke1",1], 4→["done"]}`
    /// shape.
    pub instructions: BTreeMap<usize, Vec<String>>,
    pub auxiliary: Vec<String>,
    /// Commands in source order; prologue instructions are never
    /// represented here (spec §3 of `SPEC_FULL.md`).
    pub commands: Vec<CommandRange>,
    pub script: Option<String>,
    pub namespace: String,
    pub stackdepth: usize,
    pub exceptdepth: usize,
    pub sourcefile: Option<String>,
    pub initiallinenumber: Option<u32>,
}

struct DictSink {
    instructions: BTreeMap<usize, Vec<String>>,
    current_pc: usize,
    current_row: Vec<String>,
}

impl DictSink {
    fn new() -> Self {
        DictSink {
            instructions: BTreeMap::new(),
            current_pc: 0,
            current_row: Vec::new(),
        }
    }
}

impl DisasmSink for DictSink {
    fn begin_instruction(&mut self, pc: usize, name: &str, _in_prologue: bool) {
        self.current_pc = pc;
        self.current_row = vec![name.to_string()];
    }

    fn operand(&mut self, raw: i64) {
        self.current_row.push(raw.to_string());
    }

    fn suffix(&mut self, _text: &str) {
        // the dictionary form's instruction row carries only the raw
        // operand, matching spec §8 scenario 8's literal expected shape;
        // the resolved suffix is available separately via `literals`.
    }

    fn end_instruction(&mut self) {
        let row = std::mem::take(&mut self.current_row);
        self.instructions.insert(self.current_pc, row);
    }
}

/// Render `obj` as the `<prologue>`-labeled text form.
pub fn disassemble_text(obj: &ByteCodeObject) -> Result<String, DisassembleError> {
    let mut sink = TextSink::new();
    walk(obj, &mut sink)?;
    Ok(sink.into_text())
}

/// Render `obj` as the structured dictionary form.
pub fn disassemble_dict(obj: &ByteCodeObject) -> Result<DisasmDict, DisassembleError> {
    let mut sink = DictSink::new();
    walk(obj, &mut sink)?;

    Ok(DisasmDict {
        literals: obj.literals.iter().map(|v| v.get_string()).collect(),
        variables: obj
            .locals
            .iter()
            .filter_map(|l| l.name.as_deref().map(|s| s.to_string()))
            .collect(),
        exception: obj.exceptions.iter().map(|r| format!("{r:?}")).collect(),
        instructions: sink.instructions,
        auxiliary: obj.aux.iter().map(|a| a.type_name.to_string()).collect(),
        commands: obj.commands.clone(),
        script: obj.source.clone(),
        namespace: obj.namespace.clone(),
        stackdepth: obj.max_stack_depth,
        exceptdepth: obj.max_except_depth,
        sourcefile: obj.source_file.clone(),
        initiallinenumber: obj.initial_line_number,
    })
}
