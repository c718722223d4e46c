//! Variable cell: the unit the engine reads, writes, links to and
//! traces (spec §3 "Variable cell").
//!
//! Grounded on the teacher's captured-environment cell shape
//! (`examples/navicore-cem3/crates/runtime/src/closures.rs`'s
//! `Closure { fn_ptr, env: Arc<[Value]> }`): a shared, clonable handle
//! wrapping a small enum of storage kinds. Generalized here from "one
//! closure's captured slot" to the four kinds spec §3 requires.

use crate::table::TombstoneMap;
use crate::trace::Trace;
use cmdrt_core::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Disjoint storage kinds a [`VarCell`] can hold.
pub enum CellKind {
    Scalar(Option<Value>),
    Array(ArrayData),
    /// Redirect to another cell. Holds a strong reference to the target
    /// so the target outlives the link (spec §3 "the link tracks the
    /// target via a strong reference").
    Link(Rc<RefCell<VarCell>>),
    /// A scalar that has been written exactly once and refuses further
    /// writes/unsets (spec §3, §8).
    Constant(Value),
}

pub struct ArrayData {
    pub elements: TombstoneMap<String, Rc<RefCell<VarCell>>>,
    /// Shared default; reads of missing elements fall back to this
    /// (spec §4.4 "array default law").
    pub default: Option<Value>,
    /// Outstanding search handles, so deleting the array can invalidate
    /// all of them at once (spec §4.4 "deleting the array deletes all
    /// its searches"). Grounded on `tclVar.c`'s `ArrayVarHashTable`
    /// back-pointer, adapted to a per-cell registry instead of a global
    /// table since nothing else needs to reach an array from its name.
    pub searches: Vec<Rc<RefCell<crate::array::ArraySearch>>>,
}

impl ArrayData {
    pub fn new() -> Self {
        ArrayData {
            elements: TombstoneMap::new(),
            default: None,
            searches: Vec::new(),
        }
    }
}

impl Default for ArrayData {
    fn default() -> Self {
        Self::new()
    }
}

bitflags::bitflags! {
    /// Bits every cell carries regardless of kind (spec §3).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        /// Cell lives in a hash table entry (frame-dynamic table or
        /// namespace table); deletion must free the table entry too.
        const IN_HASHTABLE = 1 << 0;
        /// Cell belongs to a namespace rather than an activation frame;
        /// affects teardown order (`Namespace::teardown`).
        const NAMESPACE_VAR = 1 << 1;
        /// Cell exists only because something still observes it (a
        /// trace list or an incoming link) even though it holds no
        /// value.
        const UNDEFINED_BUT_LIVE = 1 << 2;
    }
}

pub struct VarCell {
    pub kind: CellKind,
    pub flags: CellFlags,
    pub traces: Vec<Trace>,
}

impl VarCell {
    pub fn new_scalar() -> VarCell {
        VarCell {
            kind: CellKind::Scalar(None),
            flags: CellFlags::empty(),
            traces: Vec::new(),
        }
    }

    pub fn new_array() -> VarCell {
        VarCell {
            kind: CellKind::Array(ArrayData::new()),
            flags: CellFlags::empty(),
            traces: Vec::new(),
        }
    }

    pub fn new_link(target: Rc<RefCell<VarCell>>) -> VarCell {
        VarCell {
            kind: CellKind::Link(target),
            flags: CellFlags::empty(),
            traces: Vec::new(),
        }
    }

    pub fn new_constant(value: Value) -> VarCell {
        VarCell {
            kind: CellKind::Constant(value),
            flags: CellFlags::empty(),
            traces: Vec::new(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.kind, CellKind::Scalar(None))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, CellKind::Constant(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, CellKind::Array(_))
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, CellKind::Link(_))
    }

    /// Whether the cell is eligible for reclamation: undefined, no
    /// traces, and not pinned live by something still observing it
    /// (spec §4.3 "after traces complete...").
    pub fn is_reclaimable(&self) -> bool {
        self.is_undefined()
            && self.traces.is_empty()
            && !self.flags.contains(CellFlags::UNDEFINED_BUT_LIVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_scalar_is_undefined() {
        let c = VarCell::new_scalar();
        assert!(c.is_undefined());
        assert!(c.is_reclaimable());
    }

    #[test]
    fn constant_is_not_undefined_or_reclaimable() {
        let c = VarCell::new_constant(Value::new_string("42"));
        assert!(!c.is_undefined());
        assert!(c.is_constant());
    }

    #[test]
    fn array_default_roundtrip() {
        let mut c = VarCell::new_array();
        if let CellKind::Array(data) = &mut c.kind {
            data.default = Some(Value::new_string("D"));
        }
        if let CellKind::Array(data) = &c.kind {
            assert_eq!(data.default.as_ref().unwrap().get_string(), "D");
        } else {
            panic!("expected array");
        }
    }
}
