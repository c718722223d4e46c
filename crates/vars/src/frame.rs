//! Activation frame (spec §3 "Activation frame", §4.2).
//!
//! Grounded on the teacher's `runtime/src/closures.rs` `Closure { fn_ptr,
//! env: Arc<[Value]> }` / environment-chain shape: a fixed-size captured
//! slot array plus a back-link. Generalized from "closure env slot" to
//! the richer record spec §3 describes: compiled-local fast slots, a
//! shared name cache, and an optional dynamic table for names introduced
//! at runtime (`global`, `upvar`, `variable`).

use crate::cell::VarCell;
use crate::namespace::Namespace;
use crate::table::TombstoneMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Maps a compiled-local slot index to its source-level name. Shared
/// across every live activation of the same compiled routine (spec §3:
/// "separately refcounted, shared across all frames of the same
/// routine").
pub struct LocalCache {
    pub names: Vec<Option<Rc<str>>>,
}

impl LocalCache {
    pub fn new(names: Vec<Option<Rc<str>>>) -> Rc<LocalCache> {
        Rc::new(LocalCache { names })
    }

    pub fn name_of(&self, slot: usize) -> Option<&str> {
        self.names.get(slot).and_then(|n| n.as_deref())
    }
}

pub struct Frame {
    pub namespace: Rc<RefCell<Namespace>>,
    pub num_compiled_locals: usize,
    /// The fast slots themselves. `None` until a local is first touched
    /// (lazily materialized, matching spec §3's "array of that many
    /// Variable cells").
    pub compiled_locals: Vec<Option<Rc<RefCell<VarCell>>>>,
    pub local_cache: Rc<LocalCache>,
    pub caller: Option<Rc<RefCell<Frame>>>,
    /// Dynamic table for variables introduced by name at runtime
    /// (`global`, `upvar`, `variable`) rather than by compiled-local
    /// index.
    pub dynamic: TombstoneMap<String, Rc<RefCell<VarCell>>>,
}

impl Frame {
    pub fn new(
        namespace: Rc<RefCell<Namespace>>,
        local_cache: Rc<LocalCache>,
        caller: Option<Rc<RefCell<Frame>>>,
    ) -> Frame {
        let num_compiled_locals = local_cache.names.len();
        Frame {
            namespace,
            num_compiled_locals,
            compiled_locals: vec![None; num_compiled_locals],
            local_cache,
            caller,
            dynamic: TombstoneMap::new(),
        }
    }

    /// Fetch (creating if absent) the compiled-local cell at `slot`.
    pub fn compiled_local(&mut self, slot: usize) -> Rc<RefCell<VarCell>> {
        if self.compiled_locals[slot].is_none() {
            self.compiled_locals[slot] = Some(Rc::new(RefCell::new(VarCell::new_scalar())));
        }
        self.compiled_locals[slot].clone().unwrap()
    }

    /// Resolve a compiled-local slot by name via the shared cache, for
    /// the uncommon case a caller has a name instead of an index
    /// (introspection, error messages).
    pub fn slot_for_name(&self, name: &str) -> Option<usize> {
        self.local_cache
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))
    }

    /// Find-or-create a dynamically-introduced variable by name.
    pub fn dynamic_var(&mut self, name: &str) -> Rc<RefCell<VarCell>> {
        if let Some(existing) = self.dynamic.get(&name.to_string()) {
            return existing.clone();
        }
        let cell = Rc::new(RefCell::new(VarCell::new_scalar()));
        self.dynamic.insert(name.to_string(), cell.clone());
        cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    #[test]
    fn compiled_local_is_lazily_created_once() {
        let root = Namespace::new_root();
        let cache = LocalCache::new(vec![Some(Rc::from("x"))]);
        let mut frame = Frame::new(root, cache, None);
        let a = frame.compiled_local(0);
        let b = frame.compiled_local(0);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn dynamic_var_is_found_or_created() {
        let root = Namespace::new_root();
        let cache = LocalCache::new(vec![]);
        let mut frame = Frame::new(root, cache, None);
        let a = frame.dynamic_var("g");
        let b = frame.dynamic_var("g");
        assert!(Rc::ptr_eq(&a, &b));
    }
}
