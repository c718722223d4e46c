//! Namespace: hierarchical scope (spec §3 "Namespace", §4.6).
//!
//! No direct teacher analogue exists for a hierarchical scope; grounded
//! on spec §3/§4.6 directly, and on the teacher's epoch-counter-on-
//! structural-change idiom used for its scheduler generation counters
//! (`examples/navicore-cem3/crates/runtime/src/scheduler.rs`), applied
//! here to "bump an epoch whenever a resolver or child structure
//! changes, so cached lookups know to recheck" (spec §4.6).

use crate::cell::VarCell;
use crate::table::TombstoneMap;
use crate::trace::{dispatch_unset, cell_id, ReentrancyGuard};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Resolver callback invoked during name lookup before the default
/// search rules run (spec §6 "attach a variable resolver").
pub type VarResolver = Rc<dyn Fn(&str) -> Option<Rc<RefCell<VarCell>>>>;

thread_local! {
    /// Mints `Namespace::id` (spec §4.6: "a per-thread counter used to
    /// mint unique namespace IDs; deliberately thread-local because
    /// Values can migrate between interpreters on the same thread but
    /// not across threads"). Separate counter from `ops.rs`'s
    /// `NEXT_SEARCH_ID` — the two ID spaces are unrelated.
    static NEXT_NAMESPACE_ID: Cell<u64> = const { Cell::new(1) };
}

fn next_namespace_id() -> u64 {
    NEXT_NAMESPACE_ID.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
    })
}

pub struct Namespace {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub parent: Option<Weak<RefCell<Namespace>>>,
    pub children: TombstoneMap<String, Rc<RefCell<Namespace>>>,
    pub vars: TombstoneMap<String, Rc<RefCell<VarCell>>>,
    /// Monotonic counter bumped on any structural change (resolver
    /// attached/detached, child created/deleted). Lookup caches key on
    /// this value (spec §4.6).
    pub epoch: u64,
    resolver: Option<VarResolver>,
}

impl Namespace {
    pub fn new_root() -> Rc<RefCell<Namespace>> {
        Rc::new(RefCell::new(Namespace {
            id: next_namespace_id(),
            name: "::".to_string(),
            full_name: "::".to_string(),
            parent: None,
            children: TombstoneMap::new(),
            vars: TombstoneMap::new(),
            epoch: 0,
            resolver: None,
        }))
    }

    fn bump_epoch(&mut self) {
        self.epoch += 1;
        tracing::trace!(namespace = %self.full_name, epoch = self.epoch, "namespace epoch bumped");
    }

    /// Create (or return, if it already exists) a direct child
    /// namespace named `name`.
    pub fn ensure_child(parent: &Rc<RefCell<Namespace>>, name: &str) -> Rc<RefCell<Namespace>> {
        if let Some(existing) = parent.borrow().children.get(&name.to_string()) {
            return existing.clone();
        }
        let full_name = {
            let p = parent.borrow();
            if p.full_name == "::" {
                format!("::{name}")
            } else {
                format!("{}::{name}", p.full_name)
            }
        };
        let child = Rc::new(RefCell::new(Namespace {
            id: next_namespace_id(),
            name: name.to_string(),
            full_name,
            parent: Some(Rc::downgrade(parent)),
            children: TombstoneMap::new(),
            vars: TombstoneMap::new(),
            epoch: 0,
            resolver: None,
        }));
        let mut p = parent.borrow_mut();
        p.children.insert(name.to_string(), child.clone());
        p.bump_epoch();
        child
    }

    pub fn set_resolver(&mut self, resolver: Option<VarResolver>) {
        self.resolver = resolver;
        self.bump_epoch();
    }

    pub fn resolver(&self) -> Option<&VarResolver> {
        self.resolver.as_ref()
    }

    /// Find-or-create a namespace-scoped variable cell.
    pub fn var(&mut self, name: &str) -> Rc<RefCell<VarCell>> {
        if let Some(existing) = self.vars.get(&name.to_string()) {
            return existing.clone();
        }
        let mut cell = VarCell::new_scalar();
        cell.flags |= crate::cell::CellFlags::NAMESPACE_VAR | crate::cell::CellFlags::IN_HASHTABLE;
        let cell = Rc::new(RefCell::new(cell));
        self.vars.insert(name.to_string(), cell.clone());
        cell
    }

    /// Tear down this namespace's variables and then its children,
    /// running unset traces first, exactly in the order
    /// `TclDeleteNamespaceVars` uses (`examples/original_source/generic/
    /// tclVar.c`): unset-traces-first, then recurse into children, then
    /// free the hash table. This ordering is externally observable (a
    /// trace can see sibling variables still present during its own
    /// unset), so it is preserved rather than torn down bottom-up.
    pub fn teardown(ns: &Rc<RefCell<Namespace>>, guard: &ReentrancyGuard) {
        let var_cells: Vec<(String, Rc<RefCell<VarCell>>)> = {
            let n = ns.borrow();
            n.vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        for (name, cell) in &var_cells {
            let id = cell_id(cell);
            let traces = cell.borrow().traces.clone();
            let _ = dispatch_unset(guard, id, &traces, name);
        }
        let child_namespaces: Vec<Rc<RefCell<Namespace>>> = {
            let n = ns.borrow();
            n.children.iter().map(|(_, c)| c.clone()).collect()
        };
        for child in &child_namespaces {
            Namespace::teardown(child, guard);
        }
        let mut n = ns.borrow_mut();
        for (name, _) in &var_cells {
            n.vars.remove(name);
        }
        n.vars.compact();
        n.children.compact();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_namespace_gets_qualified_name() {
        let root = Namespace::new_root();
        let child = Namespace::ensure_child(&root, "foo");
        assert_eq!(child.borrow().full_name, "::foo");
        let grandchild = Namespace::ensure_child(&child, "bar");
        assert_eq!(grandchild.borrow().full_name, "::foo::bar");
    }

    #[test]
    fn namespaces_get_distinct_increasing_ids() {
        let root = Namespace::new_root();
        let child = Namespace::ensure_child(&root, "foo");
        let grandchild = Namespace::ensure_child(&child, "bar");
        assert!(child.borrow().id > root.borrow().id);
        assert!(grandchild.borrow().id > child.borrow().id);
    }

    #[test]
    fn creating_child_bumps_parent_epoch() {
        let root = Namespace::new_root();
        let before = root.borrow().epoch;
        Namespace::ensure_child(&root, "foo");
        assert!(root.borrow().epoch > before);
    }

    #[test]
    fn teardown_runs_unset_traces_before_freeing() {
        use crate::trace::{Trace, TraceMask, TraceEvent};
        use std::cell::RefCell as StdRefCell;

        let root = Namespace::new_root();
        let cell = root.borrow_mut().var("x");
        let seen = Rc::new(StdRefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let cb: Rc<dyn Fn(TraceEvent) -> Result<(), crate::error::VarError>> =
            Rc::new(move |ev| {
                if let TraceEvent::Unset { name } = ev {
                    seen2.borrow_mut().push(name.to_string());
                }
                Ok(())
            });
        cell.borrow_mut().traces.push(Trace::new(TraceMask::UNSET, cb));

        let guard = ReentrancyGuard::new();
        Namespace::teardown(&root, &guard);
        assert_eq!(*seen.borrow(), vec!["x".to_string()]);
        assert_eq!(root.borrow().vars.len(), 0);
    }
}
