//! Trace dispatch (spec §4.3).
//!
//! No teacher analogue exists for this (the teacher has no observer/
//! trace concept); grounded directly on spec §4.3 and §9's explicit
//! re-architecture note: "a per-dispatch reentrancy set passed through
//! the call chain, avoiding the mutable bit" the original C uses. We
//! implement that literally as [`ReentrancyGuard`], a `HashSet<CellId>`
//! an interpreter-equivalent owns and threads into every dispatch call,
//! rather than a `Cell<bool>` on the cell itself (which would need
//! careful resetting across a trace body that panics/unwinds).

use crate::cell::VarCell;
use crate::error::VarError;
use cmdrt_core::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

pub type CellId = usize;

pub fn cell_id(cell: &Rc<RefCell<VarCell>>) -> CellId {
    Rc::as_ptr(cell) as usize
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TraceMask: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const UNSET = 1 << 2;
        const ARRAY = 1 << 3;
    }
}

/// What a trace callback observes.
pub enum TraceEvent<'a> {
    Read { name: &'a str },
    Write { name: &'a str, value: &'a Value },
    Unset { name: &'a str },
    ArrayElement { name: &'a str, element: &'a str },
}

/// A single registered observer. `callback` is `Rc` (not `Box`) because
/// the same trace closure is frequently shared across every element of
/// an array-level trace.
#[derive(Clone)]
pub struct Trace {
    pub mask: TraceMask,
    pub callback: Rc<dyn Fn(TraceEvent) -> Result<(), VarError>>,
}

impl Trace {
    pub fn new(mask: TraceMask, callback: Rc<dyn Fn(TraceEvent) -> Result<(), VarError>>) -> Trace {
        Trace { mask, callback }
    }
}

/// Per-interpreter reentrancy tracking for trace dispatch (spec §4.3:
/// "a cell marked *trace active* ignores nested traces for the same
/// cell").
#[derive(Default)]
pub struct ReentrancyGuard {
    active: RefCell<HashSet<CellId>>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        ReentrancyGuard::default()
    }

    /// Run `f` guarded against reentrant dispatch on `id`. Returns
    /// `None` (and never calls `f`) if `id` is already active — this is
    /// the "nested trace suppressed" case, not an error.
    pub fn run<R>(&self, id: CellId, f: impl FnOnce() -> R) -> Option<R> {
        if !self.active.borrow_mut().insert(id) {
            tracing::trace!(cell = id, "trace dispatch suppressed: reentrant");
            return None;
        }
        let result = f();
        self.active.borrow_mut().remove(&id);
        Some(result)
    }

    pub fn is_active(&self, id: CellId) -> bool {
        self.active.borrow().contains(&id)
    }
}

/// Traces registered in registration order (oldest first). Read fires
/// innermost (most-recently-registered) first, so reversed; write fires
/// in registration order; unset fires outermost (oldest) first, same
/// direction as registration (spec §4.3).
pub fn dispatch_read(
    guard: &ReentrancyGuard,
    id: CellId,
    traces: &[Trace],
    name: &str,
) -> Result<(), VarError> {
    guard
        .run(id, || {
            for t in traces.iter().rev() {
                if t.mask.contains(TraceMask::READ) {
                    (t.callback)(TraceEvent::Read { name })?;
                }
            }
            Ok(())
        })
        .unwrap_or(Ok(()))
}

pub fn dispatch_write(
    guard: &ReentrancyGuard,
    id: CellId,
    traces: &[Trace],
    name: &str,
    value: &Value,
) -> Result<(), VarError> {
    guard
        .run(id, || {
            for t in traces.iter() {
                if t.mask.contains(TraceMask::WRITE) {
                    (t.callback)(TraceEvent::Write { name, value })?;
                }
            }
            Ok(())
        })
        .unwrap_or(Ok(()))
}

/// Unset traces always run in full even if dispatch is nested (spec
/// §4.3: "unset must always run every trace"), so this one bypasses the
/// reentrancy guard's suppression and only uses it to flag activity for
/// nested read/write traces the unset body might itself trigger.
pub fn dispatch_unset(
    guard: &ReentrancyGuard,
    id: CellId,
    traces: &[Trace],
    name: &str,
) -> Result<(), VarError> {
    let was_active = guard.is_active(id);
    if !was_active {
        guard.active.borrow_mut().insert(id);
    }
    let mut first_err = None;
    for t in traces.iter() {
        if t.mask.contains(TraceMask::UNSET) {
            if let Err(e) = (t.callback)(TraceEvent::Unset { name }) {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }
    if !was_active {
        guard.active.borrow_mut().remove(&id);
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrant_dispatch_is_suppressed() {
        let guard = ReentrancyGuard::new();
        let id = 1;
        let outer = guard.run(id, || {
            let inner = guard.run(id, || "inner ran");
            assert!(inner.is_none());
            "outer ran"
        });
        assert_eq!(outer, Some("outer ran"));
        assert!(!guard.is_active(id));
    }

    #[test]
    fn write_trace_log_matches_scenario_5() {
        let guard = ReentrancyGuard::new();
        let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let log2 = log.clone();
        let cb: Rc<dyn Fn(TraceEvent) -> Result<(), VarError>> = Rc::new(move |ev| {
            if let TraceEvent::Write { value, .. } = ev {
                log2.borrow_mut().push(value.get_string());
            }
            Ok(())
        });
        let traces = vec![Trace::new(TraceMask::WRITE, cb)];
        let id = 42;

        dispatch_write(&guard, id, &traces, "x", &Value::new_string("a")).unwrap();
        // simulate a trace that itself calls set(x, ...) recursively on
        // the same cell: the inner dispatch is suppressed.
        guard
            .run(id, || {
                dispatch_write(&guard, id, &traces, "x", &Value::new_string("suppressed")).unwrap();
            })
            .unwrap();
        dispatch_write(&guard, id, &traces, "x", &Value::new_string("b")).unwrap();

        assert_eq!(*log.borrow(), vec!["a".to_string(), "b".to_string()]);
    }
}
