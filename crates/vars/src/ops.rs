//! Variable cell operations: the verb set spec §4.2 exposes
//! (`lookup/get/set/unset/incr/upvar`), parameterized by flags.
//!
//! Grounded on `tclVar.c`'s `TclLookupVar`/`TclPtrGetVar`/`TclPtrSetVar`/
//! `TclPtrUnsetVar`/`TclPtrIncrObjVar`/`TclPtrObjMakeUpvar` family
//! (`examples/original_source/generic/tclVar.c`) for the exact
//! flag/error shape; the `TCL_LEAVE_ERR_MSG`/`TCL_AVOID_RESOLVERS` bits
//! are carried over by name per `SPEC_FULL.md` §3.

use crate::array::ArraySearch;
use crate::cell::{CellFlags, CellKind, VarCell};
use crate::error::VarError;
use crate::frame::Frame;
use crate::namespace::Namespace;
use crate::trace::{cell_id, dispatch_read, dispatch_unset, dispatch_write, ReentrancyGuard};
use cmdrt_core::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

thread_local! {
    /// Mints the `<id>` half of a search handle's `s-<id>-<arrayName>`
    /// form (spec §4.4). Thread-local for the same reason spec §4.6's
    /// namespace-id counter is: handles never cross threads, so there is
    /// no reason to pay for a shared, synchronized counter.
    static NEXT_SEARCH_ID: Cell<u64> = const { Cell::new(1) };
}

fn next_search_id() -> u64 {
    NEXT_SEARCH_ID.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
    })
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LookupFlags: u16 {
        const CREATE = 1 << 0;
        const GLOBAL_ONLY = 1 << 1;
        const NAMESPACE_ONLY = 1 << 2;
        const LEAVE_ERR_MSG = 1 << 3;
        const AVOID_RESOLVERS = 1 << 4;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SetFlags: u16 {
        const LEAVE_ERR_MSG = 1 << 0;
        const APPEND_STRING = 1 << 1;
        const APPEND_LIST_ELEMENT = 1 << 2;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct UnsetFlags: u16 {
        const LEAVE_ERR_MSG = 1 << 0;
        const IGNORE_MISSING = 1 << 1;
    }
}

/// Split `name(index)` array-element syntax. Returns `(name, None)` for
/// a plain scalar/array name.
pub fn split_array_element(name: &str) -> (&str, Option<&str>) {
    if let Some(open) = name.find('(') {
        if name.ends_with(')') && open + 1 <= name.len() - 1 {
            return (&name[..open], Some(&name[open + 1..name.len() - 1]));
        }
    }
    (name, None)
}

fn deref_link(mut cell: Rc<RefCell<VarCell>>) -> Rc<RefCell<VarCell>> {
    loop {
        let next = match &cell.borrow().kind {
            CellKind::Link(target) => Some(target.clone()),
            _ => None,
        };
        match next {
            Some(t) => cell = t,
            None => return cell,
        }
    }
}

/// Resolve (and optionally create) the *base* cell for `name` — before
/// any `(index)` array-element suffix is applied — against a frame and
/// the global namespace.
fn resolve_base(
    frame: Option<&Rc<RefCell<Frame>>>,
    global_ns: &Rc<RefCell<Namespace>>,
    base: &str,
    flags: LookupFlags,
) -> Result<Rc<RefCell<VarCell>>, VarError> {
    let create = flags.contains(LookupFlags::CREATE);

    if let Some(qualified) = base.strip_prefix("::") {
        if qualified.is_empty() {
            return Err(VarError::BadNamespace {
                name: base.to_string(),
            });
        }
        return if create {
            Ok(global_ns.borrow_mut().var(qualified))
        } else {
            global_ns
                .borrow()
                .vars
                .get(&qualified.to_string())
                .cloned()
                .ok_or_else(|| VarError::NoSuchVariable {
                    name: base.to_string(),
                })
        };
    }

    if flags.contains(LookupFlags::GLOBAL_ONLY) {
        return if create {
            Ok(global_ns.borrow_mut().var(base))
        } else {
            global_ns
                .borrow()
                .vars
                .get(&base.to_string())
                .cloned()
                .ok_or_else(|| VarError::NoSuchVariable {
                    name: base.to_string(),
                })
        };
    }

    let Some(frame_rc) = frame else {
        return if create {
            Ok(global_ns.borrow_mut().var(base))
        } else {
            global_ns
                .borrow()
                .vars
                .get(&base.to_string())
                .cloned()
                .ok_or_else(|| VarError::NoSuchVariable {
                    name: base.to_string(),
                })
        };
    };

    if flags.contains(LookupFlags::NAMESPACE_ONLY) {
        let ns = frame_rc.borrow().namespace.clone();
        return if create {
            Ok(ns.borrow_mut().var(base))
        } else {
            ns.borrow()
                .vars
                .get(&base.to_string())
                .cloned()
                .ok_or_else(|| VarError::NoSuchVariable {
                    name: base.to_string(),
                })
        };
    }

    // Resolver callbacks get first refusal, unless the caller is the
    // resolver's own machinery avoiding recursion into itself.
    if !flags.contains(LookupFlags::AVOID_RESOLVERS) {
        let resolved = {
            let ns = frame_rc.borrow().namespace.clone();
            let ns_ref = ns.borrow();
            ns_ref.resolver().and_then(|r| r(base))
        };
        if let Some(cell) = resolved {
            return Ok(cell);
        }
    }

    let slot = frame_rc.borrow().slot_for_name(base);
    if let Some(slot) = slot {
        return Ok(frame_rc.borrow_mut().compiled_local(slot));
    }
    if create {
        return Ok(frame_rc.borrow_mut().dynamic_var(base));
    }
    frame_rc
        .borrow()
        .dynamic
        .get(&base.to_string())
        .cloned()
        .ok_or_else(|| VarError::NoSuchVariable {
            name: base.to_string(),
        })
}

/// `lookup(scope, name, flags) -> (cell, arrayCell?)` (spec §4.2),
/// creating the element cell if `flags` requests it. Does NOT apply the
/// array-default fallback for missing elements — `get_by_name` handles
/// that separately, since a default read should not fabricate a cell.
pub fn lookup(
    frame: Option<&Rc<RefCell<Frame>>>,
    global_ns: &Rc<RefCell<Namespace>>,
    name: &str,
    flags: LookupFlags,
) -> Result<(Rc<RefCell<VarCell>>, Option<Rc<RefCell<VarCell>>>), VarError> {
    let (base, element) = split_array_element(name);
    let base_cell = deref_link(resolve_base(frame, global_ns, base, flags)?);

    let Some(elem) = element else {
        return Ok((base_cell, None));
    };

    let is_array = base_cell.borrow().is_array();
    if !is_array {
        if base_cell.borrow().is_undefined() && flags.contains(LookupFlags::CREATE) {
            *base_cell.borrow_mut() = VarCell::new_array();
        } else {
            return Err(VarError::NeedArray {
                name: base.to_string(),
            });
        }
    }

    let elem_cell = {
        let mut b = base_cell.borrow_mut();
        let CellKind::Array(data) = &mut b.kind else {
            unreachable!("just ensured array above")
        };
        match data.elements.get(&elem.to_string()) {
            Some(existing) => Some(existing.clone()),
            None if flags.contains(LookupFlags::CREATE) => {
                let c = Rc::new(RefCell::new(VarCell::new_scalar()));
                data.elements.insert(elem.to_string(), c.clone());
                Some(c)
            }
            None => None,
        }
    };

    match elem_cell {
        Some(c) => Ok((c, Some(base_cell))),
        None => Err(VarError::NoSuchElement {
            name: name.to_string(),
        }),
    }
}

/// `get(cell) -> value | error` (spec §4.2), resolved by name.
pub fn get_by_name(
    frame: Option<&Rc<RefCell<Frame>>>,
    global_ns: &Rc<RefCell<Namespace>>,
    guard: &ReentrancyGuard,
    name: &str,
    flags: LookupFlags,
) -> Result<Value, VarError> {
    let (base, element) = split_array_element(name);
    let lookup_flags = flags & !LookupFlags::CREATE;
    let base_cell = match resolve_base(frame, global_ns, base, lookup_flags) {
        Ok(c) => deref_link(c),
        Err(e) => return Err(e),
    };

    if let Some(elem) = element {
        if !base_cell.borrow().is_array() {
            return Err(VarError::NeedArray {
                name: base.to_string(),
            });
        }
        let (elem_cell, default) = {
            let b = base_cell.borrow();
            let CellKind::Array(data) = &b.kind else {
                unreachable!()
            };
            (
                data.elements.get(&elem.to_string()).cloned(),
                data.default.clone(),
            )
        };
        return match elem_cell {
            Some(cell) => {
                let id = cell_id(&cell);
                let traces = cell.borrow().traces.clone();
                dispatch_read(guard, id, &traces, name)?;
                read_scalar_or_const(&cell, name)
            }
            None => default.ok_or_else(|| VarError::NoSuchElement {
                name: name.to_string(),
            }),
        };
    }

    if base_cell.borrow().is_array() {
        return Err(VarError::IsArray {
            name: name.to_string(),
        });
    }
    let id = cell_id(&base_cell);
    let traces = base_cell.borrow().traces.clone();
    dispatch_read(guard, id, &traces, name)?;
    read_scalar_or_const(&base_cell, name)
}

fn read_scalar_or_const(cell: &Rc<RefCell<VarCell>>, name: &str) -> Result<Value, VarError> {
    match &cell.borrow().kind {
        CellKind::Scalar(Some(v)) => Ok(v.clone()),
        CellKind::Scalar(None) => Err(VarError::NoSuchVariable {
            name: name.to_string(),
        }),
        CellKind::Constant(v) => Ok(v.clone()),
        CellKind::Array(_) => Err(VarError::IsArray {
            name: name.to_string(),
        }),
        CellKind::Link(_) => unreachable!("caller must deref_link first"),
    }
}

/// `set(cell, value, flags) -> value | error` (spec §4.2), resolved by
/// name, creating scalar/array/element cells along the way.
pub fn set_by_name(
    frame: Option<&Rc<RefCell<Frame>>>,
    global_ns: &Rc<RefCell<Namespace>>,
    guard: &ReentrancyGuard,
    name: &str,
    value: Value,
    _flags: SetFlags,
) -> Result<Value, VarError> {
    let (cell, array_cell) = lookup(frame, global_ns, name, LookupFlags::CREATE)?;

    if cell.borrow().is_constant() {
        return Err(VarError::WriteConst {
            name: name.to_string(),
        });
    }
    if cell.borrow().is_array() {
        return Err(VarError::WriteArray {
            name: name.to_string(),
        });
    }

    {
        let mut b = cell.borrow_mut();
        b.kind = CellKind::Scalar(Some(value.clone()));
        b.flags.remove(CellFlags::UNDEFINED_BUT_LIVE);
    }

    let id = cell_id(&cell);
    let traces = cell.borrow().traces.clone();
    dispatch_write(guard, id, &traces, name, &value)?;

    if let Some(arr) = array_cell {
        let arr_id = cell_id(&arr);
        let arr_traces = arr.borrow().traces.clone();
        dispatch_write(guard, arr_id, &arr_traces, name, &value)?;
    }

    Ok(value)
}

/// `unset(cell, flags) -> ok | error` (spec §4.2). Array cells recurse
/// into their elements before the array cell itself is unset. The cell
/// is marked undefined before its unset traces run, not after (spec
/// §4.3), so a trace that resurrects the variable starts a genuinely
/// new lifetime rather than being clobbered back to undefined.
pub fn unset_by_name(
    frame: Option<&Rc<RefCell<Frame>>>,
    global_ns: &Rc<RefCell<Namespace>>,
    guard: &ReentrancyGuard,
    name: &str,
    flags: UnsetFlags,
) -> Result<(), VarError> {
    let lookup_result = lookup(frame, global_ns, name, LookupFlags::empty());
    let (cell, array_cell) = match lookup_result {
        Ok(pair) => pair,
        Err(e) => {
            if flags.contains(UnsetFlags::IGNORE_MISSING) {
                return Ok(());
            }
            return Err(e);
        }
    };

    if cell.borrow().is_constant() {
        return Err(VarError::UnsetConst {
            name: name.to_string(),
        });
    }

    if cell.borrow().is_array() && array_cell.is_none() {
        let element_names: Vec<String> = {
            let b = cell.borrow();
            let CellKind::Array(data) = &b.kind else {
                unreachable!()
            };
            data.elements.ordered_keys()
        };
        for elem_name in &element_names {
            let qualified = format!("{name}({elem_name})");
            unset_by_name(frame, global_ns, guard, &qualified, UnsetFlags::IGNORE_MISSING)?;
        }
        for search in {
            let b = cell.borrow();
            let CellKind::Array(data) = &b.kind else {
                unreachable!()
            };
            data.searches.clone()
        } {
            search.borrow_mut().mark_changed();
        }
    }

    // Spec §4.3: the cell is marked undefined *before* unset traces run,
    // so a trace body's own read sees "undefined," not the value being
    // unset. If the trace body resurrects the variable (`set`s it again),
    // that new lifetime must survive — so nothing here may clobber
    // `kind` again after dispatch.
    {
        let mut b = cell.borrow_mut();
        b.kind = CellKind::Scalar(None);
    }

    let id = cell_id(&cell);
    let traces = cell.borrow().traces.clone();
    dispatch_unset(guard, id, &traces, name)
}

/// `array_first_search(scope, name) -> searchHandle | error` (spec
/// §4.4): start a new search over array `name`, registering the handle
/// against the array cell itself so that `unset_by_name`'s array-delete
/// path can invalidate every outstanding search ("searches live in a
/// per-interpreter registry keyed by array cell. Deleting the array
/// deletes all its searches"). Errors with `NeedArray` if `name` isn't
/// already an array — matching the original's refusal to start a search
/// over a variable that doesn't exist as an array yet.
pub fn array_first_search(
    frame: Option<&Rc<RefCell<Frame>>>,
    global_ns: &Rc<RefCell<Namespace>>,
    name: &str,
) -> Result<Rc<RefCell<ArraySearch>>, VarError> {
    let (base, element) = split_array_element(name);
    if element.is_some() {
        return Err(VarError::NeedArray {
            name: name.to_string(),
        });
    }

    let base_cell = deref_link(resolve_base(frame, global_ns, base, LookupFlags::empty())?);
    if !base_cell.borrow().is_array() {
        return Err(VarError::NeedArray {
            name: name.to_string(),
        });
    }

    let mut b = base_cell.borrow_mut();
    let CellKind::Array(data) = &mut b.kind else {
        unreachable!("just checked is_array above")
    };
    let search = Rc::new(RefCell::new(ArraySearch::new(
        next_search_id(),
        base,
        data.elements.ordered_keys(),
    )));
    data.searches.push(search.clone());
    Ok(search)
}

/// `incr(cell, delta, flags) -> value | error` (spec §4.2): "fetches
/// numerically, widens as needed (integer -> big integer), writes
/// back." The fast path stays plain `i64` arithmetic; an overflowing
/// `checked_add`, or a current value too large to fit an `i64` to begin
/// with, widens into [`num_bigint::BigInt`] rather than panicking or
/// wrapping. Non-numeric current values are reported via
/// `ArgumentFormat` — spec §7 does not name a dedicated family for this
/// case, and the option-parsing family is the closest existing shape
/// for "the string form didn't parse".
pub fn incr_by_name(
    frame: Option<&Rc<RefCell<Frame>>>,
    global_ns: &Rc<RefCell<Namespace>>,
    guard: &ReentrancyGuard,
    name: &str,
    delta: i64,
) -> Result<Value, VarError> {
    use num_bigint::BigInt;
    use std::str::FromStr;

    let (cell, _) = lookup(frame, global_ns, name, LookupFlags::CREATE)?;
    if cell.borrow().is_constant() {
        return Err(VarError::WriteConst {
            name: name.to_string(),
        });
    }

    let current: Option<String> = match &cell.borrow().kind {
        CellKind::Scalar(Some(v)) => Some(v.get_string()),
        CellKind::Scalar(None) => None,
        _ => {
            return Err(VarError::ArgumentFormat {
                option: "incr".to_string(),
                reason: "not a scalar".to_string(),
            })
        }
    };

    let new_string = match current {
        None => delta.to_string(),
        Some(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<i64>() {
                Ok(n) => match n.checked_add(delta) {
                    Some(sum) => sum.to_string(),
                    None => (BigInt::from(n) + BigInt::from(delta)).to_string(),
                },
                Err(_) => {
                    let current_big = BigInt::from_str(trimmed).map_err(|_| VarError::ArgumentFormat {
                        option: "incr".to_string(),
                        reason: "expected integer".to_string(),
                    })?;
                    (current_big + BigInt::from(delta)).to_string()
                }
            }
        }
    };

    let new_value = Value::new_string(new_string);
    set_by_name(frame, global_ns, guard, name, new_value, SetFlags::empty())
}

/// `upvar(targetCell, hereName, flags) -> ok | error` (spec §4.2):
/// create a link in `frame` aliased to `target`.
///
/// This surface only ever creates the link inside a proc frame's
/// dynamic table, so the `INVERTED` refusal (spec §7: "attempting to
/// create a namespace link into a proc-local") has no call site here —
/// a namespace-scoped alias would have to be created through a
/// different entry point this crate does not expose. `VarError::UpvarInverted`
/// stays defined for the error-code family's completeness but is
/// intentionally unreachable from this function.
pub fn upvar(
    frame: &Rc<RefCell<Frame>>,
    target: Rc<RefCell<VarCell>>,
    here_name: &str,
) -> Result<(), VarError> {
    let (here_base, here_elem) = split_array_element(here_name);
    if here_elem.is_some() {
        return Err(VarError::UpvarLocalElement {
            name: here_name.to_string(),
        });
    }

    let target = deref_link(target);

    if let Some(existing) = frame.borrow().dynamic.get(&here_base.to_string()) {
        if Rc::ptr_eq(existing, &target) {
            return Err(VarError::UpvarSelf {
                name: here_name.to_string(),
            });
        }
        if !existing.borrow().is_undefined() {
            return Err(VarError::UpvarExists {
                name: here_name.to_string(),
            });
        }
    }

    if !target.borrow().traces.is_empty() {
        return Err(VarError::UpvarTraced {
            name: here_name.to_string(),
        });
    }

    let link = Rc::new(RefCell::new(VarCell::new_link(target)));
    frame.borrow_mut().dynamic.insert(here_base.to_string(), link);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_name() {
        assert_eq!(split_array_element("x"), ("x", None));
    }

    #[test]
    fn split_array_element_name() {
        assert_eq!(split_array_element("a(k)"), ("a", Some("k")));
    }

    #[test]
    fn scalar_set_then_get() {
        let global = Namespace::new_root();
        let cache = crate::frame::LocalCache::new(vec![]);
        let frame = Rc::new(RefCell::new(Frame::new(global.clone(), cache, None)));
        let guard = ReentrancyGuard::new();

        set_by_name(
            Some(&frame),
            &global,
            &guard,
            "x",
            Value::new_string("hello"),
            SetFlags::empty(),
        )
        .unwrap();
        let v = get_by_name(Some(&frame), &global, &guard, "x", LookupFlags::empty()).unwrap();
        assert_eq!(v.get_string(), "hello");
    }

    #[test]
    fn array_default_law() {
        let global = Namespace::new_root();
        let cache = crate::frame::LocalCache::new(vec![]);
        let frame = Rc::new(RefCell::new(Frame::new(global.clone(), cache, None)));
        let guard = ReentrancyGuard::new();

        let (base_cell, _) = lookup(Some(&frame), &global, "a", LookupFlags::CREATE).unwrap();
        *base_cell.borrow_mut() = VarCell::new_array();
        if let CellKind::Array(data) = &mut base_cell.borrow_mut().kind {
            data.default = Some(Value::new_string("D"));
        }

        let missing = get_by_name(Some(&frame), &global, &guard, "a(missing)", LookupFlags::empty()).unwrap();
        assert_eq!(missing.get_string(), "D");

        set_by_name(
            Some(&frame),
            &global,
            &guard,
            "a(k)",
            Value::new_string("V"),
            SetFlags::empty(),
        )
        .unwrap();
        let k = get_by_name(Some(&frame), &global, &guard, "a(k)", LookupFlags::empty()).unwrap();
        assert_eq!(k.get_string(), "V");
        let other = get_by_name(Some(&frame), &global, &guard, "a(other)", LookupFlags::empty()).unwrap();
        assert_eq!(other.get_string(), "D");
    }

    #[test]
    fn constant_rejects_write_and_unset() {
        let global = Namespace::new_root();
        let cache = crate::frame::LocalCache::new(vec![]);
        let frame = Rc::new(RefCell::new(Frame::new(global.clone(), cache, None)));
        let guard = ReentrancyGuard::new();

        let cell = frame.borrow_mut().dynamic_var("K");
        *cell.borrow_mut() = VarCell::new_constant(Value::new_string("42"));

        let err = set_by_name(
            Some(&frame),
            &global,
            &guard,
            "K",
            Value::new_string("99"),
            SetFlags::empty(),
        )
        .unwrap_err();
        assert_eq!(err.code(), vec!["WRITE", "CONST"]);

        let v = get_by_name(Some(&frame), &global, &guard, "K", LookupFlags::empty()).unwrap();
        assert_eq!(v.get_string(), "42");
    }

    #[test]
    fn upvar_chain_roundtrips() {
        let global = Namespace::new_root();
        let cache1 = crate::frame::LocalCache::new(vec![]);
        let f1 = Rc::new(RefCell::new(Frame::new(global.clone(), cache1, None)));
        let guard = ReentrancyGuard::new();

        set_by_name(Some(&f1), &global, &guard, "a", Value::new_string("7"), SetFlags::empty()).unwrap();

        let cache2 = crate::frame::LocalCache::new(vec![]);
        let f2 = Rc::new(RefCell::new(Frame::new(global.clone(), cache2, Some(f1.clone()))));

        let (a_cell, _) = lookup(Some(&f1), &global, "a", LookupFlags::empty()).unwrap();
        upvar(&f2, a_cell, "b").unwrap();

        set_by_name(Some(&f2), &global, &guard, "b", Value::new_string("9"), SetFlags::empty()).unwrap();

        let result = get_by_name(Some(&f1), &global, &guard, "a", LookupFlags::empty()).unwrap();
        assert_eq!(result.get_string(), "9");
    }
}
