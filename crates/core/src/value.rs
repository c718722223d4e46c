//! `Value`: a reference-counted cell with a dual string/internal
//! representation (spec §3/§4.1).
//!
//! # Memory model
//!
//! Grounded on the teacher's `Value` enum (`examples/navicore-cem3/
//! crates/core/src/value.rs`), which is a tagged sum with variant-specific
//! `Clone` semantics (bitwise copy for scalars, `Arc` refcount bump for
//! heap variants). Here the whole cell is refcounted rather than only
//! some of its variants, because spec §3 makes sharing a property of
//! every `Value`, not of a subset of value kinds.
//!
//! We use `Rc`, not the teacher's `Arc`: spec §5 states a `Value` is
//! only ever touched by the thread of the interpreter that owns it, so
//! atomic refcounting would pay for a guarantee nothing here needs (see
//! `DESIGN.md`, Open Questions).
//!
//! Unlike the teacher, this crate has no FFI boundary to satisfy, so the
//! payload is a safe enum (`Payload`) rather than raw pointer-sized
//! words — `Payload::Shared` plays the role the spec describes as "a
//! pointer into some auxiliary structure".

use crate::error::ValueError;
use std::cell::RefCell;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// The internal-representation payload carried alongside (or instead of)
/// a `Value`'s string form.
///
/// Spec §3 allows "one pointer-sized word or a pair of pointer-sized
/// words". `Word`/`Double`/`Pair` cover the scalar cases; `Shared` covers
/// "a pointer into some auxiliary structure" without reintroducing
/// unsafe raw pointers.
#[derive(Clone)]
pub enum Payload {
    Word(i64),
    Double(f64),
    Pair(i64, i64),
    Shared(Rc<dyn Any>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Word(n) => write!(f, "Word({n})"),
            Payload::Double(d) => write!(f, "Double({d})"),
            Payload::Pair(a, b) => write!(f, "Pair({a}, {b})"),
            Payload::Shared(_) => write!(f, "Shared(..)"),
        }
    }
}

/// Immutable descriptor for one value-type, registered at startup
/// (spec §3 "Value-type"). A `None` slot means the type does not support
/// that operation, exactly as the spec specifies (e.g. a pure numeric
/// type may omit `parse_string`).
///
/// `free` exists for spec fidelity: in this safe-Rust implementation
/// `Payload::Shared`'s own `Drop` already reclaims heap data, so most
/// value types can leave `free` as `None`. A type only needs `free` when
/// releasing its payload has an observable side effect beyond dropping
/// Rust values (closing a handle, decrementing an external counter).
pub struct ValueType {
    pub name: &'static str,
    pub free: Option<fn(&Payload)>,
    pub duplicate: Option<fn(&Payload) -> Payload>,
    pub update_string: Option<fn(&Payload) -> String>,
    pub parse_string: Option<fn(&str) -> Result<Payload, String>>,
    pub length: Option<fn(&Payload) -> usize>,
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueType").field("name", &self.name).finish()
    }
}

impl PartialEq for ValueType {
    /// Value-types are compared by identity: two descriptors with the
    /// same name registered twice are still distinct types.
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}
impl Eq for ValueType {}

struct ValueData {
    string: Option<Box<str>>,
    internal: Option<(&'static ValueType, Payload)>,
}

impl ValueData {
    /// Materialize the string form from the internal rep if absent.
    /// No-op (and does not touch `internal`) if a string form already
    /// exists.
    fn ensure_string(&mut self) {
        if self.string.is_some() {
            return;
        }
        let (vtype, payload) = self
            .internal
            .as_ref()
            .expect("Value invariant violated: neither string nor internal rep present");
        let update = vtype
            .update_string
            .unwrap_or_else(|| panic!("value type '{}' has no updateStringFromInternal", vtype.name));
        let s = update(payload);
        self.string = Some(s.into_boxed_str());
    }
}

impl Drop for ValueData {
    fn drop(&mut self) {
        if let Some((vtype, payload)) = self.internal.take() {
            if let Some(free) = vtype.free {
                free(&payload);
            }
        }
    }
}

/// A reference-counted, dual-representation value (spec §3).
///
/// Cloning a `Value` is "retain" (spec's `retain`/`release` verbs map
/// directly onto `Clone`/`Drop` once the cell is refcounted): construction
/// already counts as the producer's first reference, so there is no
/// transient zero-refcount window the way there is in the original C
/// implementation's malloc'd-then-zeroed struct — Rust's ownership model
/// removes the hazard that window exists to manage.
#[derive(Clone)]
pub struct Value(Rc<RefCell<ValueData>>);

impl Value {
    /// Construct a value with only the string form set.
    pub fn new_string(s: impl Into<String>) -> Value {
        Value(Rc::new(RefCell::new(ValueData {
            string: Some(s.into().into_boxed_str()),
            internal: None,
        })))
    }

    /// Construct a value with only the internal form set. The string
    /// form is generated lazily by `type.updateStringFromInternal`.
    pub fn new_typed(vtype: &'static ValueType, payload: Payload) -> Value {
        Value(Rc::new(RefCell::new(ValueData {
            string: None,
            internal: Some((vtype, payload)),
        })))
    }

    /// Explicit retain, for call sites that want to document ownership
    /// transfer rather than rely on an implicit `.clone()`.
    pub fn retain(&self) -> Value {
        self.clone()
    }

    /// Explicit release. Equivalent to `drop(value)`; exists for
    /// call-site symmetry with `retain`.
    pub fn release(self) {}

    /// Current strong-reference count. A value with `strong_count() >= 2`
    /// is "shared" and must not be mutated in place (spec §3/§8).
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn is_shared(&self) -> bool {
        self.strong_count() >= 2
    }

    /// Identity comparison: do these two handles refer to the same cell?
    pub fn is_same_cell(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Return the value's string form, materializing it from the
    /// internal rep if necessary. Stable across repeated calls (spec §8).
    pub fn get_string(&self) -> String {
        let mut data = self.0.borrow_mut();
        data.ensure_string();
        data.string.as_ref().unwrap().to_string()
    }

    /// Non-coercing accessor: returns the payload only if the current
    /// internal type is exactly `vtype`, without forcing a parse.
    pub fn fetch_internal(&self, vtype: &'static ValueType) -> Option<Payload> {
        let data = self.0.borrow();
        match &data.internal {
            Some((t, payload)) if std::ptr::eq(*t, vtype) => Some(payload.clone()),
            _ => None,
        }
    }

    /// Coerce to `vtype`: a no-op if already that type, otherwise frees
    /// the current internal rep and installs one parsed from the string
    /// form. On failure, leaves the string rep intact (spec §4.1).
    pub fn coerce_to(&self, vtype: &'static ValueType) -> Result<(), ValueError> {
        let mut data = self.0.borrow_mut();
        if let Some((current, _)) = &data.internal {
            if std::ptr::eq(*current, vtype) {
                return Ok(());
            }
        }
        let parse = vtype.parse_string.ok_or_else(|| ValueError {
            type_name: vtype.name,
            reason: "type has no parseStringToInternal".to_string(),
        })?;
        data.ensure_string();
        let s = data.string.as_ref().unwrap().to_string();
        match parse(&s) {
            Ok(new_payload) => {
                if let Some((old_vtype, old_payload)) = data.internal.take() {
                    if let Some(free) = old_vtype.free {
                        free(&old_payload);
                    }
                }
                data.internal = Some((vtype, new_payload));
                Ok(())
            }
            Err(reason) => Err(ValueError {
                type_name: vtype.name,
                reason,
            }),
        }
    }

    /// Deep copy for copy-on-write. If the internal type has no
    /// `duplicate`, the copy carries only the string form (re-parsing
    /// happens lazily on the next `coerce_to`), matching the original's
    /// "no dup proc means the copy just has no intrep yet" behavior.
    pub fn duplicate(&self) -> Value {
        let mut data = self.0.borrow_mut();
        if data.internal.is_some() {
            let has_dup = data.internal.as_ref().unwrap().0.duplicate.is_some();
            if !has_dup {
                data.ensure_string();
            }
        }
        let new_internal = data
            .internal
            .as_ref()
            .and_then(|(vtype, payload)| vtype.duplicate.map(|dup| (*vtype, dup(payload))));
        Value(Rc::new(RefCell::new(ValueData {
            string: data.string.clone(),
            internal: new_internal,
        })))
    }

    /// Element/byte count: `type.length` if the type provides one
    /// (required to be O(1)/amortized-O(1) for container-shaped types),
    /// otherwise the materialized string's byte length.
    pub fn length(&self) -> usize {
        let mut data = self.0.borrow_mut();
        if let Some((vtype, payload)) = &data.internal {
            if let Some(len_fn) = vtype.length {
                return len_fn(payload);
            }
        }
        data.ensure_string();
        data.string.as_ref().unwrap().len()
    }

    /// Name of the currently-installed internal type, if any.
    pub fn internal_type_name(&self) -> Option<&'static str> {
        self.0.borrow().internal.as_ref().map(|(t, _)| t.name)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Value")
            .field("string", &data.string)
            .field("internal_type", &data.internal.as_ref().map(|(t, _)| t.name))
            .field("refcount", &Rc::strong_count(&self.0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static INT_TYPE: ValueType = ValueType {
        name: "int",
        free: None,
        duplicate: None,
        update_string: Some(|p| match p {
            Payload::Word(n) => n.to_string(),
            _ => unreachable!(),
        }),
        parse_string: Some(|s| {
            s.trim()
                .parse::<i64>()
                .map(Payload::Word)
                .map_err(|e| e.to_string())
        }),
        length: None,
    };

    #[test]
    fn string_only_value_roundtrips() {
        let v = Value::new_string("hello");
        assert_eq!(v.get_string(), "hello");
        assert_eq!(v.strong_count(), 1);
    }

    #[test]
    fn get_string_is_stable_across_coercions() {
        let v = Value::new_string(" 42 ");
        let before = v.get_string();
        v.coerce_to(&INT_TYPE).unwrap();
        let after = v.get_string();
        // coercion parses the *trimmed* number but must not silently
        // rewrite the original string form out from under the caller.
        assert_eq!(before, after);
        assert_eq!(v.get_string(), after);
    }

    #[test]
    fn typed_value_materializes_string_on_demand() {
        let v = Value::new_typed(&INT_TYPE, Payload::Word(7));
        assert_eq!(v.get_string(), "7");
        assert_eq!(v.get_string(), "7");
    }

    #[test]
    fn coerce_failure_leaves_string_intact() {
        let v = Value::new_string("not a number");
        let err = v.coerce_to(&INT_TYPE).unwrap_err();
        assert_eq!(err.type_name, "int");
        assert_eq!(v.get_string(), "not a number");
    }

    #[test]
    fn coerce_is_noop_when_already_that_type() {
        let v = Value::new_typed(&INT_TYPE, Payload::Word(5));
        v.coerce_to(&INT_TYPE).unwrap();
        assert!(matches!(v.fetch_internal(&INT_TYPE), Some(Payload::Word(5))));
    }

    #[test]
    fn fetch_internal_is_noncoercing() {
        let v = Value::new_string("5");
        assert!(v.fetch_internal(&INT_TYPE).is_none());
        assert_eq!(v.get_string(), "5", "fetch_internal must not force a parse");
    }

    #[test]
    fn sharing_is_observable_via_strong_count() {
        let v = Value::new_string("x");
        assert!(!v.is_shared());
        let v2 = v.retain();
        assert!(v.is_shared());
        assert!(v2.is_shared());
        drop(v2);
        assert!(!v.is_shared());
    }

    #[test]
    fn duplicate_without_dup_proc_drops_internal_but_keeps_string() {
        let v = Value::new_typed(&INT_TYPE, Payload::Word(9));
        let d = v.duplicate();
        assert!(!v.is_same_cell(&d));
        assert_eq!(d.get_string(), "9");
        assert!(d.fetch_internal(&INT_TYPE).is_none());
    }

    #[test]
    fn length_falls_back_to_string_byte_length() {
        let v = Value::new_string("hello");
        assert_eq!(v.length(), 5);
    }

    #[test]
    fn refcount_conservation_across_clone_and_drop() {
        let v = Value::new_string("a");
        let before = v.strong_count();
        let clones: Vec<Value> = (0..4).map(|_| v.clone()).collect();
        assert_eq!(v.strong_count(), before + 4);
        drop(clones);
        assert_eq!(v.strong_count(), before);
    }
}
