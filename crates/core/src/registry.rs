//! Value-type registry: the "register a value-type" intake of the
//! external interface (spec §6), and the global table spec §4.6
//! describes ("populated at initialization and thereafter immutable").
//!
//! Grounded on the teacher's `CompilerConfig`/`ExternalBuiltin`
//! builder-then-use pattern (`examples/navicore-cem3/crates/compiler/
//! src/config.rs`): registration is open during startup and the registry
//! is sealed once the embedder is done, the same shape as that builder
//! being consumed by `compile_file_with_config`.

use crate::value::ValueType;
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// A table of registered [`ValueType`] descriptors.
///
/// Registration is only valid before [`TypeRegistry::seal`] is called.
/// Registering after seal is a programmer error, not a data error — it
/// panics, the same way `ExternalBuiltin::new` panics on a malformed
/// symbol rather than returning a `Result` the caller is expected to
/// recover from.
pub struct TypeRegistry {
    types: Vec<&'static ValueType>,
    sealed: bool,
}

impl TypeRegistry {
    pub const fn new() -> Self {
        TypeRegistry {
            types: Vec::new(),
            sealed: false,
        }
    }

    /// Register a value-type descriptor.
    ///
    /// # Panics
    /// Panics if the registry has already been sealed, or if a type of
    /// the same name is already registered.
    pub fn register(&mut self, vtype: &'static ValueType) {
        assert!(
            !self.sealed,
            "TypeRegistry: cannot register '{}' after seal()",
            vtype.name
        );
        assert!(
            self.types.iter().all(|t| t.name != vtype.name),
            "TypeRegistry: '{}' is already registered",
            vtype.name
        );
        tracing::trace!(type_name = vtype.name, "registering value type");
        self.types.push(vtype);
    }

    /// Freeze the registry. Subsequent `register` calls panic.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn find(&self, name: &str) -> Option<&'static ValueType> {
        self.types.iter().copied().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static ValueType> + '_ {
        self.types.iter().copied()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide default registry, for embedders that don't need more
/// than one interpreter's worth of value types.
static GLOBAL: Lazy<RwLock<TypeRegistry>> = Lazy::new(|| RwLock::new(TypeRegistry::new()));

pub fn register_global(vtype: &'static ValueType) {
    GLOBAL.write().expect("TypeRegistry lock poisoned").register(vtype);
}

pub fn seal_global() {
    GLOBAL.write().expect("TypeRegistry lock poisoned").seal();
}

pub fn find_global(name: &str) -> Option<&'static ValueType> {
    GLOBAL.read().expect("TypeRegistry lock poisoned").find(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Payload, ValueType};

    static TEST_TYPE: ValueType = ValueType {
        name: "registry-test-int",
        free: None,
        duplicate: None,
        update_string: Some(|p| match p {
            Payload::Word(n) => n.to_string(),
            _ => unreachable!(),
        }),
        parse_string: Some(|s| {
            s.parse::<i64>()
                .map(Payload::Word)
                .map_err(|e| e.to_string())
        }),
        length: None,
    };

    #[test]
    fn register_then_find() {
        let mut reg = TypeRegistry::new();
        reg.register(&TEST_TYPE);
        assert!(reg.find("registry-test-int").is_some());
        assert!(reg.find("nonexistent").is_none());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_register_panics() {
        let mut reg = TypeRegistry::new();
        reg.register(&TEST_TYPE);
        reg.register(&TEST_TYPE);
    }

    #[test]
    #[should_panic(expected = "after seal")]
    fn register_after_seal_panics() {
        let mut reg = TypeRegistry::new();
        reg.seal();
        reg.register(&TEST_TYPE);
    }
}
