//! Aux-data type registry: the "register an aux-data type" intake of
//! the external interface (spec §6).
//!
//! Same builder-then-seal shape as `cmdrt_core::registry::TypeRegistry`,
//! grounded on the same teacher pattern
//! (`compiler/src/config.rs`'s `CompilerConfig`/`ExternalBuiltin`).

use std::any::Any;
use std::rc::Rc;

/// Operations a type of `aux[]` entry supports. `free` may be `None` if
/// the payload's own `Drop` is sufficient (the common case in safe
/// Rust); `print` renders a short debug form for the text disassembler.
pub struct AuxType {
    pub name: &'static str,
    pub free: Option<fn(&Rc<dyn Any>)>,
    pub print: Option<fn(&Rc<dyn Any>) -> String>,
}

pub struct AuxRegistry {
    types: Vec<&'static AuxType>,
    sealed: bool,
}

impl AuxRegistry {
    pub const fn new() -> Self {
        AuxRegistry {
            types: Vec::new(),
            sealed: false,
        }
    }

    /// # Panics
    /// Panics if called after [`AuxRegistry::seal`], or if a type of the
    /// same name is already registered.
    pub fn register(&mut self, aux_type: &'static AuxType) {
        assert!(
            !self.sealed,
            "AuxRegistry: cannot register '{}' after seal()",
            aux_type.name
        );
        assert!(
            self.types.iter().all(|t| t.name != aux_type.name),
            "AuxRegistry: '{}' is already registered",
            aux_type.name
        );
        self.types.push(aux_type);
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn find(&self, name: &str) -> Option<&'static AuxType> {
        self.types.iter().copied().find(|t| t.name == name)
    }
}

impl Default for AuxRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TEST_AUX: AuxType = AuxType {
        name: "test-aux",
        free: None,
        print: Some(|_| "test-aux".to_string()),
    };

    #[test]
    fn register_then_find() {
        let mut reg = AuxRegistry::new();
        reg.register(&TEST_AUX);
        assert!(reg.find("test-aux").is_some());
    }

    #[test]
    #[should_panic(expected = "after seal")]
    fn register_after_seal_panics() {
        let mut reg = AuxRegistry::new();
        reg.seal();
        reg.register(&TEST_AUX);
    }
}
