//! Typed-value core of the runtime: the `Value` cell and its value-type
//! registry (spec subsystem A).
//!
//! Everything above this crate treats a `Value` as an opaque, cheaply
//! cloned handle with a string face and an optional typed internal
//! representation; nothing outside `value.rs` reaches into a cell's
//! fields directly.

pub mod error;
pub mod registry;
pub mod value;

pub use error::ValueError;
pub use registry::TypeRegistry;
pub use value::{Payload, Value, ValueType};
