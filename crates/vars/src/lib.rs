//! Variable and scope engine: activation frames, namespaces, array
//! elements, link (upvar) variables, constants, and trace dispatch
//! (spec subsystem B).

pub mod array;
pub mod cell;
pub mod error;
pub mod frame;
pub mod namespace;
pub mod ops;
pub mod table;
pub mod trace;

pub use cell::{ArrayData, CellFlags, CellKind, VarCell};
pub use error::VarError;
pub use frame::{Frame, LocalCache};
pub use namespace::Namespace;
pub use ops::{
    array_first_search, get_by_name, incr_by_name, lookup, set_by_name, unset_by_name, upvar,
    LookupFlags, SetFlags, UnsetFlags,
};
pub use trace::{cell_id, dispatch_read, dispatch_unset, dispatch_write, ReentrancyGuard, Trace, TraceEvent, TraceMask};
