//! p1authz-core: value tree, type registry and import parsing for
//! PingOne Authorize trust-framework resources.
//!
//! Key types are re-exported at the crate root:
//!
//! - [`Value`], [`Tri`], [`Ty`] -- the host value tree
//! - [`Registry`], [`Shape`], [`Field`], [`Union`], [`Variant`] -- the
//!   type registry, with the built-in catalogue behind [`Registry::global`]
//! - [`EntityKind`] -- endpoints, import format and delete mode per entity
//! - [`Error`], [`ErrorKind`] -- the shared error taxonomy
//!
//! The registry is read-only once built; everything else is plain data.

pub mod catalog;
pub mod constraint;
pub mod defaults;
pub mod entity;
pub mod error;
pub mod host;
pub mod import;
pub mod nulls;
pub mod registry;
pub mod schema;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use catalog::shapes;
pub use constraint::{validate, Constraint, PathRef};
pub use defaults::apply_defaults;
pub use entity::{DeleteMode, EntityKind};
pub use error::{Error, ErrorKind};
pub use import::ImportComponent;
pub use nulls::fill_absent;
pub use registry::{Field, FieldMode, Registry, Shape, Union, Variant};
pub use value::{Fields, ShapeId, Tri, Ty, Value};
