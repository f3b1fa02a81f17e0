//! Runtime support for types emitted by `schema-typegen`.
//!
//! Generated code only reaches into this crate for union plumbing and the
//! open map types; everything else is plain serde.
pub mod union;

pub use indexmap::IndexMap;
pub use serde_json::Value;
pub use union::{OneOf2, UnionError};

/// String-keyed map used for `additionalProperties` schemas. Keeps wire order.
pub type Map<V> = IndexMap<String, V>;

/// Open extension data attached to objects the generator could not type.
pub type Extensions = IndexMap<String, Value>;
