//! Generates serde data types from JSON Schema documents.
//!
//! Pipeline per unit: [`loader`] picks the generation root, [`shape`]
//! classifies nodes, [`emit`] walks the root and definitions into [`ir`]
//! declarations, and [`codegen`] renders them as Rust source.
pub mod alias;
pub mod codegen;
pub mod context;
pub mod diagnostics;
pub mod emit;
pub mod generate;
pub mod ir;
pub mod loader;
pub mod manifest;
pub mod naming;
pub mod path_de;
pub mod resolve;
pub mod schema;
pub mod shape;

pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use generate::{
    generate_document, generate_unit, generate_units, GeneratedFile, GenerationReport, GenerationUnit,
    GeneratorOptions, SchemaReference, UnitOutcome,
};
pub use manifest::{Manifest, ManifestError};
pub use schema::SchemaDocument;
