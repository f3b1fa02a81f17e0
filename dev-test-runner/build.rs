//! Generates the fixture types into `OUT_DIR`.
use std::path::PathBuf;

use schema_typegen::{generate_units, GenerationUnit, GeneratorOptions, SchemaReference};

fn main() {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR"));
    let fixtures = manifest_dir.join("fixtures");
    println!("cargo:rerun-if-changed={}", fixtures.display());

    let units = vec![
        GenerationUnit::new(SchemaReference::new(fixtures.join("storage.schema.json")), "StorageConfig")
            .with_output(out_dir.join("storage.rs")),
        GenerationUnit::new(SchemaReference::new(fixtures.join("catalog.schema.json")), "CatalogDocument")
            .with_root_name("Catalog")
            .with_existing_types(["Hash"])
            .with_output(out_dir.join("catalog.rs")),
    ];
    let report = generate_units(units, &GeneratorOptions::default());
    for diagnostic in report.diagnostics() {
        println!("cargo:warning={diagnostic}");
    }
    assert!(!report.has_errors(), "fixture generation failed");

    for file in report.files() {
        let output = file.output.as_ref().expect("every fixture unit has an output");
        std::fs::write(output, &file.contents).expect("write generated fixture types");
    }
}
