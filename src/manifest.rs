//! Explicit registration list of generation units.
//!
//! ```json
//! { "options": { "runtime_path": "typegen_runtime" },
//!   "units": [ { "schema": "schemas/manifest.json#/$defs/Manifest",
//!                "root_name": "Manifest", "container": "ManifestDefinition",
//!                "output": "src/generated/manifest.rs",
//!                "existing_types": ["Hash"] } ] }
//! ```
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::generate::{GenerationUnit, GeneratorOptions, SchemaReference};
use crate::naming::escape_keyword;
use crate::path_de::{from_str_with_path, PathError};

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub options: GeneratorOptions,
    pub units: Vec<ManifestUnit>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestUnit {
    /// `path#/pointer`, relative to the manifest's directory.
    pub schema: String,
    #[serde(default)]
    pub root_name: Option<String>,
    pub container: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub existing_types: BTreeSet<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read manifest {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: PathError,
    },

    #[error("units[{index}]: `{container}` is not a usable type name")]
    InvalidContainer { index: usize, container: String },
}

impl ManifestError {
    pub fn to_diagnostic(&self, manifest: &Path) -> Diagnostic {
        let code = match self {
            ManifestError::Read { .. } => DiagnosticCode::FileNotFound,
            ManifestError::Invalid { .. } | ManifestError::InvalidContainer { .. } => DiagnosticCode::ParseFailure,
        };
        Diagnostic::new(code, self.to_string(), format!("{}#", manifest.display()))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::parse(path, &text)?;
        tracing::debug!(manifest = %path.display(), units = manifest.units.len(), "loaded manifest");
        Ok(manifest)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = from_str_with_path(text).map_err(|source| ManifestError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
        for (index, unit) in manifest.units.iter().enumerate() {
            if !is_type_ident(&unit.container) {
                return Err(ManifestError::InvalidContainer {
                    index,
                    container: unit.container.clone(),
                });
            }
        }
        Ok(manifest)
    }

    /// Units with schema and output paths joined onto `base`.
    pub fn units(&self, base: &Path) -> Vec<GenerationUnit> {
        self.units
            .iter()
            .map(|unit| {
                let schema = match unit.schema.parse::<SchemaReference>() {
                    Ok(schema) => schema,
                    Err(never) => match never {},
                };
                GenerationUnit {
                    schema: schema.relative_to(base),
                    root_name: unit.root_name.clone(),
                    container: unit.container.clone(),
                    existing_types: unit.existing_types.clone(),
                    output: unit.output.as_ref().map(|output| base.join(output)),
                }
            })
            .collect()
    }
}

/// A plain identifier that needs no raw escaping.
fn is_type_ident(name: &str) -> bool {
    IDENT.is_match(name) && name != "_" && escape_keyword(name) == name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_resolve_against_the_manifest_directory() {
        let manifest = Manifest::parse(
            Path::new("cfg/typegen.json"),
            r#"{
                "options": {"runtime_path": "typegen_runtime", "emit_docs": false},
                "units": [{
                    "schema": "schemas/manifest.json#/$defs/Manifest",
                    "root_name": "Manifest",
                    "container": "ManifestDefinition",
                    "output": "src/generated/manifest.rs",
                    "existing_types": ["Hash"]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.options.runtime(), "::typegen_runtime");
        assert!(!manifest.options.emit_docs);

        let units = manifest.units(Path::new("/repo"));
        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.schema.path, PathBuf::from("/repo/schemas/manifest.json"));
        assert_eq!(unit.schema.fragment.as_deref(), Some("#/$defs/Manifest"));
        assert_eq!(unit.root_name.as_deref(), Some("Manifest"));
        assert_eq!(unit.output, Some(PathBuf::from("/repo/src/generated/manifest.rs")));
        assert!(unit.existing_types.contains("Hash"));
    }

    #[test]
    fn errors_name_the_json_path() {
        let err = Manifest::parse(Path::new("m.json"), r#"{"units": [{"schema": "a.json", "container": 4}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("units[0].container"), "{err}");

        let err = Manifest::parse(Path::new("m.json"), r#"{"units": [], "extra": true}"#).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { .. }));
    }

    #[test]
    fn containers_must_be_plain_identifiers() {
        for container in ["Not A Type", "type", "self", "_", ""] {
            let text = format!(r#"{{"units": [{{"schema": "a.json", "container": "{container}"}}]}}"#);
            let err = Manifest::parse(Path::new("m.json"), &text).unwrap_err();
            assert!(matches!(err, ManifestError::InvalidContainer { index: 0, .. }), "{container}");
        }
        let err = Manifest::load(Path::new("/definitely/missing/typegen.json")).unwrap_err();
        assert_eq!(err.to_diagnostic(Path::new("typegen.json")).code, DiagnosticCode::FileNotFound);
    }
}
