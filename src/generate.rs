//! Generation entry points.
//!
//! A [`GenerationUnit`] names one schema reference and the container type its
//! root becomes. Units are independent: each gets its own context and its own
//! diagnostics, and [`generate_units`] runs them on the rayon pool.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::codegen;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::emit::emit_document;
use crate::loader::load_document;
use crate::schema::SchemaDocument;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Output settings, passed explicitly to every entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorOptions {
    /// Path generated code uses to reach `typegen-runtime`.
    pub runtime_path: String,
    /// Copy schema `description`s into `///` docs.
    pub emit_docs: bool,
    /// Extra comment lines below the `@generated` banner.
    pub header: Option<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            runtime_path: "::typegen_runtime".to_string(),
            emit_docs: true,
            header: None,
        }
    }
}

impl GeneratorOptions {
    /// Runtime path as written into generated code. Bare crate names become
    /// absolute (`typegen_runtime` → `::typegen_runtime`).
    pub fn runtime(&self) -> String {
        let path = self.runtime_path.trim();
        let relative = ["::", "crate::", "self::", "super::"]
            .iter()
            .any(|prefix| path.starts_with(prefix))
            || matches!(path, "crate" | "self" | "super");
        if relative { path.to_string() } else { format!("::{path}") }
    }
}

/// `path/to/schema.json` with an optional `#/json/pointer` fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaReference {
    pub path: PathBuf,
    pub fragment: Option<String>,
}

impl SchemaReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fragment: None,
        }
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Resolves a relative path against `base`.
    pub fn relative_to(mut self, base: &Path) -> Self {
        if self.path.is_relative() {
            self.path = base.join(&self.path);
        }
        self
    }
}

impl FromStr for SchemaReference {
    type Err = std::convert::Infallible;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(match text.split_once('#') {
            Some((path, fragment)) => Self {
                path: PathBuf::from(path),
                fragment: (!fragment.is_empty()).then(|| format!("#{fragment}")),
            },
            None => Self::new(text),
        })
    }
}

impl fmt::Display for SchemaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        match &self.fragment {
            Some(fragment) => f.write_str(fragment),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationUnit {
    pub schema: SchemaReference,
    /// Root-name hint for root selection.
    pub root_name: Option<String>,
    /// Name of the type the generation root becomes.
    pub container: String,
    /// Hand-written types; definitions with these names are not emitted.
    pub existing_types: BTreeSet<String>,
    pub output: Option<PathBuf>,
}

impl GenerationUnit {
    pub fn new(schema: SchemaReference, container: impl Into<String>) -> Self {
        Self {
            schema,
            root_name: None,
            container: container.into(),
            existing_types: BTreeSet::new(),
            output: None,
        }
    }

    pub fn with_root_name(mut self, root_name: impl Into<String>) -> Self {
        self.root_name = Some(root_name.into());
        self
    }

    pub fn with_existing_types<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.existing_types.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Units sharing this key generate from the same schema file, whatever
    /// fragment or root name they select.
    fn duplicate_key(&self) -> PathBuf {
        std::fs::canonicalize(&self.schema.path).unwrap_or_else(|_| self.schema.path.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub output: Option<PathBuf>,
    pub contents: String,
    /// Declared type names, in file order.
    pub declarations: Vec<String>,
    /// Referenced names the file does not declare. The caller provides them.
    pub external_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub unit: GenerationUnit,
    /// `None` when the unit failed.
    pub file: Option<GeneratedFile>,
    pub diagnostics: Vec<Diagnostic>,
}

impl UnitOutcome {
    pub fn failed(&self) -> bool {
        self.file.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// One outcome per unit, in input order.
    pub outcomes: Vec<UnitOutcome>,
}

impl GenerationReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics().any(Diagnostic::is_error)
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.outcomes.iter().flat_map(|outcome| outcome.diagnostics.iter())
    }

    pub fn files(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.outcomes.iter().filter_map(|outcome| outcome.file.as_ref())
    }

    pub fn failed_units(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.failed()).count()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Runs every unit. Units that share a schema file all fail with
/// `DuplicateReference`; the rest run in parallel and never affect
/// each other.
pub fn generate_units(units: Vec<GenerationUnit>, options: &GeneratorOptions) -> GenerationReport {
    let mut groups: BTreeMap<_, Vec<usize>> = BTreeMap::new();
    for (index, unit) in units.iter().enumerate() {
        groups.entry(unit.duplicate_key()).or_default().push(index);
    }
    let mut duplicated = BTreeMap::new();
    for members in groups.values().filter(|members| members.len() > 1) {
        let containers = members
            .iter()
            .map(|index| units[*index].container.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        for index in members {
            duplicated.insert(*index, containers.clone());
        }
    }

    let outcomes = units
        .into_par_iter()
        .enumerate()
        .map(|(index, unit)| match duplicated.get(&index) {
            Some(containers) => {
                let diagnostic = Diagnostic::new(
                    DiagnosticCode::DuplicateReference,
                    format!("`{}` is the source of more than one unit ({containers})", unit.schema.path.display()),
                    subject_of(&unit.schema),
                );
                UnitOutcome {
                    unit,
                    file: None,
                    diagnostics: vec![diagnostic],
                }
            }
            None => generate_unit(unit, options),
        })
        .collect::<Vec<_>>();
    let report = GenerationReport { outcomes };
    tracing::info!(
        units = report.outcomes.len(),
        failed = report.failed_units(),
        "generation finished"
    );
    report
}

/// Loads and generates one unit.
pub fn generate_unit(unit: GenerationUnit, options: &GeneratorOptions) -> UnitOutcome {
    let span = tracing::debug_span!("unit", container = %unit.container, schema = %unit.schema);
    let _entered = span.enter();
    let doc = match load_document(&unit.schema.path, unit.schema.fragment.as_deref(), unit.root_name.as_deref()) {
        Ok(doc) => doc,
        Err(error) => {
            tracing::debug!(%error, "schema not loaded");
            return UnitOutcome {
                unit,
                file: None,
                diagnostics: vec![error.to_diagnostic()],
            };
        }
    };
    let (file, diagnostics) = generate_document(&doc, &unit.container, &unit.existing_types, options);
    let file = file.map(|file| GeneratedFile {
        output: unit.output.clone(),
        ..file
    });
    UnitOutcome {
        unit,
        file,
        diagnostics: diagnostics.into_vec(),
    }
}

/// Generates Rust source for an already-loaded document.
pub fn generate_document(
    doc: &SchemaDocument,
    container: &str,
    existing: &BTreeSet<String>,
    options: &GeneratorOptions,
) -> (Option<GeneratedFile>, Diagnostics) {
    let emission = emit_document(doc, container, existing);
    if emission.failed() {
        return (None, emission.diagnostics);
    }
    let contents = codegen::render(&emission.declarations, options, &banner_subject(doc));
    let declarations = emission
        .declarations
        .iter()
        .map(|declaration| declaration.name.clone())
        .collect::<Vec<_>>();
    let external_types = emission
        .declarations
        .iter()
        .flat_map(|declaration| declaration.dependencies())
        .filter(|name| !declarations.iter().any(|declared| declared == name))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    tracing::debug!(
        declarations = declarations.len(),
        external = external_types.len(),
        bytes = contents.len(),
        "rendered unit"
    );
    let file = GeneratedFile {
        output: None,
        contents,
        declarations,
        external_types,
    };
    (Some(file), emission.diagnostics)
}

/// File name plus root pointer; stable across checkouts.
fn banner_subject(doc: &SchemaDocument) -> String {
    let source = Path::new(doc.source())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| doc.source().to_string());
    format!("{source}{}", doc.generation_root_pointer())
}

fn subject_of(schema: &SchemaReference) -> String {
    format!("{}{}", schema.path.display(), schema.fragment.as_deref().unwrap_or("#"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::document_from_value;
    use serde_json::json;

    #[test]
    fn schema_reference_parsing() {
        let reference = "schemas/a.json#/$defs/A".parse::<SchemaReference>().unwrap();
        assert_eq!(reference.path, PathBuf::from("schemas/a.json"));
        assert_eq!(reference.fragment.as_deref(), Some("#/$defs/A"));
        assert_eq!(reference.to_string(), "schemas/a.json#/$defs/A");

        let bare = "a.json#".parse::<SchemaReference>().unwrap();
        assert_eq!(bare, SchemaReference::new("a.json"));

        let joined = SchemaReference::new("a.json").relative_to(Path::new("/base"));
        assert_eq!(joined.path, PathBuf::from("/base/a.json"));
    }

    #[test]
    fn runtime_path_normalization() {
        let with = |path: &str| GeneratorOptions {
            runtime_path: path.into(),
            ..GeneratorOptions::default()
        };
        assert_eq!(GeneratorOptions::default().runtime(), "::typegen_runtime");
        assert_eq!(with("typegen_runtime").runtime(), "::typegen_runtime");
        assert_eq!(with("crate::runtime").runtime(), "crate::runtime");
        assert_eq!(with("super::rt").runtime(), "super::rt");
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: GeneratorOptions = serde_json::from_value(json!({"emit_docs": false})).unwrap();
        assert_eq!(options.runtime_path, "::typegen_runtime");
        assert!(!options.emit_docs);
        assert!(serde_json::from_value::<GeneratorOptions>(json!({"bogus": 1})).is_err());
    }

    #[test]
    fn document_generation_is_deterministic() {
        let schema = json!({
            "type": "object",
            "properties": {
                "b": {"enum": ["x", "y"]},
                "a": {"oneOf": [{"const": "ok"}, {"type": "string"}]}
            },
            "$defs": {"Zed": {"type": "object"}, "Alpha": {"type": "object"}}
        });
        let doc = document_from_value("dir/mem.json", schema, None, None).unwrap();
        let options = GeneratorOptions::default();
        let (first, _) = generate_document(&doc, "Root", &BTreeSet::new(), &options);
        let (second, _) = generate_document(&doc, "Root", &BTreeSet::new(), &options);
        let first = first.unwrap();
        assert_eq!(first, second.unwrap());
        assert!(first.contents.starts_with("// @generated by schema-typegen from `mem.json#`"));
        assert_eq!(first.declarations, ["Root", "Alpha", "Zed", "RootB", "RootA"]);
    }
}
