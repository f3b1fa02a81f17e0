//! Reads schema files and picks the node generation starts from.
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::schema::{escape_segment, SchemaDocument, DEFINITION_KEYS};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read schema file {}: {source}", path.display())]
    SchemaFileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema file {source_name} is not valid JSON: {source}")]
    SchemaParseFailed {
        source_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{selector} selects nothing in {source_name}")]
    RootNotFound { source_name: String, selector: String },
}

impl LoadError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            LoadError::SchemaFileNotFound { .. } => DiagnosticCode::FileNotFound,
            LoadError::SchemaParseFailed { .. } => DiagnosticCode::ParseFailure,
            LoadError::RootNotFound { .. } => DiagnosticCode::RootNotFound,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let subject = match self {
            LoadError::SchemaFileNotFound { path, .. } => format!("{}#", path.display()),
            LoadError::SchemaParseFailed { source_name, .. } => format!("{source_name}#"),
            LoadError::RootNotFound { source_name, selector } => {
                if selector.starts_with('#') {
                    format!("{source_name}{selector}")
                } else {
                    format!("{source_name}#")
                }
            }
        };
        Diagnostic::new(self.code(), self.to_string(), subject)
    }
}

/// Reads and parses `path`, then selects the generation root.
pub fn load_document(
    path: &Path,
    fragment: Option<&str>,
    root_name: Option<&str>,
) -> Result<SchemaDocument, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::SchemaFileNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "read schema");
    document_from_str(&path.display().to_string(), &text, fragment, root_name)
}

pub fn document_from_str(
    source_name: &str,
    text: &str,
    fragment: Option<&str>,
    root_name: Option<&str>,
) -> Result<SchemaDocument, LoadError> {
    let value = serde_json::from_str::<Value>(text).map_err(|source| LoadError::SchemaParseFailed {
        source_name: source_name.to_string(),
        source,
    })?;
    document_from_value(source_name, value, fragment, root_name)
}

/// Root selection, first rule that applies:
/// 1. an explicit pointer fragment;
/// 2. a requested root name: the document root when its `title` matches,
///    else the `$defs`/`definitions` entry of that name;
/// 3. a root `title` naming a definition (self-referential container);
/// 4. the document root.
pub fn document_from_value(
    source_name: &str,
    value: Value,
    fragment: Option<&str>,
    root_name: Option<&str>,
) -> Result<SchemaDocument, LoadError> {
    let not_found = |selector: String| LoadError::RootNotFound {
        source_name: source_name.to_string(),
        selector,
    };

    let pointer = if let Some(fragment) = fragment.filter(|fragment| !fragment.is_empty()) {
        let pointer = normalize_fragment(fragment);
        let path = &pointer[1..];
        if !path.is_empty() && value.pointer(path).is_none() {
            return Err(not_found(pointer));
        }
        pointer
    } else if let Some(name) = root_name {
        if title_of(&value) == Some(name) {
            "#".to_string()
        } else {
            definition_pointer(&value, name).ok_or_else(|| not_found(format!("root name `{name}`")))?
        }
    } else if let Some(pointer) = title_of(&value).and_then(|title| definition_pointer(&value, title)) {
        pointer
    } else {
        "#".to_string()
    };

    tracing::debug!(source = source_name, root = %pointer, "selected generation root");
    Ok(SchemaDocument::new(source_name, value, pointer))
}

fn normalize_fragment(fragment: &str) -> String {
    match fragment.strip_prefix('#') {
        Some(rest) => format!("#{rest}"),
        None => format!("#{fragment}"),
    }
}

fn title_of(value: &Value) -> Option<&str> {
    value.get("title")?.as_str()
}

fn definition_pointer(value: &Value, name: &str) -> Option<String> {
    DEFINITION_KEYS.iter().find_map(|table| {
        value
            .get(*table)?
            .get(name)
            .map(|_| format!("#/{}/{}", escape_segment(table), escape_segment(name)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root(value: Value, fragment: Option<&str>, root_name: Option<&str>) -> Result<String, LoadError> {
        document_from_value("mem.json", value, fragment, root_name)
            .map(|doc| doc.generation_root_pointer().to_string())
    }

    #[test]
    fn fragment_wins() {
        let schema = json!({"title": "A", "$defs": {"A": {}, "B": {}}});
        assert_eq!(root(schema.clone(), Some("#/$defs/B"), Some("A")).unwrap(), "#/$defs/B");
        assert_eq!(root(schema, Some("/$defs/B"), None).unwrap(), "#/$defs/B");
    }

    #[test]
    fn missing_fragment_is_root_not_found() {
        let err = root(json!({}), Some("#/$defs/Nope"), None).unwrap_err();
        assert_eq!(err.code(), DiagnosticCode::RootNotFound);
        assert_eq!(err.to_diagnostic().subject_path, "mem.json#/$defs/Nope");
    }

    #[test]
    fn root_name_prefers_matching_title_then_defs() {
        let titled = json!({"title": "Manifest", "$defs": {"Manifest": {}}});
        assert_eq!(root(titled, None, Some("Manifest")).unwrap(), "#");

        let both = json!({"definitions": {"X": {}}, "$defs": {"X": {}}});
        assert_eq!(root(both, None, Some("X")).unwrap(), "#/$defs/X");

        let legacy = json!({"definitions": {"X": {}}});
        assert_eq!(root(legacy, None, Some("X")).unwrap(), "#/definitions/X");

        let err = root(json!({}), None, Some("X")).unwrap_err();
        assert_eq!(err.code(), DiagnosticCode::RootNotFound);
    }

    #[test]
    fn self_referential_title_selects_definition() {
        let schema = json!({"title": "Catalog", "$ref": "#/$defs/Catalog", "$defs": {"Catalog": {}}});
        assert_eq!(root(schema, None, None).unwrap(), "#/$defs/Catalog");
        assert_eq!(root(json!({"title": "Lonely"}), None, None).unwrap(), "#");
    }

    #[test]
    fn parse_and_read_failures_map_to_codes() {
        let err = document_from_str("bad.json", "{ nope", None, None).unwrap_err();
        assert_eq!(err.code(), DiagnosticCode::ParseFailure);
        assert_eq!(err.to_diagnostic().subject_path, "bad.json#");

        let err = load_document(Path::new("/definitely/not/here.json"), None, None).unwrap_err();
        assert_eq!(err.code(), DiagnosticCode::FileNotFound);
    }
}
