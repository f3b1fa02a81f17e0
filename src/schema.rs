//! Parsed schema documents and pointer-addressed nodes.
//!
//! Every node handed to the classifier carries the JSON Pointer it was read
//! from, so diagnostics and deferred declarations can always point back at
//! the schema fragment that produced them.

use serde_json::{Map, Value};

/// Keys holding reusable definitions, in lookup preference order.
pub const DEFINITION_KEYS: [&str; 2] = ["$defs", "definitions"];

/// Keys that give a schema structure. An entry without any of them is
/// constraint or documentation only (e.g. `{"minLength": 1}`).
const STRUCTURAL_KEYS: &[&str] = &[
    "$ref",
    "type",
    "properties",
    "additionalProperties",
    "items",
    "enum",
    "const",
    "oneOf",
    "anyOf",
    "allOf",
];

/// Keys that may sit next to `$ref` without making it more than a reference.
const ANNOTATION_KEYS: &[&str] = &[
    "$ref",
    "description",
    "title",
    "$comment",
    "examples",
    "default",
    "deprecated",
    "readOnly",
    "writeOnly",
];

/// One schema document, plus the pointer of the node generation starts from.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    source: String,
    root: Value,
    generation_root: String,
}

impl SchemaDocument {
    /// `generation_root` must be a `#`-prefixed pointer that resolves in `root`.
    pub fn new(source: impl Into<String>, root: Value, generation_root: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            root,
            generation_root: generation_root.into(),
        }
    }

    /// Display path of the document (file path or an in-memory label).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn generation_root_pointer(&self) -> &str {
        &self.generation_root
    }

    pub fn generation_root(&self) -> SchemaNode<'_> {
        self.node_at(&self.generation_root)
            .unwrap_or_else(|| SchemaNode::new(&self.root, "#"))
    }

    /// Looks up a `#`-prefixed JSON Pointer.
    pub fn node_at(&self, pointer: &str) -> Option<SchemaNode<'_>> {
        let path = pointer.strip_prefix('#')?;
        let value = if path.is_empty() {
            &self.root
        } else {
            self.root.pointer(path)?
        };
        Some(SchemaNode::new(value, pointer))
    }

    /// Resolves a document-local `$ref`. References into other documents are
    /// not followed and yield `None`.
    pub fn resolve_ref(&self, reference: &str) -> Option<SchemaNode<'_>> {
        self.node_at(local_pointer(reference)?)
    }

    /// All `$defs`/`definitions` entries of the document root, sorted by key.
    /// A key present in both tables resolves to the `$defs` entry.
    pub fn definitions(&self) -> Vec<(String, SchemaNode<'_>)> {
        let mut entries = std::collections::BTreeMap::new();
        for table in DEFINITION_KEYS.iter().rev() {
            let Some(defs) = self.root.get(*table).and_then(Value::as_object) else {
                continue;
            };
            for (key, value) in defs {
                let pointer = format!("#/{}/{}", escape_segment(table), escape_segment(key));
                entries.insert(key.clone(), SchemaNode::new(value, pointer));
            }
        }
        entries.into_iter().collect()
    }

    /// `source#pointer`, the subject path used by diagnostics.
    pub fn subject(&self, pointer: &str) -> String {
        format!("{}{}", self.source, pointer)
    }
}

/// Strips a local `$ref` down to its `#`-prefixed pointer.
pub fn local_pointer(reference: &str) -> Option<&str> {
    reference.starts_with('#').then_some(reference)
}

/// Escapes a key for use as a JSON Pointer segment.
pub fn escape_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Last segment of a pointer, unescaped.
pub fn last_segment(pointer: &str) -> String {
    let raw = pointer.rsplit('/').next().unwrap_or(pointer);
    raw.replace("~1", "/").replace("~0", "~")
}

/// Declared `type` of a node, split into primitive kinds and nullability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec<'a> {
    pub kinds: Vec<&'a str>,
    pub nullable: bool,
}

impl TypeSpec<'_> {
    pub fn single(&self) -> Option<&str> {
        match self.kinds.as_slice() {
            [kind] => Some(*kind),
            _ => None,
        }
    }

    pub fn is(&self, kind: &str) -> bool {
        self.single() == Some(kind)
    }
}

/// A borrowed schema value and the pointer it lives at.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode<'a> {
    value: &'a Value,
    pointer: String,
}

impl<'a> SchemaNode<'a> {
    pub fn new(value: &'a Value, pointer: impl Into<String>) -> Self {
        Self {
            value,
            pointer: pointer.into(),
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    pub fn object(&self) -> Option<&'a Map<String, Value>> {
        self.value.as_object()
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.object()?.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn str_field(&self, key: &str) -> Option<&'a str> {
        self.get(key)?.as_str()
    }

    /// Child node under `key`.
    pub fn child(&self, key: &str) -> Option<SchemaNode<'a>> {
        let value = self.get(key)?;
        Some(SchemaNode::new(value, format!("{}/{}", self.pointer, escape_segment(key))))
    }

    /// Entries of an array-valued keyword (`oneOf`, `allOf`, ...).
    pub fn items_of(&self, key: &str) -> Option<Vec<SchemaNode<'a>>> {
        let entries = self.get(key)?.as_array()?;
        Some(
            entries
                .iter()
                .enumerate()
                .map(|(index, value)| {
                    SchemaNode::new(value, format!("{}/{}/{}", self.pointer, escape_segment(key), index))
                })
                .collect(),
        )
    }

    /// Entries of an object-valued keyword (`properties`), in document order.
    pub fn entries_of(&self, key: &str) -> Vec<(&'a str, SchemaNode<'a>)> {
        let Some(map) = self.get(key).and_then(Value::as_object) else {
            return Vec::new();
        };
        map.iter()
            .map(|(name, value)| {
                let pointer = format!(
                    "{}/{}/{}",
                    self.pointer,
                    escape_segment(key),
                    escape_segment(name)
                );
                (name.as_str(), SchemaNode::new(value, pointer))
            })
            .collect()
    }

    /// `oneOf` branches, else `anyOf` branches.
    pub fn union_branches(&self) -> Option<Vec<SchemaNode<'a>>> {
        self.items_of("oneOf").or_else(|| self.items_of("anyOf"))
    }

    pub fn required(&self) -> Vec<&'a str> {
        self.get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn description(&self) -> Option<&'a str> {
        self.str_field("description")
    }

    pub fn reference(&self) -> Option<&'a str> {
        self.str_field("$ref")
    }

    pub fn is_true_schema(&self) -> bool {
        matches!(self.value, Value::Bool(true))
    }

    /// `$ref` plus annotations only.
    pub fn is_pure_ref(&self) -> bool {
        match self.object() {
            Some(map) => {
                map.contains_key("$ref") && map.keys().all(|key| ANNOTATION_KEYS.contains(&key.as_str()))
            }
            None => false,
        }
    }

    /// `{"type": "null"}` (or `{"const": null}`).
    pub fn is_null_schema(&self) -> bool {
        if let Some(spec) = self.type_spec() {
            return spec.kinds.is_empty() && spec.nullable;
        }
        matches!(self.get("const"), Some(Value::Null))
    }

    /// Whether the node contributes structure rather than constraints only.
    pub fn is_meaningful(&self) -> bool {
        match self.value {
            Value::Bool(_) => true,
            Value::Object(map) => STRUCTURAL_KEYS.iter().any(|key| map.contains_key(*key)),
            _ => false,
        }
    }

    /// Declared object shape: `type: object`, or `properties` /
    /// `additionalProperties` without a conflicting type.
    pub fn is_object_like(&self) -> bool {
        match self.type_spec() {
            Some(spec) => spec.is("object"),
            None => self.has("properties") || self.has("additionalProperties"),
        }
    }

    /// `None` when `type` is absent or not a string/array of strings.
    pub fn type_spec(&self) -> Option<TypeSpec<'a>> {
        let declared = self.get("type")?;
        let names: Vec<&'a str> = match declared {
            Value::String(name) => vec![name.as_str()],
            Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
            _ => return None,
        };
        let nullable = names.contains(&"null");
        let kinds = names.into_iter().filter(|name| *name != "null").collect();
        Some(TypeSpec { kinds, nullable })
    }
}
