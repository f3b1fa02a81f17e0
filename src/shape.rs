//! Shape classification of schema nodes.
//!
//! [`classify`] is pure: it reads the node (and, for mixed unions, the target
//! of an object `$ref`) and returns exactly one [`ShapeKind`]. The rules are
//! tried in a fixed order and the first match wins:
//!
//! 1. `allOf` with one meaningful entry is unwrapped; more is unsupported.
//! 2. `true`, or `anyOf` containing `true` → always-valid alias.
//! 3. `enum` of strings → string enum.
//! 4. `oneOf`/`anyOf` of string literals, nulls and bare strings → literal union.
//! 5. `oneOf`/`anyOf` of single-required-property objects → discriminated union.
//! 6. `oneOf`/`anyOf` of one object and string literals → mixed union.
//! 7. `oneOf`/`anyOf` of pure `$ref`s → ref-only union.
//! 8. object-like → plain object.
//! 9. bare string → string alias; other scalars and references → inline.
//! 10. anything else → opaque fallback.
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::schema::{SchemaDocument, SchemaNode};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Where a node sits. Only definitions can become string aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Definition,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscriminatorArm {
    pub property: String,
    /// Pointer of the arm's payload schema (the property value).
    pub pointer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum ShapeKind {
    PlainObject,
    StringEnum {
        values: Vec<String>,
        nullable: bool,
    },
    StringLiteralUnion {
        values: Vec<String>,
        open: bool,
        nullable: bool,
    },
    RefOnlyUnion {
        refs: Vec<String>,
        nullable: bool,
    },
    ObjectDiscriminatedUnion {
        arms: Vec<DiscriminatorArm>,
        nullable: bool,
    },
    MixedObjectStringUnion {
        /// Pointer of the object branch (inline object or `$ref`).
        object_arm: String,
        literals: Vec<String>,
        nullable: bool,
    },
    StringAlias {
        nullable: bool,
    },
    AlwaysValidAlias,
    /// Resolved in place by the type resolver; never a declaration of its own.
    Inline,
    OpaqueFallback {
        reason: String,
    },
}

impl ShapeKind {
    pub fn is_alias(&self) -> bool {
        matches!(self, ShapeKind::StringAlias { .. } | ShapeKind::AlwaysValidAlias)
    }
}

/// A classified node. `node` is the node after `allOf` unwrapping.
#[derive(Debug, Clone)]
pub struct Classification<'a> {
    pub node: SchemaNode<'a>,
    pub shape: ShapeKind,
}

// ————————————————————————————————————————————————————————————————————————————
// CLASSIFIER
// ————————————————————————————————————————————————————————————————————————————

pub fn classify<'a>(doc: &'a SchemaDocument, node: SchemaNode<'a>, placement: Placement) -> Classification<'a> {
    if let Some(entries) = node.items_of("allOf") {
        let mut meaningful = entries.into_iter().filter(SchemaNode::is_meaningful).collect::<Vec<_>>();
        if meaningful.len() > 1 {
            let reason = format!("allOf with {} meaningful entries is not supported", meaningful.len());
            return Classification {
                node,
                shape: ShapeKind::OpaqueFallback { reason },
            };
        }
        if let Some(inner) = meaningful.pop() {
            return classify(doc, inner, placement);
        }
    }
    let shape = classify_shape(doc, &node, placement);
    Classification { node, shape }
}

fn classify_shape(doc: &SchemaDocument, node: &SchemaNode<'_>, placement: Placement) -> ShapeKind {
    if node.is_true_schema() {
        return ShapeKind::AlwaysValidAlias;
    }
    if let Some(branches) = node.items_of("anyOf") {
        if branches.iter().any(SchemaNode::is_true_schema) {
            return ShapeKind::AlwaysValidAlias;
        }
    }
    if node.object().is_none() {
        return ShapeKind::OpaqueFallback {
            reason: format!("schema must be an object or `true`, found {}", node.value()),
        };
    }

    if let Some(shape) = string_enum(node) {
        return shape;
    }

    if let Some(branches) = node.union_branches() {
        let (nulls, rest): (Vec<_>, Vec<_>) = branches.into_iter().partition(SchemaNode::is_null_schema);
        let nullable = !nulls.is_empty();
        if let Some(shape) = literal_union(&rest, nullable) {
            return shape;
        }
        if let Some(shape) = discriminated_union(&rest, nullable) {
            return shape;
        }
        if let Some(shape) = mixed_union(doc, &rest, nullable) {
            return shape;
        }
        if rest.iter().all(SchemaNode::is_pure_ref) {
            let refs = rest
                .iter()
                .filter_map(SchemaNode::reference)
                .map(str::to_string)
                .collect();
            return ShapeKind::RefOnlyUnion { refs, nullable };
        }
        if let [only] = rest.as_slice() {
            let plain_string = bare_string(only).is_some() && !has_format(only);
            if placement == Placement::Definition && nullable && plain_string {
                return ShapeKind::StringAlias { nullable: true };
            }
            return ShapeKind::Inline;
        }
        return ShapeKind::OpaqueFallback {
            reason: "union branches match no supported union shape".to_string(),
        };
    }

    if let Some(spec) = node.type_spec() {
        if spec.kinds.len() > 1 {
            return ShapeKind::OpaqueFallback {
                reason: format!("type union [{}] is not supported", spec.kinds.join(", ")),
            };
        }
    }

    if node.is_object_like() || node.has("properties") || node.has("additionalProperties") {
        return ShapeKind::PlainObject;
    }

    if node.is_pure_ref() {
        return ShapeKind::Inline;
    }

    if let Some(spec) = node.type_spec() {
        match spec.single() {
            Some("string") => {
                let plain = !node.has("const") && !has_format(node);
                return if plain && placement == Placement::Definition {
                    ShapeKind::StringAlias { nullable: spec.nullable }
                } else {
                    ShapeKind::Inline
                };
            }
            Some("boolean" | "integer" | "number" | "array") => return ShapeKind::Inline,
            _ => {}
        }
    }
    if matches!(node.get("const"), Some(Value::String(_))) {
        return ShapeKind::Inline;
    }

    ShapeKind::OpaqueFallback {
        reason: "schema matches no supported shape".to_string(),
    }
}

/// Rule 3: `enum` with `type` absent or `"string"` and string values.
fn string_enum(node: &SchemaNode<'_>) -> Option<ShapeKind> {
    let values = node.get("enum")?.as_array()?;
    let type_nullable = match node.type_spec() {
        None => false,
        Some(spec) if spec.is("string") => spec.nullable,
        Some(_) => return None,
    };
    let mut strings = Vec::new();
    let mut value_nullable = false;
    for value in values {
        match value {
            Value::String(text) => strings.push(text.clone()),
            Value::Null => value_nullable = true,
            _ => return None,
        }
    }
    if strings.is_empty() {
        return None;
    }
    Some(ShapeKind::StringEnum {
        values: dedup(strings),
        nullable: type_nullable || value_nullable,
    })
}

/// Rule 4: every non-null branch is a literal or a bare string, at least one
/// literal.
fn literal_union(branches: &[SchemaNode<'_>], nullable: bool) -> Option<ShapeKind> {
    let mut values = Vec::new();
    let mut open = false;
    let mut nullable = nullable;
    for branch in branches {
        if let Some((literals, literal_nullable)) = string_literals(branch) {
            values.extend(literals);
            nullable |= literal_nullable;
        } else if let Some(string_nullable) = bare_string(branch) {
            open = true;
            nullable |= string_nullable;
        } else {
            return None;
        }
    }
    if values.is_empty() {
        return None;
    }
    Some(ShapeKind::StringLiteralUnion {
        values: dedup(values),
        open,
        nullable,
    })
}

/// Rule 5: inline objects with exactly one property, which is required, and
/// pairwise distinct property names.
fn discriminated_union(branches: &[SchemaNode<'_>], nullable: bool) -> Option<ShapeKind> {
    if branches.len() < 2 {
        return None;
    }
    let mut seen = BTreeSet::new();
    let mut arms = Vec::with_capacity(branches.len());
    for branch in branches {
        if branch.is_pure_ref() || !branch.is_object_like() {
            return None;
        }
        let properties = branch.entries_of("properties");
        let [(property, payload)] = properties.as_slice() else {
            return None;
        };
        if !branch.required().contains(property) || !seen.insert(*property) {
            return None;
        }
        arms.push(DiscriminatorArm {
            property: property.to_string(),
            pointer: payload.pointer().to_string(),
        });
    }
    Some(ShapeKind::ObjectDiscriminatedUnion { arms, nullable })
}

/// Rule 6: one object branch (inline or `$ref` to an object definition), the
/// rest closed string literals.
fn mixed_union(doc: &SchemaDocument, branches: &[SchemaNode<'_>], nullable: bool) -> Option<ShapeKind> {
    let mut object_arm = None;
    let mut literals = Vec::new();
    let mut nullable = nullable;
    for branch in branches {
        if let Some((values, literal_nullable)) = string_literals(branch) {
            literals.extend(values);
            nullable |= literal_nullable;
            continue;
        }
        let is_object = if branch.is_pure_ref() {
            branch
                .reference()
                .and_then(|reference| doc.resolve_ref(reference))
                .is_some_and(|target| target.is_object_like())
        } else {
            branch.is_object_like()
        };
        if !is_object || object_arm.is_some() {
            return None;
        }
        object_arm = Some(branch.pointer().to_string());
    }
    if literals.is_empty() {
        return None;
    }
    Some(ShapeKind::MixedObjectStringUnion {
        object_arm: object_arm?,
        literals: dedup(literals),
        nullable,
    })
}

/// String literals carried by a `const` or string `enum` branch, and whether
/// the branch also admits null.
fn string_literals(node: &SchemaNode<'_>) -> Option<(Vec<String>, bool)> {
    if let Some(spec) = node.type_spec() {
        if !spec.is("string") {
            return None;
        }
    }
    if let Some(Value::String(text)) = node.get("const") {
        return Some((vec![text.clone()], false));
    }
    match string_enum(node)? {
        ShapeKind::StringEnum { values, nullable } => Some((values, nullable)),
        _ => None,
    }
}

/// `{type: "string"}` without literals; returns its nullability.
fn bare_string(node: &SchemaNode<'_>) -> Option<bool> {
    let spec = node.type_spec()?;
    if !spec.is("string") || node.has("enum") || node.has("const") || node.has("$ref") {
        return None;
    }
    Some(spec.nullable)
}

fn has_format(node: &SchemaNode<'_>) -> bool {
    node.has("format")
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values.into_iter().filter(|value| seen.insert(value.clone())).collect()
}

// ————————————————————————————————————————————————————————————————————————————
// SURVEY
// ————————————————————————————————————————————————————————————————————————————

/// Shape of the generation root and of every definition, keyed by pointer.
pub fn survey(doc: &SchemaDocument) -> IndexMap<String, ShapeKind> {
    let mut out = IndexMap::new();
    let root = classify(doc, doc.generation_root(), Placement::Definition);
    out.insert(doc.generation_root_pointer().to_string(), root.shape);
    for (_, node) in doc.definitions() {
        let pointer = node.pointer().to_string();
        if out.contains_key(&pointer) {
            continue;
        }
        out.insert(pointer, classify(doc, node, Placement::Definition).shape);
    }
    out
}
