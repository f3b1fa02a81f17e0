//! Definitions that stand for a primitive rather than a generated type.
use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{TypeKind, TypeRef};
use crate::schema::{SchemaDocument, SchemaNode};
use crate::shape::{classify, Placement, ShapeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasTarget {
    String { nullable: bool },
    AlwaysValid,
}

impl AliasTarget {
    pub fn from_shape(shape: &ShapeKind) -> Option<Self> {
        match shape {
            ShapeKind::StringAlias { nullable } => Some(AliasTarget::String { nullable: *nullable }),
            ShapeKind::AlwaysValidAlias => Some(AliasTarget::AlwaysValid),
            _ => None,
        }
    }

    /// Type a reference to the alias resolves to. `site_nullable` is OR-ed
    /// with the alias's own nullability.
    pub fn type_ref(self, site_nullable: bool) -> TypeRef {
        match self {
            AliasTarget::String { nullable } => TypeRef::new(TypeKind::String).or_nullable(nullable || site_nullable),
            AliasTarget::AlwaysValid => TypeRef::opaque().or_nullable(site_nullable),
        }
    }
}

/// Alias definitions of one document, keyed by definition pointer.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    string_aliases: BTreeMap<String, bool>,
    always_valid: BTreeSet<String>,
}

impl AliasTable {
    /// Classifies every definition of `doc` and keeps the aliases.
    pub fn collect(doc: &SchemaDocument) -> Self {
        let mut table = Self::default();
        for (_, node) in doc.definitions() {
            let shape = classify(doc, node.clone(), Placement::Definition).shape;
            table.record(node.pointer(), &shape);
        }
        table
    }

    pub fn record(&mut self, pointer: &str, shape: &ShapeKind) {
        match AliasTarget::from_shape(shape) {
            Some(AliasTarget::String { nullable }) => {
                self.string_aliases.insert(pointer.to_string(), nullable);
            }
            Some(AliasTarget::AlwaysValid) => {
                self.always_valid.insert(pointer.to_string());
            }
            None => {}
        }
    }

    pub fn lookup(&self, pointer: &str) -> Option<AliasTarget> {
        if let Some(nullable) = self.string_aliases.get(pointer) {
            return Some(AliasTarget::String { nullable: *nullable });
        }
        self.always_valid.contains(pointer).then_some(AliasTarget::AlwaysValid)
    }

    /// Resolves a `$ref` whose target is a known alias.
    pub fn resolve(&self, target: &SchemaNode<'_>, site_nullable: bool) -> Option<TypeRef> {
        self.lookup(target.pointer()).map(|alias| alias.type_ref(site_nullable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> SchemaDocument {
        SchemaDocument::new(
            "mem.json",
            json!({
                "$defs": {
                    "Label": {"type": ["string", "null"]},
                    "Name": {"type": "string"},
                    "Maybe": {"anyOf": [{"type": "string"}, {"type": "null"}]},
                    "Anything": true,
                    "Loose": {"anyOf": [true, {"type": "integer"}]},
                    "Obj": {"type": "object"},
                    "Choice": {"oneOf": [{"const": "a"}, {"type": "null"}]}
                }
            }),
            "#",
        )
    }

    #[test]
    fn collects_string_and_always_valid_aliases() {
        let table = AliasTable::collect(&doc());
        assert_eq!(table.lookup("#/$defs/Name"), Some(AliasTarget::String { nullable: false }));
        assert_eq!(table.lookup("#/$defs/Label"), Some(AliasTarget::String { nullable: true }));
        assert_eq!(table.lookup("#/$defs/Maybe"), Some(AliasTarget::String { nullable: true }));
        assert_eq!(table.lookup("#/$defs/Anything"), Some(AliasTarget::AlwaysValid));
        assert_eq!(table.lookup("#/$defs/Loose"), Some(AliasTarget::AlwaysValid));
        assert_eq!(table.lookup("#/$defs/Obj"), None);
        assert_eq!(table.lookup("#/$defs/Choice"), None);
    }

    #[test]
    fn nullability_combines_with_site() {
        let table = AliasTable::collect(&doc());
        let doc = doc();
        let name = doc.node_at("#/$defs/Name").unwrap();
        assert_eq!(table.resolve(&name, false), Some(TypeRef::new(TypeKind::String)));
        assert_eq!(
            table.resolve(&name, true),
            Some(TypeRef::new(TypeKind::String).or_nullable(true))
        );
        let label = doc.node_at("#/$defs/Label").unwrap();
        assert!(table.resolve(&label, false).unwrap().nullable);
        let anything = doc.node_at("#/$defs/Anything").unwrap();
        assert_eq!(table.resolve(&anything, false), Some(TypeRef::opaque()));
    }
}
