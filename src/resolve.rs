//! Maps property and item schemas to type references.
use serde_json::Value;

use crate::context::GenerationContext;
use crate::ir::{IntWidth, TypeKind, TypeRef};
use crate::schema::{local_pointer, SchemaNode};
use crate::shape::{classify, Placement, ShapeKind};

impl<'a> GenerationContext<'a> {
    /// Resolves the schema of `property` on `owner`. Property-local enums and
    /// unions are deferred under the name `<owner><Property>`.
    pub fn resolve(&mut self, node: SchemaNode<'a>, owner: &str, property: &str) -> TypeRef {
        if let Some(entries) = node.items_of("allOf") {
            let meaningful = entries.into_iter().filter(SchemaNode::is_meaningful).collect::<Vec<_>>();
            if meaningful.len() > 1 {
                let message = format!(
                    "allOf with {} meaningful entries is not supported; only the first is used",
                    meaningful.len()
                );
                self.warn(node.pointer(), message);
            }
            if let Some(first) = meaningful.into_iter().next() {
                return self.resolve(first, owner, property);
            }
        }

        if let Some(reference) = node.reference() {
            return self.resolve_reference(&node, reference, owner, property);
        }

        if let Some(branches) = node.union_branches() {
            let (nulls, rest): (Vec<_>, Vec<_>) = branches.into_iter().partition(SchemaNode::is_null_schema);
            if let [only] = rest.as_slice() {
                return self.resolve(only.clone(), owner, property).or_nullable(!nulls.is_empty());
            }
        }

        let shape = classify(self.doc, node.clone(), Placement::Inline).shape;
        match shape {
            ShapeKind::StringEnum { .. }
            | ShapeKind::StringLiteralUnion { .. }
            | ShapeKind::RefOnlyUnion { .. }
            | ShapeKind::ObjectDiscriminatedUnion { .. }
            | ShapeKind::MixedObjectStringUnion { .. } => {
                return self.defer(owner, property, node, &shape);
            }
            ShapeKind::AlwaysValidAlias => return TypeRef::opaque(),
            _ => {}
        }

        self.resolve_primitive(node, owner, property)
    }

    fn resolve_primitive(&mut self, node: SchemaNode<'a>, owner: &str, property: &str) -> TypeRef {
        let Some(spec) = node.type_spec() else {
            if matches!(node.get("const"), Some(Value::String(_))) {
                return TypeRef::new(TypeKind::String);
            }
            if node.has("properties") || node.has("additionalProperties") {
                return self.resolve_object(node, owner, property, false);
            }
            if node.is_meaningful() {
                self.warn(node.pointer(), "schema has no resolvable type; using an opaque value");
            }
            return TypeRef::opaque();
        };

        let resolved = match spec.kinds.as_slice() {
            ["string"] => TypeRef::new(TypeKind::String),
            ["boolean"] => TypeRef::new(TypeKind::Bool),
            ["integer"] => TypeRef::new(TypeKind::Integer(IntWidth::from_format(node.str_field("format")))),
            ["number"] => TypeRef::new(TypeKind::Double),
            ["array"] => {
                let item = match node.child("items") {
                    Some(items) if items.object().is_some() || items.is_true_schema() => {
                        self.resolve(items, owner, property)
                    }
                    Some(items) => {
                        self.warn(items.pointer(), "tuple `items` is not supported; using opaque items");
                        TypeRef::opaque()
                    }
                    None => TypeRef::opaque(),
                };
                TypeRef::new(TypeKind::List(Box::new(item)))
            }
            ["object"] => return self.resolve_object(node, owner, property, spec.nullable),
            [] => {
                self.warn(node.pointer(), "a `null`-only schema has no value type; using an opaque value");
                TypeRef::opaque()
            }
            kinds => {
                let message = format!("type union [{}] is not supported; using an opaque value", kinds.join(", "));
                self.warn(node.pointer(), message);
                TypeRef::opaque()
            }
        };
        resolved.or_nullable(spec.nullable)
    }

    /// Inline objects: declared properties → opaque value, an
    /// `additionalProperties` schema alone → map.
    fn resolve_object(&mut self, node: SchemaNode<'a>, owner: &str, property: &str, nullable: bool) -> TypeRef {
        if node.has("properties") {
            return TypeRef::opaque().or_nullable(nullable);
        }
        let resolved = match node.child("additionalProperties") {
            Some(values) if values.object().is_some() || values.is_true_schema() => {
                let value = self.resolve(values, owner, property);
                TypeRef::new(TypeKind::Map(Box::new(value)))
            }
            _ => TypeRef::opaque(),
        };
        resolved.or_nullable(nullable)
    }

    /// `$ref` resolution: alias table, then named definitions, then the
    /// target followed in place.
    pub fn resolve_reference(&mut self, site: &SchemaNode<'a>, reference: &str, owner: &str, property: &str) -> TypeRef {
        let Some(pointer) = local_pointer(reference) else {
            self.warn(site.pointer(), format!("external reference `{reference}` is not followed; using an opaque value"));
            return TypeRef::opaque();
        };
        let doc = self.doc;
        let Some(target) = doc.node_at(pointer) else {
            self.warn(site.pointer(), format!("reference `{reference}` does not resolve; using an opaque value"));
            return TypeRef::opaque();
        };
        if let Some(resolved) = self.aliases.resolve(&target, false) {
            return resolved;
        }
        if let Some(entry) = self.definition(target.pointer()) {
            return entry.type_ref(false);
        }
        if !self.enter(target.pointer()) {
            self.warn(site.pointer(), format!("reference `{reference}` is cyclic; using an opaque value"));
            return TypeRef::opaque();
        }
        let resolved = self.resolve(target, owner, property);
        self.leave();
        resolved
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use crate::context::{DefinitionEntry, GenerationContext};
    use crate::diagnostics::DiagnosticCode;
    use crate::ir::{IntWidth, NamedKind, TypeKind, TypeRef};
    use crate::schema::SchemaDocument;

    fn document() -> SchemaDocument {
        SchemaDocument::new(
            "mem.json",
            json!({
                "properties": {
                    "name": {"type": "string"},
                    "count": {"type": "integer", "format": "uint64"},
                    "ratio": {"type": ["number", "null"]},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "limits": {"type": "object", "additionalProperties": {"type": "integer", "format": "int64"}},
                    "inline": {"type": "object", "properties": {"a": {}}},
                    "label": {"$ref": "#/$defs/Label"},
                    "cfg": {"allOf": [{"$ref": "#/$defs/Cfg"}, {"description": "doc"}]},
                    "merged": {"allOf": [{"$ref": "#/$defs/Cfg"}, {"type": "object", "properties": {"b": {}}}]},
                    "maybe_cfg": {"anyOf": [{"$ref": "#/$defs/Cfg"}, {"type": "null"}]},
                    "tier": {"enum": ["hot", "cold"]},
                    "status": {"oneOf": [{"const": "ok"}, {"type": "string"}]},
                    "wrapped": {"$ref": "#/$defs/Wrapper"},
                    "loop": {"$ref": "#/$defs/LoopA"},
                    "external": {"$ref": "other.json#/Thing"},
                    "dangling": {"$ref": "#/$defs/Missing"},
                    "anything": true,
                    "pair": {"type": ["string", "integer"]}
                },
                "$defs": {
                    "Label": {"type": ["string", "null"]},
                    "Cfg": {"type": "object"},
                    "Wrapper": {"type": "array", "items": {"$ref": "#/$defs/Cfg"}},
                    "LoopA": {"$ref": "#/$defs/LoopB"},
                    "LoopB": {"$ref": "#/$defs/LoopA"}
                }
            }),
            "#",
        )
    }

    fn resolve(doc: &SchemaDocument, property: &str) -> (TypeRef, Vec<DiagnosticCode>) {
        let mut ctx = GenerationContext::new(doc, "Root", &BTreeSet::new());
        ctx.register_definition(
            "#/$defs/Cfg",
            DefinitionEntry { name: "Cfg".into(), kind: NamedKind::Object, nullable: false, emit: true },
        );
        let node = doc.node_at(&format!("#/properties/{property}")).unwrap();
        let resolved = ctx.resolve(node, "Root", property);
        let codes = ctx.diagnostics.iter().map(|diagnostic| diagnostic.code).collect();
        (resolved, codes)
    }

    fn ty(doc: &SchemaDocument, property: &str) -> TypeRef {
        resolve(doc, property).0
    }

    #[test]
    fn primitives() {
        let doc = document();
        assert_eq!(ty(&doc, "name"), TypeRef::new(TypeKind::String));
        assert_eq!(ty(&doc, "count"), TypeRef::new(TypeKind::Integer(IntWidth::U64)));
        assert_eq!(ty(&doc, "ratio"), TypeRef::new(TypeKind::Double).or_nullable(true));
        assert_eq!(
            ty(&doc, "tags"),
            TypeRef::new(TypeKind::List(Box::new(TypeRef::new(TypeKind::String))))
        );
        assert_eq!(
            ty(&doc, "limits"),
            TypeRef::new(TypeKind::Map(Box::new(TypeRef::new(TypeKind::Integer(IntWidth::I64)))))
        );
        assert_eq!(ty(&doc, "inline"), TypeRef::opaque());
        assert_eq!(ty(&doc, "anything"), TypeRef::opaque());
    }

    #[test]
    fn references() {
        let doc = document();
        assert_eq!(ty(&doc, "label"), TypeRef::new(TypeKind::String).or_nullable(true));
        assert_eq!(ty(&doc, "cfg"), TypeRef::named("Cfg", NamedKind::Object));
        assert_eq!(ty(&doc, "maybe_cfg"), TypeRef::named("Cfg", NamedKind::Object).or_nullable(true));
        assert_eq!(
            ty(&doc, "wrapped"),
            TypeRef::new(TypeKind::List(Box::new(TypeRef::named("Cfg", NamedKind::Object))))
        );
    }

    #[test]
    fn all_of_keeps_first_meaningful_entry() {
        let doc = document();
        let (cfg, codes) = resolve(&doc, "cfg");
        assert_eq!(cfg, TypeRef::named("Cfg", NamedKind::Object));
        assert!(codes.is_empty());

        let (merged, codes) = resolve(&doc, "merged");
        assert_eq!(merged, TypeRef::named("Cfg", NamedKind::Object));
        assert_eq!(codes, [DiagnosticCode::UnsupportedConstruct]);
    }

    #[test]
    fn inline_enums_and_literal_unions_are_deferred() {
        let doc = document();
        assert_eq!(ty(&doc, "tier"), TypeRef::named("RootTier", NamedKind::Enum));
        assert_eq!(ty(&doc, "status"), TypeRef::named("RootStatus", NamedKind::OpenString));
    }

    #[test]
    fn unsupported_references_degrade_to_opaque_with_warning() {
        let doc = document();
        for property in ["loop", "external", "dangling", "pair"] {
            let (resolved, codes) = resolve(&doc, property);
            assert_eq!(resolved, TypeRef::opaque(), "{property}");
            assert_eq!(codes, [DiagnosticCode::UnsupportedConstruct], "{property}");
        }
    }
}
