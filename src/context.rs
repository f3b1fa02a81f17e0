//! Mutable state of one unit's emission pass.
use std::collections::{BTreeMap, BTreeSet};

use crate::alias::AliasTable;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::ir::{NamedKind, TypeRef};
use crate::naming::NameAllocator;
use crate::schema::{SchemaDocument, SchemaNode};
use crate::shape::ShapeKind;

/// A definition (or the generation root) that references resolve to by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionEntry {
    pub name: String,
    pub kind: NamedKind,
    /// Nullability every reference inherits.
    pub nullable: bool,
    /// False for caller-supplied types.
    pub emit: bool,
}

impl DefinitionEntry {
    pub fn type_ref(&self, site_nullable: bool) -> TypeRef {
        TypeRef::named(&self.name, self.kind).or_nullable(self.nullable || site_nullable)
    }
}

/// Emission order bucket for deferred declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeferredCategory {
    Enum,
    OpenString,
    Other,
}

/// A property-local declaration found mid-walk.
#[derive(Debug, Clone)]
pub struct Deferred<'a> {
    pub name: String,
    pub node: SchemaNode<'a>,
    pub category: DeferredCategory,
}

pub struct GenerationContext<'a> {
    pub doc: &'a SchemaDocument,
    pub container: String,
    pub names: NameAllocator,
    pub aliases: AliasTable,
    pub diagnostics: Diagnostics,
    /// Definition pointer → allocated entry.
    definitions: BTreeMap<String, DefinitionEntry>,
    /// Hand-written types that must not be emitted.
    existing: BTreeSet<String>,
    emitted: BTreeSet<String>,
    pending: Vec<Deferred<'a>>,
    /// Pointer → reference handed out for a deferred declaration.
    deferred_refs: BTreeMap<String, TypeRef>,
    /// Pointers of `$ref` targets currently being followed inline.
    resolving: Vec<String>,
}

impl<'a> GenerationContext<'a> {
    pub fn new(doc: &'a SchemaDocument, container: &str, existing: &BTreeSet<String>) -> Self {
        let mut names = NameAllocator::new();
        names.reserve(container);
        for name in existing {
            names.reserve(name);
        }
        Self {
            doc,
            container: container.to_string(),
            names,
            aliases: AliasTable::collect(doc),
            diagnostics: Diagnostics::new(),
            definitions: BTreeMap::new(),
            existing: existing.clone(),
            emitted: BTreeSet::new(),
            pending: Vec::new(),
            deferred_refs: BTreeMap::new(),
            resolving: Vec::new(),
        }
    }

    pub fn is_existing(&self, name: &str) -> bool {
        self.existing.contains(name)
    }

    pub fn register_definition(&mut self, pointer: &str, entry: DefinitionEntry) {
        self.definitions.insert(pointer.to_string(), entry);
    }

    pub fn definition(&self, pointer: &str) -> Option<&DefinitionEntry> {
        self.definitions.get(pointer)
    }

    /// Records `name` as emitted. Returns false when it already was.
    pub fn mark_emitted(&mut self, name: &str) -> bool {
        self.emitted.insert(name.to_string())
    }

    /// Queues a property-local declaration for `node`, or returns the
    /// reference already handed out for it.
    pub fn defer(&mut self, owner: &str, property: &str, node: SchemaNode<'a>, shape: &ShapeKind) -> TypeRef {
        if let Some(existing) = self.deferred_refs.get(node.pointer()) {
            return existing.clone();
        }
        let (kind, category, nullable) = match shape {
            ShapeKind::StringEnum { nullable, .. } => (NamedKind::Enum, DeferredCategory::Enum, *nullable),
            ShapeKind::StringLiteralUnion { open: false, nullable, .. } => {
                (NamedKind::Enum, DeferredCategory::Enum, *nullable)
            }
            ShapeKind::StringLiteralUnion { open: true, nullable, .. } => {
                (NamedKind::OpenString, DeferredCategory::OpenString, *nullable)
            }
            _ => (NamedKind::Union, DeferredCategory::Other, false),
        };
        let candidate = format!("{owner}{}", crate::naming::type_name(property));
        let name = self.names.allocate_exact(&candidate);
        let type_ref = TypeRef::named(&name, kind).or_nullable(nullable);
        tracing::trace!(name = %name, pointer = node.pointer(), "deferred declaration");
        self.deferred_refs.insert(node.pointer().to_string(), type_ref.clone());
        self.pending.push(Deferred { name, node, category });
        type_ref
    }

    pub fn take_pending(&mut self) -> Vec<Deferred<'a>> {
        std::mem::take(&mut self.pending)
    }

    /// Enters a `$ref` target. False when it is already on the stack.
    pub fn enter(&mut self, pointer: &str) -> bool {
        if self.resolving.iter().any(|active| active == pointer) {
            return false;
        }
        self.resolving.push(pointer.to_string());
        true
    }

    pub fn leave(&mut self) {
        self.resolving.pop();
    }

    pub fn warn(&mut self, pointer: &str, message: impl Into<String>) {
        let subject = self.doc.subject(pointer);
        self.diagnostics.report(DiagnosticCode::UnsupportedConstruct, message, subject);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deferral_is_idempotent_per_node() {
        let doc = SchemaDocument::new("mem.json", json!({"properties": {"tier": {"enum": ["a"]}}}), "#");
        let mut ctx = GenerationContext::new(&doc, "Root", &BTreeSet::new());
        let node = doc.node_at("#/properties/tier").unwrap();
        let shape = ShapeKind::StringEnum { values: vec!["a".into()], nullable: true };

        let first = ctx.defer("Root", "tier", node.clone(), &shape);
        let second = ctx.defer("Root", "tier", node, &shape);
        assert_eq!(first, second);
        assert_eq!(first, TypeRef::named("RootTier", NamedKind::Enum).or_nullable(true));

        let pending = ctx.take_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].category, DeferredCategory::Enum);
        assert!(ctx.take_pending().is_empty());
    }

    #[test]
    fn container_and_existing_names_are_reserved() {
        let doc = SchemaDocument::new("mem.json", json!({}), "#");
        let existing = BTreeSet::from(["Hash".to_string()]);
        let mut ctx = GenerationContext::new(&doc, "Root", &existing);
        assert_eq!(ctx.names.allocate("root"), "Root2");
        assert_eq!(ctx.names.allocate("hash"), "Hash2");
        assert!(ctx.is_existing("Hash"));
    }

    #[test]
    fn cycle_guard_rejects_reentry() {
        let doc = SchemaDocument::new("mem.json", json!({}), "#");
        let mut ctx = GenerationContext::new(&doc, "Root", &BTreeSet::new());
        assert!(ctx.enter("#/$defs/A"));
        assert!(!ctx.enter("#/$defs/A"));
        ctx.leave();
        assert!(ctx.enter("#/$defs/A"));
    }
}
