//! Declaration emitter.
//!
//! Planning allocates a name for every definition up front, so references can
//! resolve to names before their declarations exist. The walk then emits the
//! generation root, the definitions in key order, and finally the deferred
//! property-local declarations (enums, then open strings, then the rest, each
//! group sorted by name).
use std::collections::{BTreeMap, BTreeSet};

use crate::context::{DefinitionEntry, DeferredCategory, GenerationContext};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::ir::{
    DeclBody, Declaration, EnumMember, Extension, Field, NamedKind, TypeKind, TypeRef, UnionArm, UnionDecl,
    UnionStyle,
};
use crate::naming::{type_name, unraw, MemberScope};
use crate::schema::{last_segment, SchemaDocument, SchemaNode};
use crate::shape::{classify, Classification, DiscriminatorArm, Placement, ShapeKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("ref-only union `{name}` has {count} reference branches; exactly 2 are supported")]
    UnsupportedUnionArity { name: String, count: usize, subject: String },
}

impl EmitError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            EmitError::UnsupportedUnionArity { subject, .. } => {
                Diagnostic::new(DiagnosticCode::UnsupportedUnionArity, self.to_string(), subject.clone())
            }
        }
    }
}

/// Declarations of one unit plus everything reported on the way. When an
/// error was reported the declarations are empty.
#[derive(Debug, Clone)]
pub struct Emission {
    pub declarations: Vec<Declaration>,
    pub diagnostics: Diagnostics,
}

impl Emission {
    pub fn failed(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Emits every declaration for `doc`, with the generation root named `container`.
/// Names in `existing` are treated as hand-written and never emitted.
pub fn emit_document(doc: &SchemaDocument, container: &str, existing: &BTreeSet<String>) -> Emission {
    let mut ctx = GenerationContext::new(doc, container, existing);
    let result = ctx.emit_all();
    let mut diagnostics = std::mem::take(&mut ctx.diagnostics);
    match result {
        Ok(mut declarations) => {
            box_recursive_edges(&mut declarations);
            Emission { declarations, diagnostics }
        }
        Err(error) => {
            diagnostics.push(error.to_diagnostic());
            Emission {
                declarations: Vec::new(),
                diagnostics,
            }
        }
    }
}

/// Kind and own nullability of a named declaration. Objects and opaque
/// containers take nullability from a `["object", "null"]`-style `type`.
fn named_kind(node: &SchemaNode<'_>, shape: &ShapeKind) -> (NamedKind, bool) {
    let declared_nullable = || node.type_spec().is_some_and(|spec| spec.nullable);
    match shape {
        ShapeKind::PlainObject => (NamedKind::Object, declared_nullable()),
        ShapeKind::StringEnum { nullable, .. } => (NamedKind::Enum, *nullable),
        ShapeKind::StringLiteralUnion { open: false, nullable, .. } => (NamedKind::Enum, *nullable),
        ShapeKind::StringLiteralUnion { open: true, nullable, .. } => (NamedKind::OpenString, *nullable),
        ShapeKind::RefOnlyUnion { .. }
        | ShapeKind::ObjectDiscriminatedUnion { .. }
        | ShapeKind::MixedObjectStringUnion { .. } => (NamedKind::Union, false),
        ShapeKind::OpaqueFallback { .. } => (NamedKind::Opaque, declared_nullable()),
        ShapeKind::StringAlias { .. } | ShapeKind::AlwaysValidAlias | ShapeKind::Inline => (NamedKind::Alias, false),
    }
}

fn enum_members(values: &[String]) -> Vec<EnumMember> {
    let mut scope = MemberScope::new();
    values
        .iter()
        .map(|value| EnumMember {
            ident: scope.literal(value),
            wire_value: value.clone(),
        })
        .collect()
}

impl<'a> GenerationContext<'a> {
    fn plan(&mut self) -> Classification<'a> {
        let doc = self.doc;
        let root_pointer = doc.generation_root_pointer();
        let root = classify(doc, doc.generation_root(), Placement::Definition);
        let (kind, nullable) = named_kind(&root.node, &root.shape);
        let container = self.container.clone();
        self.register_definition(
            root_pointer,
            DefinitionEntry {
                name: container,
                kind,
                nullable,
                emit: true,
            },
        );

        for (key, node) in doc.definitions() {
            if node.pointer() == root_pointer {
                continue;
            }
            let Classification { node: classified, shape } = classify(doc, node.clone(), Placement::Definition);
            if shape.is_alias() || shape == ShapeKind::Inline {
                tracing::trace!(definition = %key, "resolved in place");
                continue;
            }
            let candidate = type_name(&key);
            if self.is_existing(&candidate) {
                tracing::debug!(definition = %key, name = %candidate, "using existing type");
                self.register_definition(
                    node.pointer(),
                    DefinitionEntry {
                        name: candidate,
                        kind: NamedKind::External,
                        nullable: false,
                        emit: false,
                    },
                );
                continue;
            }
            let name = self.names.allocate(&key);
            let (kind, nullable) = named_kind(&classified, &shape);
            self.register_definition(node.pointer(), DefinitionEntry { name, kind, nullable, emit: true });
        }
        root
    }

    fn emit_all(&mut self) -> Result<Vec<Declaration>, EmitError> {
        let doc = self.doc;
        let root = self.plan();
        let container = self.container.clone();
        self.mark_emitted(&container);
        let mut out = self.emit_declaration(&container, root)?;

        for (_, node) in doc.definitions() {
            if node.pointer() == doc.generation_root_pointer() {
                continue;
            }
            let Some(entry) = self.definition(node.pointer()).cloned() else {
                continue;
            };
            if !entry.emit || !self.mark_emitted(&entry.name) {
                continue;
            }
            let classification = classify(doc, node, Placement::Definition);
            out.extend(self.emit_declaration(&entry.name, classification)?);
        }

        let mut deferred: Vec<(DeferredCategory, String, Vec<Declaration>)> = Vec::new();
        loop {
            let pending = self.take_pending();
            if pending.is_empty() {
                break;
            }
            for item in pending {
                if !self.mark_emitted(&item.name) {
                    continue;
                }
                let classification = classify(doc, item.node, Placement::Inline);
                let declarations = self.emit_declaration(&item.name, classification)?;
                deferred.push((item.category, item.name, declarations));
            }
        }
        deferred.sort_by(|left, right| (left.0, &left.1).cmp(&(right.0, &right.1)));
        out.extend(deferred.into_iter().flat_map(|(_, _, declarations)| declarations));
        Ok(out)
    }

    /// One declaration for `classification`, followed by its auxiliaries.
    fn emit_declaration(&mut self, name: &str, classification: Classification<'a>) -> Result<Vec<Declaration>, EmitError> {
        let Classification { node, shape } = classification;
        let declare = |body: DeclBody| Declaration {
            name: name.to_string(),
            pointer: node.pointer().to_string(),
            doc: node.description().map(str::to_string),
            body,
        };
        let declarations = match shape {
            ShapeKind::PlainObject => vec![self.object_declaration(name, &node)],
            ShapeKind::StringEnum { values, .. } | ShapeKind::StringLiteralUnion { values, open: false, .. } => {
                vec![declare(DeclBody::Enum {
                    members: enum_members(&values),
                })]
            }
            ShapeKind::StringLiteralUnion { values, open: true, .. } => {
                vec![declare(DeclBody::OpenString {
                    members: enum_members(&values),
                })]
            }
            ShapeKind::RefOnlyUnion { refs, nullable } => {
                let union = self.ref_union(name, &node, refs.len(), nullable)?;
                vec![declare(DeclBody::Union(union))]
            }
            ShapeKind::ObjectDiscriminatedUnion { arms, nullable } => {
                let (union, mut auxiliary) = self.discriminated_union(name, &arms, nullable);
                let mut declarations = vec![declare(DeclBody::Union(union))];
                declarations.append(&mut auxiliary);
                declarations
            }
            ShapeKind::MixedObjectStringUnion {
                object_arm,
                literals,
                nullable,
            } => {
                let (union, mut auxiliary) = self.mixed_union(name, &object_arm, &literals, nullable);
                let mut declarations = vec![declare(DeclBody::Union(union))];
                declarations.append(&mut auxiliary);
                declarations
            }
            ShapeKind::OpaqueFallback { reason } => {
                self.warn(node.pointer(), format!("{reason}; `{name}` only keeps extension data"));
                vec![declare(DeclBody::Opaque)]
            }
            ShapeKind::StringAlias { .. } | ShapeKind::AlwaysValidAlias | ShapeKind::Inline => {
                let target = self.resolve(node.clone(), name, "value");
                vec![declare(DeclBody::Alias { target })]
            }
        };
        Ok(declarations)
    }

    fn object_declaration(&mut self, name: &str, node: &SchemaNode<'a>) -> Declaration {
        let required = node.required();
        let mut scope = MemberScope::new();
        let mut fields = Vec::new();
        for (key, property) in node.entries_of("properties") {
            let ident = scope.field(key);
            let doc = property.description().map(str::to_string);
            let ty = self.resolve(property, name, key);
            let required = required.contains(&key);
            fields.push(Field {
                ident,
                wire_name: key.to_string(),
                non_defaultable: required && ty.is_non_defaultable(),
                required,
                ty,
                doc,
            });
        }

        let mut deny_unknown = false;
        let extension = match node.child("additionalProperties") {
            Some(schema) if schema.value() == &serde_json::Value::Bool(false) => {
                deny_unknown = true;
                None
            }
            Some(schema) if schema.is_true_schema() => Some(None),
            Some(schema) if schema.object().is_some() => Some(Some(self.resolve(schema, name, "value"))),
            Some(_) => None,
            None if fields.is_empty() => Some(None),
            None => None,
        };
        let extension = extension.map(|value| Extension {
            ident: if fields.is_empty() {
                scope.field("additional_properties")
            } else {
                scope.field("extension_data")
            },
            value: value.filter(|value| value.kind != TypeKind::Opaque || value.nullable),
        });

        Declaration {
            name: name.to_string(),
            pointer: node.pointer().to_string(),
            doc: node.description().map(str::to_string),
            body: DeclBody::Object {
                fields,
                extension,
                deny_unknown,
            },
        }
    }

    fn ref_union(&mut self, name: &str, node: &SchemaNode<'a>, count: usize, nullable: bool) -> Result<UnionDecl, EmitError> {
        if count != 2 {
            return Err(EmitError::UnsupportedUnionArity {
                name: name.to_string(),
                count,
                subject: self.doc.subject(node.pointer()),
            });
        }
        let branches = node.union_branches().unwrap_or_default();
        let mut accessors = MemberScope::new();
        let mut variants = MemberScope::new();
        let mut arms = Vec::with_capacity(2);
        for branch in branches.iter().filter(|branch| branch.is_pure_ref()) {
            let Some(reference) = branch.reference() else {
                continue;
            };
            let key = last_segment(reference);
            let mut ty = self.resolve_reference(branch, reference, name, &key);
            ty.nullable = false;
            let accessor = accessors.field(&key);
            arms.push(UnionArm {
                factory: format!("from_{}", unraw(&accessor)),
                variant: variants.literal(unraw(&accessor)),
                accessor,
                wire_name: None,
                ty,
            });
        }
        Ok(UnionDecl {
            style: UnionStyle::RefOnly,
            arms,
            branch_enum: self.names.allocate_exact(&format!("{name}Branch")),
            nullable,
        })
    }

    fn discriminated_union(&mut self, name: &str, arms: &[DiscriminatorArm], nullable: bool) -> (UnionDecl, Vec<Declaration>) {
        let doc = self.doc;
        let mut accessors = MemberScope::new();
        let mut variants = MemberScope::new();
        let mut auxiliary = Vec::new();
        let mut union_arms = Vec::with_capacity(arms.len());
        for arm in arms {
            let mut ty = match doc.node_at(&arm.pointer) {
                Some(payload) if is_inline_object(&payload) => {
                    let payload_name = self.names.allocate_exact(&format!("{name}{}", type_name(&arm.property)));
                    self.mark_emitted(&payload_name);
                    auxiliary.push(self.object_declaration(&payload_name, &payload));
                    TypeRef::named(payload_name, NamedKind::Object)
                }
                Some(payload) => self.resolve(payload, name, &arm.property),
                None => TypeRef::opaque(),
            };
            ty.nullable = false;
            let accessor = accessors.field(&arm.property);
            union_arms.push(UnionArm {
                factory: format!("from_{}", unraw(&accessor)),
                variant: variants.literal(unraw(&accessor)),
                accessor,
                wire_name: Some(arm.property.clone()),
                ty,
            });
        }
        let union = UnionDecl {
            style: UnionStyle::Discriminated,
            arms: union_arms,
            branch_enum: self.names.allocate_exact(&format!("{name}Branch")),
            nullable,
        };
        (union, auxiliary)
    }

    fn mixed_union(&mut self, name: &str, object_arm: &str, literals: &[String], nullable: bool) -> (UnionDecl, Vec<Declaration>) {
        let doc = self.doc;
        let mut auxiliary = Vec::new();
        let (payload_key, mut payload_ty) = match doc.node_at(object_arm) {
            Some(branch) if branch.is_pure_ref() => {
                let reference = branch.reference().unwrap_or_default();
                let key = last_segment(reference);
                let ty = self.resolve_reference(&branch, reference, name, &key);
                (key, ty)
            }
            Some(branch) => {
                let payload_name = self.names.allocate_exact(&format!("{name}Payload"));
                self.mark_emitted(&payload_name);
                auxiliary.push(self.object_declaration(&payload_name, &branch));
                ("payload".to_string(), TypeRef::named(payload_name, NamedKind::Object))
            }
            None => ("payload".to_string(), TypeRef::opaque()),
        };
        payload_ty.nullable = false;

        let literal_enum = self.names.allocate_exact(&format!("{name}Literal"));
        self.mark_emitted(&literal_enum);
        let members = enum_members(literals);
        let consts = members
            .iter()
            .map(|member| (member.ident.clone(), member.ident.clone()))
            .collect();
        auxiliary.insert(
            0,
            Declaration {
                name: literal_enum.clone(),
                pointer: object_arm.rsplit_once('/').map_or(object_arm, |(parent, _)| parent).to_string(),
                doc: None,
                body: DeclBody::Enum { members },
            },
        );

        let mut accessors = MemberScope::new();
        let literal_accessor = accessors.field("literal");
        let payload_accessor = accessors.field(&payload_key);
        let mut variants = MemberScope::with_reserved(&["Literal"]);
        let arms = vec![
            UnionArm {
                factory: format!("from_{}", unraw(&payload_accessor)),
                variant: variants.literal(unraw(&payload_accessor)),
                accessor: payload_accessor,
                wire_name: None,
                ty: payload_ty,
            },
            UnionArm {
                factory: format!("from_{}", unraw(&literal_accessor)),
                variant: "Literal".to_string(),
                accessor: literal_accessor,
                wire_name: None,
                ty: TypeRef::named(literal_enum, NamedKind::Enum),
            },
        ];
        let union = UnionDecl {
            style: UnionStyle::Mixed { consts },
            arms,
            branch_enum: self.names.allocate_exact(&format!("{name}Branch")),
            nullable,
        };
        (union, auxiliary)
    }
}

/// An inline object with declared properties, emitted as its own declaration.
fn is_inline_object(node: &SchemaNode<'_>) -> bool {
    !node.has("$ref") && node.has("properties") && node.is_object_like()
}

/// Boxes every direct (non-collection) reference that can reach back to the
/// declaration holding it.
fn box_recursive_edges(declarations: &mut [Declaration]) {
    let graph: BTreeMap<String, BTreeSet<String>> = declarations
        .iter()
        .map(|declaration| (declaration.name.clone(), direct_targets(declaration)))
        .collect();
    for declaration in declarations.iter_mut() {
        let owner = declaration.name.clone();
        for ty in declaration.direct_refs_mut() {
            if let TypeKind::Named { name, boxed, .. } = &mut ty.kind {
                if reaches(&graph, name, &owner) {
                    *boxed = true;
                }
            }
        }
    }
}

fn direct_targets(declaration: &Declaration) -> BTreeSet<String> {
    let direct = |ty: &TypeRef| match &ty.kind {
        TypeKind::Named { name, .. } => Some(name.clone()),
        _ => None,
    };
    match &declaration.body {
        DeclBody::Object { fields, .. } => fields.iter().filter_map(|field| direct(&field.ty)).collect(),
        DeclBody::Union(union) => union.arms.iter().filter_map(|arm| direct(&arm.ty)).collect(),
        DeclBody::Alias { target } => direct(target).into_iter().collect(),
        _ => BTreeSet::new(),
    }
}

fn reaches(graph: &BTreeMap<String, BTreeSet<String>>, from: &str, to: &str) -> bool {
    let mut stack = vec![from.to_string()];
    let mut seen = BTreeSet::new();
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(targets) = graph.get(&current) {
            stack.extend(targets.iter().cloned());
        }
    }
    false
}
