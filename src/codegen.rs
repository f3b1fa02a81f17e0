//! Rust source rendering for emitted declarations.
//!
//! Generated code names serde and std items by absolute path and reaches
//! runtime helpers through `GeneratorOptions::runtime_path`, so it can be
//! `include!`d into any module without imports.
use crate::generate::GeneratorOptions;
use crate::ir::{DeclBody, Declaration, EnumMember, Extension, Field, TypeKind, TypeRef, UnionArm, UnionDecl, UnionStyle};

const INDENT: &str = "    ";

pub struct Codegen<'o> {
    out: String,
    depth: usize,
    options: &'o GeneratorOptions,
    rt: String,
}

impl<'o> Codegen<'o> {
    pub fn new(options: &'o GeneratorOptions) -> Self {
        Self {
            out: String::new(),
            depth: 0,
            rt: options.runtime(),
            options,
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }

    /// File banner naming the schema the file came from.
    pub fn emit_header(&mut self, subject: &str) {
        self.line(format!("// @generated by schema-typegen from `{subject}`; do not edit by hand."));
        if let Some(header) = self.options.header.as_deref() {
            for text in header.lines() {
                self.line(format!("// {text}").trim_end());
            }
        }
    }

    pub fn emit(&mut self, declaration: &Declaration) {
        self.blank();
        self.docs(declaration.doc.as_deref());
        let name = declaration.name.as_str();
        match &declaration.body {
            DeclBody::Object { fields, extension, deny_unknown } => {
                self.object(name, fields, extension.as_ref(), *deny_unknown)
            }
            DeclBody::Enum { members } => self.enumeration(name, members),
            DeclBody::OpenString { members } => self.open_string(name, members),
            DeclBody::Union(union) => self.union(name, union),
            DeclBody::Opaque => {
                let extension = Extension {
                    ident: "extension_data".to_string(),
                    value: None,
                };
                self.object(name, &[], Some(&extension), false)
            }
            DeclBody::Alias { target } => {
                let target = self.ty(target);
                self.line(format!("pub type {name} = {target};"));
            }
        }
    }

    // ————————————————————————————————————————————————————————————————————————
    // DECLARATIONS
    // ————————————————————————————————————————————————————————————————————————

    fn object(&mut self, name: &str, fields: &[Field], extension: Option<&Extension>, deny_unknown: bool) {
        let defaultable = fields.iter().all(|field| !field.non_defaultable);
        let default = if defaultable { "Default, " } else { "" };
        self.line(format!(
            "#[derive(Debug, Clone, PartialEq, {default}::serde::Serialize, ::serde::Deserialize)]"
        ));
        if deny_unknown {
            self.line("#[serde(deny_unknown_fields)]");
        }
        self.open(format!("pub struct {name} {{"));
        for field in fields {
            self.docs(field.doc.as_deref());
            let wire = lit(&field.wire_name);
            let ty = self.ty(&field.ty);
            if field.required {
                self.line(format!("#[serde(rename = {wire})]"));
                self.line(format!("pub {}: {ty},", field.ident));
            } else {
                self.line(format!(
                    "#[serde(rename = {wire}, default, skip_serializing_if = \"Option::is_none\")]"
                ));
                let ty = if field.ty.nullable { ty } else { format!("Option<{ty}>") };
                self.line(format!("pub {}: {ty},", field.ident));
            }
        }
        if let Some(extension) = extension {
            let rt = &self.rt;
            let ty = match &extension.value {
                Some(value) => format!("{rt}::Map<{}>", self.ty(value)),
                None => format!("{rt}::Extensions"),
            };
            self.line("#[serde(flatten)]");
            self.line(format!("pub {}: {ty},", extension.ident));
        }
        self.close("}");
    }

    fn enumeration(&mut self, name: &str, members: &[EnumMember]) {
        self.line(
            "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, ::serde::Serialize, ::serde::Deserialize)]",
        );
        if members.iter().any(|member| member.ident.contains('_')) {
            self.line("#[allow(non_camel_case_types)]");
        }
        self.open(format!("pub enum {name} {{"));
        for (index, member) in members.iter().enumerate() {
            if index == 0 {
                self.line("#[default]");
            }
            self.line(format!("#[serde(rename = {})]", lit(&member.wire_value)));
            self.line(format!("{},", member.ident));
        }
        self.close("}");
        self.blank();
        self.open(format!("impl {name} {{"));
        self.open("pub fn as_str(&self) -> &'static str {");
        self.open("match self {");
        for member in members {
            self.line(format!("Self::{} => {},", member.ident, lit(&member.wire_value)));
        }
        self.close("}");
        self.close("}");
        self.close("}");
        self.display(name);
    }

    fn open_string(&mut self, name: &str, members: &[EnumMember]) {
        self.line(
            "#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, ::serde::Serialize, ::serde::Deserialize)]",
        );
        self.line("#[serde(transparent)]");
        self.line(format!("pub struct {name}(::std::borrow::Cow<'static, str>);"));
        self.blank();
        self.line("#[allow(non_upper_case_globals)]");
        self.open(format!("impl {name} {{"));
        for member in members {
            self.line(format!(
                "pub const {}: Self = Self(::std::borrow::Cow::Borrowed({}));",
                member.ident,
                lit(&member.wire_value)
            ));
        }
        self.blank();
        self.open("pub fn new(value: impl Into<String>) -> Self {");
        self.line("Self(::std::borrow::Cow::Owned(value.into()))");
        self.close("}");
        self.blank();
        self.open("pub fn as_str(&self) -> &str {");
        self.line("&self.0");
        self.close("}");
        self.blank();
        self.line("/// Whether the value is one of the literals the schema lists.");
        self.open("pub fn is_known(&self) -> bool {");
        let known = members.iter().map(|member| lit(&member.wire_value)).collect::<Vec<_>>();
        self.line(format!("matches!(self.as_str(), {})", known.join(" | ")));
        self.close("}");
        self.close("}");

        for (source, body) in [("String", "Self::new(value)"), ("&str", "Self::new(value)")] {
            self.blank();
            self.open(format!("impl From<{source}> for {name} {{"));
            self.open(format!("fn from(value: {source}) -> Self {{"));
            self.line(body);
            self.close("}");
            self.close("}");
        }
        self.blank();
        self.open(format!("impl From<{name}> for String {{"));
        self.open(format!("fn from(value: {name}) -> Self {{"));
        self.line("value.0.into_owned()");
        self.close("}");
        self.close("}");
        self.blank();
        self.open(format!("impl AsRef<str> for {name} {{"));
        self.open("fn as_ref(&self) -> &str {");
        self.line("&self.0");
        self.close("}");
        self.close("}");
        self.display(name);
    }

    fn union(&mut self, name: &str, union: &UnionDecl) {
        let rt = self.rt.clone();
        let branch_enum = union.branch_enum.as_str();

        self.line("#[derive(Debug, Clone, PartialEq, Default)]");
        self.open(format!("pub struct {name} {{"));
        for arm in &union.arms {
            let ty = self.arm_ty(arm);
            self.line(format!("pub {}: Option<{ty}>,", arm.accessor));
        }
        self.close("}");

        self.blank();
        self.line(format!("/// The populated branch of [`{name}`]."));
        self.line("#[derive(Debug, Clone, Copy, PartialEq)]");
        self.open(format!("pub enum {branch_enum}<'a> {{"));
        for arm in &union.arms {
            let ty = self.ty(&unboxed(&arm.ty));
            self.line(format!("{}(&'a {ty}),", arm.variant));
        }
        self.close("}");

        self.blank();
        if matches!(union.style, UnionStyle::Mixed { .. }) {
            self.line("#[allow(non_upper_case_globals)]");
        }
        self.open(format!("impl {name} {{"));
        if let UnionStyle::Mixed { consts } = &union.style {
            let (payload, literal) = (&union.arms[0], &union.arms[1]);
            let literal_enum = self.ty(&unboxed(&literal.ty));
            for (ident, member) in consts {
                self.line(format!(
                    "pub const {ident}: Self = Self {{ {}: None, {}: Some({literal_enum}::{member}) }};",
                    payload.accessor, literal.accessor
                ));
            }
            self.blank();
        }
        for arm in &union.arms {
            let ty = self.ty(&unboxed(&arm.ty));
            let value = if is_boxed(&arm.ty) { "Box::new(value)" } else { "value" };
            self.open(format!("pub fn {}(value: {ty}) -> Self {{", arm.factory));
            self.open("Self {");
            for other in &union.arms {
                if other.accessor == arm.accessor {
                    self.line(format!("{}: Some({value}),", other.accessor));
                } else {
                    self.line(format!("{}: None,", other.accessor));
                }
            }
            self.close("}");
            self.close("}");
            self.blank();
        }
        self.line("/// The single populated accessor. `None` when empty, an error when more than one is set.");
        self.open(format!(
            "pub fn branch(&self) -> Result<Option<{branch_enum}<'_>>, {rt}::UnionError> {{"
        ));
        self.line("let mut populated = 0;");
        self.line("let mut branch = None;");
        for arm in &union.arms {
            let view = if is_boxed(&arm.ty) { "as_deref" } else { "as_ref" };
            self.open(format!("if let Some(value) = self.{}.{view}() {{", arm.accessor));
            self.line("populated += 1;");
            self.line(format!("branch = Some({branch_enum}::{}(value));", arm.variant));
            self.close("}");
        }
        self.line(format!("{rt}::union::settle({}, populated, branch)", lit(name)));
        self.close("}");
        self.close("}");

        self.union_serialize(name, union);
        self.union_deserialize(name, union);
    }

    fn union_serialize(&mut self, name: &str, union: &UnionDecl) {
        let rt = self.rt.clone();
        self.blank();
        self.open(format!("impl ::serde::Serialize for {name} {{"));
        self.line("fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>");
        self.line("where");
        self.line(format!("{INDENT}S: ::serde::Serializer,"));
        self.open("{");
        self.open("match self.branch().map_err(<S::Error as ::serde::ser::Error>::custom)? {");
        for arm in &union.arms {
            let pattern = format!("Some({}::{}(value))", union.branch_enum, arm.variant);
            match &arm.wire_name {
                Some(property) => self.line(format!(
                    "{pattern} => {rt}::union::write_arm(serializer, {}, value),",
                    lit(property)
                )),
                None => self.line(format!("{pattern} => ::serde::Serialize::serialize(value, serializer),")),
            }
        }
        self.line(format!(
            "None => {rt}::union::write_empty(serializer, {}, {}),",
            lit(name),
            union.nullable
        ));
        self.close("}");
        self.close("}");
        self.close("}");
    }

    fn union_deserialize(&mut self, name: &str, union: &UnionDecl) {
        let rt = self.rt.clone();
        self.blank();
        self.open(format!("impl<'de> ::serde::Deserialize<'de> for {name} {{"));
        self.line("fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>");
        self.line("where");
        self.line(format!("{INDENT}D: ::serde::Deserializer<'de>,"));
        self.open("{");
        match union.style {
            UnionStyle::Discriminated => {
                let arms = union
                    .arms
                    .iter()
                    .filter_map(|arm| arm.wire_name.as_deref().map(lit))
                    .collect::<Vec<_>>();
                self.line(format!(
                    "let Some((arm, payload)) = {rt}::union::read_discriminated(deserializer, {}, {}, &[{}])? else {{",
                    lit(name),
                    union.nullable,
                    arms.join(", ")
                ));
                self.line(format!("{INDENT}return Ok(Self::default());"));
                self.line("};");
                self.open("match arm {");
                for (index, arm) in union.arms.iter().enumerate() {
                    self.line(format!(
                        "{index} => Ok(Self::{}({rt}::union::decode::<_, D::Error>(payload)?)),",
                        arm.factory
                    ));
                }
                self.line(format!(
                    "_ => Err(<D::Error as ::serde::de::Error>::custom({})),",
                    lit(&format!("{name}: unknown union arm"))
                ));
                self.close("}");
            }
            UnionStyle::RefOnly | UnionStyle::Mixed { .. } => {
                let first = self.ty(&unboxed(&union.arms[0].ty));
                let second = self.ty(&unboxed(&union.arms[1].ty));
                let probe = format!("{rt}::OneOf2<{first}, {second}>");
                if union.nullable {
                    self.line(format!(
                        "let value = <Option<{probe}> as ::serde::Deserialize>::deserialize(deserializer)?;"
                    ));
                    self.open("Ok(match value {");
                    self.line(format!("Some({rt}::OneOf2::First(value)) => Self::{}(value),", union.arms[0].factory));
                    self.line(format!("Some({rt}::OneOf2::Second(value)) => Self::{}(value),", union.arms[1].factory));
                    self.line("None => Self::default(),");
                } else {
                    self.line(format!("let value = <{probe} as ::serde::Deserialize>::deserialize(deserializer)?;"));
                    self.open("Ok(match value {");
                    self.line(format!("{rt}::OneOf2::First(value) => Self::{}(value),", union.arms[0].factory));
                    self.line(format!("{rt}::OneOf2::Second(value) => Self::{}(value),", union.arms[1].factory));
                }
                self.close("})");
            }
        }
        self.close("}");
        self.close("}");
    }

    fn display(&mut self, name: &str) {
        self.blank();
        self.open(format!("impl ::std::fmt::Display for {name} {{"));
        self.open("fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {");
        self.line("f.write_str(self.as_str())");
        self.close("}");
        self.close("}");
    }

    // ————————————————————————————————————————————————————————————————————————
    // HELPERS
    // ————————————————————————————————————————————————————————————————————————

    fn ty(&self, ty: &TypeRef) -> String {
        let rt = &self.rt;
        let base = match &ty.kind {
            TypeKind::String => "String".to_string(),
            TypeKind::Bool => "bool".to_string(),
            TypeKind::Integer(width) => width.rust().to_string(),
            TypeKind::Double => "f64".to_string(),
            TypeKind::Named { name, boxed: true, .. } => format!("Box<{name}>"),
            TypeKind::Named { name, .. } => name.clone(),
            TypeKind::List(item) => format!("Vec<{}>", self.ty(item)),
            TypeKind::Map(value) => format!("{rt}::Map<{}>", self.ty(value)),
            TypeKind::Opaque => format!("{rt}::Value"),
        };
        if ty.nullable { format!("Option<{base}>") } else { base }
    }

    fn arm_ty(&self, arm: &UnionArm) -> String {
        self.ty(&arm.ty)
    }

    fn docs(&mut self, doc: Option<&str>) {
        if !self.options.emit_docs {
            return;
        }
        let Some(doc) = doc.map(str::trim).filter(|doc| !doc.is_empty()) else {
            return;
        };
        for text in doc.lines() {
            let text = text.trim_end();
            if text.is_empty() {
                self.line("///");
            } else {
                self.line(format!("/// {text}"));
            }
        }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") && !self.out.ends_with("{\n") {
            self.out.push('\n');
        }
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        if self.out.ends_with("\n\n") {
            self.out.pop();
        }
        self.line(text);
    }
}

/// Renders a whole generated file.
pub fn render(declarations: &[Declaration], options: &GeneratorOptions, subject: &str) -> String {
    let mut codegen = Codegen::new(options);
    codegen.emit_header(subject);
    for declaration in declarations {
        codegen.emit(declaration);
    }
    codegen.into_string()
}

/// Rust string literal for `value`.
fn lit(value: &str) -> String {
    format!("{value:?}")
}

fn is_boxed(ty: &TypeRef) -> bool {
    matches!(ty.kind, TypeKind::Named { boxed: true, .. })
}

fn unboxed(ty: &TypeRef) -> TypeRef {
    let mut ty = ty.clone();
    if let TypeKind::Named { boxed, .. } = &mut ty.kind {
        *boxed = false;
    }
    ty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IntWidth, NamedKind};

    fn field(ident: &str, ty: TypeRef, required: bool) -> Field {
        Field {
            ident: ident.into(),
            wire_name: ident.trim_start_matches("r#").into(),
            non_defaultable: required && ty.is_non_defaultable(),
            ty,
            required,
            doc: None,
        }
    }

    fn render_one(declaration: Declaration) -> String {
        render(&[declaration], &GeneratorOptions::default(), "mem.json#")
    }

    fn declaration(name: &str, body: DeclBody) -> Declaration {
        Declaration {
            name: name.into(),
            pointer: "#".into(),
            doc: None,
            body,
        }
    }

    #[test]
    fn object_fields_and_defaults() {
        let source = render_one(Declaration {
            doc: Some("Backend settings.\n\nSecond paragraph.".into()),
            ..declaration(
                "LocalCfg",
                DeclBody::Object {
                    fields: vec![
                        field("path", TypeRef::new(TypeKind::String), true),
                        field("r#type", TypeRef::new(TypeKind::Integer(IntWidth::U32)), false),
                        field("region", TypeRef::new(TypeKind::String).or_nullable(true), false),
                    ],
                    extension: None,
                    deny_unknown: true,
                },
            )
        });
        let expected = r#"// @generated by schema-typegen from `mem.json#`; do not edit by hand.

/// Backend settings.
///
/// Second paragraph.
#[derive(Debug, Clone, PartialEq, Default, ::serde::Serialize, ::serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalCfg {
    #[serde(rename = "path")]
    pub path: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<u32>,
    #[serde(rename = "region", default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}
"#;
        assert_eq!(source, expected);
    }

    #[test]
    fn required_object_reference_blocks_default() {
        let source = render_one(declaration(
            "Holder",
            DeclBody::Object {
                fields: vec![field("cfg", TypeRef::named("Cfg", NamedKind::Object), true)],
                extension: Some(Extension {
                    ident: "extension_data".into(),
                    value: Some(TypeRef::new(TypeKind::Integer(IntWidth::I64))),
                }),
                deny_unknown: false,
            },
        ));
        assert!(source.contains("#[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]"));
        assert!(source.contains("    #[serde(flatten)]\n    pub extension_data: ::typegen_runtime::Map<i64>,\n"));
    }

    #[test]
    fn enums_carry_wire_values() {
        let source = render_one(declaration(
            "Tier",
            DeclBody::Enum {
                members: vec![
                    EnumMember { ident: "Hot".into(), wire_value: "hot".into() },
                    EnumMember { ident: "Deep".into(), wire_value: "archive/deep".into() },
                ],
            },
        ));
        assert!(source.contains("pub enum Tier {\n    #[default]\n    #[serde(rename = \"hot\")]\n    Hot,\n"));
        assert!(source.contains("Self::Deep => \"archive/deep\","));
        assert!(source.contains("impl ::std::fmt::Display for Tier {"));
        assert!(!source.contains("non_camel_case_types"));
    }

    #[test]
    fn open_strings_expose_consts() {
        let source = render_one(declaration(
            "Status",
            DeclBody::OpenString {
                members: vec![
                    EnumMember { ident: "Ok".into(), wire_value: "ok".into() },
                    EnumMember { ident: "Degraded".into(), wire_value: "degraded".into() },
                ],
            },
        ));
        assert!(source.contains("pub struct Status(::std::borrow::Cow<'static, str>);"));
        assert!(source.contains("pub const Ok: Self = Self(::std::borrow::Cow::Borrowed(\"ok\"));"));
        assert!(source.contains("matches!(self.as_str(), \"ok\" | \"degraded\")"));
        assert!(source.contains("impl From<Status> for String {"));
    }

    #[test]
    fn discriminated_union_rendering() {
        let arm = |name: &str, ty: &str, variant: &str| UnionArm {
            accessor: name.into(),
            factory: format!("from_{name}"),
            variant: variant.into(),
            wire_name: Some(name.into()),
            ty: TypeRef::named(ty, NamedKind::Object),
        };
        let source = render_one(declaration(
            "Backend",
            DeclBody::Union(UnionDecl {
                style: UnionStyle::Discriminated,
                arms: vec![arm("local", "LocalCfg", "Local"), arm("remote", "RemoteCfg", "Remote")],
                branch_enum: "BackendBranch".into(),
                nullable: false,
            }),
        ));
        assert!(source.contains("pub enum BackendBranch<'a> {\n    Local(&'a LocalCfg),\n"));
        assert!(source.contains(
            "Some(BackendBranch::Remote(value)) => ::typegen_runtime::union::write_arm(serializer, \"remote\", value),"
        ));
        assert!(source.contains("None => ::typegen_runtime::union::write_empty(serializer, \"Backend\", false),"));
        assert!(source.contains(
            "read_discriminated(deserializer, \"Backend\", false, &[\"local\", \"remote\"])? else {"
        ));
        assert!(source.contains("1 => Ok(Self::from_remote(::typegen_runtime::union::decode::<_, D::Error>(payload)?)),"));
    }

    #[test]
    fn boxed_union_arms_use_deref_views() {
        let source = render_one(declaration(
            "Tree",
            DeclBody::Union(UnionDecl {
                style: UnionStyle::RefOnly,
                arms: vec![
                    UnionArm {
                        accessor: "tree".into(),
                        factory: "from_tree".into(),
                        variant: "Tree".into(),
                        wire_name: None,
                        ty: TypeRef::new(TypeKind::Named { name: "Tree".into(), kind: NamedKind::Union, boxed: true }),
                    },
                    UnionArm {
                        accessor: "leaf".into(),
                        factory: "from_leaf".into(),
                        variant: "Leaf".into(),
                        wire_name: None,
                        ty: TypeRef::new(TypeKind::String),
                    },
                ],
                branch_enum: "TreeBranch".into(),
                nullable: true,
            }),
        ));
        assert!(source.contains("pub tree: Option<Box<Tree>>,"));
        assert!(source.contains("Tree(&'a Tree),"));
        assert!(source.contains("tree: Some(Box::new(value)),"));
        assert!(source.contains("if let Some(value) = self.tree.as_deref() {"));
        assert!(source.contains("<Option<::typegen_runtime::OneOf2<Tree, String>> as ::serde::Deserialize>"));
    }

    #[test]
    fn runtime_path_and_docs_are_configurable() {
        let options = GeneratorOptions {
            runtime_path: "crate::rt".into(),
            emit_docs: false,
            header: Some("Regenerate with `make types`.".into()),
        };
        let source = render(
            &[Declaration {
                doc: Some("hidden".into()),
                ..declaration("Bag", DeclBody::Opaque)
            }],
            &options,
            "bag.json#",
        );
        assert!(source.starts_with(
            "// @generated by schema-typegen from `bag.json#`; do not edit by hand.\n// Regenerate with `make types`.\n"
        ));
        assert!(!source.contains("hidden"));
        assert!(source.contains("pub extension_data: crate::rt::Extensions,"));
    }
}
