// Strongly-typed IR between resolution and codegen. No serde_json::Value here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    /// `format` tag → width; unknown or missing formats are `i32`.
    pub fn from_format(format: Option<&str>) -> Self {
        match format {
            Some("int8") => IntWidth::I8,
            Some("int16") => IntWidth::I16,
            Some("int64") => IntWidth::I64,
            Some("uint8") => IntWidth::U8,
            Some("uint16") => IntWidth::U16,
            Some("uint32") | Some("uint") => IntWidth::U32,
            Some("uint64") => IntWidth::U64,
            _ => IntWidth::I32,
        }
    }

    pub fn rust(self) -> &'static str {
        match self {
            IntWidth::I8 => "i8",
            IntWidth::I16 => "i16",
            IntWidth::I32 => "i32",
            IntWidth::I64 => "i64",
            IntWidth::U8 => "u8",
            IntWidth::U16 => "u16",
            IntWidth::U32 => "u32",
            IntWidth::U64 => "u64",
        }
    }
}

/// What a generated name stands for. Drives defaultability and boxing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKind {
    Object,
    Enum,
    OpenString,
    Union,
    Opaque,
    Alias,
    /// Hand-written type supplied by the caller.
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    String,
    Bool,
    Integer(IntWidth),
    Double,
    Named { name: String, kind: NamedKind, boxed: bool },
    List(Box<TypeRef>),
    Map(Box<TypeRef>),
    /// Arbitrary JSON value.
    Opaque,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub kind: TypeKind,
    pub nullable: bool,
}

impl TypeRef {
    pub fn new(kind: TypeKind) -> Self {
        Self { kind, nullable: false }
    }

    pub fn named(name: impl Into<String>, kind: NamedKind) -> Self {
        Self::new(TypeKind::Named {
            name: name.into(),
            kind,
            boxed: false,
        })
    }

    pub fn opaque() -> Self {
        Self::new(TypeKind::Opaque)
    }

    /// Nullability combines by OR.
    pub fn or_nullable(mut self, nullable: bool) -> Self {
        self.nullable |= nullable;
        self
    }

    pub fn named_target(&self) -> Option<(&str, NamedKind)> {
        match &self.kind {
            TypeKind::Named { name, kind, .. } => Some((name, *kind)),
            _ => None,
        }
    }

    /// Whether a required field of this type has no safe default value.
    pub fn is_non_defaultable(&self) -> bool {
        !self.nullable
            && matches!(
                self.named_target(),
                Some((_, NamedKind::Object | NamedKind::Opaque | NamedKind::External | NamedKind::Alias))
            )
    }

    /// Names this reference needs declared, collections included.
    pub fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            TypeKind::Named { name, .. } => out.push(name),
            TypeKind::List(item) | TypeKind::Map(item) => item.collect_names(out),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ident: String,
    pub wire_name: String,
    pub ty: TypeRef,
    pub required: bool,
    pub non_defaultable: bool,
    pub doc: Option<String>,
}

/// Catch-all map flattened into an object.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub ident: String,
    /// `None` for untyped values.
    pub value: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub ident: String,
    pub wire_value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionArm {
    pub accessor: String,
    pub factory: String,
    /// Variant of the `<Union>Branch` enum.
    pub variant: String,
    /// Discriminator property; `None` for ref-only and mixed arms.
    pub wire_name: Option<String>,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnionStyle {
    /// Two referenced types probed in order.
    RefOnly,
    /// One arm per discriminator property.
    Discriminated,
    /// Object arm first, then the literal enum. `consts` pairs an associated
    /// const name with the literal enum member it stands for.
    Mixed { consts: Vec<(String, String)> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDecl {
    pub style: UnionStyle,
    pub arms: Vec<UnionArm>,
    pub branch_enum: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclBody {
    Object {
        fields: Vec<Field>,
        extension: Option<Extension>,
        deny_unknown: bool,
    },
    Enum {
        members: Vec<EnumMember>,
    },
    OpenString {
        members: Vec<EnumMember>,
    },
    Union(UnionDecl),
    /// Only an open extension map.
    Opaque,
    Alias {
        target: TypeRef,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    /// Schema fragment the declaration came from.
    pub pointer: String,
    pub doc: Option<String>,
    pub body: DeclBody,
}

impl Declaration {
    /// Generated names this declaration refers to.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut out = Vec::new();
        match &self.body {
            DeclBody::Object { fields, extension, .. } => {
                for field in fields {
                    field.ty.collect_names(&mut out);
                }
                if let Some(value) = extension.as_ref().and_then(|extension| extension.value.as_ref()) {
                    value.collect_names(&mut out);
                }
            }
            DeclBody::Union(union) => {
                for arm in &union.arms {
                    arm.ty.collect_names(&mut out);
                }
            }
            DeclBody::Alias { target } => target.collect_names(&mut out),
            DeclBody::Enum { .. } | DeclBody::OpenString { .. } | DeclBody::Opaque => {}
        }
        out
    }

    /// Mutable views of every type reference held directly by this declaration.
    pub fn direct_refs_mut(&mut self) -> Vec<&mut TypeRef> {
        match &mut self.body {
            DeclBody::Object { fields, .. } => fields.iter_mut().map(|field| &mut field.ty).collect(),
            DeclBody::Union(union) => union.arms.iter_mut().map(|arm| &mut arm.ty).collect(),
            _ => Vec::new(),
        }
    }
}
