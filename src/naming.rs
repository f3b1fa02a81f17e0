//! Identifier allocation for generated Rust.
//!
//! Type names live in one file-wide [`NameAllocator`]; field, accessor, const
//! and variant names live in a [`MemberScope`] per declaration. Both append
//! `2`, `3`, ... on collision and claim the result immediately.
use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static LOWER_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());
static ACRONYM_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-.]+").unwrap());

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "type",
    "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final", "macro",
    "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// Keywords that cannot be written as raw identifiers.
const NON_RAW_KEYWORDS: &[&str] = &["crate", "self", "Self", "super"];

/// Type names the generated code relies on unqualified, plus the generic
/// parameter names used inside generated serde impls.
const RESERVED_TYPE_NAMES: &[&str] = &[
    "AsRef", "Box", "Clone", "Copy", "D", "Default", "Err", "From", "Into", "None", "Ok", "Option",
    "Result", "S", "Self", "Some", "String", "ToString", "Vec",
];

#[derive(Debug, Clone)]
pub struct NameAllocator {
    taken: BTreeSet<String>,
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl NameAllocator {
    pub fn new() -> Self {
        Self {
            taken: RESERVED_TYPE_NAMES.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Claims `name` verbatim. Returns false when it was already taken.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.taken.insert(name.to_string())
    }

    /// Converts a raw schema name to a type name and claims a unique variant.
    pub fn allocate(&mut self, raw: &str) -> String {
        let base = type_name(raw);
        claim(&mut self.taken, &base)
    }

    /// Claims a unique variant of an already-formed type name.
    pub fn allocate_exact(&mut self, candidate: &str) -> String {
        claim(&mut self.taken, candidate)
    }
}

/// Names local to one struct, enum or impl block.
#[derive(Debug, Clone, Default)]
pub struct MemberScope {
    taken: BTreeSet<String>,
}

impl MemberScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-claims names the scope must never hand out (method names).
    pub fn with_reserved(names: &[&str]) -> Self {
        Self {
            taken: names.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// snake_case field or accessor name.
    pub fn field(&mut self, raw: &str) -> String {
        claim(&mut self.taken, &field_name(raw))
    }

    /// Variant or associated const name for a string literal.
    pub fn literal(&mut self, literal: &str) -> String {
        claim(&mut self.taken, &literal_member_name(literal))
    }
}

/// `catalog_entry` / `catalog-entry` / `catalog entry` → `CatalogEntry`.
pub fn to_pascal_case(raw: &str) -> String {
    raw.split(['_', '-', ' '])
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `intervalSecs` / `HTTPServer` / `public-key` → `interval_secs` / `http_server` / `public_key`.
pub fn to_snake_case(raw: &str) -> String {
    let spaced = SEPARATORS.replace_all(raw, "_");
    let split = ACRONYM_WORD.replace_all(&spaced, "${1}_${2}");
    let split = LOWER_UPPER.replace_all(&split, "${1}_${2}");
    split.to_lowercase()
}

/// Makes `raw` a valid identifier: a bad first character gets a `_` prefix,
/// other bad characters become `_`.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    for (index, ch) in raw.chars().enumerate() {
        let valid = ch.is_ascii_alphanumeric() || ch == '_';
        if index == 0 && !(ch.is_ascii_alphabetic() || ch == '_') {
            out.push('_');
            if valid {
                out.push(ch);
            }
            continue;
        }
        out.push(if valid { ch } else { '_' });
    }
    out
}

/// Raw-identifier escape for keywords; `_` prefix where `r#` is not allowed.
pub fn escape_keyword(ident: &str) -> String {
    if NON_RAW_KEYWORDS.contains(&ident) {
        format!("_{ident}")
    } else if KEYWORDS.contains(&ident) {
        format!("r#{ident}")
    } else {
        ident.to_string()
    }
}

/// Strips a raw-identifier prefix, for composing derived names (`from_type`).
pub fn unraw(ident: &str) -> &str {
    ident.strip_prefix("r#").unwrap_or(ident)
}

pub fn type_name(raw: &str) -> String {
    let name = sanitize(&to_pascal_case(raw));
    if name.is_empty() { "Empty".to_string() } else { name }
}

pub fn field_name(raw: &str) -> String {
    let name = sanitize(&to_snake_case(raw));
    match name.as_str() {
        "" => "empty".to_string(),
        "_" => "underscore".to_string(),
        _ => name,
    }
}

/// `http://ns/c2pa.created` → `C2pa_created`; the part after the final `/`
/// or `#` names the member.
pub fn literal_member_name(literal: &str) -> String {
    let tail = literal.rsplit(['/', '#']).next().unwrap_or(literal);
    type_name(tail)
}

fn claim(taken: &mut BTreeSet<String>, base: &str) -> String {
    let mut suffix = 1usize;
    loop {
        let candidate = if suffix == 1 {
            base.to_string()
        } else {
            format!("{base}{suffix}")
        };
        let ident = escape_keyword(&candidate);
        if !taken.contains(&candidate) && !taken.contains(&ident) {
            taken.insert(ident.clone());
            return ident;
        }
        suffix += 1;
    }
}
