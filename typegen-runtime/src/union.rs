//! Read/write helpers behind generated union wrappers.
//!
//! A generated union is a struct of `Option` accessors plus a borrowed
//! `<Name>Branch` enum. Writing goes through [`settle`] so that at most one
//! accessor is ever serialized; reading either probes branch types in order
//! ([`OneOf2`]) or counts discriminator properties ([`read_discriminated`]).

use serde::de::DeserializeOwned;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Contract violations of a union value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnionError {
    #[error("{union}: no branch is populated and the schema has no null branch")]
    Empty { union: &'static str },

    #[error("{union}: {populated} branches are populated, expected exactly one")]
    Ambiguous { union: &'static str, populated: usize },

    #[error("{union}: expected exactly one of [{expected}] to be present, found {found}")]
    Discriminator {
        union: &'static str,
        expected: String,
        found: usize,
    },

    #[error("{union}: expected an object, found {found}")]
    NotAnObject { union: &'static str, found: &'static str },
}

/// Tagged representation of a two-branch union.
///
/// Deserializing probes `A` first and only falls back to `B` when `A` fails,
/// so the order of the type parameters is part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneOf2<A, B> {
    First(A),
    Second(B),
}

impl<A: Serialize, B: Serialize> Serialize for OneOf2<A, B> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            OneOf2::First(value) => value.serialize(serializer),
            OneOf2::Second(value) => value.serialize(serializer),
        }
    }
}

impl<'de, A, B> Deserialize<'de> for OneOf2<A, B>
where
    A: DeserializeOwned,
    B: DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if let Ok(first) = A::deserialize(&value) {
            return Ok(OneOf2::First(first));
        }
        B::deserialize(&value)
            .map(OneOf2::Second)
            .map_err(|error| D::Error::custom(format!("value matched no union branch: {error}")))
    }
}

/// Resolves the branch scan of a generated `branch()` method.
///
/// `populated` is the number of accessors that were set and `branch` the last
/// one seen; anything above one is a contract violation.
pub fn settle<T>(
    union: &'static str,
    populated: usize,
    branch: Option<T>,
) -> Result<Option<T>, UnionError> {
    if populated > 1 {
        return Err(UnionError::Ambiguous { union, populated });
    }
    Ok(branch)
}

/// Writes a union with no populated accessor.
pub fn write_empty<S>(serializer: S, union: &'static str, nullable: bool) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if nullable {
        serializer.serialize_none()
    } else {
        Err(S::Error::custom(UnionError::Empty { union }))
    }
}

/// Writes one arm of a discriminated union as `{"<property>": payload}`.
pub fn write_arm<S, T>(serializer: S, property: &'static str, payload: &T) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(property, payload)?;
    map.end()
}

/// Reads a discriminated union: the input must be an object carrying exactly
/// one of `arms` as a property. Returns the arm index and its payload, or
/// `None` for an explicit `null` when the union is nullable.
pub fn read_discriminated<'de, D>(
    deserializer: D,
    union: &'static str,
    nullable: bool,
    arms: &[&'static str],
) -> Result<Option<(usize, Value)>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut object = match Value::deserialize(deserializer)? {
        Value::Null if nullable => return Ok(None),
        Value::Object(object) => object,
        other => {
            return Err(D::Error::custom(UnionError::NotAnObject {
                union,
                found: kind_of(&other),
            }));
        }
    };
    let present = arms
        .iter()
        .enumerate()
        .filter(|(_, arm)| object.contains_key(**arm))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    match present.as_slice() {
        [index] => {
            let payload = object.remove(arms[*index]).unwrap_or(Value::Null);
            Ok(Some((*index, payload)))
        }
        _ => Err(D::Error::custom(UnionError::Discriminator {
            union,
            expected: arms.join(", "),
            found: present.len(),
        })),
    }
}

/// Decodes an arm payload returned by [`read_discriminated`].
pub fn decode<T, E>(payload: Value) -> Result<T, E>
where
    T: DeserializeOwned,
    E: serde::de::Error,
{
    serde_json::from_value(payload).map_err(E::custom)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
