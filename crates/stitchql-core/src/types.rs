//! Structural type algebra.
//!
//! Types are plain values compared structurally. Two annotations ride on top of
//! ordinary value types:
//! - `Tagged` attaches side-channel tags that assignability ignores
//! - `HasKeys` records the exact backend fields known to be fetched for a domain object
//!
//! Assignability lives in `assign.rs`.

use std::collections::BTreeMap;
use std::fmt;

/// Named member types, ordered by name so equal maps compare equal.
pub type TypeMap = BTreeMap<String, Type>;

/// A structural type.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Type {
    /// Uninhabitable. Produced by empty unions and broken type functions.
    Invalid,
    Any,
    #[serde(rename = "none")]
    NoneType,
    Boolean,
    Int,
    Float,
    String,
    /// Type of a type-valued constant.
    TypeType,
    List {
        element: Box<Type>,
    },
    TypedDict {
        fields: TypeMap,
    },
    /// Always flat and deduplicated when built through [`Type::union`].
    Union {
        members: Vec<Type>,
    },
    /// A literal value together with its underlying type.
    Const {
        inner: Box<Type>,
        value: serde_json::Value,
    },
    Function {
        params: TypeMap,
        output: Box<Type>,
    },
    /// Value type with out-of-band tags. Never nested: [`Type::tagged`] flattens.
    Tagged {
        tags: TypeMap,
        value: Box<Type>,
    },
    /// A backend domain object with no statically known fields.
    Object {
        class: String,
    },
    /// A backend domain object whose fetched fields are known exactly.
    HasKeys {
        class: String,
        keys: TypeMap,
    },
}

impl Type {
    pub fn list(element: Type) -> Self {
        Type::List {
            element: Box::new(element),
        }
    }

    pub fn typed_dict<K: Into<String>>(fields: impl IntoIterator<Item = (K, Type)>) -> Self {
        Type::TypedDict {
            fields: fields.into_iter().map(|(k, t)| (k.into(), t)).collect(),
        }
    }

    pub fn constant(inner: Type, value: impl Into<serde_json::Value>) -> Self {
        Type::Const {
            inner: Box::new(inner),
            value: value.into(),
        }
    }

    pub fn function<K: Into<String>>(
        params: impl IntoIterator<Item = (K, Type)>,
        output: Type,
    ) -> Self {
        Type::Function {
            params: params.into_iter().map(|(k, t)| (k.into(), t)).collect(),
            output: Box::new(output),
        }
    }

    pub fn object(class: impl Into<String>) -> Self {
        Type::Object {
            class: class.into(),
        }
    }

    pub fn has_keys<K: Into<String>>(
        class: impl Into<String>,
        keys: impl IntoIterator<Item = (K, Type)>,
    ) -> Self {
        Type::HasKeys {
            class: class.into(),
            keys: keys.into_iter().map(|(k, t)| (k.into(), t)).collect(),
        }
    }

    /// Build a union, flattening nested unions and dropping duplicates.
    ///
    /// Zero members yield `Invalid`, one member yields the member itself.
    pub fn union(members: impl IntoIterator<Item = Type>) -> Self {
        let mut flat: Vec<Type> = Vec::new();
        let mut pending: Vec<Type> = members.into_iter().collect();
        pending.reverse();

        while let Some(member) = pending.pop() {
            match member {
                Type::Union { members } => pending.extend(members.into_iter().rev()),
                Type::Invalid => {}
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }

        match flat.len() {
            0 => Type::Invalid,
            1 => flat.swap_remove(0),
            _ => Type::Union { members: flat },
        }
    }

    /// Wrap `value` with `tags`. Tags already on `value` are kept; `tags` wins on conflict.
    pub fn tagged(tags: TypeMap, value: Type) -> Self {
        if tags.is_empty() {
            return value;
        }
        match value {
            Type::Tagged {
                tags: mut inner_tags,
                value,
            } => {
                inner_tags.extend(tags);
                Type::Tagged {
                    tags: inner_tags,
                    value,
                }
            }
            value => Type::Tagged {
                tags,
                value: Box::new(value),
            },
        }
    }

    /// The value type with any tag wrapper removed.
    pub fn untagged(&self) -> &Type {
        match self {
            Type::Tagged { value, .. } => value,
            other => other,
        }
    }

    /// Tags carried by this type, if any.
    pub fn tags(&self) -> Option<&TypeMap> {
        match self {
            Type::Tagged { tags, .. } => Some(tags),
            _ => None,
        }
    }

    /// Look up a tag by name.
    pub fn tag(&self, name: &str) -> Option<&Type> {
        self.tags().and_then(|tags| tags.get(name))
    }

    /// Look up a known field of a `HasKeys` object or a `TypedDict`, ignoring tags.
    pub fn key(&self, name: &str) -> Option<&Type> {
        match self.untagged() {
            Type::HasKeys { keys, .. } => keys.get(name),
            Type::TypedDict { fields } => fields.get(name),
            _ => None,
        }
    }

    /// Element type of a list, ignoring tags.
    pub fn element(&self) -> Option<&Type> {
        match self.untagged() {
            Type::List { element } => Some(element),
            _ => None,
        }
    }

    /// Domain class of an `Object` or `HasKeys`, ignoring tags.
    pub fn class(&self) -> Option<&str> {
        match self.untagged() {
            Type::Object { class } | Type::HasKeys { class, .. } => Some(class),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.untagged(), Type::Invalid)
    }

    /// Whether no value can have this type.
    ///
    /// Lists are always inhabited by the empty list.
    pub fn is_uninhabited(&self) -> bool {
        match self {
            Type::Invalid => true,
            Type::Tagged { value, .. } => value.is_uninhabited(),
            Type::Const { inner, .. } => inner.is_uninhabited(),
            Type::TypedDict { fields } => fields.values().any(Type::is_uninhabited),
            Type::HasKeys { keys, .. } => keys.values().any(Type::is_uninhabited),
            Type::Union { members } => members.iter().all(Type::is_uninhabited),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Invalid => f.write_str("Invalid"),
            Type::Any => f.write_str("Any"),
            Type::NoneType => f.write_str("None"),
            Type::Boolean => f.write_str("Boolean"),
            Type::Int => f.write_str("Int"),
            Type::Float => f.write_str("Float"),
            Type::String => f.write_str("String"),
            Type::TypeType => f.write_str("Type"),
            Type::List { element } => write!(f, "List<{element}>"),
            Type::TypedDict { fields } => write_members(f, fields),
            Type::Union { members } => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            Type::Const { inner, value } => write!(f, "Const<{inner}, {value}>"),
            Type::Function { params, output } => {
                f.write_str("(")?;
                for (i, (name, ty)) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, ") => {output}")
            }
            Type::Tagged { tags, value } => {
                f.write_str("Tagged<")?;
                write_members(f, tags)?;
                write!(f, ", {value}>")
            }
            Type::Object { class } => f.write_str(class),
            Type::HasKeys { class, keys } => {
                write!(f, "HasKeys<{class}>")?;
                write_members(f, keys)
            }
        }
    }
}

fn write_members(f: &mut fmt::Formatter<'_>, members: &TypeMap) -> fmt::Result {
    f.write_str("{")?;
    for (i, (name, ty)) in members.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{name}: {ty}")?;
    }
    f.write_str("}")
}
