//! Typed selection-set AST.
//!
//! Only executable documents are modelled. Fragment spreads and inline
//! fragments parse, but the merger rejects them.

/// A parsed document: one or more operation definitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub operations: Vec<Operation>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn keyword(self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

impl Operation {
    /// An unnamed query, the shape of `{ ... }` shorthand documents.
    pub fn query(name: Option<String>, selection_set: Vec<Selection>) -> Self {
        Self {
            kind: OperationKind::Query,
            name,
            variables: Vec::new(),
            directives: Vec::new(),
            selection_set,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableDefinition {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Value>,
}

/// Variable type reference, e.g. `[String!]!`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Field(Field),
    FragmentSpread {
        name: String,
        directives: Vec<Directive>,
    },
    InlineFragment {
        type_condition: Option<String>,
        directives: Vec<Directive>,
        selection_set: Vec<Selection>,
    },
}

impl Selection {
    /// Name of the selection kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Selection::Field(_) => "field",
            Selection::FragmentSpread { .. } => "fragment spread",
            Selection::InlineFragment { .. } => "inline fragment",
        }
    }

    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Selection::Field(field) => Some(field),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: name.into(),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: Vec::new(),
        }
    }

    /// Key under which the field appears in a response: the alias if present.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }

    /// Fields nested directly under this one.
    pub fn subfields(&self) -> impl Iterator<Item = &Field> {
        self.selection_set.iter().filter_map(Selection::as_field)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<Argument>,
}

/// Argument value. Numbers keep their source text so printing is exact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Variable(String),
    Int(String),
    Float(String),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) if n.is_f64() => Value::Float(n.to_string()),
            serde_json::Value::Number(n) => Value::Int(n.to_string()),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, item)| (name.clone(), Value::from(item)))
                    .collect(),
            ),
        }
    }
}
