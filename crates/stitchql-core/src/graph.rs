//! Immutable expression graph stored in an append-only arena.
//!
//! Nodes are addressed by [`NodeId`] handles. Identity is the handle, not the
//! value: two structurally equal nodes added separately are distinct, and a
//! node reused by several parents is one shared sub-expression.
//!
//! Nothing is ever mutated in place. Transformations add new nodes and return
//! new handles, so handles held by other graphs' owners stay valid.

use std::collections::HashSet;
use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::types::Type;

/// Handle to a node in a [`Graph`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Handle to a registered operation. Resolved by the operation registry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct OpId(u32);

impl OpId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Create an OpId from a raw index. Use only from the registry.
    #[inline]
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }
}

/// Resolves operation handles to names for display.
pub trait OpNames {
    fn op_name(&self, op: OpId) -> &str;
}

/// Payload of a constant node.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ConstValue {
    Literal(serde_json::Value),
    /// A function literal: the body node, evaluated lazily with bound variables.
    Function(NodeId),
    Type(Type),
}

impl ConstValue {
    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            ConstValue::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_literal().and_then(serde_json::Value::as_str)
    }

    pub fn as_function(&self) -> Option<NodeId> {
        match self {
            ConstValue::Function(body) => Some(*body),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&Type> {
        match self {
            ConstValue::Type(ty) => Some(ty),
            _ => None,
        }
    }
}

/// Graph node.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Const {
        ty: Type,
        value: ConstValue,
    },
    /// Invocation of a registered operation. Input order follows the operation signature.
    Output {
        ty: Type,
        op: OpId,
        inputs: IndexMap<String, NodeId>,
    },
    /// Free variable, bound only inside a function literal body.
    Var {
        ty: Type,
        name: String,
    },
}

impl Node {
    pub fn ty(&self) -> &Type {
        match self {
            Node::Const { ty, .. } | Node::Output { ty, .. } | Node::Var { ty, .. } => ty,
        }
    }

    pub fn op(&self) -> Option<OpId> {
        match self {
            Node::Output { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn inputs(&self) -> Option<&IndexMap<String, NodeId>> {
        match self {
            Node::Output { inputs, .. } => Some(inputs),
            _ => None,
        }
    }

    pub fn const_value(&self) -> Option<&ConstValue> {
        match self {
            Node::Const { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Body of a function literal.
    pub fn function_body(&self) -> Option<NodeId> {
        self.const_value().and_then(ConstValue::as_function)
    }
}

/// Whether traversals descend into function literal bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Descend {
    /// Only follow operation inputs.
    Inputs,
    /// Also enter the body of every function literal.
    Functions,
}

/// Append-only node arena.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn constant(&mut self, ty: Type, value: ConstValue) -> NodeId {
        self.add(Node::Const { ty, value })
    }

    /// Add a literal constant.
    pub fn literal(&mut self, ty: Type, value: impl Into<serde_json::Value>) -> NodeId {
        self.constant(ty, ConstValue::Literal(value.into()))
    }

    /// Add a string literal typed `String`.
    pub fn string(&mut self, value: &str) -> NodeId {
        self.literal(Type::String, value)
    }

    /// Add a function literal whose body is `body`.
    pub fn function(&mut self, ty: Type, body: NodeId) -> NodeId {
        self.constant(ty, ConstValue::Function(body))
    }

    pub fn output<K: Into<String>>(
        &mut self,
        ty: Type,
        op: OpId,
        inputs: impl IntoIterator<Item = (K, NodeId)>,
    ) -> NodeId {
        let inputs = inputs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.add(Node::Output { ty, op, inputs })
    }

    pub fn var(&mut self, ty: Type, name: impl Into<String>) -> NodeId {
        self.add(Node::Var {
            ty,
            name: name.into(),
        })
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        self.ensure_node(id)
    }

    #[inline]
    pub fn try_get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub fn ty(&self, id: NodeId) -> &Type {
        self.get(id).ty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of a node: operation inputs, plus the body of a
    /// function literal when descending into functions.
    pub fn children(&self, id: NodeId, descend: Descend) -> Vec<NodeId> {
        match self.get(id) {
            Node::Output { inputs, .. } => inputs.values().copied().collect(),
            Node::Const {
                value: ConstValue::Function(body),
                ..
            } if descend == Descend::Functions => vec![*body],
            _ => Vec::new(),
        }
    }

    /// All nodes reachable from `roots`, each once, dependencies before dependents.
    pub fn walk(&self, roots: &[NodeId], descend: Descend) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(NodeId, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            for child in self.children(id, descend).into_iter().rev() {
                if !visited.contains(&child) {
                    stack.push((child, false));
                }
            }
        }

        order
    }

    /// Whether any node reachable from `roots` satisfies `pred`.
    pub fn any_reachable(
        &self,
        roots: &[NodeId],
        descend: Descend,
        mut pred: impl FnMut(NodeId, &Node) -> bool,
    ) -> bool {
        self.walk(roots, descend)
            .into_iter()
            .any(|id| pred(id, self.get(id)))
    }

    /// Human-readable listing of everything reachable from `roots`.
    ///
    /// One line per node in dependency order, function bodies included:
    /// ```text
    /// %0 = "acme" : String
    /// %1 = project(name: %0) : project
    /// ```
    pub fn dump(&self, roots: &[NodeId], names: &impl OpNames) -> String {
        let mut out = String::new();
        for id in self.walk(roots, Descend::Functions) {
            let _ = write!(out, "%{} = ", id.as_u32());
            match self.get(id) {
                Node::Const { value, .. } => match value {
                    ConstValue::Literal(v) => {
                        let _ = write!(out, "{v}");
                    }
                    ConstValue::Function(body) => {
                        let _ = write!(out, "fn %{}", body.as_u32());
                    }
                    ConstValue::Type(ty) => {
                        let _ = write!(out, "type {ty}");
                    }
                },
                Node::Output { op, inputs, .. } => {
                    out.push_str(names.op_name(*op));
                    out.push('(');
                    for (i, (name, input)) in inputs.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        let _ = write!(out, "{name}: %{}", input.as_u32());
                    }
                    out.push(')');
                }
                Node::Var { name, .. } => {
                    let _ = write!(out, "${name}");
                }
            }
            let _ = writeln!(out, " : {}", self.ty(id));
        }
        out
    }
}
