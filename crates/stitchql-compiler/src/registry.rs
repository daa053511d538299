//! Operation registry and the backend-query plugin contract.
//!
//! The registry is populated once through [`RegistryBuilder`] and frozen by
//! [`RegistryBuilder::build`]. A built [`Registry`] is immutable and shared by
//! reference across any number of concurrent compile calls.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use stitchql_core::{ConstValue, Graph, Node, NodeId, OpId, OpNames, Type, TypeMap};
use stitchql_gql::Value;
use stitchql_gql::printer::print_value;

use crate::error::{CompileError, Result};

/// Synthetic operation that runs the merged query. Inputs: `query`, `aliases`.
pub const EXECUTE: OpId = OpId::from_raw(0);
/// Synthetic operation that extracts one aliased root from the query result.
/// Inputs: `result`, `alias`, `rootOp`, `selection`.
pub const EXTRACT: OpId = OpId::from_raw(1);

pub const EXECUTE_NAME: &str = "gql.execute";
pub const EXTRACT_NAME: &str = "gql.extract";

/// Input types of a call, in signature order.
pub type InputTypes = IndexMap<String, Type>;

pub type OutputTypeFn = Arc<dyn Fn(&InputTypes) -> Type + Send + Sync>;
pub type QueryFn = Arc<dyn Fn(&QueryInputs<'_>, &str) -> String + Send + Sync>;
pub type KeyPropagationFn = Arc<dyn Fn(&Type) -> Type + Send + Sync>;

/// Output type of an operation, either fixed or computed from the input types.
#[derive(Clone)]
pub enum OutputType {
    Fixed(Type),
    Computed(OutputTypeFn),
}

impl OutputType {
    pub fn computed(f: impl Fn(&InputTypes) -> Type + Send + Sync + 'static) -> Self {
        OutputType::Computed(Arc::new(f))
    }

    pub fn resolve(&self, inputs: &InputTypes) -> Type {
        match self {
            OutputType::Fixed(ty) => ty.clone(),
            OutputType::Computed(f) => f(inputs),
        }
    }
}

impl fmt::Debug for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputType::Fixed(ty) => write!(f, "Fixed({ty})"),
            OutputType::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// How tags on the first input reach an operation's output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TagFlow {
    #[default]
    None,
    /// Output inherits the first input's tags.
    Flows,
    /// Output inherits the first input's tags plus a tag named after the first
    /// parameter holding the first input itself.
    TagsOutputs,
}

/// Special forms the stitcher recognizes. Everything else is `Generic`.
///
/// Input positions are fixed per form:
/// - `Map`, `MapEach`, `Filter`, `Sort`, `GroupBy`, `JoinAll`: collection, function
/// - `Join`: left, right, left function, right function, left alias, right alias
/// - `Pick`: object, key
/// - `Execute`: function
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OpForm {
    #[default]
    Generic,
    /// Unwraps a named tag from the first input.
    TagGetter { tag: String },
    IndexCheckpoint,
    Dict,
    Pick,
    List,
    Map,
    MapEach,
    Filter,
    Sort,
    GroupBy,
    Join,
    JoinAll,
    Execute,
    /// Contributes no query text and forwards the fragments of its consumers.
    Passthrough,
}

/// Constant-valued inputs of a call, handed to a [`QueryFn`].
#[derive(Debug, Default)]
pub struct QueryInputs<'g> {
    values: IndexMap<&'g str, &'g serde_json::Value>,
}

impl<'g> QueryInputs<'g> {
    /// Collect the literal constants among `inputs`.
    pub fn new(graph: &'g Graph, inputs: &'g IndexMap<String, NodeId>) -> Self {
        let values = inputs
            .iter()
            .filter_map(|(name, &id)| {
                let value = graph.get(id).const_value()?.as_literal()?;
                Some((name.as_str(), value))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&'g serde_json::Value> {
        self.values.get(name).copied()
    }

    pub fn str(&self, name: &str) -> Option<&'g str> {
        self.get(name).and_then(serde_json::Value::as_str)
    }

    /// Input rendered as a query argument value, `null` when absent.
    pub fn argument(&self, name: &str) -> String {
        let Some(value) = self.get(name) else {
            return "null".to_string();
        };
        let mut out = String::new();
        print_value(&mut out, &Value::from(value));
        out
    }
}

/// Backend-query contribution of an operation.
#[derive(Clone)]
pub struct GqlPlugin {
    pub(crate) query: QueryFn,
    pub(crate) is_root: bool,
    pub(crate) root_resolver: Option<String>,
    pub(crate) key_propagation: Option<KeyPropagationFn>,
}

impl GqlPlugin {
    /// Plugin whose fragment is `query(const_inputs, child_fragments)`.
    pub fn new(query: impl Fn(&QueryInputs<'_>, &str) -> String + Send + Sync + 'static) -> Self {
        Self {
            query: Arc::new(query),
            is_root: false,
            root_resolver: None,
            key_propagation: None,
        }
    }

    /// Mark as a root: a top-level field of the merged query.
    pub fn root(mut self) -> Self {
        self.is_root = true;
        self
    }

    /// Replace the root with operation `name` instead of the generic extractor.
    pub fn root_resolver(mut self, name: impl Into<String>) -> Self {
        self.root_resolver = Some(name.into());
        self
    }

    pub fn key_propagation(mut self, f: impl Fn(&Type) -> Type + Send + Sync + 'static) -> Self {
        self.key_propagation = Some(Arc::new(f));
        self
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn query(&self, inputs: &QueryInputs<'_>, inner: &str) -> String {
        (self.query)(inputs, inner)
    }

    pub fn resolver(&self) -> Option<&str> {
        self.root_resolver.as_deref()
    }

    pub fn propagate(&self, input: &Type) -> Option<Type> {
        self.key_propagation.as_ref().map(|f| f(input))
    }

    pub fn has_key_propagation(&self) -> bool {
        self.key_propagation.is_some()
    }
}

impl fmt::Debug for GqlPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GqlPlugin")
            .field("is_root", &self.is_root)
            .field("root_resolver", &self.root_resolver)
            .field("key_propagation", &self.key_propagation.is_some())
            .finish_non_exhaustive()
    }
}

/// A registered operation.
#[derive(Clone, Debug)]
pub struct Operation {
    pub name: String,
    pub inputs: InputTypes,
    pub output: OutputType,
    pub tag_flow: TagFlow,
    /// Scalar operation this is the vectorized ("mapped") variant of.
    pub derived_from: Option<String>,
    pub form: OpForm,
    pub plugin: Option<GqlPlugin>,
}

impl Operation {
    pub fn new<K: Into<String>>(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = (K, Type)>,
        output: OutputType,
    ) -> Self {
        Self {
            name: name.into(),
            inputs: inputs.into_iter().map(|(k, t)| (k.into(), t)).collect(),
            output,
            tag_flow: TagFlow::None,
            derived_from: None,
            form: OpForm::Generic,
            plugin: None,
        }
    }

    pub fn tag_flow(mut self, flow: TagFlow) -> Self {
        self.tag_flow = flow;
        self
    }

    pub fn derived_from(mut self, name: impl Into<String>) -> Self {
        self.derived_from = Some(name.into());
        self
    }

    pub fn form(mut self, form: OpForm) -> Self {
        self.form = form;
        self
    }

    pub fn plugin(mut self, plugin: GqlPlugin) -> Self {
        self.plugin = Some(plugin);
        self
    }

    /// Name of the first declared parameter.
    pub fn first_param(&self) -> Option<&str> {
        self.inputs.keys().next().map(String::as_str)
    }
}

/// Exclusive-writer registration phase.
pub struct RegistryBuilder {
    ops: Vec<Operation>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        let mut builder = Self { ops: Vec::new() };

        // Pre-register builtin operations at their expected IDs
        let execute = builder.register(Operation::new(
            EXECUTE_NAME,
            [("query", Type::String), ("aliases", Type::list(Type::String))],
            OutputType::Fixed(Type::Any),
        ));
        debug_assert_eq!(execute, EXECUTE);

        let extract = builder.register(Operation::new(
            EXTRACT_NAME,
            [
                ("result", Type::Any),
                ("alias", Type::String),
                ("rootOp", Type::String),
                ("selection", Type::TypeType),
            ],
            OutputType::Fixed(Type::Any),
        ));
        debug_assert_eq!(extract, EXTRACT);

        builder
    }

    /// Register an operation. A later registration under the same name shadows earlier ones.
    pub fn register(&mut self, op: Operation) -> OpId {
        let id = OpId::from_raw(self.ops.len() as u32);
        self.ops.push(op);
        id
    }

    /// Freeze the registry. Every `derived_from` and root resolver must name a registered operation.
    pub fn build(self) -> Result<Registry> {
        let by_name: HashMap<String, OpId> = self
            .ops
            .iter()
            .enumerate()
            .map(|(i, op)| (op.name.clone(), OpId::from_raw(i as u32)))
            .collect();

        let mut derived = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            let base = match &op.derived_from {
                Some(name) => Some(
                    *by_name
                        .get(name)
                        .ok_or_else(|| CompileError::UnknownOperation(name.clone()))?,
                ),
                None => None,
            };
            derived.push(base);

            if let Some(resolver) = op.plugin.as_ref().and_then(GqlPlugin::resolver)
                && !by_name.contains_key(resolver)
            {
                return Err(CompileError::UnknownOperation(resolver.to_string()));
            }
        }

        Ok(Registry {
            ops: self.ops,
            by_name,
            derived,
        })
    }
}

/// Frozen operation registry.
#[derive(Debug)]
pub struct Registry {
    ops: Vec<Operation>,
    by_name: HashMap<String, OpId>,
    derived: Vec<Option<OpId>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    #[inline]
    pub fn get(&self, op: OpId) -> &Operation {
        self.ensure_op(op)
    }

    pub fn lookup(&self, name: &str) -> Option<OpId> {
        self.by_name.get(name).copied()
    }

    pub fn resolve(&self, name: &str) -> Result<OpId> {
        self.lookup(name)
            .ok_or_else(|| CompileError::UnknownOperation(name.to_string()))
    }

    pub(crate) fn ops_slice(&self) -> &[Operation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The scalar operation `op` is a mapped variant of.
    pub fn base(&self, op: OpId) -> Option<OpId> {
        self.derived.get(op.as_u32() as usize).copied().flatten()
    }

    pub fn is_mapped(&self, op: OpId) -> bool {
        self.base(op).is_some()
    }

    /// Plugin of `op`, inherited from the base operation for mapped variants.
    pub fn plugin(&self, op: OpId) -> Option<&GqlPlugin> {
        self.get(op)
            .plugin
            .as_ref()
            .or_else(|| self.base(op).and_then(|base| self.get(base).plugin.as_ref()))
    }

    pub fn is_root(&self, op: OpId) -> bool {
        self.plugin(op).is_some_and(GqlPlugin::is_root)
    }

    /// Special form of `op`. Mapped variants of tag getters and passthroughs
    /// behave like their base.
    pub fn form(&self, op: OpId) -> &OpForm {
        let own = &self.get(op).form;
        if *own != OpForm::Generic {
            return own;
        }
        match self.base(op).map(|base| &self.get(base).form) {
            Some(form @ (OpForm::TagGetter { .. } | OpForm::Passthrough)) => form,
            _ => own,
        }
    }

    /// Tag flow of `op`, falling back to its base so mapping never drops tags.
    pub fn tag_flow(&self, op: OpId) -> TagFlow {
        match self.get(op).tag_flow {
            TagFlow::None => self
                .base(op)
                .map_or(TagFlow::None, |base| self.get(base).tag_flow),
            flow => flow,
        }
    }

    /// Output type of `op` for the given input types, with tag flow applied.
    pub fn output_type(&self, op: OpId, inputs: &InputTypes) -> Type {
        let operation = self.get(op);
        let output = operation.output.resolve(inputs);
        let Some((first_param, first)) = inputs.get_index(0) else {
            return output;
        };

        match self.tag_flow(op) {
            TagFlow::None => output,
            TagFlow::Flows => Type::tagged(first.tags().cloned().unwrap_or_default(), output),
            TagFlow::TagsOutputs => {
                let mut tags: TypeMap = first.tags().cloned().unwrap_or_default();
                tags.insert(first_param.clone(), first.untagged().clone());
                Type::tagged(tags, output)
            }
        }
    }

    /// Add a call to operation `name` to `graph`, typed by the operation's output function.
    ///
    /// Inputs are ordered by the operation signature; inputs outside the
    /// signature follow in the order given.
    pub fn call<K: Into<String>>(
        &self,
        graph: &mut Graph,
        name: &str,
        inputs: impl IntoIterator<Item = (K, NodeId)>,
    ) -> Result<NodeId> {
        let op = self.resolve(name)?;
        let operation = self.get(op);
        let mut given: IndexMap<String, NodeId> =
            inputs.into_iter().map(|(k, v)| (k.into(), v)).collect();

        let mut ordered = IndexMap::with_capacity(given.len());
        for param in operation.inputs.keys() {
            let id = given
                .shift_remove(param)
                .ok_or_else(|| CompileError::MissingInput {
                    op: operation.name.clone(),
                    input: param.clone(),
                })?;
            ordered.insert(param.clone(), id);
        }
        ordered.extend(given);

        let ty = self.output_type(op, &input_types(graph, &ordered));
        Ok(graph.add(Node::Output {
            ty,
            op,
            inputs: ordered,
        }))
    }
}

impl OpNames for Registry {
    fn op_name(&self, op: OpId) -> &str {
        &self.get(op).name
    }
}

/// Types of `inputs` as seen by output-type functions. Literal constants are
/// presented as `Const` types so functions can depend on their values.
pub fn input_types(graph: &Graph, inputs: &IndexMap<String, NodeId>) -> InputTypes {
    inputs
        .iter()
        .map(|(name, &id)| {
            let node = graph.get(id);
            let ty = match (node.ty(), node.const_value()) {
                (ty @ Type::Const { .. }, _) => ty.clone(),
                (ty, Some(ConstValue::Literal(value))) => Type::constant(ty.clone(), value.clone()),
                (ty, _) => ty.clone(),
            };
            (name.clone(), ty)
        })
        .collect()
}
