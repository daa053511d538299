//! Query compiler: one merged backend query per batch of leaf nodes.
//!
//! Pipeline:
//! 1. Gate: graphs that reach no root operation are returned untouched
//! 2. Stitch the whole batch once. Only roots the stitcher reached are compiled
//! 3. Build each root's fragment bottom-up from the calls recorded on it
//! 4. Alias the roots and merge all fragments into one document
//! 5. Replace every root with an extraction from a single execute node
//! 6. Refine result types with the now-known keys

use std::collections::HashMap;

use indexmap::IndexMap;
use stitchql_core::{ConstValue, Descend, Graph, Node, NodeId, OpId, OpNames, Type};
use stitchql_gql::{Selection, parse_selections, print_selections};
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{CompileError, ExecutionError, Result};
use crate::key_propagation::{refine_types, selection_type};
use crate::registry::{EXECUTE, EXTRACT, GqlPlugin, OpForm, QueryInputs, Registry};
use crate::stitch::{StitchedGraph, stitch};

/// Compile `leaves` with the default configuration.
pub fn compile(graph: &mut Graph, registry: &Registry, leaves: &[NodeId]) -> Result<Vec<NodeId>> {
    Compiler::new(registry).compile(graph, leaves)
}

/// Look up the sub-result of one root in an executed query result.
pub fn extract_alias<'v>(
    result: &'v serde_json::Value,
    alias: &str,
) -> std::result::Result<&'v serde_json::Value, ExecutionError> {
    result
        .get(alias)
        .ok_or_else(|| ExecutionError::MissingAlias(alias.to_string()))
}

pub struct Compiler<'r> {
    registry: &'r Registry,
    config: Config,
}

#[derive(Clone, Debug)]
struct RootPlan {
    alias: String,
    selection: Type,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            config: Config::default(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Rewrite `leaves` so that all backend reads go through one query.
    ///
    /// Only appends to `graph`. Returns the rewritten leaves in input order.
    #[instrument(skip_all, fields(leaves = leaves.len()))]
    pub fn compile(&self, graph: &mut Graph, leaves: &[NodeId]) -> Result<Vec<NodeId>> {
        let registry = self.registry;
        let is_root = |node: &Node| node.op().is_some_and(|op| registry.is_root(op));

        if !graph.any_reachable(leaves, Descend::Functions, |_, node| is_root(node)) {
            debug!("no root operation reachable, skipping query compilation");
            return Ok(leaves.to_vec());
        }

        let stitched = stitch(graph, registry, leaves, &self.config)?;
        // Roots in lambda bodies the stitcher never entered stay untouched.
        let roots: Vec<NodeId> = graph
            .walk(leaves, Descend::Functions)
            .into_iter()
            .filter(|&id| is_root(graph.get(id)) && stitched.has_result(id))
            .collect();
        debug!(roots = roots.len(), recorders = stitched.len(), "stitched");
        if roots.is_empty() {
            return Ok(leaves.to_vec());
        }

        let mut fragments = Fragments {
            graph,
            registry,
            stitched: &stitched,
            recursion_limit: self.config.recursion_limit,
            memo: HashMap::new(),
        };
        let mut plans: HashMap<NodeId, RootPlan> = HashMap::new();
        let mut selections: Vec<String> = Vec::new();
        let mut aliases: Vec<String> = Vec::new();

        for &root in &roots {
            let text = fragments.fragment(root, 0)?;
            let (alias, selection, printed) = self.alias_root(graph, root, &text)?;
            if !aliases.contains(&alias) {
                aliases.push(alias.clone());
            }
            if !selections.contains(&printed) {
                selections.push(printed);
            }
            plans.insert(root, RootPlan { alias, selection });
        }

        let query = self.assemble(&selections)?;
        debug!(?aliases, query_len = query.len(), "query assembled");

        let query_node = graph.literal(Type::String, query);
        let aliases_node = graph.literal(Type::list(Type::String), aliases.clone());
        let execute_ty = Type::typed_dict(aliases.iter().map(|alias| (alias.clone(), Type::Any)));
        let execute = graph.output(
            execute_ty,
            EXECUTE,
            [("query", query_node), ("aliases", aliases_node)],
        );

        let rewritten = self.rewrite(graph, leaves, &plans, execute)?;
        refine_types(graph, registry, &rewritten)
    }

    /// Parse a root fragment, alias its field and derive its selection type.
    ///
    /// A fragment that already carries an alias keeps it. Otherwise the alias
    /// is derived from the fragment text, so identical roots share one.
    fn alias_root(&self, graph: &Graph, root: NodeId, text: &str) -> Result<(String, Type, String)> {
        let missing = || CompileError::MissingRootSelection {
            node: root,
            op: graph
                .get(root)
                .op()
                .map_or_else(String::new, |op| self.registry.op_name(op).to_string()),
        };

        let selections = parse_selections(text)?;
        let Ok([Selection::Field(mut field)]) = <[Selection; 1]>::try_from(selections) else {
            return Err(missing());
        };

        let alias = match &field.alias {
            Some(alias) => alias.clone(),
            None => {
                let alias = format!(
                    "{}_{:08x}",
                    self.config.alias_prefix,
                    crc32fast::hash(text.trim().as_bytes())
                );
                field.alias = Some(alias.clone());
                alias
            }
        };

        let selection = selection_type(&field);
        let printed = print_selections(&[Selection::Field(field)]);
        Ok((alias, selection, printed))
    }

    fn assemble(&self, selections: &[String]) -> Result<String> {
        let text = format!(
            "query {} {{ {} }}",
            self.config.operation_name,
            selections.join(" ")
        );
        if !self.config.normalize {
            return Ok(text);
        }
        Ok(stitchql_gql::normalize(&text)?)
    }

    /// Substitute roots bottom-up, rebuilding every node whose inputs changed.
    fn rewrite(
        &self,
        graph: &mut Graph,
        leaves: &[NodeId],
        plans: &HashMap<NodeId, RootPlan>,
        execute: NodeId,
    ) -> Result<Vec<NodeId>> {
        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
        let lookup = |remap: &HashMap<NodeId, NodeId>, id: NodeId| remap.get(&id).copied().unwrap_or(id);

        for id in graph.walk(leaves, Descend::Functions) {
            let rebuilt = match graph.get(id).clone() {
                Node::Output { ty, op, inputs } => {
                    let new_inputs: IndexMap<String, NodeId> = inputs
                        .iter()
                        .map(|(name, &input)| (name.clone(), lookup(&remap, input)))
                        .collect();
                    if let Some(plan) = plans.get(&id) {
                        self.replace_root(graph, op, ty, new_inputs, plan, execute)?
                    } else if new_inputs != inputs {
                        graph.add(Node::Output {
                            ty,
                            op,
                            inputs: new_inputs,
                        })
                    } else {
                        continue;
                    }
                }
                Node::Const {
                    ty,
                    value: ConstValue::Function(body),
                } => {
                    let new_body = lookup(&remap, body);
                    if new_body == body {
                        continue;
                    }
                    graph.function(ty, new_body)
                }
                Node::Const { .. } | Node::Var { .. } => continue,
            };
            remap.insert(id, rebuilt);
        }

        Ok(leaves.iter().map(|&leaf| lookup(&remap, leaf)).collect())
    }

    fn replace_root(
        &self,
        graph: &mut Graph,
        op: OpId,
        ty: Type,
        inputs: IndexMap<String, NodeId>,
        plan: &RootPlan,
        execute: NodeId,
    ) -> Result<NodeId> {
        let registry = self.registry;
        let alias = graph.string(&plan.alias);

        if let Some(resolver) = registry.plugin(op).and_then(GqlPlugin::resolver) {
            let resolver = registry.resolve(resolver)?;
            let mut resolver_inputs = IndexMap::from([
                ("gqlResult".to_string(), execute),
                ("alias".to_string(), alias),
            ]);
            resolver_inputs.extend(inputs);
            return Ok(graph.add(Node::Output {
                ty,
                op: resolver,
                inputs: resolver_inputs,
            }));
        }

        let root_op = graph.string(&registry.get(op).name);
        let selection = graph.constant(Type::TypeType, ConstValue::Type(plan.selection.clone()));
        Ok(graph.output(
            ty,
            EXTRACT,
            [
                ("result", execute),
                ("alias", alias),
                ("rootOp", root_op),
                ("selection", selection),
            ],
        ))
    }
}

/// Memoized fragment text per node.
struct Fragments<'a> {
    graph: &'a Graph,
    registry: &'a Registry,
    stitched: &'a StitchedGraph,
    recursion_limit: usize,
    memo: HashMap<NodeId, String>,
}

impl Fragments<'_> {
    /// Fragment of `node`: its own query text wrapped around its consumers' fragments.
    fn fragment(&mut self, node: NodeId, depth: usize) -> Result<String> {
        if let Some(text) = self.memo.get(&node) {
            return Ok(text.clone());
        }
        if depth >= self.recursion_limit {
            return Err(CompileError::RecursionLimitExceeded {
                limit: self.recursion_limit,
            });
        }

        let consumers: Vec<NodeId> = self
            .stitched
            .consumers(node)
            .map(|call| call.node)
            .filter(|&consumer| consumer != node)
            .collect();
        let mut children: Vec<String> = Vec::new();
        for consumer in consumers {
            let text = self.fragment(consumer, depth + 1)?;
            if !text.is_empty() && !children.contains(&text) {
                children.push(text);
            }
        }
        let inner = children.join(" ");

        let text = match self.graph.get(node) {
            Node::Output { op, inputs, .. } => match self.registry.plugin(*op) {
                Some(plugin) => plugin.query(&QueryInputs::new(self.graph, inputs), &inner),
                None if matches!(self.registry.form(*op), OpForm::Passthrough | OpForm::List) => {
                    inner
                }
                None => String::new(),
            },
            Node::Const { .. } | Node::Var { .. } => String::new(),
        };

        self.memo.insert(node, text.clone());
        Ok(text)
    }
}
