//! Static refinement of result types with the backend fields known to be fetched.
//!
//! Once the compiler has fixed the merged query, every extracted root knows
//! exactly which fields its result carries. Key propagation pushes that
//! knowledge down the graph: plugin operations map the known keys of their
//! first input to the known keys of their output.

use std::collections::HashMap;

use indexmap::IndexMap;
use stitchql_core::{ConstValue, Descend, Graph, Node, NodeId, OpId, Type, TypeMap};
use stitchql_gql::Field;

use crate::error::{CompileError, Result};
use crate::registry::{EXTRACT, Registry, TagFlow, input_types};

/// Key-propagation function selecting the type of known field `name`.
///
/// Yields `Invalid` when the input's known keys lack the field.
pub fn select_key(name: impl Into<String>) -> impl Fn(&Type) -> Type + Send + Sync + 'static {
    let name = name.into();
    move |input| input.key(&name).cloned().unwrap_or(Type::Invalid)
}

/// Shape of the value selected by `field`: a dict keyed by response key, leaves typed `Any`.
pub fn selection_type(field: &Field) -> Type {
    Type::typed_dict(field.subfields().map(|sub| {
        let ty = if sub.selection_set.is_empty() {
            Type::Any
        } else {
            selection_type(sub)
        };
        (sub.response_key().to_string(), ty)
    }))
}

fn has_known_keys(ty: &Type) -> bool {
    matches!(ty.untagged(), Type::HasKeys { .. } | Type::TypedDict { .. })
}

/// Refined output type of a call to `op` with `inputs`.
///
/// Only extraction nodes and plugin operations with a key-propagation function
/// are refined; everything else keeps `current`. Pure in the input types, so
/// re-running it on a refined node changes nothing.
pub fn propagate_keys(
    graph: &Graph,
    registry: &Registry,
    op: OpId,
    inputs: &IndexMap<String, NodeId>,
    current: &Type,
) -> Result<Type> {
    if op == EXTRACT {
        return propagate_extracted(graph, registry, inputs, current);
    }

    let Some(plugin) = registry.plugin(op).filter(|p| p.has_key_propagation()) else {
        return Ok(current.clone());
    };
    let Some((param, &first)) = inputs.get_index(0) else {
        return Ok(current.clone());
    };

    let input = graph.ty(first);
    let mapped = registry.is_mapped(op);
    let target = if mapped {
        match input.element() {
            Some(element) => element.untagged(),
            None => return Ok(current.clone()),
        }
    } else {
        input.untagged()
    };
    if !has_known_keys(target) {
        return Ok(current.clone());
    }

    let Some(refined) = plugin.propagate(target) else {
        return Ok(current.clone());
    };
    ensure_inhabited(registry, op, &refined)?;

    let value = if mapped { Type::list(refined) } else { refined };
    let mut tags: TypeMap = input.tags().cloned().unwrap_or_default();
    if registry.tag_flow(op) == TagFlow::TagsOutputs {
        tags.insert(param.clone(), input.untagged().clone());
    }
    Ok(Type::tagged(tags, value))
}

/// Extraction nodes refine through the plugin of the root they replaced.
fn propagate_extracted(
    graph: &Graph,
    registry: &Registry,
    inputs: &IndexMap<String, NodeId>,
    current: &Type,
) -> Result<Type> {
    let const_input = |name: &str| {
        inputs
            .get(name)
            .and_then(|&id| graph.get(id).const_value())
    };
    let (Some(root_name), Some(selection)) = (
        const_input("rootOp").and_then(ConstValue::as_str),
        const_input("selection").and_then(ConstValue::as_type),
    ) else {
        return Ok(current.clone());
    };

    let root = registry.resolve(root_name)?;
    let Some(refined) = registry.plugin(root).and_then(|p| p.propagate(selection)) else {
        return Ok(current.clone());
    };
    ensure_inhabited(registry, root, &refined)?;

    let value = if registry.is_mapped(root) {
        Type::list(refined)
    } else {
        refined
    };
    Ok(Type::tagged(current.tags().cloned().unwrap_or_default(), value))
}

fn ensure_inhabited(registry: &Registry, op: OpId, ty: &Type) -> Result<()> {
    if ty.is_uninhabited() {
        return Err(CompileError::PluginContract {
            op: registry.get(op).name.clone(),
            ty: ty.clone(),
        });
    }
    Ok(())
}

/// Rebuild everything reachable from `leaves` bottom-up with refined types.
///
/// Nodes whose inputs and type are unchanged keep their handle. Returns the
/// handles of the rewritten leaves, in order.
pub fn refine_types(
    graph: &mut Graph,
    registry: &Registry,
    leaves: &[NodeId],
) -> Result<Vec<NodeId>> {
    let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
    let lookup = |remap: &HashMap<NodeId, NodeId>, id: NodeId| remap.get(&id).copied().unwrap_or(id);

    for id in graph.walk(leaves, Descend::Functions) {
        let rebuilt = match graph.get(id).clone() {
            Node::Const {
                ty,
                value: ConstValue::Function(body),
            } => {
                let new_body = lookup(&remap, body);
                if new_body == body {
                    continue;
                }
                let ty = match ty {
                    Type::Function { params, .. } => Type::Function {
                        params,
                        output: Box::new(graph.ty(new_body).clone()),
                    },
                    other => other,
                };
                graph.function(ty, new_body)
            }
            Node::Output { ty, op, inputs } => {
                let new_inputs: IndexMap<String, NodeId> = inputs
                    .iter()
                    .map(|(name, &input)| (name.clone(), lookup(&remap, input)))
                    .collect();
                let changed = new_inputs != inputs;

                let refines = op == EXTRACT
                    || registry
                        .plugin(op)
                        .is_some_and(|plugin| plugin.has_key_propagation());
                let new_ty = if refines {
                    propagate_keys(graph, registry, op, &new_inputs, &ty)?
                } else if changed {
                    registry.output_type(op, &input_types(graph, &new_inputs))
                } else {
                    ty.clone()
                };

                if !changed && new_ty == ty {
                    continue;
                }
                graph.add(Node::Output {
                    ty: new_ty,
                    op,
                    inputs: new_inputs,
                })
            }
            Node::Const { .. } | Node::Var { .. } => continue,
        };
        remap.insert(id, rebuilt);
    }

    Ok(leaves.iter().map(|&leaf| lookup(&remap, leaf)).collect())
}
