//! Stitcher: traces literal construction, destructuring and tag flow through a graph.
//!
//! Every visited node gets an [`ObjectRecorder`]. A recorder collects the tags
//! attached to its value, the literal shape it was built from, and every
//! [`OpCall`] that consumes it. The query compiler reads the recorded calls to
//! find out which fields each backend object must fetch.
//!
//! Function literals are not stitched where they appear. A higher-order
//! operation stitches the body with its variables bound, once per call site,
//! so a shared body accumulates calls from every site.

use std::collections::HashMap;

use indexmap::IndexMap;
use stitchql_core::{ConstValue, Descend, Graph, Node, NodeId, OpId, OpNames};
use tracing::trace;

use crate::config::Config;
use crate::error::{CompileError, Result};
use crate::registry::{OpForm, Registry, TagFlow};

/// Variable bound to the collection (or row) inside higher-order operation bodies.
const ROW: &str = "row";

pub const TAG_INDEX_CHECKPOINT: &str = "indexCheckpoint";
pub const TAG_GROUP_KEY: &str = "groupKey";
pub const TAG_JOIN_OBJ: &str = "joinObj";

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RecorderId(u32);

impl RecorderId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CallId(u32);

impl CallId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Literal shape a value was built from, if known.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Shape {
    #[default]
    Opaque,
    Dict(IndexMap<String, RecorderId>),
    List(Vec<RecorderId>),
    Literal(ConstValue),
}

#[derive(Clone, Debug, Default)]
pub struct ObjectRecorder {
    /// Node that produced the value. `None` for placeholders.
    pub node: Option<NodeId>,
    pub tags: IndexMap<String, RecorderId>,
    pub shape: Shape,
    /// Calls consuming this value, in discovery order.
    pub calls: Vec<CallId>,
}

/// One operation invocation observed while stitching.
#[derive(Clone, Debug, PartialEq)]
pub struct OpCall {
    pub node: NodeId,
    pub inputs: IndexMap<String, RecorderId>,
    pub output: RecorderId,
}

/// Result of a stitch pass. Read-only once returned.
#[derive(Debug, Default)]
pub struct StitchedGraph {
    recorders: Vec<ObjectRecorder>,
    calls: Vec<OpCall>,
    by_node: HashMap<NodeId, RecorderId>,
    calls_by_node: HashMap<NodeId, Vec<CallId>>,
}

impl StitchedGraph {
    #[inline]
    pub fn recorder(&self, id: RecorderId) -> &ObjectRecorder {
        self.ensure_recorder(id)
    }

    #[inline]
    pub fn call(&self, id: CallId) -> &OpCall {
        self.ensure_call(id)
    }

    /// Recorder of the value `node` evaluates to.
    pub fn result(&self, node: NodeId) -> Option<RecorderId> {
        self.by_node.get(&node).copied()
    }

    pub fn has_result(&self, node: NodeId) -> bool {
        self.by_node.contains_key(&node)
    }

    pub fn recorder_of(&self, node: NodeId) -> Option<&ObjectRecorder> {
        self.result(node).map(|id| self.recorder(id))
    }

    /// Calls consuming the value of `node`.
    pub fn consumers(&self, node: NodeId) -> impl Iterator<Item = &OpCall> {
        self.recorder_of(node)
            .into_iter()
            .flat_map(|rec| rec.calls.iter().map(|&call| self.call(call)))
    }

    pub fn calls(&self) -> &[OpCall] {
        &self.calls
    }

    /// Number of recorders, placeholders included.
    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }

    pub(crate) fn recorders_slice(&self) -> &[ObjectRecorder] {
        &self.recorders
    }

    pub(crate) fn calls_slice(&self) -> &[OpCall] {
        &self.calls
    }

    /// Follow a dotted path through literal dict shapes as far as they go.
    ///
    /// Returns the deepest recorder reached and the unresolved rest of the path.
    pub fn resolve_path<'p>(
        &self,
        start: RecorderId,
        path: &'p str,
    ) -> (RecorderId, Option<&'p str>) {
        let mut current = start;
        let mut rest = path;
        loop {
            let (key, tail) = match rest.split_once('.') {
                Some((key, tail)) => (key, Some(tail)),
                None => (rest, None),
            };
            let next = match &self.recorder(current).shape {
                Shape::Dict(entries) => entries.get(key).copied(),
                _ => None,
            };
            let Some(next) = next else {
                return (current, Some(rest));
            };
            current = next;
            match tail {
                Some(tail) => rest = tail,
                None => return (current, None),
            }
        }
    }

    fn new_recorder(&mut self, node: Option<NodeId>, shape: Shape) -> RecorderId {
        let id = RecorderId(self.recorders.len() as u32);
        self.recorders.push(ObjectRecorder {
            node,
            shape,
            ..ObjectRecorder::default()
        });
        id
    }

    fn recorder_mut(&mut self, id: RecorderId) -> &mut ObjectRecorder {
        self.ensure_recorder(id);
        &mut self.recorders[id.index()]
    }

    /// Own output recorder of `node`, created on first use.
    fn output_recorder(&mut self, node: NodeId) -> RecorderId {
        match self.result(node) {
            Some(existing) if self.recorder(existing).node == Some(node) => existing,
            _ => self.new_recorder(Some(node), Shape::Opaque),
        }
    }

    /// Record a call, attaching it to every input. Identical calls are recorded once.
    fn add_call(
        &mut self,
        node: NodeId,
        inputs: IndexMap<String, RecorderId>,
        output: RecorderId,
    ) -> CallId {
        let existing = self.calls_by_node.get(&node).and_then(|ids| {
            ids.iter().copied().find(|&id| {
                let call = self.call(id);
                call.output == output && call.inputs == inputs
            })
        });
        if let Some(id) = existing {
            return id;
        }

        let id = CallId(self.calls.len() as u32);
        for &input in inputs.values() {
            let calls = &mut self.recorder_mut(input).calls;
            if !calls.contains(&id) {
                calls.push(id);
            }
        }
        self.calls.push(OpCall {
            node,
            inputs,
            output,
        });
        self.calls_by_node.entry(node).or_default().push(id);
        id
    }

    /// Copy `from`'s tags onto `to`, keeping tags `to` already has.
    fn inherit_tags(&mut self, from: RecorderId, to: RecorderId) {
        let tags = self.recorder(from).tags.clone();
        let target = &mut self.recorder_mut(to).tags;
        for (name, value) in tags {
            target.entry(name).or_insert(value);
        }
    }

    fn set_tag(&mut self, on: RecorderId, name: &str, value: RecorderId) {
        self.recorder_mut(on).tags.insert(name.to_string(), value);
    }

    fn is_empty_list(&self, id: RecorderId) -> bool {
        matches!(&self.recorder(id).shape, Shape::List(items) if items.is_empty())
    }
}

/// Stitch everything reachable from `leaves`.
pub fn stitch(
    graph: &Graph,
    registry: &Registry,
    leaves: &[NodeId],
    config: &Config,
) -> Result<StitchedGraph> {
    let mut stitcher = Stitcher {
        graph,
        registry,
        recursion_limit: config.recursion_limit,
        sg: StitchedGraph::default(),
    };
    let mut frame = Frame::default();
    stitcher.stitch_all(leaves, &mut frame, 0)?;
    Ok(stitcher.sg)
}

#[derive(Clone, Copy, Debug)]
struct Visit {
    recorder: RecorderId,
    /// Depends on a variable bound in the current frame.
    bound: bool,
}

/// One traversal: the top level or a single stitch of a lambda body.
#[derive(Default)]
struct Frame {
    vars: HashMap<String, RecorderId>,
    visits: HashMap<NodeId, Visit>,
}

impl Frame {
    fn recorder(&self, node: NodeId) -> RecorderId {
        self.visits[&node].recorder
    }
}

struct Stitcher<'a> {
    graph: &'a Graph,
    registry: &'a Registry,
    recursion_limit: usize,
    sg: StitchedGraph,
}

impl<'a> Stitcher<'a> {
    fn stitch_all(&mut self, roots: &[NodeId], frame: &mut Frame, depth: usize) -> Result<()> {
        for id in self.graph.walk(roots, Descend::Inputs) {
            if frame.visits.contains_key(&id) {
                continue;
            }
            let visit = self.visit(id, frame, depth)?;
            frame.visits.insert(id, visit);
        }
        Ok(())
    }

    fn visit(&mut self, id: NodeId, frame: &Frame, depth: usize) -> Result<Visit> {
        let graph = self.graph;
        match graph.get(id) {
            Node::Var { name, .. } => {
                if let Some(&recorder) = frame.vars.get(name) {
                    return Ok(Visit {
                        recorder,
                        bound: true,
                    });
                }
                // Unbound: the graph is partially evaluated.
                Ok(Visit {
                    recorder: self.memoized(id, Shape::Opaque),
                    bound: false,
                })
            }
            Node::Const { value, .. } => Ok(Visit {
                recorder: self.memoized(id, Shape::Literal(value.clone())),
                bound: false,
            }),
            Node::Output { op, inputs, .. } => {
                let bound = self.depends_on_bound_var(inputs, frame);
                if !bound && let Some(recorder) = self.sg.result(id) {
                    return Ok(Visit { recorder, bound });
                }
                let recorder = self.stitch_output(id, *op, inputs, frame, depth)?;
                self.sg.by_node.insert(id, recorder);
                Ok(Visit { recorder, bound })
            }
        }
    }

    fn memoized(&mut self, id: NodeId, shape: Shape) -> RecorderId {
        if let Some(recorder) = self.sg.result(id) {
            return recorder;
        }
        let recorder = self.sg.new_recorder(Some(id), shape);
        self.sg.by_node.insert(id, recorder);
        recorder
    }

    fn depends_on_bound_var(&self, inputs: &IndexMap<String, NodeId>, frame: &Frame) -> bool {
        if frame.vars.is_empty() {
            return false;
        }
        inputs.values().any(|&input| {
            if frame.visits[&input].bound {
                return true;
            }
            // Nested lambdas may close over the current frame's variables.
            let Some(body) = self.graph.get(input).function_body() else {
                return false;
            };
            self.graph
                .any_reachable(&[body], Descend::Functions, |_, node| {
                    matches!(node, Node::Var { name, .. } if frame.vars.contains_key(name))
                })
        })
    }

    fn stitch_output(
        &mut self,
        id: NodeId,
        op: OpId,
        inputs: &IndexMap<String, NodeId>,
        frame: &Frame,
        depth: usize,
    ) -> Result<RecorderId> {
        let registry = self.registry;
        let graph = self.graph;
        let input_recs: IndexMap<String, RecorderId> = inputs
            .iter()
            .map(|(name, &input)| (name.clone(), frame.recorder(input)))
            .collect();
        let first = input_recs.get_index(0).map(|(_, &rec)| rec);
        let form = registry.form(op);

        trace!(node = %id, op = registry.op_name(op), ?form, "stitch");

        match form {
            OpForm::TagGetter { tag } => {
                let found = first.and_then(|rec| self.sg.recorder(rec).tags.get(tag).copied());
                Ok(found.unwrap_or_else(|| self.sg.new_recorder(None, Shape::Opaque)))
            }
            OpForm::IndexCheckpoint => {
                let Some(first) = first else {
                    return Ok(self.default_call(id, op, input_recs));
                };
                if !self.sg.recorder(first).tags.contains_key(TAG_INDEX_CHECKPOINT) {
                    let checkpoint = self.sg.new_recorder(None, Shape::Opaque);
                    self.sg.set_tag(first, TAG_INDEX_CHECKPOINT, checkpoint);
                }
                Ok(first)
            }
            OpForm::Dict => Ok(self.sg.new_recorder(Some(id), Shape::Dict(input_recs))),
            OpForm::Pick => {
                let key = inputs
                    .get_index(1)
                    .and_then(|(_, &key)| graph.get(key).const_value())
                    .and_then(ConstValue::as_str);
                let mut input_recs = input_recs;
                if let (Some(obj), Some(key)) = (first, key) {
                    let (found, rest) = self.sg.resolve_path(obj, key);
                    let Some(rest) = rest else {
                        return Ok(found);
                    };
                    // The rest of the path is picked from the deepest literal entry.
                    if found != obj {
                        let rest = self
                            .sg
                            .new_recorder(None, Shape::Literal(ConstValue::Literal(rest.into())));
                        if let Some((_, obj)) = input_recs.get_index_mut(0) {
                            *obj = found;
                        }
                        if let Some((_, key)) = input_recs.get_index_mut(1) {
                            *key = rest;
                        }
                    }
                }
                Ok(self.default_call(id, op, input_recs))
            }
            OpForm::List => {
                let elements: Vec<RecorderId> = input_recs.values().copied().collect();
                let list = self.sg.output_recorder(id);
                self.sg.recorder_mut(list).shape = Shape::List(elements.clone());
                for &element in &elements {
                    self.sg.inherit_tags(element, list);
                }
                if !elements.is_empty() {
                    self.sg.add_call(id, input_recs, list);
                }
                Ok(list)
            }
            OpForm::Map | OpForm::MapEach => {
                let (arr, func) = self.collection_and_function(id, op, inputs, first)?;
                match self.stitch_row_body(func, arr, frame, depth)? {
                    Some(result) => Ok(result),
                    None => Ok(self.sg.new_recorder(None, Shape::Opaque)),
                }
            }
            OpForm::Filter | OpForm::Sort => {
                let (arr, func) = self.collection_and_function(id, op, inputs, first)?;
                self.stitch_row_body(func, arr, frame, depth)?;
                Ok(arr)
            }
            OpForm::GroupBy | OpForm::JoinAll => {
                let (arr, func) = self.collection_and_function(id, op, inputs, first)?;
                let tag = if *form == OpForm::GroupBy {
                    TAG_GROUP_KEY
                } else {
                    TAG_JOIN_OBJ
                };
                if let Some(key) = self.stitch_row_body(func, arr, frame, depth)? {
                    self.sg.set_tag(arr, tag, key);
                }
                Ok(arr)
            }
            OpForm::Join => self.stitch_join(id, op, inputs, &input_recs, frame, depth),
            OpForm::Execute => {
                let func = self.function_input(id, op, inputs, 0)?;
                self.stitch_body(func, HashMap::new(), depth)
            }
            OpForm::Generic | OpForm::Passthrough => Ok(self.default_call(id, op, input_recs)),
        }
    }

    /// Record an ordinary call and apply the operation's tag flow.
    fn default_call(
        &mut self,
        id: NodeId,
        op: OpId,
        input_recs: IndexMap<String, RecorderId>,
    ) -> RecorderId {
        let output = self.sg.output_recorder(id);
        let first = input_recs
            .get_index(0)
            .map(|(param, &rec)| (param.clone(), rec));
        self.sg.add_call(id, input_recs, output);

        let Some((param, first)) = first else {
            return output;
        };
        match self.registry.tag_flow(op) {
            TagFlow::None => {}
            TagFlow::Flows => self.sg.inherit_tags(first, output),
            TagFlow::TagsOutputs => {
                self.sg.inherit_tags(first, output);
                self.sg.set_tag(output, &param, first);
            }
        }
        output
    }

    fn stitch_join(
        &mut self,
        id: NodeId,
        op: OpId,
        inputs: &IndexMap<String, NodeId>,
        input_recs: &IndexMap<String, RecorderId>,
        frame: &Frame,
        depth: usize,
    ) -> Result<RecorderId> {
        let side = |index: usize| {
            input_recs
                .get_index(index)
                .map(|(_, &rec)| rec)
                .ok_or_else(|| self.missing_input(op, index))
        };
        let (left, right) = (side(0)?, side(1)?);
        let left_fn = self.function_input(id, op, inputs, 2)?;
        let right_fn = self.function_input(id, op, inputs, 3)?;
        let left_alias = self.const_str_input(id, op, inputs, 4)?;
        let right_alias = self.const_str_input(id, op, inputs, 5)?;

        let left_key = self.stitch_row_body(left_fn, left, frame, depth)?;
        self.stitch_row_body(right_fn, right, frame, depth)?;

        let entries = IndexMap::from([(left_alias, left), (right_alias, right)]);
        let joined = self.sg.new_recorder(Some(id), Shape::Dict(entries));
        if let Some(key) = left_key {
            self.sg.set_tag(joined, TAG_JOIN_OBJ, key);
        }
        Ok(joined)
    }

    fn collection_and_function(
        &self,
        id: NodeId,
        op: OpId,
        inputs: &IndexMap<String, NodeId>,
        first: Option<RecorderId>,
    ) -> Result<(RecorderId, NodeId)> {
        let arr = first.ok_or_else(|| self.missing_input(op, 0))?;
        let func = self.function_input(id, op, inputs, 1)?;
        Ok((arr, func))
    }

    /// Stitch a lambda body with `row` bound to `arr`. Skipped for empty literal lists.
    fn stitch_row_body(
        &mut self,
        func: NodeId,
        arr: RecorderId,
        frame: &Frame,
        depth: usize,
    ) -> Result<Option<RecorderId>> {
        if self.sg.is_empty_list(arr) {
            return Ok(None);
        }
        let mut vars = frame.vars.clone();
        vars.insert(ROW.to_string(), arr);
        self.stitch_body(func, vars, depth).map(Some)
    }

    fn stitch_body(
        &mut self,
        func: NodeId,
        vars: HashMap<String, RecorderId>,
        depth: usize,
    ) -> Result<RecorderId> {
        if depth >= self.recursion_limit {
            return Err(CompileError::RecursionLimitExceeded {
                limit: self.recursion_limit,
            });
        }
        // Callers only pass nodes checked by `function_input`.
        let Some(body) = self.graph.get(func).function_body() else {
            return Ok(self.sg.new_recorder(None, Shape::Opaque));
        };
        let mut frame = Frame {
            vars,
            visits: HashMap::new(),
        };
        self.stitch_all(&[body], &mut frame, depth + 1)?;
        Ok(frame.recorder(body))
    }

    /// The function literal at input position `index`.
    fn function_input(
        &self,
        id: NodeId,
        op: OpId,
        inputs: &IndexMap<String, NodeId>,
        index: usize,
    ) -> Result<NodeId> {
        let (_, &func) = inputs
            .get_index(index)
            .ok_or_else(|| self.missing_input(op, index))?;
        if self.graph.get(func).function_body().is_none() {
            return Err(CompileError::NotYetSupported {
                node: id,
                op: self.registry.op_name(op).to_string(),
                reason: "a non-constant function argument",
            });
        }
        Ok(func)
    }

    fn const_str_input(
        &self,
        id: NodeId,
        op: OpId,
        inputs: &IndexMap<String, NodeId>,
        index: usize,
    ) -> Result<String> {
        let (name, &input) = inputs
            .get_index(index)
            .ok_or_else(|| self.missing_input(op, index))?;
        self.graph
            .get(input)
            .const_value()
            .and_then(ConstValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| CompileError::NonConstantInput {
                node: id,
                op: self.registry.op_name(op).to_string(),
                input: name.clone(),
            })
    }

    fn missing_input(&self, op: OpId, index: usize) -> CompileError {
        let operation = self.registry.get(op);
        CompileError::MissingInput {
            op: operation.name.clone(),
            input: operation
                .inputs
                .get_index(index)
                .map_or_else(|| format!("#{index}"), |(name, _)| name.clone()),
        }
    }
}
