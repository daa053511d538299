//! Fixture registry and graph-building helpers.
//!
//! The fixture models a small backend: projects own runs, runs carry names
//! and summary metrics. `root`/`field1` model a minimal two-step root chain.

use stitchql_core::{Graph, NodeId, Type, TypeMap};

use crate::{
    Compiler, Config, GqlPlugin, OpForm, Operation, OutputType, Registry, Result, TagFlow,
    select_key,
};

/// Backend field types by class.
fn schema(class: &str, field: &str) -> Option<Type> {
    match (class, field) {
        ("project", "id" | "name") | ("run", "id" | "name") | ("field1", "x") => {
            Some(Type::String)
        }
        ("project", "runs") => Some(Type::list(Type::object("run"))),
        ("run", "summaryMetrics") => Some(Type::Any),
        _ => None,
    }
}

/// Key type of a `class` object given the shape of its fetched selection.
pub fn domain_keys(class: &str, selection: &Type) -> Type {
    let Type::TypedDict { fields } = selection else {
        return Type::object(class);
    };
    let keys: TypeMap = fields
        .iter()
        .map(|(name, sub)| {
            let ty = match schema(class, name) {
                Some(Type::List { element }) => match element.class() {
                    Some(inner) => Type::list(domain_keys(inner, sub)),
                    None => Type::List { element },
                },
                Some(Type::Object { class: inner }) => domain_keys(&inner, sub),
                Some(ty) => ty,
                None => Type::Any,
            };
            (name.clone(), ty)
        })
        .collect();
    Type::HasKeys {
        class: class.to_string(),
        keys,
    }
}

/// `head { fixed inner }`, without a dangling space when `inner` is empty.
fn nest(head: &str, fixed: &str, inner: &str) -> String {
    if inner.is_empty() {
        format!("{head} {{ {fixed} }}")
    } else {
        format!("{head} {{ {fixed} {inner} }}")
    }
}

fn arg_type(inputs: &crate::registry::InputTypes, name: &str) -> Type {
    match inputs.get(name) {
        Some(Type::Const { inner, .. }) => (**inner).clone(),
        Some(ty) => ty.clone(),
        None => Type::Any,
    }
}

fn same_as(name: &'static str) -> OutputType {
    OutputType::computed(move |inputs| arg_type(inputs, name))
}

fn function_output(name: &'static str) -> impl Fn(&crate::registry::InputTypes) -> Type {
    move |inputs| match inputs.get(name) {
        Some(Type::Function { output, .. }) => (**output).clone(),
        _ => Type::Any,
    }
}

fn tag_output(inputs: &crate::registry::InputTypes) -> Type {
    let obj = arg_type(inputs, "obj");
    obj.tag("project")
        .or_else(|| obj.element().and_then(|e| e.tag("project")))
        .cloned()
        .unwrap_or_else(|| Type::object("project"))
}

pub fn registry() -> Registry {
    let mut b = Registry::builder();
    let run = Type::object("run");
    let project = Type::object("project");

    b.register(
        Operation::new(
            "project",
            [("entityName", Type::String), ("projectName", Type::String)],
            OutputType::Fixed(project.clone()),
        )
        .plugin(
            GqlPlugin::new(|inputs, inner| {
                let head = format!(
                    "project(entityName: {}, name: {})",
                    inputs.argument("entityName"),
                    inputs.argument("projectName")
                );
                nest(&head, "id", inner)
            })
            .root()
            .key_propagation(|selection| domain_keys("project", selection)),
        ),
    );
    b.register(
        Operation::new(
            "project-name",
            [("project", project.clone())],
            OutputType::Fixed(Type::String),
        )
        .tag_flow(TagFlow::Flows)
        .plugin(GqlPlugin::new(|_, _| "name".to_string()).key_propagation(select_key("name"))),
    );
    b.register(
        Operation::new(
            "project-runs",
            [("project", project.clone())],
            OutputType::Fixed(Type::list(run.clone())),
        )
        .tag_flow(TagFlow::TagsOutputs)
        .plugin(
            GqlPlugin::new(|_, inner| nest("runs", "id", inner))
                .key_propagation(select_key("runs")),
        ),
    );
    b.register(
        Operation::new("run-name", [("run", run.clone())], OutputType::Fixed(Type::String))
            .tag_flow(TagFlow::Flows)
            .plugin(GqlPlugin::new(|_, _| "name".to_string()).key_propagation(select_key("name"))),
    );
    b.register(
        Operation::new(
            "mapped_run-name",
            [("run", Type::list(run.clone()))],
            OutputType::Fixed(Type::list(Type::String)),
        )
        .derived_from("run-name"),
    );
    b.register(
        Operation::new(
            "run-summary",
            [("run", run.clone()), ("key", Type::String)],
            OutputType::Fixed(Type::Any),
        )
        .tag_flow(TagFlow::Flows)
        .plugin(
            GqlPlugin::new(|inputs, _| {
                format!("summaryMetrics(keys: [{}])", inputs.argument("key"))
            })
            .key_propagation(select_key("summaryMetrics")),
        ),
    );
    b.register(
        Operation::new("project-tag", [("obj", Type::Any)], OutputType::computed(tag_output))
            .form(OpForm::TagGetter {
                tag: "project".to_string(),
            }),
    );
    b.register(
        Operation::new(
            "mapped_project-tag",
            [("obj", Type::list(Type::Any))],
            OutputType::computed(tag_output),
        )
        .derived_from("project-tag"),
    );
    b.register(
        Operation::new(
            "pick",
            [("obj", Type::Any), ("key", Type::String)],
            OutputType::computed(|inputs| {
                let key = match inputs.get("key") {
                    Some(Type::Const { value, .. }) => value.as_str(),
                    _ => None,
                };
                let obj = arg_type(inputs, "obj");
                key.and_then(|key| obj.key(key).cloned())
                    .unwrap_or(Type::Any)
            }),
        )
        .form(OpForm::Pick),
    );
    b.register(
        Operation::new(
            "dict",
            [] as [(&str, Type); 0],
            OutputType::computed(|inputs| {
                Type::typed_dict(inputs.keys().map(|name| (name.clone(), arg_type(inputs, name))))
            }),
        )
        .form(OpForm::Dict),
    );
    b.register(
        Operation::new(
            "list",
            [] as [(&str, Type); 0],
            OutputType::computed(|inputs| {
                Type::list(Type::union(
                    inputs.keys().map(|name| arg_type(inputs, name).untagged().clone()),
                ))
            }),
        )
        .form(OpForm::List),
    );
    b.register(
        Operation::new(
            "map",
            [("arr", Type::list(Type::Any)), ("mapFn", Type::Any)],
            OutputType::computed(|inputs| Type::list(function_output("mapFn")(inputs))),
        )
        .form(OpForm::Map),
    );
    b.register(
        Operation::new(
            "filter",
            [("arr", Type::list(Type::Any)), ("filterFn", Type::Any)],
            same_as("arr"),
        )
        .form(OpForm::Filter),
    );
    b.register(
        Operation::new(
            "sort",
            [("arr", Type::list(Type::Any)), ("compFn", Type::Any)],
            same_as("arr"),
        )
        .form(OpForm::Sort),
    );
    b.register(
        Operation::new(
            "groupby",
            [("arr", Type::list(Type::Any)), ("groupByFn", Type::Any)],
            same_as("arr"),
        )
        .form(OpForm::GroupBy),
    );
    b.register(
        Operation::new(
            "joinAll",
            [("arrs", Type::list(Type::Any)), ("joinFn", Type::Any)],
            OutputType::Fixed(Type::list(Type::Any)),
        )
        .form(OpForm::JoinAll),
    );
    b.register(
        Operation::new(
            "join",
            [
                ("arr1", Type::list(Type::Any)),
                ("arr2", Type::list(Type::Any)),
                ("joinFn1", Type::Any),
                ("joinFn2", Type::Any),
                ("alias1", Type::String),
                ("alias2", Type::String),
            ],
            OutputType::Fixed(Type::list(Type::Any)),
        )
        .form(OpForm::Join),
    );
    b.register(
        Operation::new(
            "execute",
            [("fn", Type::Any)],
            OutputType::computed(function_output("fn")),
        )
        .form(OpForm::Execute),
    );
    b.register(
        Operation::new(
            "limit",
            [("arr", Type::list(Type::Any)), ("limit", Type::Int)],
            same_as("arr"),
        )
        .tag_flow(TagFlow::Flows)
        .form(OpForm::Passthrough),
    );
    b.register(
        Operation::new(
            "index-checkpoint",
            [("arr", Type::list(Type::Any))],
            same_as("arr"),
        )
        .form(OpForm::IndexCheckpoint),
    );
    b.register(Operation::new(
        "count",
        [("arr", Type::list(Type::Any))],
        OutputType::Fixed(Type::Int),
    ));
    b.register(Operation::new(
        "root",
        [("name", Type::String)],
        OutputType::Fixed(Type::object("A")),
    ));
    b.register(
        Operation::new(
            "field1",
            [("obj", Type::object("A"))],
            OutputType::Fixed(Type::object("field1")),
        )
        .plugin(
            GqlPlugin::new(|_, _| "field1 { x }".to_string())
                .root()
                .key_propagation(|selection| domain_keys("field1", selection)),
        ),
    );
    b.register(
        Operation::new("viewer", [] as [(&str, Type); 0], OutputType::Fixed(Type::object("user")))
            .plugin(
                GqlPlugin::new(|_, inner| nest("viewer", "id", inner))
                    .root()
                    .root_resolver("viewer-resolve"),
            ),
    );
    b.register(Operation::new(
        "viewer-resolve",
        [("gqlResult", Type::Any), ("alias", Type::String)],
        OutputType::Fixed(Type::object("user")),
    ));

    match b.build() {
        Ok(registry) => registry,
        Err(err) => panic!("fixture registry is invalid: {err}"),
    }
}

/// A graph under construction against the fixture registry.
pub struct Fixture {
    pub graph: Graph,
    pub registry: Registry,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_registry(registry())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            graph: Graph::new(),
            registry,
        }
    }

    pub fn call(&mut self, name: &str, inputs: &[(&str, NodeId)]) -> NodeId {
        self.registry
            .call(&mut self.graph, name, inputs.iter().copied())
            .unwrap()
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        self.graph.string(value)
    }

    pub fn project(&mut self, entity: &str, name: &str) -> NodeId {
        let entity = self.string(entity);
        let name = self.string(name);
        self.call("project", &[("entityName", entity), ("projectName", name)])
    }

    pub fn runs(&mut self, project: NodeId) -> NodeId {
        self.call("project-runs", &[("project", project)])
    }

    /// Function literal `row => body(row)` with `row: param`.
    pub fn lambda(&mut self, param: Type, body: impl FnOnce(&mut Self, NodeId) -> NodeId) -> NodeId {
        let row = self.graph.var(param.clone(), "row");
        let body = body(self, row);
        let output = self.graph.ty(body).clone();
        self.graph
            .function(Type::function([("row", param)], output), body)
    }

    pub fn map(&mut self, arr: NodeId, func: NodeId) -> NodeId {
        self.call("map", &[("arr", arr), ("mapFn", func)])
    }

    pub fn compile(&mut self, leaves: &[NodeId]) -> Result<Vec<NodeId>> {
        self.compile_with(Config::default(), leaves)
    }

    pub fn compile_with(&mut self, config: Config, leaves: &[NodeId]) -> Result<Vec<NodeId>> {
        Compiler::new(&self.registry)
            .config(config)
            .compile(&mut self.graph, leaves)
    }

    pub fn dump(&self, roots: &[NodeId]) -> String {
        self.graph.dump(roots, &self.registry)
    }

    pub fn op_name(&self, node: NodeId) -> &str {
        match self.graph.get(node).op() {
            Some(op) => &self.registry.get(op).name,
            None => "",
        }
    }
}
