//! Graph compiler — validates a workflow definition and produces the
//! dispatch structure the executor runs.
//!
//! Compilation is pure: the same definition always yields a structurally
//! equal [`CompiledWorkflow`]. Condition functions are resolved by name
//! against the process-scoped registry at compile time; the compiled form
//! itself stays data-only.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use weft_domain::workflow::{
    ConditionalEdge, NodeSpec, ParamSpec, WorkflowDefinition, TERMINAL,
};
use weft_domain::{Error, Result};

use crate::conditions::ConditionRegistry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Compiled form
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outgoing transition for one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// No outgoing edge: natural completion.
    Terminal,
    Unconditional(String),
    Conditional {
        condition: String,
        /// branch label → destination (node name or [`TERMINAL`]).
        branches: BTreeMap<String, String>,
        /// Destination when the label is not in `branches` and the node is
        /// not a router: the node's unconditional edge, else [`TERMINAL`].
        fallback: String,
    },
}

/// The validated, indexed form of a workflow definition. Immutable after
/// compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledWorkflow {
    pub name: String,
    pub version: String,
    pub entry_point: String,
    pub nodes: BTreeMap<String, NodeSpec>,
    pub transitions: BTreeMap<String, Transition>,
    pub parameter_schema: BTreeMap<String, ParamSpec>,
}

impl CompiledWorkflow {
    pub fn transition(&self, node: &str) -> &Transition {
        self.transitions.get(node).unwrap_or(&Transition::Terminal)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Compilation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn compile(
    definition: &WorkflowDefinition,
    conditions: &ConditionRegistry,
) -> Result<CompiledWorkflow> {
    check_structure(definition)?;
    check_parameter_schema(&definition.parameter_schema)?;

    let conditional = index_conditional_edges(definition, conditions)?;
    let transitions = build_transitions(definition, &conditional)?;

    check_reachability(definition, &transitions)?;
    check_cycles(definition, &transitions)?;

    Ok(CompiledWorkflow {
        name: definition.name.clone(),
        version: definition.version.clone(),
        entry_point: definition.entry_point.clone(),
        nodes: definition.nodes.clone(),
        transitions,
        parameter_schema: definition.parameter_schema.clone(),
    })
}

// ── structural validation ───────────────────────────────────────────

fn check_structure(definition: &WorkflowDefinition) -> Result<()> {
    let nodes = &definition.nodes;

    if !nodes.contains_key(&definition.entry_point) {
        return Err(Error::UnknownNode(definition.entry_point.clone()));
    }

    for (from, to) in &definition.edges {
        if !nodes.contains_key(from) {
            return Err(Error::UnknownNode(from.clone()));
        }
        if to != TERMINAL && !nodes.contains_key(to) {
            return Err(Error::UnknownNode(to.clone()));
        }
    }

    for edge in &definition.conditional_edges {
        if !nodes.contains_key(&edge.from) {
            return Err(Error::UnknownNode(edge.from.clone()));
        }
        for to in edge.branches.values() {
            if to != TERMINAL && !nodes.contains_key(to) {
                return Err(Error::UnknownNode(to.clone()));
            }
        }
    }

    for (name, spec) in nodes {
        if let NodeSpec::Composite { children } = spec {
            for child in children {
                match nodes.get(child) {
                    None => return Err(Error::UnknownNode(child.clone())),
                    Some(NodeSpec::ToolCall { .. }) => {}
                    Some(other) => {
                        return Err(Error::Validation(format!(
                            "composite `{name}`: child `{child}` must be a tool_call node, \
                             not {}",
                            other.kind_name()
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

fn check_parameter_schema(schema: &BTreeMap<String, ParamSpec>) -> Result<()> {
    for (name, spec) in schema {
        if spec.required && spec.default.is_some() {
            return Err(Error::InvalidParameterSchema(format!(
                "parameter `{name}` is required and may not carry a default"
            )));
        }
        if let Some(default) = &spec.default {
            if !spec.param_type.matches(default) {
                return Err(Error::InvalidParameterSchema(format!(
                    "parameter `{name}`: default does not match declared type {}",
                    spec.param_type
                )));
            }
        }
    }
    Ok(())
}

// ── conditional-edge indexing ───────────────────────────────────────

fn index_conditional_edges<'a>(
    definition: &'a WorkflowDefinition,
    conditions: &ConditionRegistry,
) -> Result<HashMap<&'a str, &'a ConditionalEdge>> {
    let mut by_from: HashMap<&str, &ConditionalEdge> = HashMap::new();

    for edge in &definition.conditional_edges {
        if !conditions.contains(&edge.condition) {
            return Err(Error::UnknownCondition(edge.condition.clone()));
        }
        if by_from.insert(edge.from.as_str(), edge).is_some() {
            return Err(Error::AmbiguousTransition(edge.from.clone()));
        }
    }

    // Routers must have a branch map, and it must agree on the condition.
    for (name, spec) in &definition.nodes {
        if let NodeSpec::ConditionalRouter { condition } = spec {
            if !conditions.contains(condition) {
                return Err(Error::UnknownCondition(condition.clone()));
            }
            match by_from.get(name.as_str()) {
                None => {
                    return Err(Error::Validation(format!(
                        "conditional_router `{name}` has no conditional edges"
                    )));
                }
                Some(edge) if edge.condition != *condition => {
                    return Err(Error::Validation(format!(
                        "conditional_router `{name}` is bound to `{condition}` but its \
                         edges name `{}`",
                        edge.condition
                    )));
                }
                Some(_) => {}
            }
        }
    }

    Ok(by_from)
}

// ── adjacency ───────────────────────────────────────────────────────

fn build_transitions(
    definition: &WorkflowDefinition,
    conditional: &HashMap<&str, &ConditionalEdge>,
) -> Result<BTreeMap<String, Transition>> {
    let mut unconditional: HashMap<&str, &str> = HashMap::new();
    for (from, to) in &definition.edges {
        if unconditional.insert(from.as_str(), to.as_str()).is_some() {
            return Err(Error::AmbiguousTransition(from.clone()));
        }
    }

    let mut transitions = BTreeMap::new();
    for (name, spec) in &definition.nodes {
        let is_router = matches!(spec, NodeSpec::ConditionalRouter { .. });
        let transition = match (conditional.get(name.as_str()), unconditional.get(name.as_str())) {
            // A router routes solely through its branch map; a competing
            // unconditional edge would never fire.
            (Some(_), Some(_)) if is_router => {
                return Err(Error::AmbiguousTransition(name.clone()));
            }
            (Some(edge), fallback) => Transition::Conditional {
                condition: edge.condition.clone(),
                branches: edge.branches.clone(),
                fallback: fallback.copied().unwrap_or(TERMINAL).to_owned(),
            },
            (None, Some(&to)) => Transition::Unconditional(to.to_owned()),
            (None, None) => Transition::Terminal,
        };
        transitions.insert(name.clone(), transition);
    }
    Ok(transitions)
}

/// Runtime-reachable successors of a node. The conditional fallback only
/// fires for non-router nodes; a router answers with a branch label or
/// fails validation.
fn successors<'a>(transition: &'a Transition, is_router: bool, out: &mut Vec<&'a str>) {
    match transition {
        Transition::Terminal => {}
        Transition::Unconditional(to) => out.push(to),
        Transition::Conditional { branches, fallback, .. } => {
            out.extend(branches.values().map(String::as_str));
            if !is_router {
                out.push(fallback);
            }
        }
    }
    out.retain(|t| *t != TERMINAL);
}

fn is_router_node(definition: &WorkflowDefinition, name: &str) -> bool {
    matches!(
        definition.nodes.get(name),
        Some(NodeSpec::ConditionalRouter { .. })
    )
}

// ── reachability ────────────────────────────────────────────────────

fn check_reachability(
    definition: &WorkflowDefinition,
    transitions: &BTreeMap<String, Transition>,
) -> Result<()> {
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(&definition.entry_point);
    visited.insert(&definition.entry_point);

    while let Some(node) = queue.pop_front() {
        let mut next: Vec<&str> = Vec::new();
        if let Some(transition) = transitions.get(node) {
            successors(transition, is_router_node(definition, node), &mut next);
        }
        // Composite children are reachable through their parent.
        if let Some(NodeSpec::Composite { children }) = definition.nodes.get(node) {
            next.extend(children.iter().map(String::as_str));
        }
        for succ in next {
            if visited.insert(succ) {
                queue.push_back(succ);
            }
        }
    }

    let unreachable: Vec<&str> = definition
        .nodes
        .keys()
        .map(String::as_str)
        .filter(|n| !visited.contains(n))
        .collect();

    if unreachable.is_empty() {
        Ok(())
    } else {
        Err(Error::UnreachableNodes(unreachable.join(", ")))
    }
}

// ── cycle analysis ──────────────────────────────────────────────────

/// Reject cycles unless some node on the cycle routes conditionally with
/// at least one branch leaving the cycle.
fn check_cycles(
    definition: &WorkflowDefinition,
    transitions: &BTreeMap<String, Transition>,
) -> Result<()> {
    let sccs = strongly_connected_components(definition, transitions);

    for scc in sccs {
        let is_cycle = scc.len() > 1 || {
            let node = scc[0];
            let mut next = Vec::new();
            if let Some(t) = transitions.get(node) {
                successors(t, is_router_node(definition, node), &mut next);
            }
            next.contains(&node)
        };
        if !is_cycle {
            continue;
        }

        let members: BTreeSet<&str> = scc.iter().copied().collect();
        let has_exit = scc.iter().any(|node| {
            match transitions.get(*node) {
                Some(Transition::Conditional { branches, fallback, .. }) => {
                    let fallback_exits = !is_router_node(definition, node)
                        && (fallback == TERMINAL || !members.contains(fallback.as_str()));
                    fallback_exits
                        || branches
                            .values()
                            .any(|to| to == TERMINAL || !members.contains(to.as_str()))
                }
                _ => false,
            }
        });

        if !has_exit {
            let mut names: Vec<&str> = scc.clone();
            names.sort_unstable();
            return Err(Error::InfiniteLoop(names.join(" -> ")));
        }
    }

    Ok(())
}

/// Tarjan's algorithm over the transition graph.
fn strongly_connected_components<'a>(
    definition: &'a WorkflowDefinition,
    transitions: &'a BTreeMap<String, Transition>,
) -> Vec<Vec<&'a str>> {
    struct Tarjan<'a> {
        transitions: &'a BTreeMap<String, Transition>,
        routers: BTreeSet<&'a str>,
        index: HashMap<&'a str, usize>,
        lowlink: HashMap<&'a str, usize>,
        on_stack: BTreeSet<&'a str>,
        stack: Vec<&'a str>,
        counter: usize,
        sccs: Vec<Vec<&'a str>>,
    }

    impl<'a> Tarjan<'a> {
        fn visit(&mut self, node: &'a str) {
            self.index.insert(node, self.counter);
            self.lowlink.insert(node, self.counter);
            self.counter += 1;
            self.stack.push(node);
            self.on_stack.insert(node);

            let mut next = Vec::new();
            if let Some(t) = self.transitions.get(node) {
                successors(t, self.routers.contains(node), &mut next);
            }
            for succ in next {
                if !self.index.contains_key(succ) {
                    self.visit(succ);
                    let low = self.lowlink[succ].min(self.lowlink[node]);
                    self.lowlink.insert(node, low);
                } else if self.on_stack.contains(succ) {
                    let low = self.index[succ].min(self.lowlink[node]);
                    self.lowlink.insert(node, low);
                }
            }

            if self.lowlink[node] == self.index[node] {
                let mut scc = Vec::new();
                while let Some(top) = self.stack.pop() {
                    self.on_stack.remove(top);
                    scc.push(top);
                    if top == node {
                        break;
                    }
                }
                self.sccs.push(scc);
            }
        }
    }

    let routers: BTreeSet<&str> = definition
        .nodes
        .iter()
        .filter(|(_, spec)| matches!(spec, NodeSpec::ConditionalRouter { .. }))
        .map(|(name, _)| name.as_str())
        .collect();

    let mut tarjan = Tarjan {
        transitions,
        routers,
        index: HashMap::new(),
        lowlink: HashMap::new(),
        on_stack: BTreeSet::new(),
        stack: Vec::new(),
        counter: 0,
        sccs: Vec::new(),
    };

    for node in definition.nodes.keys() {
        if !tarjan.index.contains_key(node.as_str()) {
            tarjan.visit(node);
        }
    }
    tarjan.sccs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use weft_domain::workflow::{ParamType, ValueSource};

    fn tool_node(service: &str, tool: &str) -> NodeSpec {
        NodeSpec::ToolCall {
            service: service.into(),
            tool: tool.into(),
            input_mapping: BTreeMap::new(),
            output_mapping: None,
        }
    }

    fn chain(names: &[&str]) -> WorkflowDefinition {
        let nodes = names
            .iter()
            .map(|n| (n.to_string(), tool_node("svc", n)))
            .collect();
        let edges = names
            .windows(2)
            .map(|w| (w[0].to_string(), w[1].to_string()))
            .chain(std::iter::once((
                names.last().unwrap().to_string(),
                TERMINAL.to_string(),
            )))
            .collect();
        WorkflowDefinition {
            name: "test".into(),
            version: "1.0.0".into(),
            nodes,
            edges,
            conditional_edges: vec![],
            entry_point: names[0].to_string(),
            parameter_schema: BTreeMap::new(),
        }
    }

    fn conditions() -> ConditionRegistry {
        let registry = ConditionRegistry::with_builtins();
        registry.register("pick", |_| "left".into());
        registry
    }

    // ── happy path ──────────────────────────────────────────────────

    #[test]
    fn compiles_linear_chain() {
        let compiled = compile(&chain(&["a", "b", "c"]), &conditions()).unwrap();
        assert_eq!(compiled.entry_point, "a");
        assert_eq!(compiled.transition("a"), &Transition::Unconditional("b".into()));
        assert_eq!(compiled.transition("c"), &Transition::Unconditional(TERMINAL.into()));
    }

    #[test]
    fn compilation_is_pure() {
        let definition = chain(&["a", "b", "c"]);
        let first = compile(&definition, &conditions()).unwrap();
        let second = compile(&definition, &conditions()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn node_without_edges_is_terminal() {
        let mut definition = chain(&["a", "b"]);
        definition.edges.retain(|(_, to)| to != TERMINAL);
        let compiled = compile(&definition, &conditions()).unwrap();
        assert_eq!(compiled.transition("b"), &Transition::Terminal);
    }

    // ── structural errors ───────────────────────────────────────────

    #[test]
    fn missing_entry_point_is_unknown_node() {
        let mut definition = chain(&["a"]);
        definition.entry_point = "ghost".into();
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::UnknownNode(n) if n == "ghost"));
    }

    #[test]
    fn edge_to_missing_node_is_unknown_node() {
        let mut definition = chain(&["a"]);
        definition.edges.push(("a".into(), "ghost".into()));
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::UnknownNode(_)));
    }

    #[test]
    fn two_unconditional_edges_are_ambiguous() {
        let mut definition = chain(&["a", "b", "c"]);
        definition.edges.push(("a".into(), "c".into()));
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::AmbiguousTransition(n) if n == "a"));
    }

    #[test]
    fn duplicate_conditional_edges_are_ambiguous() {
        let mut definition = chain(&["a", "b"]);
        for _ in 0..2 {
            definition.conditional_edges.push(ConditionalEdge {
                from: "a".into(),
                condition: "pick".into(),
                branches: BTreeMap::from([("left".to_string(), "b".to_string())]),
            });
        }
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::AmbiguousTransition(_)));
    }

    #[test]
    fn unknown_condition_is_rejected() {
        let mut definition = chain(&["a", "b"]);
        definition.conditional_edges.push(ConditionalEdge {
            from: "a".into(),
            condition: "no_such_condition".into(),
            branches: BTreeMap::from([("x".to_string(), "b".to_string())]),
        });
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::UnknownCondition(_)));
    }

    #[test]
    fn unreachable_nodes_are_rejected() {
        let mut definition = chain(&["a", "b"]);
        definition.nodes.insert("island".into(), tool_node("svc", "island"));
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::UnreachableNodes(n) if n.contains("island")));
    }

    #[test]
    fn required_parameter_with_default_is_invalid() {
        let mut definition = chain(&["a"]);
        definition.parameter_schema.insert(
            "document_id".into(),
            ParamSpec {
                param_type: ParamType::String,
                required: true,
                default: Some(serde_json::json!("doc_1")),
            },
        );
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameterSchema(_)));
    }

    #[test]
    fn default_must_match_declared_type() {
        let mut definition = chain(&["a"]);
        definition.parameter_schema.insert(
            "limit".into(),
            ParamSpec {
                param_type: ParamType::Number,
                required: false,
                default: Some(serde_json::json!("three")),
            },
        );
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameterSchema(_)));
    }

    // ── cycles ──────────────────────────────────────────────────────

    #[test]
    fn pure_two_node_cycle_is_infinite_loop() {
        // Edges {(a,b),(b,a)} with no router on the cycle.
        let mut definition = chain(&["a", "b"]);
        definition.edges = vec![("a".into(), "b".into()), ("b".into(), "a".into())];
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::InfiniteLoop(_)));
    }

    #[test]
    fn self_loop_without_exit_is_infinite_loop() {
        let mut definition = chain(&["a"]);
        definition.edges = vec![("a".into(), "a".into())];
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::InfiniteLoop(_)));
    }

    #[test]
    fn cycle_with_conditional_exit_is_allowed() {
        let mut definition = chain(&["work", "router"]);
        definition.edges = vec![("work".into(), "router".into())];
        definition
            .nodes
            .insert("router".into(), NodeSpec::ConditionalRouter { condition: "pick".into() });
        definition.conditional_edges.push(ConditionalEdge {
            from: "router".into(),
            condition: "pick".into(),
            branches: BTreeMap::from([
                ("left".to_string(), "work".to_string()),
                ("right".to_string(), TERMINAL.to_string()),
            ]),
        });
        compile(&definition, &conditions()).unwrap();
    }

    #[test]
    fn cycle_whose_router_cannot_exit_is_infinite_loop() {
        let mut definition = chain(&["work", "router"]);
        definition.edges = vec![("work".into(), "router".into())];
        definition
            .nodes
            .insert("router".into(), NodeSpec::ConditionalRouter { condition: "pick".into() });
        definition.conditional_edges.push(ConditionalEdge {
            from: "router".into(),
            condition: "pick".into(),
            // Every branch stays inside the cycle; the router's implicit
            // terminal fallback never fires, so there is no way out.
            branches: BTreeMap::from([("left".to_string(), "work".to_string())]),
        });
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::InfiniteLoop(_)));
    }

    #[test]
    fn non_router_conditional_cycle_exits_through_fallback() {
        // `work -> check` unconditionally; `check` carries conditional
        // edges looping back to `work`. Its fallback is terminal, which
        // breaks the cycle.
        let mut definition = chain(&["work", "check"]);
        definition.edges = vec![("work".into(), "check".into())];
        definition.conditional_edges.push(ConditionalEdge {
            from: "check".into(),
            condition: "pick".into(),
            branches: BTreeMap::from([("left".to_string(), "work".to_string())]),
        });
        compile(&definition, &conditions()).unwrap();
    }

    #[test]
    fn router_with_unconditional_edge_is_ambiguous() {
        let mut definition = chain(&["a", "r", "b"]);
        definition
            .nodes
            .insert("r".into(), NodeSpec::ConditionalRouter { condition: "pick".into() });
        definition.conditional_edges.push(ConditionalEdge {
            from: "r".into(),
            condition: "pick".into(),
            branches: BTreeMap::from([("left".to_string(), "b".to_string())]),
        });
        // The chain already gave `r` an unconditional edge to `b`.
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::AmbiguousTransition(n) if n == "r"));
    }

    // ── routers / composites ────────────────────────────────────────

    #[test]
    fn router_without_edges_is_rejected() {
        let mut definition = chain(&["a"]);
        definition
            .nodes
            .insert("r".into(), NodeSpec::ConditionalRouter { condition: "pick".into() });
        definition.edges = vec![("a".into(), "r".into())];
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn composite_child_must_exist_and_be_tool_call() {
        let mut definition = chain(&["a", "b"]);
        definition
            .nodes
            .insert("combo".into(), NodeSpec::Composite { children: vec!["ghost".into()] });
        definition.edges = vec![
            ("a".into(), "combo".into()),
            ("combo".into(), "b".into()),
            ("b".into(), TERMINAL.into()),
        ];
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::UnknownNode(n) if n == "ghost"));

        definition.nodes.insert(
            "combo".into(),
            NodeSpec::Composite { children: vec!["b".into()] },
        );
        definition.nodes.insert("b".into(), NodeSpec::Terminal);
        let err = compile(&definition, &conditions()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn composite_children_are_reachable_through_parent() {
        let mut definition = chain(&["combo"]);
        definition.nodes.insert(
            "combo".into(),
            NodeSpec::Composite { children: vec!["child_a".into(), "child_b".into()] },
        );
        definition.nodes.insert("child_a".into(), tool_node("svc", "a"));
        definition.nodes.insert("child_b".into(), tool_node("svc", "b"));
        compile(&definition, &conditions()).unwrap();
    }

    #[test]
    fn value_source_mappings_survive_compilation() {
        let mut definition = chain(&["a"]);
        definition.nodes.insert(
            "a".into(),
            NodeSpec::ToolCall {
                service: "svc".into(),
                tool: "a".into(),
                input_mapping: BTreeMap::from([(
                    "document_id".to_string(),
                    ValueSource::state("input.document_id"),
                )]),
                output_mapping: Some("document".into()),
            },
        );
        let compiled = compile(&definition, &conditions()).unwrap();
        match compiled.nodes.get("a").unwrap() {
            NodeSpec::ToolCall { input_mapping, .. } => {
                assert_eq!(input_mapping.len(), 1);
            }
            other => panic!("unexpected node spec {other:?}"),
        }
    }
}
