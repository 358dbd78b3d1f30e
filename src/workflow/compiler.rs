use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, trace};

use super::graph::{Graph, edge_from, edge_to, extract_action, node_id};
use crate::error::WorkflowError;
use crate::model::Action;
use crate::model::action::id_from_value;

/// Validate a workflow descriptor. An empty list means the workflow is valid.
///
/// A workflow needs a non-empty `id` and `name` and exactly one of `steps`
/// (list of action descriptors) or `graph` (`{nodes, edges}`). Graph checks
/// cover node ids, edge endpoints, acyclicity and embedded action payloads.
pub fn validate(workflow: &Value) -> Vec<String> {
    let Some(wf) = workflow.as_object() else {
        return vec!["workflow must be a mapping".into()];
    };

    let mut errors = Vec::new();
    if !is_present(wf.get("id")) {
        errors.push("workflow.id is required".into());
    }
    if !is_present(wf.get("name")) {
        errors.push("workflow.name is required".into());
    }

    match (wf.get("steps"), wf.get("graph")) {
        (Some(_), Some(_)) => {
            errors.push("workflow.steps and workflow.graph are mutually exclusive".into());
        }
        (Some(steps), None) => validate_steps(steps, &mut errors),
        (None, Some(graph)) => validate_graph(graph, &mut errors),
        (None, None) => errors.push("workflow.steps or workflow.graph is required".into()),
    }

    trace!(target: "autotool::workflow", errors = errors.len(), "Workflow validated");
    errors
}

fn validate_steps(steps: &Value, errors: &mut Vec<String>) {
    let Some(steps) = steps.as_array() else {
        errors.push("workflow.steps must be a list".into());
        return;
    };
    for (idx, step) in steps.iter().enumerate() {
        if let Err(err) = Action::from_value(step) {
            errors.push(format!("steps[{idx}] invalid: {err}"));
        }
    }
}

fn validate_graph(graph: &Value, errors: &mut Vec<String>) {
    let Some(graph) = graph.as_object() else {
        errors.push("workflow.graph must be a mapping".into());
        return;
    };
    let nodes = graph.get("nodes").and_then(Value::as_array);
    let edges = graph.get("edges").and_then(Value::as_array);

    if nodes.is_none_or(|n| n.is_empty()) {
        errors.push("workflow.graph.nodes must be a non-empty list".into());
    }
    if edges.is_none() {
        errors.push("workflow.graph.edges must be a list".into());
    }

    let mut node_ids = HashSet::new();
    if let Some(nodes) = nodes {
        let mut missing_id = false;
        let mut duplicate = false;
        for node in nodes {
            let Some(node) = node.as_object() else {
                errors.push("workflow.graph.nodes entries must be mappings".into());
                continue;
            };
            match node_id(node) {
                Some(id) => duplicate |= !node_ids.insert(id),
                None => missing_id = true,
            }
        }
        if missing_id {
            errors.push("workflow.graph.nodes require id".into());
        }
        if duplicate {
            errors.push("workflow.graph.nodes ids must be unique".into());
        }
    }

    let (Some(nodes), Some(edges)) = (nodes, edges) else {
        return;
    };

    for edge in edges {
        let Some(edge) = edge.as_object() else {
            errors.push("workflow.graph.edges entries must be mappings".into());
            continue;
        };
        let source = edge_from(edge);
        let target = edge_to(edge);
        let resolves = |id: &Option<String>| id.as_ref().is_some_and(|id| node_ids.contains(id));
        if !resolves(&source) || !resolves(&target) {
            errors.push(format!(
                "edge references missing node: {} -> {}",
                source.as_deref().unwrap_or("<missing>"),
                target.as_deref().unwrap_or("<missing>")
            ));
        }
    }

    // Cycle detection only makes sense once ids and endpoints are sound.
    if errors.is_empty() && Graph::new(nodes, edges).has_cycle() {
        errors.push("workflow.graph contains cycles".into());
    }

    for node in nodes.iter().filter_map(Value::as_object) {
        let Some(payload) = extract_action(node) else {
            continue;
        };
        if let Err(err) = Action::from_value(&payload) {
            errors.push(format!(
                "node {} invalid action: {err}",
                node_id(node).as_deref().unwrap_or("<missing>")
            ));
        }
    }
}

/// Compile a workflow descriptor into its ordered action list.
///
/// `steps` keep their list order. `graph` nodes are ordered topologically
/// (see [`Graph::topological_order`]); structural nodes are skipped and an
/// embedded action without its own id takes the node id.
pub fn compile(workflow: &Value) -> Result<Vec<Action>, WorkflowError> {
    let errors = validate(workflow);
    if !errors.is_empty() {
        return Err(WorkflowError::Invalid(errors));
    }

    let actions = match workflow.get("steps").and_then(Value::as_array) {
        Some(steps) => steps
            .iter()
            .map(Action::from_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| WorkflowError::Invalid(vec![e.to_string()]))?,
        None => compile_graph(workflow)?,
    };

    if actions.is_empty() {
        return Err(WorkflowError::Empty);
    }
    debug!(
        target: "autotool::workflow",
        workflow_id = %workflow.get("id").and_then(id_from_value).unwrap_or_default(),
        actions = actions.len(),
        "Workflow compiled"
    );
    Ok(actions)
}

fn compile_graph(workflow: &Value) -> Result<Vec<Action>, WorkflowError> {
    let empty = Vec::new();
    let graph = &workflow["graph"];
    let nodes = graph["nodes"].as_array().unwrap_or(&empty);
    let edges = graph["edges"].as_array().unwrap_or(&empty);

    let graph = Graph::new(nodes, edges);
    let order = graph.topological_order();
    if order.len() != graph.len() {
        return Err(WorkflowError::Cycle);
    }

    let mut actions = Vec::new();
    for id in order {
        let Some(node) = graph.node(&id) else {
            continue;
        };
        let Some(payload) = extract_action(node) else {
            continue;
        };
        let mut payload: Map<String, Value> = match payload {
            Value::Object(map) => map,
            other => {
                return Err(WorkflowError::Invalid(vec![format!(
                    "node {id} invalid action: {other}"
                )]));
            }
        };
        if payload.get("id").is_none_or(Value::is_null) {
            payload.insert("id".into(), Value::String(id.clone()));
        }
        let action = Action::from_value(&Value::Object(payload))
            .map_err(|e| WorkflowError::Invalid(vec![format!("node {id} invalid action: {e}")]))?;
        actions.push(action);
    }
    Ok(actions)
}

/// Non-empty string or number, the same identifiers the store accepts.
fn is_present(value: Option<&Value>) -> bool {
    value.and_then(id_from_value).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActionKind;
    use serde_json::json;

    #[test]
    fn compiles_steps_in_order_with_generated_ids() {
        let wf = json!({
            "id": "wf1",
            "name": "W",
            "steps": [
                {"type": "click", "params": {"x": 1, "y": 2}},
                {"type": "wait", "params": {"seconds": 1}}
            ]
        });
        let actions = compile(&wf).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].kind(), Some(ActionKind::Click));
        assert_eq!(actions[1].kind(), Some(ActionKind::Wait));
        assert!(!actions[0].id().is_empty());
        assert_ne!(actions[0].id(), actions[1].id());
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let wf = json!({
            "id": "wf", "name": "W",
            "graph": {
                "nodes": [{"id": "a"}, {"id": "b"}],
                "edges": [{"from": "a", "to": "b"}, {"from": "b", "to": "a"}]
            }
        });
        let errors = validate(&wf);
        assert!(errors.iter().any(|e| e.contains("cycles")), "{errors:?}");
        assert!(matches!(compile(&wf), Err(WorkflowError::Invalid(_))));
    }

    #[test]
    fn graph_compiles_in_deterministic_topological_order() {
        let wf = json!({
            "id": "wf", "name": "Graph",
            "graph": {
                "nodes": [
                    {"id": "typed", "data": {"type": "type", "params": {"text": "hi"}}},
                    {"id": "begin", "type": "start"},
                    {"id": "clicked", "action": {"type": "click", "params": {"x": 1, "y": 1}}},
                    {"id": "moved", "type": "move", "params": {"x": 5, "y": 5}}
                ],
                "edges": [
                    {"source": "begin", "target": "moved"},
                    {"sourceNodeID": "begin", "targetNodeID": "clicked"},
                    {"src": "clicked", "dst": "typed"},
                    {"start": "moved", "end": "typed"}
                ]
            }
        });
        let first: Vec<String> = compile(&wf).unwrap().iter().map(|a| a.id().to_string()).collect();
        assert_eq!(first, vec!["clicked", "moved", "typed"]);
        for _ in 0..5 {
            let again: Vec<String> =
                compile(&wf).unwrap().iter().map(|a| a.id().to_string()).collect();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn embedded_ids_win_over_node_ids() {
        let wf = json!({
            "id": "wf", "name": "W",
            "graph": {
                "nodes": [{"id": "n1", "action": {"id": "custom", "type": "wait"}}],
                "edges": []
            }
        });
        assert_eq!(compile(&wf).unwrap()[0].id(), "custom");
    }

    #[test]
    fn structural_only_graph_is_empty() {
        let wf = json!({
            "id": "wf", "name": "W",
            "graph": {"nodes": [{"id": "s", "type": "start"}], "edges": []}
        });
        assert!(validate(&wf).is_empty());
        assert_eq!(compile(&wf).unwrap_err(), WorkflowError::Empty);
    }

    #[test]
    fn reports_structural_errors() {
        let wf = json!({
            "graph": {
                "nodes": [{"id": "a"}, {"id": "a"}, {"type": "wait"}],
                "edges": [{"from": "a", "to": "ghost"}, 3]
            }
        });
        let errors = validate(&wf);
        assert!(errors.contains(&"workflow.id is required".to_string()));
        assert!(errors.contains(&"workflow.name is required".to_string()));
        assert!(errors.contains(&"workflow.graph.nodes require id".to_string()));
        assert!(errors.contains(&"workflow.graph.nodes ids must be unique".to_string()));
        assert!(errors.contains(&"edge references missing node: a -> ghost".to_string()));
        assert!(errors.contains(&"workflow.graph.edges entries must be mappings".to_string()));
        assert!(!errors.iter().any(|e| e.contains("cycles")));
    }

    #[test]
    fn requires_exactly_one_body() {
        let neither = json!({"id": "wf", "name": "W"});
        assert_eq!(validate(&neither), vec!["workflow.steps or workflow.graph is required"]);

        let both = json!({"id": "wf", "name": "W", "steps": [], "graph": {"nodes": [], "edges": []}});
        assert_eq!(
            validate(&both),
            vec!["workflow.steps and workflow.graph are mutually exclusive"]
        );
    }

    #[test]
    fn invalid_steps_and_node_actions() {
        let steps = json!({"id": "wf", "name": "W", "steps": [{"type": "click"}, {"params": {}}]});
        assert_eq!(validate(&steps), vec!["steps[1] invalid: Action type is required"]);

        let graph = json!({
            "id": "wf", "name": "W",
            "graph": {"nodes": [{"id": "n", "action": "click"}], "edges": []}
        });
        assert_eq!(
            validate(&graph),
            vec!["node n invalid action: Action must be a dict-like object"]
        );
    }

    #[test]
    fn empty_steps_compile_error() {
        let wf = json!({"id": "wf", "name": "W", "steps": []});
        assert_eq!(compile(&wf).unwrap_err(), WorkflowError::Empty);
    }
}
