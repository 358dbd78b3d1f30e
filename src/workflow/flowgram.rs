//! Normalisation of FlowGram editor payloads into compiler-ready workflows.
//!
//! The editor either posts `{id, name, graph: {nodes, edges}}` or a bare
//! `{nodes, edges}` graph.

use serde_json::{Map, Value, json};

use crate::error::WorkflowError;

/// Extract `{nodes, edges}` from a FlowGram payload.
pub fn extract_graph(payload: &Value) -> Result<Value, WorkflowError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| WorkflowError::FlowGram("payload must be a mapping".into()))?;
    let graph = match obj.get("graph") {
        Some(graph) => graph,
        None if obj.contains_key("nodes") => payload,
        None => {
            return Err(WorkflowError::FlowGram(
                "payload must include a graph mapping".into(),
            ));
        }
    };
    let graph = graph
        .as_object()
        .ok_or_else(|| WorkflowError::FlowGram("payload must include a graph mapping".into()))?;

    let empty = Value::Array(Vec::new());
    let nodes = graph.get("nodes").unwrap_or(&empty);
    let edges = graph.get("edges").unwrap_or(&empty);
    if !nodes.is_array() || !edges.is_array() {
        return Err(WorkflowError::FlowGram(
            "graph requires 'nodes' and 'edges' lists".into(),
        ));
    }
    Ok(json!({"nodes": nodes, "edges": edges}))
}

/// Build a `{id, name, graph}` workflow from a FlowGram payload.
/// Missing `id`/`name` become empty strings and are reported by validation.
pub fn normalize_flowgram_payload(payload: &Value) -> Result<Value, WorkflowError> {
    let graph = extract_graph(payload)?;
    let text = |key: &str| match payload.get(key) {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    };
    let mut wf = Map::new();
    wf.insert("id".into(), Value::String(text("id")));
    wf.insert("name".into(), Value::String(text("name")));
    wf.insert("graph".into(), graph);
    Ok(Value::Object(wf))
}

/// `(node_count, edge_count)` of a graph mapping; non-lists count as zero.
pub fn graph_counts(graph: &Value) -> (usize, usize) {
    let count = |key: &str| graph.get(key).and_then(Value::as_array).map_or(0, Vec::len);
    (count("nodes"), count("edges"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::compile;

    #[test]
    fn normalizes_wrapped_and_bare_graphs() {
        let wrapped = json!({
            "id": "wf", "name": "Flow", "meta": {"zoom": 1},
            "graph": {"nodes": [{"id": "a", "type": "wait", "params": {}}], "edges": []}
        });
        let wf = normalize_flowgram_payload(&wrapped).unwrap();
        assert_eq!(wf["id"], json!("wf"));
        assert!(wf.get("meta").is_none());
        assert_eq!(compile(&wf).unwrap().len(), 1);

        let bare = json!({"nodes": [{"id": "a"}], "edges": []});
        let wf = normalize_flowgram_payload(&bare).unwrap();
        assert_eq!(wf["id"], json!(""));
        assert_eq!(graph_counts(&wf["graph"]), (1, 0));
    }

    #[test]
    fn rejects_payloads_without_graph() {
        assert!(extract_graph(&json!({"id": "x"})).is_err());
        assert!(extract_graph(&json!({"graph": []})).is_err());
        assert!(extract_graph(&json!({"graph": {"nodes": {}, "edges": []}})).is_err());
        assert!(extract_graph(&json!(null)).is_err());
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let graph = extract_graph(&json!({"graph": {}})).unwrap();
        assert_eq!(graph, json!({"nodes": [], "edges": []}));
        assert_eq!(graph_counts(&json!({"nodes": 3})), (0, 0));
    }
}
