use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::model::action::id_from_value;

/// Accepted keys for an edge's source endpoint, in lookup order.
pub const FROM_ALIASES: [&str; 7] = [
    "from",
    "source",
    "src",
    "start",
    "sourceId",
    "sourceNodeID",
    "sourceNodeId",
];

/// Accepted keys for an edge's target endpoint, in lookup order.
pub const TO_ALIASES: [&str; 7] = [
    "to",
    "target",
    "dst",
    "end",
    "targetId",
    "targetNodeID",
    "targetNodeId",
];

/// First alias holding a usable id; empty strings fall through to the next alias.
fn endpoint(edge: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|key| edge.get(*key).and_then(id_from_value))
}

pub fn edge_from(edge: &Map<String, Value>) -> Option<String> {
    endpoint(edge, &FROM_ALIASES)
}

pub fn edge_to(edge: &Map<String, Value>) -> Option<String> {
    endpoint(edge, &TO_ALIASES)
}

pub fn node_id(node: &Map<String, Value>) -> Option<String> {
    node.get("id").and_then(id_from_value)
}

/// Lowercased node `type`, empty when absent.
pub fn node_type(node: &Map<String, Value>) -> String {
    node.get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase()
}

/// Extract the action descriptor embedded in a graph node, if any.
///
/// Shapes are tried in precedence order:
/// 1. `node.action`
/// 2. `node.data.action`
/// 3. `node.data.type` (+ `node.data.params`)
/// 4. `node.type` + `node.params` (both present)
///
/// Nodes matching none of these are structural and yield `None`.
pub fn extract_action(node: &Map<String, Value>) -> Option<Value> {
    if let Some(action) = node.get("action") {
        return Some(action.clone());
    }
    if let Some(data) = node.get("data").and_then(Value::as_object) {
        if let Some(action) = data.get("action") {
            return Some(action.clone());
        }
        if let Some(kind) = data.get("type") {
            return Some(typed_descriptor(kind, data.get("params")));
        }
    }
    if let (Some(kind), Some(params)) = (node.get("type"), node.get("params")) {
        return Some(typed_descriptor(kind, Some(params)));
    }
    None
}

fn typed_descriptor(kind: &Value, params: Option<&Value>) -> Value {
    let mut obj = Map::new();
    obj.insert("type".into(), kind.clone());
    obj.insert(
        "params".into(),
        params.cloned().unwrap_or_else(|| Value::Object(Map::new())),
    );
    Value::Object(obj)
}

/// Directed graph view over validated node/edge lists.
#[derive(Debug, Clone)]
pub struct Graph<'a> {
    nodes: BTreeMap<String, &'a Map<String, Value>>,
    adjacency: HashMap<String, Vec<String>>,
}

impl<'a> Graph<'a> {
    /// Build from raw JSON lists. Nodes without an id and edges whose endpoints
    /// do not resolve to a known node are ignored.
    pub fn new(nodes: &'a [Value], edges: &[Value]) -> Self {
        let nodes: BTreeMap<String, &'a Map<String, Value>> = nodes
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|n| node_id(n).map(|id| (id, n)))
            .collect();

        let mut adjacency: HashMap<String, Vec<String>> =
            nodes.keys().map(|id| (id.clone(), Vec::new())).collect();
        for edge in edges.iter().filter_map(Value::as_object) {
            let (Some(from), Some(to)) = (edge_from(edge), edge_to(edge)) else {
                continue;
            };
            if nodes.contains_key(&from) && nodes.contains_key(&to) {
                adjacency.entry(from).or_default().push(to);
            }
        }

        Self { nodes, adjacency }
    }

    pub fn node(&self, id: &str) -> Option<&'a Map<String, Value>> {
        self.nodes.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Kahn's algorithm with a deterministic queue.
    ///
    /// Initial ready nodes sort `start`-typed nodes first, then by id; on each
    /// pop, successors are visited in ascending id order and enqueued as soon as
    /// their in-degree reaches zero. Nodes on (or behind) a cycle never become
    /// ready, so a short result means the graph is not a DAG.
    pub fn topological_order(&self) -> Vec<String> {
        let mut in_degree: HashMap<&str, usize> =
            self.nodes.keys().map(|id| (id.as_str(), 0)).collect();
        for targets in self.adjacency.values() {
            for to in targets {
                if let Some(d) = in_degree.get_mut(to.as_str()) {
                    *d += 1;
                }
            }
        }

        let mut ready: Vec<&str> = self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();
        ready.sort_by_key(|id| {
            let is_start = self.nodes.get(*id).is_some_and(|n| node_type(n) == "start");
            (!is_start, *id)
        });
        let mut queue: VecDeque<&str> = ready.into();

        let mut ordered = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            ordered.push(current.to_string());
            let mut successors: Vec<&str> = self
                .adjacency
                .get(current)
                .map(|v| v.iter().map(String::as_str).collect())
                .unwrap_or_default();
            successors.sort_unstable();
            for next in successors {
                if let Some(d) = in_degree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
        ordered
    }

    pub fn has_cycle(&self) -> bool {
        self.topological_order().len() != self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn endpoint_aliases_in_order() {
        assert_eq!(edge_from(&obj(json!({"sourceNodeID": "a"}))), Some("a".into()));
        assert_eq!(edge_to(&obj(json!({"targetNodeId": "b"}))), Some("b".into()));
        assert_eq!(edge_from(&obj(json!({"from": "", "src": "c"}))), Some("c".into()));
        assert_eq!(edge_from(&obj(json!({"source": "x", "start": "y"}))), Some("x".into()));
        assert_eq!(edge_to(&obj(json!({"foo": "b"}))), None);
    }

    #[test]
    fn extraction_precedence() {
        let explicit = obj(json!({"id": "n", "action": {"type": "click"}, "data": {"type": "wait"}}));
        assert_eq!(extract_action(&explicit), Some(json!({"type": "click"})));

        let data_action = obj(json!({"id": "n", "data": {"action": {"type": "move"}, "type": "wait"}}));
        assert_eq!(extract_action(&data_action), Some(json!({"type": "move"})));

        let data_typed = obj(json!({"id": "n", "data": {"type": "wait"}}));
        assert_eq!(
            extract_action(&data_typed),
            Some(json!({"type": "wait", "params": {}}))
        );

        let top = obj(json!({"id": "n", "type": "hotkey", "params": {"combo": "ctrl+c"}}));
        assert_eq!(
            extract_action(&top),
            Some(json!({"type": "hotkey", "params": {"combo": "ctrl+c"}}))
        );

        let structural = obj(json!({"id": "s", "type": "start"}));
        assert_eq!(extract_action(&structural), None);
    }

    #[test]
    fn start_nodes_sort_first() {
        let nodes = vec![
            json!({"id": "a"}),
            json!({"id": "z", "type": "Start"}),
            json!({"id": "m"}),
        ];
        let graph = Graph::new(&nodes, &[]);
        assert_eq!(graph.topological_order(), vec!["z", "a", "m"]);
    }

    #[test]
    fn successors_enqueue_in_id_order() {
        let nodes = vec![
            json!({"id": "s", "type": "start"}),
            json!({"id": "c"}),
            json!({"id": "b"}),
            json!({"id": "d"}),
        ];
        let edges = vec![
            json!({"from": "s", "to": "c"}),
            json!({"from": "s", "to": "b"}),
            json!({"from": "b", "to": "d"}),
            json!({"from": "c", "to": "d"}),
        ];
        let graph = Graph::new(&nodes, &edges);
        assert_eq!(graph.topological_order(), vec!["s", "b", "c", "d"]);
        assert!(!graph.has_cycle());
    }

    #[test]
    fn detects_cycles() {
        let nodes = vec![json!({"id": "a"}), json!({"id": "b"}), json!({"id": "c"})];
        let edges = vec![
            json!({"from": "a", "to": "b"}),
            json!({"from": "b", "to": "c"}),
            json!({"from": "c", "to": "b"}),
        ];
        let graph = Graph::new(&nodes, &edges);
        assert_eq!(graph.topological_order(), vec!["a"]);
        assert!(graph.has_cycle());
    }
}
