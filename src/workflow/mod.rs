//! Workflow compiler.
//!
//! Validates workflow descriptors (flat `steps` lists or `graph` node/edge sets)
//! and compiles them into ordered [`Action`](crate::model::Action) lists.
//! Graph ordering is a deterministic Kahn topological sort: two compiles of the
//! same graph always produce the same action order.

pub mod compiler;
pub mod flowgram;
pub mod graph;

pub use compiler::{compile, validate};
pub use flowgram::{extract_graph, graph_counts, normalize_flowgram_payload};
pub use graph::{FROM_ALIASES, Graph, TO_ALIASES, extract_action};
