use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Ordering constraints between tasks, as a directed graph `before -> after`.
pub struct PrecedenceGraph {
    pub graph: DiGraph<String, ()>,
    pub id_to_index: HashMap<String, NodeIndex>,
}

impl PrecedenceGraph {
    pub fn build<'a>(edges: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut id_to_index: HashMap<String, NodeIndex> = HashMap::new();

        for (before, after) in edges {
            let u = node(&mut graph, &mut id_to_index, before);
            let v = node(&mut graph, &mut id_to_index, after);
            graph.add_edge(u, v, ());
        }

        Self { graph, id_to_index }
    }

    /// Tasks in an order that respects every edge, or the task where a cycle was found.
    pub fn order(&self) -> Result<Vec<String>, String> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|ix| self.graph[ix].clone()).collect())
            .map_err(|cycle| self.graph[cycle.node_id()].clone())
    }

    pub fn is_acyclic(&self) -> bool {
        self.order().is_ok()
    }
}

fn node(
    graph: &mut DiGraph<String, ()>,
    id_to_index: &mut HashMap<String, NodeIndex>,
    task_id: &str,
) -> NodeIndex {
    *id_to_index
        .entry(task_id.to_string())
        .or_insert_with(|| graph.add_node(task_id.to_string()))
}
