use crate::graph::WorkflowGraph;

/// Render the graph's node/dependency structure as Graphviz DOT.
///
/// Read-only: consumes only the public structure, left-to-right layout.
pub fn to_dot(graph: &WorkflowGraph) -> String {
    let mut dot = String::new();
    dot.push_str(&format!("digraph \"{}\" {{\n", graph.name()));
    dot.push_str("    rankdir=LR;\n");

    for node in graph.iter() {
        dot.push_str(&format!("    \"{}\";\n", node.name()));
    }
    for node in graph.iter() {
        for dep in node.resolved_dependencies() {
            dot.push_str(&format!("    \"{}\" -> \"{}\";\n", dep, node.name()));
        }
    }

    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use braid_agent::FnAgent;

    use crate::node::AgentNode;

    #[test]
    fn test_dot_structure() {
        let agent: Arc<FnAgent> = Arc::new(FnAgent::new("noop", Ok));
        let mut graph = WorkflowGraph::new("pipeline");
        graph.add_node(AgentNode::new("Fetch", agent.clone())).unwrap();
        graph
            .add_node(AgentNode::new("Double", agent).bind_output("value", "Fetch", "value"))
            .unwrap();

        let dot = to_dot(&graph);
        assert!(dot.starts_with("digraph \"pipeline\" {"));
        assert!(dot.contains("rankdir=LR;"));
        assert!(dot.contains("\"Fetch\";"));
        assert!(dot.contains("\"Fetch\" -> \"Double\";"));
        assert!(dot.ends_with("}\n"));
    }
}
