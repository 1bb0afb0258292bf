use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;

use flowloop::errors::GraphError;
use flowloop::graph::{WorkflowGraph, compile};
use flowloop_test_utils::GraphBuilder;

// Acyclic by construction: node i may only take inputs from nodes 0..i.
// Node insertion order is shuffled so the compiler cannot lean on it.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = (WorkflowGraph, Vec<(usize, usize)>)> {
    (1..=max_nodes).prop_flat_map(|num_nodes| {
        let deps = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_nodes),
            num_nodes,
        );
        let order = Just((0..num_nodes).collect::<Vec<_>>()).prop_shuffle();

        (deps, order).prop_map(move |(raw_deps, insertion)| {
            let mut edges = BTreeSet::new();
            for (i, potential) in raw_deps.into_iter().enumerate() {
                if i == 0 {
                    continue;
                }
                for dep in potential {
                    edges.insert((dep % i, i));
                }
            }

            let mut builder = GraphBuilder::new();
            for i in insertion {
                builder = builder.node(&format!("n{i}"), "Constant");
            }
            for &(source, target) in &edges {
                builder = builder.edge(&format!("n{source}"), &format!("n{target}"));
            }
            (builder.build(), edges.into_iter().collect())
        })
    })
}

proptest! {
    #[test]
    fn every_edge_points_forward((graph, edges) in dag_strategy(12)) {
        let compiled = compile(&graph).unwrap();

        prop_assert_eq!(compiled.order.len(), graph.nodes.len());
        let unique: HashSet<&String> = compiled.order.iter().collect();
        prop_assert_eq!(unique.len(), graph.nodes.len());

        for (source, target) in edges {
            let s = compiled.position(&format!("n{source}")).unwrap();
            let t = compiled.position(&format!("n{target}")).unwrap();
            prop_assert!(s < t, "n{} must precede n{}", source, target);
        }
    }

    #[test]
    fn wire_round_trip_keeps_the_order((graph, _edges) in dag_strategy(10)) {
        let first = compile(&graph).unwrap();
        let reparsed = WorkflowGraph::from_value(graph.to_value()).unwrap();
        let second = compile(&reparsed).unwrap();
        prop_assert_eq!(first.order, second.order);
    }

    #[test]
    fn a_back_edge_makes_a_cycle((graph, edges) in dag_strategy(10)) {
        // Reverse an existing edge's direction on top of the original one.
        prop_assume!(!edges.is_empty());
        let (source, target) = edges[0];
        let mut cyclic = graph;
        cyclic.edges.push(flowloop::graph::Edge::new(
            &format!("n{target}"),
            &format!("n{source}"),
        ));

        match compile(&cyclic) {
            Err(GraphError::CyclicGraph(remaining)) => {
                let source_id = format!("n{source}");
                let target_id = format!("n{target}");
                prop_assert!(remaining.contains(&source_id));
                prop_assert!(remaining.contains(&target_id));
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other),
        }
    }
}
