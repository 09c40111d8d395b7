//! Linearizer and id generation property tests
//!
//! Random graphs (self-loops, parallel edges and cycles included) against
//! the ordering guarantees the task list relies on.

#[cfg(test)]
mod linearizer_properties {
    use flowlist_core::services::linearizer;
    use flowlist_core::{Edge, EdgeMetadata, FlowNode, GraphStore, NodeType, Position};
    use proptest::prelude::*;
    use serde_json::Map;
    use std::collections::HashSet;

    fn build_nodes(count: usize) -> Vec<FlowNode> {
        (1..=count)
            .map(|i| FlowNode::new(i.to_string(), NodeType::Text, Position::default(), Map::new()))
            .collect()
    }

    fn build_edges(pairs: &[(usize, usize)]) -> Vec<Edge> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (s, t))| {
                Edge::new(
                    format!("e{}", i),
                    s.to_string(),
                    t.to_string(),
                    EdgeMetadata::default(),
                )
            })
            .collect()
    }

    /// Any graph over ids 1..=n, endpoints may point past n (stale edges)
    fn graph_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
        (0usize..12).prop_flat_map(|n| {
            let endpoint = 1usize..=(n + 2);
            (
                Just(n),
                prop::collection::vec((endpoint.clone(), endpoint), 0..30),
            )
        })
    }

    /// Edges only go from lower to higher index, then node order is shuffled
    fn dag_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize)>)> {
        (2usize..12).prop_flat_map(|n| {
            let order = Just((1..=n).collect::<Vec<_>>()).prop_shuffle();
            let edges = prop::collection::vec((1..n, 1..n), 0..25).prop_map(|pairs| {
                pairs
                    .into_iter()
                    .map(|(a, b)| if a <= b { (a, b + 1) } else { (b, a + 1) })
                    .collect::<Vec<_>>()
            });
            (order, edges)
        })
    }

    #[derive(Debug, Clone)]
    enum IdOp {
        Add,
        Paste(usize),
        Remove(usize),
    }

    fn id_ops_strategy() -> impl Strategy<Value = Vec<IdOp>> {
        let op = prop_oneof![
            3 => Just(IdOp::Add),
            2 => (0usize..20).prop_map(IdOp::Paste),
            1 => (0usize..20).prop_map(IdOp::Remove),
        ];
        prop::collection::vec(op, 1..40)
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        #[test]
        fn order_is_idempotent((n, pairs) in graph_strategy()) {
            let nodes = build_nodes(n);
            let edges = build_edges(&pairs);

            let first = linearizer::order_ids(&nodes, &edges);
            let second = linearizer::order_ids(&nodes, &edges);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn order_is_total((n, pairs) in graph_strategy()) {
            let nodes = build_nodes(n);
            let edges = build_edges(&pairs);

            let ordered = linearizer::order_ids(&nodes, &edges);
            prop_assert_eq!(ordered.len(), n);

            let unique: HashSet<&String> = ordered.iter().collect();
            prop_assert_eq!(unique.len(), n);
            for node in &nodes {
                prop_assert!(unique.contains(&node.id));
            }
        }

        #[test]
        fn order_respects_every_dag_edge((order, pairs) in dag_strategy()) {
            let nodes: Vec<FlowNode> = order
                .iter()
                .map(|i| FlowNode::new(i.to_string(), NodeType::Text, Position::default(), Map::new()))
                .collect();
            let edges = build_edges(&pairs);

            let ordered = linearizer::order_ids(&nodes, &edges);
            let position = |id: &str| ordered.iter().position(|o| o == id);

            for edge in &edges {
                let u = position(edge.source.as_str());
                let v = position(edge.target.as_str());
                prop_assert!(u.is_some() && v.is_some());
                prop_assert!(u < v, "{} must precede {}", edge.source, edge.target);
            }
        }

        #[test]
        fn node_ids_stay_unique(ops in id_ops_strategy()) {
            let mut store = GraphStore::new();

            for op in ops {
                match op {
                    IdOp::Add => {
                        store.add_node(NodeType::Text, Position::default(), Map::new());
                    }
                    IdOp::Paste(pick) => {
                        let snapshot = store
                            .nodes()
                            .get(pick % store.nodes().len().max(1))
                            .and_then(|n| store.copy_node(&n.id));
                        if let Some(snapshot) = snapshot {
                            store.paste_node(&snapshot, Position::new(10.0, 10.0));
                        }
                    }
                    IdOp::Remove(pick) => {
                        let id = store
                            .nodes()
                            .get(pick % store.nodes().len().max(1))
                            .map(|n| n.id.clone());
                        if let Some(id) = id {
                            store.remove_node(&id);
                        }
                    }
                }

                let ids: HashSet<&str> = store.nodes().iter().map(|n| n.id.as_str()).collect();
                prop_assert_eq!(ids.len(), store.nodes().len());
            }
        }
    }

    #[test]
    fn scenario_chain_is_fully_ordered() {
        let nodes = build_nodes(2);
        let edges = build_edges(&[(1, 2)]);
        assert_eq!(linearizer::order_ids(&nodes, &edges), vec!["1", "2"]);
    }

    #[test]
    fn scenario_cycle_lists_each_node_once() {
        let nodes = build_nodes(3);
        let edges = build_edges(&[(1, 2), (2, 3), (3, 1)]);

        let mut ordered = linearizer::order_ids(&nodes, &edges);
        ordered.sort();
        assert_eq!(ordered, vec!["1", "2", "3"]);
    }
}
