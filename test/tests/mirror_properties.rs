use proptest::prelude::*;

use synthctl_client::Server;
use synthctl_shared::{AddAction, Controls, NodeId};
use synthctl_test::connected_pair;

#[derive(Debug, Clone)]
enum Edit {
    AddGroup { target: usize, action: u8 },
    AddSynth { target: usize, action: u8 },
    Free { node: usize },
    Move { node: usize, action: u8, target: usize },
    Pause { node: usize },
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => (any::<usize>(), 0u8..5).prop_map(|(target, action)| Edit::AddGroup { target, action }),
        3 => (any::<usize>(), 0u8..5).prop_map(|(target, action)| Edit::AddSynth { target, action }),
        1 => any::<usize>().prop_map(|node| Edit::Free { node }),
        2 => (any::<usize>(), 0u8..4, any::<usize>())
            .prop_map(|(node, action, target)| Edit::Move { node, action, target }),
        1 => any::<usize>().prop_map(|node| Edit::Pause { node }),
    ]
}

fn add_action(value: u8) -> AddAction {
    AddAction::from_i32(i32::from(value)).unwrap_or_default()
}

/// Default group plus everything under it, in tree order.
fn live_nodes(server: &Server) -> Vec<NodeId> {
    let mut nodes = vec![1];
    nodes.extend(server.with_node_tree(|tree| tree.descendants(1)).unwrap());
    nodes
}

fn pick(nodes: &[NodeId], index: usize) -> NodeId {
    nodes[index % nodes.len()]
}

fn is_default_group_replace(target: NodeId, action: AddAction) -> bool {
    target == 1 && action == AddAction::Replace
}

fn apply(server: &Server, edit: &Edit) {
    let nodes = live_nodes(server);
    // invalid placements are refused locally and never reach the engine
    let _ = match edit {
        Edit::AddGroup { target, action } => {
            let (target, action) = (pick(&nodes, *target), add_action(*action));
            if is_default_group_replace(target, action) {
                return;
            }
            server.add_group(target, action, false).map(drop)
        }
        Edit::AddSynth { target, action } => {
            let (target, action) = (pick(&nodes, *target), add_action(*action));
            if is_default_group_replace(target, action) {
                return;
            }
            server
                .add_synth(target, action, "default", Controls::new())
                .map(drop)
        }
        Edit::Free { node } => {
            let node = pick(&nodes, *node);
            if node == 1 {
                return;
            }
            server.free_node(node).map(drop)
        }
        Edit::Move { node, action, target } => {
            let node = pick(&nodes, *node);
            if node == 1 {
                return;
            }
            server.move_node(node, add_action(*action), pick(&nodes, *target))
        }
        Edit::Pause { node } => server.pause_node(pick(&nodes, *node)),
    };
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn mirror_matches_engine_after_sync(edits in prop::collection::vec(edit_strategy(), 1..24)) {
        let (engine, server) = connected_pair(57800, 1);
        for edit in &edits {
            apply(&server, edit);
        }
        server.sync().unwrap();

        let engine_tree = server.query_tree(0, false).unwrap().unwrap();
        let mirror_tree = server
            .with_node_tree(|tree| tree.to_query_tree(0, false))
            .unwrap()
            .unwrap();
        prop_assert_eq!(engine_tree, mirror_tree);

        for node_id in live_nodes(&server) {
            prop_assert!(engine.contains(node_id));
            let mirror_parent = server.with_node_tree(|tree| tree.parent(node_id)).unwrap();
            prop_assert_eq!(engine.parent(node_id), mirror_parent);
        }
    }
}
