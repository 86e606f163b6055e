use std::{sync::Arc, time::Duration};

use synthctl_client::{Server, ServerRegistry};
use synthctl_shared::{AddAction, ControlValue, Controls, NodeRequest, OscArgument, OscMessage};
use synthctl_test::{connected_pair, init_logging, options_for, quiet_config, wait_until};

const WAIT: Duration = Duration::from_secs(2);

fn mirror_children(server: &Server, group_id: i32) -> Option<Vec<i32>> {
    server
        .with_node_tree(|tree| tree.children(group_id).map(<[i32]>::to_vec))
        .unwrap()
}

fn node_args(values: &[i32]) -> Vec<OscArgument> {
    values.iter().map(|value| OscArgument::Int(*value)).collect()
}

#[test]
fn engine_and_mirror_agree_after_mixed_edits() {
    init_logging();
    let (engine, server) = connected_pair(57400, 1);

    let outer = server.add_group(1, AddAction::AddToHead, false).unwrap();
    let inner = server.add_group(outer, AddAction::AddToTail, false).unwrap();
    let synth = server
        .add_synth(inner, AddAction::AddToHead, "default", Controls::new().with("amp", 0.25f32))
        .unwrap();
    let sibling = server.add_group(outer, AddAction::AddBefore, false).unwrap();
    server.move_node(synth, AddAction::AddToTail, outer).unwrap();
    server.sync().unwrap();

    assert_eq!(engine.children(1), mirror_children(&server, 1));
    assert_eq!(engine.children(outer), mirror_children(&server, outer));
    assert_eq!(engine.children(1), Some(vec![sibling, outer]));
    assert_eq!(engine.children(outer), Some(vec![inner, synth]));

    let engine_tree = server.query_tree(0, true).unwrap().unwrap();
    let mirror_tree = server.with_node_tree(|tree| tree.to_query_tree(0, true)).unwrap().unwrap();
    assert_eq!(engine_tree, mirror_tree);
}

#[test]
fn freeing_a_group_removes_its_subtree_everywhere() {
    init_logging();
    let (engine, server) = connected_pair(57401, 1);
    let group = server.add_group(1, AddAction::AddToHead, false).unwrap();
    let synth = server
        .add_synth(group, AddAction::AddToHead, "default", Controls::new())
        .unwrap();

    let mut removed = server.free_node(group).unwrap();
    removed.sort_unstable();
    assert_eq!(removed, vec![group, synth]);
    assert!(!server.with_node_tree(|tree| tree.contains(synth)).unwrap());

    server.sync().unwrap();
    assert!(!engine.contains(group));
    assert!(!engine.contains(synth));
    assert_eq!(engine.received("/n_free").len(), 1);
    assert!(!server.with_node_tree(|tree| tree.is_tombstoned(group)).unwrap());
}

#[test]
fn creation_echo_for_a_freed_node_is_dropped() {
    init_logging();
    let (engine, server) = connected_pair(57402, 1);
    server.sync().unwrap();
    engine.set_muted(true);

    let node_id = server.add_group(1, AddAction::AddToTail, false).unwrap();
    server.free_node(node_id).unwrap();
    assert!(wait_until(WAIT, || !engine.received("/n_free").is_empty()));
    assert!(server.with_node_tree(|tree| tree.is_tombstoned(node_id)).unwrap());

    engine.inject(OscMessage::new("/n_go", node_args(&[node_id, 1, -1, -1, 1, -1, -1])));
    engine.set_muted(false);
    server.sync().unwrap();
    assert!(!server.with_node_tree(|tree| tree.contains(node_id)).unwrap());

    engine.inject(OscMessage::new("/n_end", node_args(&[node_id, 1, -1, -1, 1, -1, -1])));
    server.sync().unwrap();
    assert!(!server.with_node_tree(|tree| tree.is_tombstoned(node_id)).unwrap());
    assert!(!server.with_node_tree(|tree| tree.contains(node_id)).unwrap());
}

#[test]
fn nodes_created_by_another_client_appear_in_the_mirror() {
    init_logging();
    let (engine, first) = connected_pair(57403, 2);
    let second = Server::with_registry(quiet_config(), Arc::new(ServerRegistry::new()));
    second
        .connect(options_for(engine.addr()), engine.socket())
        .unwrap();

    let mine = first.add_group(1, AddAction::AddToHead, false).unwrap();
    first.sync().unwrap();
    assert!(wait_until(WAIT, || second.with_node_tree(|tree| tree.contains(mine)).unwrap()));
    let theirs = second.add_group(mine, AddAction::AddAfter, false).unwrap();
    second.sync().unwrap();
    first.sync().unwrap();

    assert_eq!(mirror_children(&first, 1), Some(vec![mine, theirs]));
    assert_eq!(first.with_node_tree(|tree| tree.parent(theirs)).unwrap(), Some(1));

    second.free_node(theirs).unwrap();
    second.sync().unwrap();
    first.sync().unwrap();
    assert_eq!(mirror_children(&first, 1), Some(vec![mine]));
}

#[test]
fn notification_with_unknown_parent_is_ignored() {
    init_logging();
    let (engine, server) = connected_pair(57404, 1);
    server.sync().unwrap();

    engine.inject(OscMessage::new("/n_go", node_args(&[7000, 5555, -1, -1, 1, -1, -1])));
    server.sync().unwrap();
    assert!(!server.with_node_tree(|tree| tree.contains(7000)).unwrap());
    assert!(server.is_running());
}

#[test]
fn pause_and_resume_reach_the_engine() {
    init_logging();
    let (engine, server) = connected_pair(57405, 1);
    let synth = server
        .add_synth(1, AddAction::AddToHead, "default", Controls::new())
        .unwrap();

    server.pause_node(synth).unwrap();
    assert!(server.with_node_tree(|tree| tree.node(synth).map(|node| node.is_paused())).unwrap().unwrap());
    server.sync().unwrap();
    assert_eq!(engine.is_running(synth), Some(false));

    server.unpause_node(synth).unwrap();
    server.sync().unwrap();
    assert_eq!(engine.is_running(synth), Some(true));
    assert!(!server.with_node_tree(|tree| tree.node(synth).map(|node| node.is_paused())).unwrap().unwrap());
}

#[test]
fn replace_swaps_the_target_out() {
    init_logging();
    let (engine, server) = connected_pair(57406, 1);
    let old = server.add_group(1, AddAction::AddToHead, false).unwrap();
    let after = server.add_group(1, AddAction::AddToTail, false).unwrap();
    let new = server
        .add_synth(old, AddAction::Replace, "default", Controls::new())
        .unwrap();
    server.sync().unwrap();

    assert_eq!(mirror_children(&server, 1), Some(vec![new, after]));
    assert_eq!(engine.children(1), Some(vec![new, after]));
    assert!(!engine.contains(old));
}

#[test]
fn group_controls_reach_contained_synths() {
    init_logging();
    let (engine, server) = connected_pair(57407, 1);
    let group = server.add_group(1, AddAction::AddToHead, false).unwrap();
    let synth = server
        .add_synth(group, AddAction::AddToHead, "default", Controls::new().with("freq", 220.0f32))
        .unwrap();

    server
        .set_node_controls(group, &Controls::new().with("freq", 440.0f32))
        .unwrap();
    let mirrored = server
        .with_node_tree(|tree| tree.node(synth).and_then(|node| node.controls().and_then(|controls| controls.get("freq"))))
        .unwrap();
    assert_eq!(mirrored, Some(ControlValue::Float(440.0)));

    server.sync().unwrap();
    assert_eq!(engine.control(synth, "freq"), Some(OscArgument::Float(440.0)));
}

#[test]
fn invalid_placement_is_rejected_locally() {
    init_logging();
    let (engine, server) = connected_pair(57408, 1);
    let synth = server
        .add_synth(1, AddAction::AddToHead, "default", Controls::new())
        .unwrap();
    server.sync().unwrap();
    let sent_before = engine.received_messages().len();

    assert!(server.add_group(synth, AddAction::AddToHead, false).is_err());
    assert!(server.add_group(4242, AddAction::AddToHead, false).is_err());
    assert!(server.move_node(1, AddAction::AddToHead, 1).is_err());
    server.sync().unwrap();

    // only the /sync went out
    assert_eq!(engine.received_messages().len(), sent_before + 1);
}

#[test]
fn order_places_nodes_in_sequence_on_both_sides() {
    init_logging();
    let (engine, server) = connected_pair(57409, 1);
    let ids: Vec<i32> = (0..4)
        .map(|_| server.add_group(1, AddAction::AddToTail, false).unwrap())
        .collect();

    server
        .send(NodeRequest::Order {
            add_action: AddAction::AddBefore,
            target_id: ids[0],
            node_ids: vec![ids[3], ids[2]],
        })
        .unwrap();
    server.sync().unwrap();

    let expected = vec![ids[3], ids[2], ids[0], ids[1]];
    assert_eq!(mirror_children(&server, 1), Some(expected.clone()));
    assert_eq!(engine.children(1), Some(expected));
    assert_eq!(server.with_node_tree(|tree| tree.pending_move_count()).unwrap(), 0);
}

#[test]
fn lost_move_echo_is_forgotten_after_sync() {
    init_logging();
    let (engine, server) = connected_pair(57410, 1);
    let a = server.add_group(1, AddAction::AddToTail, false).unwrap();
    let b = server.add_group(1, AddAction::AddToTail, false).unwrap();
    server.sync().unwrap();

    engine.set_muted(true);
    server.move_node(a, AddAction::AddAfter, b).unwrap();
    assert!(wait_until(WAIT, || !engine.received("/n_after").is_empty()));
    engine.set_muted(false);
    server.sync().unwrap();
    assert_eq!(server.with_node_tree(|tree| tree.pending_move_count()).unwrap(), 0);

    // a later move by someone else must not be taken for the lost echo
    engine.inject(OscMessage::new("/n_move", node_args(&[a, 1, -1, b, 1, -1, -1])));
    server.sync().unwrap();
    assert_eq!(mirror_children(&server, 1), Some(vec![a, b]));
}
