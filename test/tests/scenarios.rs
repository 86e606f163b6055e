use std::time::Duration;

use synthctl_client::Server;
use synthctl_shared::{
    AddAction, BlockAllocator, OscMessage, OscPacket, Requestable, Response, SynthDefRequest,
    MAX_DATAGRAM_SIZE,
};
use synthctl_test::{connected_pair, init_logging, wait_until};

const WAIT: Duration = Duration::from_secs(2);

fn children_of(server: &Server, group_id: i32) -> Vec<i32> {
    server
        .with_node_tree(|tree| tree.children(group_id).map(<[i32]>::to_vec))
        .unwrap()
        .unwrap_or_default()
}

#[test]
fn block_allocator_fills_and_reuses_heap() {
    let allocator = BlockAllocator::new(0, 16);
    let first_four: Vec<Option<i32>> = (0..4).map(|_| allocator.allocate(4)).collect();
    assert_eq!(first_four, vec![Some(0), Some(4), Some(8), Some(12)]);
    assert_eq!(allocator.allocate(4), None);

    allocator.free(4).unwrap();
    assert_eq!(allocator.allocate(4), Some(4));
}

#[test]
fn new_group_is_mirrored_before_the_engine_answers() {
    init_logging();
    let (engine, server) = connected_pair(57200, 1);
    server.sync().unwrap();
    engine.set_muted(true);

    let node_id = server.add_group(1, AddAction::AddToTail, false).unwrap();
    assert_eq!(node_id, 1000);
    assert_eq!(children_of(&server, 1), vec![1000]);
    assert_eq!(server.with_node_tree(|tree| tree.parent(1000)).unwrap(), Some(1));
    let before = server.with_node_tree(|tree| tree.render()).unwrap();

    assert!(wait_until(WAIT, || engine.contains(1000)));
    let created = engine.node_info(1000).unwrap();
    assert_eq!(created[0].as_int(), Some(1000));
    assert_eq!(created[1].as_int(), Some(1));
    engine.inject(OscMessage::new("/n_go", created));
    engine.set_muted(false);
    server.sync().unwrap();

    let after = server.with_node_tree(|tree| tree.render()).unwrap();
    assert_eq!(before, after);
    assert_eq!(children_of(&server, 1), vec![1000]);
}

#[test]
fn oversized_batch_is_split_into_synced_bundles() {
    init_logging();
    let (engine, server) = connected_pair(57201, 1);
    server.sync().unwrap();

    let requests: Vec<Requestable> = (0..2u8)
        .map(|seed| {
            SynthDefRequest::Receive {
                payload: vec![seed; 5000],
                completion: None,
            }
            .into()
        })
        .collect();
    let combined: usize = requests
        .iter()
        .map(|request| request.to_packet().encode().len())
        .sum();
    assert!(combined > MAX_DATAGRAM_SIZE);

    let responses = server.communicate_many(requests, None).unwrap();
    assert_eq!(responses.len(), 2);
    let sync_ids: Vec<i32> = responses
        .iter()
        .map(|response| match response {
            Response::Synced(synced) => synced.sync_id,
            other => panic!("expected /synced, got {:?}", other),
        })
        .collect();
    assert_eq!(sync_ids[1], sync_ids[0] + 1);

    let bundles: Vec<Vec<OscMessage>> = engine
        .received_datagrams()
        .iter()
        .filter(|datagram| datagram.starts_with(b"#bundle\0"))
        .map(|datagram| OscPacket::decode(datagram).unwrap().into_messages())
        .collect();
    assert_eq!(bundles.len(), 2);
    for (bundle, sync_id) in bundles.iter().zip(&sync_ids) {
        let addresses: Vec<&str> = bundle.iter().map(OscMessage::address).collect();
        assert_eq!(addresses, vec!["/d_recv", "/sync"]);
        assert_eq!(bundle[1].arguments[0].as_int(), Some(*sync_id));
    }
    assert!(engine
        .received_datagrams()
        .iter()
        .all(|datagram| datagram.len() <= MAX_DATAGRAM_SIZE));
}
