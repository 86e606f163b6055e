use std::time::Duration;

use synthctl_client::{CaptureDirection, ServerError};
use synthctl_shared::{
    BufferRequest, BusRequest, CalculationRate, ControlBusSetNInfo, GroupRequest, OscArgument,
    Response, ServerRequest, SynthDefRequest,
};
use synthctl_test::{connected_pair, init_logging, wait_until};

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn buffers_are_allocated_on_the_engine() {
    init_logging();
    let (engine, server) = connected_pair(57500, 1);

    let first = server.add_buffer(1024, 2).unwrap();
    let second = server.add_buffer(512, 1).unwrap();
    assert_eq!(first, 0);
    assert_eq!(second, 1);
    assert!(engine.has_buffer(first));

    server.free_buffer(first).unwrap();
    server.sync().unwrap();
    assert!(!engine.has_buffer(first));
    assert_eq!(server.add_buffer(64, 1).unwrap(), first);

    assert_eq!(
        server.free_buffer(900),
        Err(ServerError::UnknownResource { kind: "buffer", id: 900 })
    );
}

#[test]
fn unanswered_buffer_allocation_keeps_its_id() {
    init_logging();
    let (engine, server) = connected_pair(57501, 1);
    server.sync().unwrap();
    engine.set_muted(true);

    let result = server.add_buffer(1024, 1);
    assert!(result.is_ok());
    // a timeout is only logged; the reservation stands
    engine.set_muted(false);
    assert_eq!(server.add_buffer(1024, 1).unwrap(), 1);
}

#[test]
fn control_buses_round_trip_through_the_engine() {
    init_logging();
    let (engine, server) = connected_pair(57502, 1);

    let group = server.add_bus_group(CalculationRate::Control, 4).unwrap();
    assert_eq!(group.bus_id, 0);
    assert_eq!(group.count, 4);
    let audio = server.add_bus_group(CalculationRate::Audio, 2).unwrap();
    assert_eq!(audio.bus_id, 16);

    server
        .set_control_buses(vec![(group.bus_id, 0.5), (group.bus_id + 1, 0.75)])
        .unwrap();
    let values = server
        .get_control_buses(vec![group.bus_id, group.bus_id + 1])
        .unwrap()
        .unwrap();
    assert_eq!(values, vec![(0, 0.5), (1, 0.75)]);
    assert_eq!(engine.control_bus(1), Some(0.75));

    server.free_bus_group(CalculationRate::Control, group.bus_id).unwrap();
    assert!(server.free_bus_group(CalculationRate::Control, group.bus_id).is_err());
    assert_eq!(server.add_bus_group(CalculationRate::Control, 2).unwrap().bus_id, 0);
}

#[test]
fn bus_ranges_round_trip_through_the_engine() {
    init_logging();
    let (engine, server) = connected_pair(57508, 1);
    let group = server.add_bus_group(CalculationRate::Control, 4).unwrap();

    server
        .send(BusRequest::ControlSetN {
            items: vec![(group.bus_id + 1, vec![0.25, 0.5, 0.75])],
        })
        .unwrap();
    let reply = server
        .communicate(
            BusRequest::ControlGetN {
                items: vec![(group.bus_id, 4)],
            },
            None,
        )
        .unwrap();
    assert_eq!(
        reply,
        Some(Response::ControlBusSetN(ControlBusSetNInfo {
            items: vec![(group.bus_id, vec![0.0, 0.25, 0.5, 0.75])],
        }))
    );
    assert_eq!(engine.control_bus(group.bus_id + 3), Some(0.75));
}

#[test]
fn all_synthdefs_can_be_freed_at_once() {
    init_logging();
    let (engine, server) = connected_pair(57509, 1);
    server.send_synthdef(vec![1, 2, 3]).unwrap();
    server.send_synthdef(vec![4, 5, 6]).unwrap();
    assert_eq!(engine.synthdef_count(), 2);

    server.send(SynthDefRequest::FreeAll).unwrap();
    server.sync().unwrap();
    assert_eq!(engine.synthdef_count(), 0);
}

#[test]
fn synthdef_upload_waits_for_done() {
    init_logging();
    let (engine, server) = connected_pair(57503, 1);
    let reply = server.send_synthdef(vec![0x53, 0x43, 0x67, 0x66]).unwrap();
    match reply {
        Some(Response::Done(done)) => assert_eq!(done.command, "/d_recv"),
        other => panic!("expected /done /d_recv, got {:?}", other),
    }
    assert_eq!(engine.synthdef_count(), 1);
}

#[test]
fn completion_messages_run_after_their_command() {
    init_logging();
    let (engine, server) = connected_pair(57504, 1);
    let request = BufferRequest::Allocate {
        buffer_id: 7,
        frame_count: 32,
        channel_count: 1,
        completion: Some(Box::new(
            BufferRequest::Zero {
                buffer_id: 7,
                completion: None,
            }
            .into(),
        )),
    };
    let reply = server.communicate(request, None).unwrap();
    assert!(matches!(reply, Some(Response::Done(_))));
    server.sync().unwrap();
    let addresses: Vec<String> = engine
        .received_messages()
        .into_iter()
        .map(|message| message.address)
        .filter(|address| address.starts_with("/b_"))
        .collect();
    assert_eq!(addresses, vec!["/b_alloc", "/b_zero"]);
}

#[test]
fn unanswered_request_yields_none() {
    init_logging();
    let (engine, server) = connected_pair(57505, 1);
    server.sync().unwrap();
    engine.set_muted(true);
    let reply = server
        .communicate(ServerRequest::Version, Some(Duration::from_millis(50)))
        .unwrap();
    assert!(reply.is_none());

    engine.set_muted(false);
    let reply = server.communicate(ServerRequest::Version, None).unwrap();
    assert!(matches!(reply, Some(Response::Version(_))));
}

#[test]
fn query_tree_failure_is_reported() {
    init_logging();
    let (_engine, server) = connected_pair(57506, 1);
    let reply = server
        .communicate(GroupRequest::QueryTree { group_id: 9999, include_controls: false }, None)
        .unwrap();
    assert!(matches!(reply, Some(Response::Fail(_))));
}

#[test]
fn capture_records_both_directions() {
    init_logging();
    let (_engine, server) = connected_pair(57507, 1);
    let capture = server.capture();
    server.sync().unwrap();

    let sent: Vec<String> = capture
        .sent_messages()
        .into_iter()
        .map(|message| message.address)
        .collect();
    assert_eq!(sent, vec!["/sync"]);
    assert!(wait_until(WAIT, || capture
        .messages(CaptureDirection::Received)
        .iter()
        .any(|message| message.address == "/synced"
            && message.arguments.first().and_then(OscArgument::as_int).is_some())));

    drop(capture);
    let later = server.capture();
    assert!(later.entries().is_empty());
}
