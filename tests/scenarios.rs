//! End-to-end scenarios from spec §8, driven through the public `Bridge`
//! and `default_router` the same way a host would, rather than calling
//! service internals directly.

use app_runtime_core::bridge::Bridge;
use app_runtime_core::message::Message;
use app_runtime_core::routes::default_router;
use bytes::Bytes;
use serde_json::json;

fn bridge_with_routes() -> Bridge {
    let mut bridge = Bridge::for_test();
    bridge.router = default_router();
    bridge
}

#[test]
fn scenario_echo_ping() {
    let bridge = bridge_with_routes();
    let message = Message::parse("ping?seq=1", Bytes::new());
    let result = bridge.dispatch(&message);
    assert_eq!(result.to_wire()["data"], json!("pong"));
    assert_eq!(result.seq, "1");
}

#[test]
fn scenario_fs_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("round-trip.txt");
    let bridge = bridge_with_routes();

    let encoded_path = app_runtime_core::url::encode_uri_component(path.to_str().unwrap());
    let open = Message::parse(&format!("fs.open?seq=1&path={encoded_path}&flags=577&mode=420"), Bytes::new());
    let opened = bridge.dispatch(&open);
    let id = opened.to_wire()["data"]["id"].as_u64().unwrap();

    let write = Message::parse(&format!("fs.write?seq=2&id={id}"), Bytes::from_static(b"hello world"));
    let written = bridge.dispatch(&write);
    assert!(!written.is_err());

    let read = Message::parse(&format!("fs.read?seq=3&id={id}&size=64&offset=0"), Bytes::new());
    let read_result = bridge.dispatch(&read);
    assert!(!read_result.is_err());
    let response_id = read_result.to_wire()["data"]["id"].as_u64().unwrap();
    let queued = bridge.queued_responses.take(response_id).unwrap();
    assert_eq!(&queued.body[..], b"hello world");

    let close = Message::parse(&format!("fs.close?seq=4&id={id}"), Bytes::new());
    assert!(!bridge.dispatch(&close).is_err());
}

#[tokio::test]
async fn scenario_udp_send_recv() {
    let bridge = bridge_with_routes();
    let a = bridge.services.udp.bind("127.0.0.1", 0).await.unwrap();

    // Exercise the route surface for `send`; the raw send/recv round-trip
    // is covered directly against the service in services/udp.rs, since
    // the router has no `udp.recv` route (reads are pushed, not pulled).
    // Without a peer address and no prior connect, send must fail cleanly.
    let send = Message::parse(&format!("udp.send?seq=1&id={a}"), Bytes::from_static(b"hi"));
    let result = bridge.dispatch(&send);
    assert!(result.is_err());
}

#[tokio::test]
async fn scenario_process_timeout_kill() {
    let bridge = bridge_with_routes();
    let spawn = Message::parse("child_process.spawn?seq=1&command=sleep&args=5", Bytes::new());
    let spawned = bridge.dispatch(&spawn);
    let id = spawned.to_wire()["data"]["id"].as_u64().unwrap();

    let kill = Message::parse(&format!("child_process.kill?seq=2&id={id}"), Bytes::new());
    assert!(!bridge.dispatch(&kill).is_err());

    for _ in 0..50 {
        if bridge.services.process.poll_exit(id).await.is_some() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("process was not reaped after kill");
}

#[test]
fn scenario_service_worker_fetch() {
    let bridge = bridge_with_routes();
    let register = Message::parse("serviceWorker.register?seq=1&scheme=app&scope=/&scriptURL=worker.js", Bytes::new());
    let registered = bridge.dispatch(&register);
    assert!(!registered.is_err());

    let fetch = Message::parse(
        "serviceWorker.fetch?seq=2&scheme=app&pathname=/index.html&method=GET&host=app&client=c1",
        Bytes::new(),
    );
    let fetched = bridge.dispatch(&fetch);
    assert!(!fetched.is_err());
    let fetch_id = fetched.to_wire()["data"]["id"].as_u64().unwrap();

    let request = bridge.service_workers.fetch_request(fetch_id).unwrap();
    assert_eq!(request.pathname, "/index.html");

    let complete = Message::parse(
        &format!("serviceWorker.fetch.response?seq=3&id={fetch_id}&statusCode=200"),
        Bytes::from_static(b"<html></html>"),
    );
    let completed = bridge.dispatch(&complete);
    assert!(!completed.is_err());
    assert_eq!(completed.to_wire()["data"]["statusCode"], json!(200));
    assert!(bridge.service_workers.fetch_request(fetch_id).is_none());

    let response_id = completed.to_wire()["data"]["id"].as_u64().unwrap();
    let body = Message::parse(&format!("queuedResponse?seq=4&id={response_id}"), Bytes::new());
    let delivered = bridge.dispatch(&body);
    assert!(!delivered.is_err());
}

#[test]
fn scenario_queued_response_consumed_once() {
    let bridge = bridge_with_routes();
    let queued = app_runtime_core::result::QueuedResponse::octet_stream(bridge.ids.next(), Bytes::from_static(b"payload"));
    let id = queued.id;
    bridge.queued_responses.insert(queued);

    let first = Message::parse(&format!("queuedResponse?seq=1&id={id}"), Bytes::new());
    assert!(!bridge.dispatch(&first).is_err());

    let second = Message::parse(&format!("queuedResponse?seq=2&id={id}"), Bytes::new());
    assert!(bridge.dispatch(&second).is_err());
}

#[tokio::test]
async fn scenario_child_process_exec_timeout_reports_etimedout() {
    let bridge = bridge_with_routes();
    let exec = Message::parse(
        "child_process.exec?seq=1&command=sleep&args=5&timeout=50&killSignal=15",
        Bytes::new(),
    );
    let result = bridge.dispatch(&exec);
    assert!(result.is_err());
    assert_eq!(result.to_wire()["err"]["code"], json!("ETIMEDOUT"));
}

#[test]
fn scenario_window_lifecycle_through_routes() {
    let bridge = bridge_with_routes();
    let create = Message::parse("window.create?seq=1&url=https://example.test&title=Example", Bytes::new());
    let created = bridge.dispatch(&create);
    assert!(!created.is_err());
    let index = created.to_wire()["data"]["index"].as_i64().unwrap() as i32;

    let set_title = Message::parse(&format!("window.setTitle?seq=2&index={index}&title=Renamed"), Bytes::new());
    assert!(!bridge.dispatch(&set_title).is_err());

    let get_title = Message::parse(&format!("window.getTitle?seq=3&index={index}"), Bytes::new());
    let got = bridge.dispatch(&get_title);
    assert_eq!(got.to_wire()["data"]["title"], json!("Renamed"));

    let close = Message::parse(&format!("window.close?seq=4&index={index}"), Bytes::new());
    assert!(!bridge.dispatch(&close).is_err());
}

#[test]
fn scenario_broadcast_channel_subscribe_then_post() {
    let bridge = bridge_with_routes();
    let subscribe = Message::parse("broadcast_channel.subscribe?seq=1&name=updates", Bytes::new());
    assert!(!bridge.dispatch(&subscribe).is_err());

    let post = Message::parse("broadcast_channel.postMessage?seq=2&name=updates", Bytes::new());
    let posted = bridge.dispatch(&post);
    assert!(!posted.is_err());
    assert_eq!(posted.to_wire()["data"]["recipients"], json!([bridge.window_index]));

    let unsubscribe = Message::parse("broadcast_channel.unsubscribe?seq=3&name=updates", Bytes::new());
    assert!(!bridge.dispatch(&unsubscribe).is_err());

    let post_again = Message::parse("broadcast_channel.postMessage?seq=4&name=updates", Bytes::new());
    assert!(bridge.dispatch(&post_again).is_err());
}

#[test]
fn scenario_protocol_register_then_serve_via_queued_data() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), b"<html></html>").unwrap();
    let bridge = bridge_with_routes();

    let root = app_runtime_core::url::encode_uri_component(dir.path().to_str().unwrap());
    let register = Message::parse(&format!("protocol.register?seq=1&scheme=app&root={root}"), Bytes::new());
    assert!(!bridge.dispatch(&register).is_err());

    let set_data = Message::parse("protocol.setData?seq=2&scheme=app&data=%7B%22ready%22%3Atrue%7D", Bytes::new());
    assert!(!bridge.dispatch(&set_data).is_err());

    let get_data = Message::parse("protocol.getData?seq=3&scheme=app", Bytes::new());
    let got = bridge.dispatch(&get_data);
    assert_eq!(got.to_wire()["data"]["data"]["ready"], json!(true));

    let unregister = Message::parse("protocol.unregister?seq=4&scheme=app", Bytes::new());
    assert!(!bridge.dispatch(&unregister).is_err());
}

#[test]
fn scenario_fs_descriptor_retention_survives_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("retained.txt");
    let bridge = bridge_with_routes();
    let encoded_path = app_runtime_core::url::encode_uri_component(path.to_str().unwrap());

    let open = Message::parse(&format!("fs.open?seq=1&path={encoded_path}&flags=577&mode=420"), Bytes::new());
    let opened = bridge.dispatch(&open);
    let id = opened.to_wire()["data"]["id"].as_u64().unwrap();

    let retain = Message::parse(&format!("fs.retainOpenDescriptor?seq=2&id={id}"), Bytes::new());
    assert!(!bridge.dispatch(&retain).is_err());

    let sweep = Message::parse("fs.closeOpenDescriptors?seq=3&preserveRetained=true", Bytes::new());
    let swept = bridge.dispatch(&sweep);
    assert_eq!(swept.to_wire()["data"]["closed"], json!(0));

    let descriptors = Message::parse("fs.getOpenDescriptors?seq=4", Bytes::new());
    let listed = bridge.dispatch(&descriptors);
    let entries = listed.to_wire()["data"]["descriptors"].as_array().unwrap().clone();
    assert!(entries.iter().any(|d| d["id"] == json!(id) && d["retained"] == json!(true)));
}

#[test]
fn invariant_unknown_route_is_not_found_with_matching_seq() {
    let bridge = bridge_with_routes();
    let message = Message::parse("totally.unknown?seq=42", Bytes::new());
    let result = bridge.dispatch(&message);
    assert!(result.is_err());
    assert_eq!(result.seq, "42");
}

#[test]
fn invariant_stream_messages_default_seq_to_minus_one() {
    let message = Message::parse("fs.watch?path=/tmp", Bytes::new());
    assert!(message.is_stream());
}

