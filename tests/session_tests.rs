//! End-to-end scenarios against a real session over HTTP + WebSocket,
//! driven through `axum-test` (spec §8).

mod common;

use std::time::Duration;

use serde_json::{Value, json};
use tempfile::tempdir;

use common::{test_app, test_app_with_hotloader, test_app_with_viewdef};

/// Connects to `/ws/{id}` and returns the live socket.
async fn connect(server: &axum_test::TestServer, session_id: &str) -> axum_test::TestWebSocket {
    server
        .get_websocket(&format!("/ws/{session_id}"))
        .await
        .into_websocket()
        .await
}

async fn recv_json(ws: &mut axum_test::TestWebSocket) -> Value {
    let raw = ws.receive_text().await.to_string();
    serde_json::from_str(&raw).unwrap_or_else(|err| panic!("not JSON: {raw} ({err})"))
}

/// Pulls the `"type":"update"` entries out of a decoded frame, which is
/// either a single object or a batch array.
fn updates_for(frame: &Value, var_id: i64) -> Vec<Value> {
    let entries: Vec<&Value> = match frame {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    entries
        .into_iter()
        .filter(|m| m["type"] == "update" && m["data"]["varId"] == var_id)
        .cloned()
        .collect()
}

/// New session + root (spec §8 scenario 1): `GET /` vends a session and
/// redirects to its variable browser; watching variable 1 over the socket
/// gets back its type and (when one is registered) its viewdef HTML.
#[tokio::test]
async fn new_session_bootstraps_the_root_variable() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("App.DEFAULT.html"), "<div>app</div>").unwrap();
    let server = test_app_with_viewdef(dir.path());

    let redirect = server.get("/").await;
    assert_eq!(redirect.status_code(), axum::http::StatusCode::TEMPORARY_REDIRECT);
    let location = redirect
        .headers()
        .get(axum::http::header::LOCATION)
        .expect("redirect carries a Location header")
        .to_str()
        .unwrap()
        .to_string();
    let session_id = location
        .strip_prefix('/')
        .and_then(|rest| rest.strip_suffix("/variables"))
        .expect("Location points at /{id}/variables")
        .to_string();

    let mut ws = connect(&server, &session_id).await;
    ws.send_text(json!({"type": "watch", "data": {"varId": 1}}).to_string())
        .await;

    let frame = recv_json(&mut ws).await;
    let updates = updates_for(&frame, 1);
    assert_eq!(updates.len(), 1, "expected exactly one update for the root variable");
    let props = &updates[0]["data"]["properties"];
    assert_eq!(props["type"], "App");
    let viewdefs: Value = serde_json::from_str(props["viewdefs"].as_str().unwrap()).unwrap();
    assert!(viewdefs.get("App.DEFAULT").is_some());
}

/// Path child (spec §8 scenario 2): a client-vended variable bound to
/// `contacts` resolves against the root's current value on creation.
#[tokio::test]
async fn creating_a_child_bound_to_a_path_resolves_its_value() {
    let server = test_app();
    let redirect = server.get("/").await;
    let location = redirect
        .headers()
        .get(axum::http::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let session_id = location.strip_prefix('/').unwrap().strip_suffix("/variables").unwrap();

    let mut ws = connect(&server, session_id).await;
    ws.send_text(
        json!({
            "type": "create",
            "data": {"id": 7, "parentId": 1, "properties": {"path": "contacts"}},
        })
        .to_string(),
    )
    .await;

    let frame = recv_json(&mut ws).await;
    let updates = updates_for(&frame, 7);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["data"]["value"], json!([]));
}

/// ViewList expansion (spec §8 scenario 3): growing and shrinking the
/// backing array produces one update each time with the new element count.
#[tokio::test]
async fn view_list_tracks_array_growth_and_shrinkage() {
    let server = test_app();
    let redirect = server.get("/").await;
    let location = redirect
        .headers()
        .get(axum::http::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let session_id = location.strip_prefix('/').unwrap().strip_suffix("/variables").unwrap();

    let mut ws = connect(&server, session_id).await;

    // A plain binding to "contacts" we mutate directly, plus a ViewList
    // wrapper over the same path so its sync algorithm has something to track.
    ws.send_text(
        json!({"type": "create", "data": {"id": 7, "parentId": 1, "properties": {"path": "contacts"}}})
            .to_string(),
    )
    .await;
    recv_json(&mut ws).await;

    ws.send_text(
        json!({
            "type": "create",
            "data": {
                "id": 9,
                "parentId": 1,
                "properties": {"path": "contacts", "wrapper": "ViewList", "item": "ContactName"},
            },
        })
        .to_string(),
    )
    .await;
    let frame = recv_json(&mut ws).await;
    let updates = updates_for(&frame, 9);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["data"]["value"].as_array().unwrap().len(), 0);

    ws.send_text(
        json!({"type": "update", "data": {"varId": 7, "value": ["alice", "bob", "carol"]}})
            .to_string(),
    )
    .await;
    let frame = recv_json(&mut ws).await;
    let grown = updates_for(&frame, 9);
    assert_eq!(grown.len(), 1);
    assert_eq!(grown[0]["data"]["value"].as_array().unwrap().len(), 3);

    ws.send_text(
        json!({"type": "update", "data": {"varId": 7, "value": ["alice", "bob"]}}).to_string(),
    )
    .await;
    let frame = recv_json(&mut ws).await;
    let shrunk = updates_for(&frame, 9);
    assert_eq!(shrunk.len(), 1);
    assert_eq!(shrunk[0]["data"]["value"].as_array().unwrap().len(), 2);
}

/// Debounced coalescing (spec §8 scenario 4): three mutations of the same
/// variable inside one debounce window reach the wire as a single update.
#[tokio::test]
async fn rapid_updates_within_the_debounce_window_coalesce() {
    let server = test_app();
    let redirect = server.get("/").await;
    let location = redirect
        .headers()
        .get(axum::http::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let session_id = location.strip_prefix('/').unwrap().strip_suffix("/variables").unwrap();

    let mut ws = connect(&server, session_id).await;
    ws.send_text(
        json!({"type": "create", "data": {"id": 7, "parentId": 1, "properties": {"path": "contacts"}}})
            .to_string(),
    )
    .await;
    recv_json(&mut ws).await;

    for value in [json!(["a"]), json!(["a", "b"]), json!(["a", "b", "c"])] {
        ws.send_text(json!({"type": "update", "data": {"varId": 7, "value": value}}).to_string())
            .await;
    }

    let frame = recv_json(&mut ws).await;
    let updates = updates_for(&frame, 7);
    assert_eq!(updates.len(), 1, "three mutations of one variable must coalesce into one update");
    assert_eq!(updates[0]["data"]["value"], json!(["a", "b", "c"]));
}

/// User-event immediate flush (spec §8 scenario 5): a batch frame carrying
/// the `userEvent` sentinel flushes before the debounce window elapses.
#[tokio::test]
async fn user_event_frame_flushes_immediately() {
    let server = test_app();
    let redirect = server.get("/").await;
    let location = redirect
        .headers()
        .get(axum::http::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let session_id = location.strip_prefix('/').unwrap().strip_suffix("/variables").unwrap();

    let mut ws = connect(&server, session_id).await;
    ws.send_text(
        json!({"type": "create", "data": {"id": 7, "parentId": 1, "properties": {"path": "contacts"}}})
            .to_string(),
    )
    .await;
    recv_json(&mut ws).await;

    ws.send_text(
        json!([
            {"userEvent": true},
            {"type": "update", "data": {"varId": 7, "value": ["alice"]}},
        ])
        .to_string(),
    )
    .await;

    let frame = tokio::time::timeout(Duration::from_millis(5), recv_json(&mut ws))
        .await
        .expect("a user-event frame must flush well before the 10ms debounce window fires");
    let updates = updates_for(&frame, 7);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["data"]["value"], json!(["alice"]));
}

/// Viewdef hot-reload (spec §8 scenario 6): once a session has received a
/// type's viewdef HTML, an on-disk change to that template is repushed to it
/// without the session asking again.
#[tokio::test]
async fn viewdef_hot_reload_is_repushed_to_sessions_that_already_received_it() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("App.DEFAULT.html");
    std::fs::write(&path, "<div>v1</div>").unwrap();
    let (server, _hotloader) = test_app_with_hotloader(dir.path());

    let redirect = server.get("/").await;
    let location = redirect
        .headers()
        .get(axum::http::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let session_id = location.strip_prefix('/').unwrap().strip_suffix("/variables").unwrap();

    let mut ws = connect(&server, session_id).await;
    ws.send_text(json!({"type": "watch", "data": {"varId": 1}}).to_string())
        .await;
    let frame = recv_json(&mut ws).await;
    let initial = updates_for(&frame, 1);
    let initial_viewdefs: Value =
        serde_json::from_str(initial[0]["data"]["properties"]["viewdefs"].as_str().unwrap())
            .unwrap();
    assert_eq!(initial_viewdefs["App.DEFAULT"], "<div>v1</div>");

    std::fs::write(&path, "<div>v2</div>").unwrap();

    // The hotloader's filesystem watcher runs on its own background thread;
    // give it a moment to notice the change and fan the reload out.
    let frame = tokio::time::timeout(Duration::from_secs(5), recv_json(&mut ws))
        .await
        .expect("expected a reload push after the viewdef file changed");
    let reload = updates_for(&frame, 1);
    assert_eq!(reload.len(), 1);
    let reloaded_viewdefs: Value =
        serde_json::from_str(reload[0]["data"]["properties"]["viewdefs"].as_str().unwrap())
            .unwrap();
    assert_eq!(reloaded_viewdefs["App.DEFAULT"], "<div>v2</div>");
}
