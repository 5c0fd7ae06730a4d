//! Test utilities and common setup.

use std::time::Duration;

use axum::Router;
use axum_test::TestServer;
use strand_server::state::AppState;
use strand_viewdefs::{HotLoader, ViewdefStore};

/// Default per-session idle timeout used by tests; long enough that the
/// idle-sweep loop never fires mid-test.
const TEST_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Builds the router with a fresh, empty `ViewdefStore` and no sessions.
pub fn test_router() -> Router {
    let state = AppState::new(TEST_SESSION_TIMEOUT, ViewdefStore::new());
    strand_server::http::router(state)
}

/// Builds an in-process `TestServer` around a fresh app, ready to drive
/// HTTP and WebSocket scenarios without binding a real socket.
pub fn test_app() -> TestServer {
    TestServer::new(test_router()).expect("failed to build TestServer")
}

/// Like [`test_app`] but with a viewdef template already loaded for
/// `Contact.DEFAULT`, used by the hot-reload and viewdef-delivery scenarios.
pub fn test_app_with_viewdef(dir: &std::path::Path) -> TestServer {
    let viewdefs = ViewdefStore::new();
    viewdefs
        .load_dir(dir)
        .expect("failed to load viewdef fixtures");
    let state = AppState::new(TEST_SESSION_TIMEOUT, viewdefs);
    TestServer::new(strand_server::http::router(state)).expect("failed to build TestServer")
}

/// Like [`test_app_with_viewdef`], but also spawns the filesystem watcher
/// that repushes a viewdef to every session that already received it (spec
/// §4.11, §8 scenario 6). The returned `HotLoader` must be kept alive for
/// the duration of the test — dropping it stops the watch.
pub fn test_app_with_hotloader(dir: &std::path::Path) -> (TestServer, HotLoader) {
    let viewdefs = ViewdefStore::new();
    viewdefs
        .load_dir(dir)
        .expect("failed to load viewdef fixtures");
    let state = AppState::new(TEST_SESSION_TIMEOUT, viewdefs);
    let hotloader = state
        .spawn_viewdef_hotloader(dir.to_path_buf())
        .expect("failed to spawn viewdef hotloader");
    let server = TestServer::new(strand_server::http::router(state)).expect("failed to build TestServer");
    (server, hotloader)
}
