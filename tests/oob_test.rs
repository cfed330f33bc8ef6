//! Tests for the OOB callback listener

mod common;

use std::net::SocketAddr;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zuulscan::oob::{self, CallbackListener};
use zuulscan::scanner::ActiveProbe;

async fn local_listener() -> CallbackListener {
    CallbackListener::start(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("listener")
}

#[tokio::test]
async fn test_callback_url_format() {
    let listener = local_listener().await;
    let port = listener.local_addr().port();

    let url = listener.callback_url("10.0.0.1", "abc123def456");
    assert_eq!(url, format!("http://10.0.0.1:{port}/callback/abc123def456"));
}

#[tokio::test]
async fn test_callback_fires_registered_signal() {
    let listener = local_listener().await;
    let scan_id = oob::generate_id();
    let mut signal = listener.register(&scan_id).await.expect("register");
    assert!(!signal.try_receive());

    let url = listener.callback_url("127.0.0.1", &scan_id);
    let res = reqwest::get(&url).await.expect("callback request");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.expect("body"), "ok");

    assert!(signal.try_receive(), "callback should notify the scan");
}

#[tokio::test]
async fn test_unknown_scan_id_is_not_found() {
    let listener = local_listener().await;
    let mut signal = listener.register("known000000").await.expect("register");

    let res = reqwest::get(listener.callback_url("127.0.0.1", "unknown00000"))
        .await
        .expect("request");
    assert_eq!(res.status(), 404);

    let port = listener.local_addr().port();
    let res = reqwest::get(format!("http://127.0.0.1:{port}/known000000"))
        .await
        .expect("request");
    assert_eq!(res.status(), 404);

    assert!(!signal.try_receive());
}

#[tokio::test]
async fn test_unregistered_scan_ignored() {
    let listener = local_listener().await;
    let mut signal = listener.register("gone00000000").await.expect("register");
    listener.unregister("gone00000000").await;

    let res = reqwest::get(listener.callback_url("127.0.0.1", "gone00000000"))
        .await
        .expect("request");
    assert_eq!(res.status(), 404);
    assert!(!signal.try_receive());
}

#[tokio::test]
async fn test_received_callback_confirms_active_scan() {
    let target = MockServer::start().await;
    let listener = local_listener().await;
    let scan_id = oob::generate_id();
    let mut signal = listener.register(&scan_id).await.expect("register");
    let callback_url = listener.callback_url("127.0.0.1", &scan_id);

    Mock::given(method("GET"))
        .and(path("/admin/filterLoader.jsp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::registry_page(1)))
        .mount(&target)
        .await;

    Mock::given(method("POST"))
        .and(path("/admin/scriptmanager"))
        .and(query_param("action", "UPLOAD"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/admin/filterLoader.jsp"))
        .expect(1)
        .mount(&target)
        .await;

    // The uploaded filter runs on the target and calls back before the race point.
    reqwest::get(&callback_url).await.expect("callback");

    let rs = ActiveProbe::new(common::test_client())
        .scan(&target.uri(), &callback_url, Some(&mut signal))
        .await
        .expect("scan");

    assert!(rs.vulnerable);
    assert!(!rs.prev_enabled && !rs.admin_disabled && !rs.might_vulnerable);
}
