// kiosk-server/tests/api_test.rs
use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::StatusCode, test, App};
use chrono::{TimeZone, Utc};
use coin_bridge::discovery::StaticDiscovery;
use coin_bridge::link::SerialConnector;
use coin_bridge::{BridgeSettings, DeviceBridge};
use common::{CoinInserted, Config};
use kiosk_server::recorder::TracingRecorder;
use kiosk_server::KioskServices;
use serde_json::{json, Value};

// A bridge that never reaches the hardware during a test run
fn idle_bridge() -> DeviceBridge {
    let settings = BridgeSettings {
        startup_delay: Duration::from_secs(3600),
        ..BridgeSettings::default()
    };
    DeviceBridge::new(
        settings,
        Box::new(SerialConnector::new(9600)),
        Box::new(StaticDiscovery::default()),
    )
}

fn services() -> KioskServices {
    KioskServices::start(&Config::default(), idle_bridge(), Arc::new(TracingRecorder))
}

fn join_body(session_id: &str) -> Value {
    json!({
        "sessionId": session_id,
        "fileInfo": { "fileName": format!("{}.pdf", session_id), "pageCount": 2 }
    })
}

#[actix_web::test]
async fn test_queue_lifecycle() {
    let services = services();
    let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;

    let req = test::TestRequest::post().uri("/api/queue/join").set_json(join_body("s1")).to_request();
    let s1: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(s1["status"], "ACTIVE");
    assert_eq!(s1["position"], 0);
    assert_eq!(s1["canProceed"], true);

    let req = test::TestRequest::post().uri("/api/queue/join").set_json(join_body("s2")).to_request();
    let s2: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(s2["status"], "WAITING");
    assert_eq!(s2["position"], 1);
    assert_eq!(s2["canProceed"], false);

    // Joining again is idempotent
    let req = test::TestRequest::post().uri("/api/queue/join").set_json(join_body("s2")).to_request();
    let again: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(again["position"], 1);

    let req = test::TestRequest::post()
        .uri("/api/queue/heartbeat")
        .set_json(json!({ "sessionId": "s1" }))
        .to_request();
    let beat: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(beat["status"], "ACTIVE");

    let req = test::TestRequest::post()
        .uri("/api/queue/complete")
        .set_json(json!({ "sessionId": "s1" }))
        .to_request();
    let done: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(done["success"], true);

    let req = test::TestRequest::get().uri("/api/queue/status/s2").to_request();
    let s2: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(s2["status"], "ACTIVE");
    assert_eq!(s2["canProceed"], true);

    let req = test::TestRequest::get().uri("/api/queue/status/s1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "NOT_FOUND");

    let req = test::TestRequest::get().uri("/api/queue/info").to_request();
    let info: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(info["activeSession"], "s2");
    assert_eq!(info["queueLength"], 0);
    assert_eq!(info["totalSessions"], 1);
}

#[actix_web::test]
async fn test_queue_full_returns_429() {
    let services = services();
    let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;

    for i in 0..=10 {
        let req = test::TestRequest::post()
            .uri("/api/queue/join")
            .set_json(join_body(&format!("s{}", i)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = test::TestRequest::post().uri("/api/queue/join").set_json(join_body("s11")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "QUEUE_FULL");

    // Leaving frees a place
    let req = test::TestRequest::post()
        .uri("/api/queue/leave")
        .set_json(json!({ "sessionId": "s5" }))
        .to_request();
    let left: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(left["success"], true);

    let req = test::TestRequest::post().uri("/api/queue/join").set_json(join_body("s11")).to_request();
    let s11: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(s11["status"], "WAITING");
    assert_eq!(s11["position"], 10);
}

#[actix_web::test]
async fn test_empty_session_id_is_rejected() {
    let services = services();
    let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;

    let req = test::TestRequest::post().uri("/api/queue/join").set_json(join_body("")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_claim_and_authorize() {
    let services = services();
    let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;

    let req = test::TestRequest::get().uri("/api/coins/last").to_request();
    let last: Value = test::call_and_read_body_json(&app, req).await;
    assert!(last.is_null());

    let req = test::TestRequest::post().uri("/api/queue/join").set_json(join_body("s1")).to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/payment/authorize")
        .set_json(json!({ "sessionId": "s1" }))
        .to_request();
    let decision: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(decision["decision"], "NO_COIN");

    services
        .ledger
        .send(CoinInserted {
            value: 10,
            coin_type: "10".to_string(),
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        })
        .await
        .unwrap();

    let req = test::TestRequest::get().uri("/api/coins/last").to_request();
    let last: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(last["value"], 10);
    assert_eq!(last["timestamp"], 1_700_000_000_000i64);

    let req = test::TestRequest::get().uri("/api/coins/claim/1700000000000/10").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/coins/claim")
        .set_json(json!({ "timestamp": 1_700_000_000_000i64, "value": 10, "sessionId": "s1" }))
        .to_request();
    let claimed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(claimed["success"], true);

    let req = test::TestRequest::get().uri("/api/coins/claim/1700000000000/10").to_request();
    let claim: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(claim["sessionId"], "s1");

    let req = test::TestRequest::post()
        .uri("/api/payment/authorize")
        .set_json(json!({ "sessionId": "s1" }))
        .to_request();
    let decision: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(decision["decision"], "AUTHORIZED");
    assert_eq!(decision["coin"]["value"], 10);

    let req = test::TestRequest::post()
        .uri("/api/payment/authorize")
        .set_json(json!({ "sessionId": "someone-else" }))
        .to_request();
    let decision: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(decision["decision"], "NOT_ACTIVE");
}

#[actix_web::test]
async fn test_device_endpoints_without_hardware() {
    let services = services();
    let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;

    let req = test::TestRequest::get().uri("/api/device/status").to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["connected"], false);
    assert_eq!(status["state"], "DISCONNECTED");
    assert_eq!(status["failed"], false);

    let req = test::TestRequest::post()
        .uri("/api/device/command")
        .set_json(json!({ "command": "ENABLE_COINS" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let req = test::TestRequest::post()
        .uri("/api/device/command")
        .set_json(json!({ "command": "SELF_DESTRUCT" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
