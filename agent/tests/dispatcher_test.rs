//! HTTP dispatcher tests against a mock clinic API.

use std::time::Duration;

use clinic_sync_agent::dispatcher::{DispatchError, Dispatcher, HttpDispatcher};
use clinic_sync_agent::session::BearerToken;
use clinic_sync_engine::{
    plan_request, Collection, CreateMutation, DeleteMutation, Envelope, PayloadEncoding,
    RequestPlan, UpdateMutation,
};
use reqwest::Url;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dispatcher(server: &MockServer) -> HttpDispatcher {
    let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
    HttpDispatcher::new(base, Duration::from_secs(5)).unwrap()
}

fn token() -> BearerToken {
    BearerToken::new("test-token").unwrap()
}

fn create_plan(
    collection: Collection,
    endpoint: &str,
    payload: serde_json::Value,
    encoding: PayloadEncoding,
) -> RequestPlan {
    let envelope = CreateMutation::new(collection, endpoint, payload, encoding)
        .into_envelope("local-1", 1706745600000)
        .unwrap();
    plan_request(&envelope).unwrap()
}

fn clean(collection: Collection, value: serde_json::Value) -> Envelope {
    Envelope::clean(collection, value, 1706745600000).unwrap()
}

// ── JSON ────────────────────────────────────────────────────────

#[tokio::test]
async fn create_posts_json_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/supplier/create-supplier"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({"name": "Acme"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let plan = create_plan(
        Collection::Suppliers,
        "supplier/create-supplier",
        json!({"name": "Acme", "syncState": "pendingCreate", "note": null}),
        PayloadEncoding::Json,
    );

    dispatcher(&server).dispatch(&plan, &token()).await.unwrap();
}

#[tokio::test]
async fn update_puts_to_record_path() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/patient/p-1"))
        .and(body_json(json!({"name": "A", "phone": "555"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut envelope = clean(Collection::Patients, json!({"_id": "p-1", "name": "A"}));
    UpdateMutation::new(
        Collection::Patients,
        "/patient/",
        "p-1",
        json!({"phone": "555"}),
        PayloadEncoding::Json,
    )
    .apply(&mut envelope, 1706745601000)
    .unwrap();

    let plan = plan_request(&envelope).unwrap();
    dispatcher(&server).dispatch(&plan, &token()).await.unwrap();
}

#[tokio::test]
async fn delete_is_a_put_with_the_stored_record() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/invoice/inv-1"))
        .and(body_json(json!({"total": 10})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut envelope = clean(Collection::Invoices, json!({"_id": "inv-1", "total": 10}));
    DeleteMutation::new(Collection::Invoices, "invoice", "inv-1")
        .apply(&mut envelope, 1706745601000)
        .unwrap();

    let plan = plan_request(&envelope).unwrap();
    dispatcher(&server).dispatch(&plan, &token()).await.unwrap();
}

// ── Multipart ───────────────────────────────────────────────────

#[tokio::test]
async fn multipart_body_is_flattened() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/prescription/create"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains("name=\"items[0][drug]\""))
        .and(body_string_contains("name=\"tags\""))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let plan = create_plan(
        Collection::Prescriptions,
        "prescription/create",
        json!({"items": [{"drug": "Amoxicillin", "qty": 2}], "tags": ["a", "b"]}),
        PayloadEncoding::Multipart,
    );

    dispatcher(&server).dispatch(&plan, &token()).await.unwrap();
}

// ── Failures ────────────────────────────────────────────────────

#[tokio::test]
async fn server_error_is_status_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&server)
        .await;

    let plan = create_plan(
        Collection::Clinics,
        "clinic/create",
        json!({"name": "North"}),
        PayloadEncoding::Json,
    );

    let err = dispatcher(&server).dispatch(&plan, &token()).await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::Status {
            status: 500,
            body: "database down".to_string(),
        }
    );
}

#[tokio::test]
async fn client_error_is_also_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let plan = create_plan(
        Collection::Doctors,
        "doctor/create",
        json!({"name": "Dr. A"}),
        PayloadEncoding::Json,
    );

    let err = dispatcher(&server).dispatch(&plan, &token()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Status { status: 422, .. }));
}

#[tokio::test]
async fn endpoint_outside_base_is_never_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    for endpoint in ["foo:bar", "../admin/create"] {
        let plan = create_plan(
            Collection::Users,
            endpoint,
            json!({"email": "a@example.com"}),
            PayloadEncoding::Json,
        );
        let err = dispatcher(&server).dispatch(&plan, &token()).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidUrl(_)), "{endpoint}: {err:?}");
    }
}

#[tokio::test]
async fn unreachable_server_is_transport_failure() {
    let server = MockServer::start().await;
    let dispatcher = dispatcher(&server);
    drop(server);

    let plan = create_plan(
        Collection::Users,
        "user/create",
        json!({"email": "a@example.com"}),
        PayloadEncoding::Json,
    );

    let err = dispatcher.dispatch(&plan, &token()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Transport(_)));
}
