//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::PrincipalId;
use domain::Theatre;
use metrics_exporter_prometheus::PrometheusHandle;
use seat_store::InMemoryReservationStore;
use serde_json::{Value, json};
use tower::ServiceExt;

use api::Collaborators;
use api::config::Config;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    theatre: Theatre,
    collaborators: Collaborators,
}

async fn setup() -> TestApp {
    let store = InMemoryReservationStore::new();
    let (state, collaborators) =
        api::create_default_state(store.clone(), &Config::default()).unwrap();
    let theatre = api::demo::seed(&store, &collaborators.catalog).await.unwrap();
    let app = api::create_app(state, get_metrics_handle());

    TestApp {
        app,
        theatre,
        collaborators,
    }
}

#[derive(Clone, Copy)]
struct As {
    id: PrincipalId,
    role: &'static str,
}

fn user() -> As {
    As {
        id: PrincipalId::new(),
        role: "user",
    }
}

fn admin() -> As {
    As {
        id: PrincipalId::new(),
        role: "admin",
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        caller: Option<As>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder
                .header("x-principal-id", caller.id.to_string())
                .header("x-principal-role", caller.role);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    fn booking_body(&self, seats: &[&str]) -> Value {
        json!({
            "theatre_id": self.theatre.id().to_string(),
            "movie_id": self.theatre.movie_id().to_string(),
            "seats": seats,
        })
    }

    async fn book(&self, caller: As, seats: &[&str]) -> Value {
        let (status, json) = self
            .send("POST", "/bookings", Some(caller), Some(self.booking_body(seats)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json
    }
}

#[tokio::test]
async fn test_health_check() {
    let t = setup().await;

    let (status, json) = t.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup().await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_seat_map() {
    let t = setup().await;
    t.book(user(), &["A1", "A2"]).await;

    let uri = format!("/theatres/{}/seats", t.theatre.id());
    let (status, json) = t.send("GET", &uri, None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Main Hall");
    assert_eq!(json["rows"].as_array().unwrap().len(), 5);
    assert_eq!(json["claimed"], json!(["A1", "A2"]));
    assert_eq!(json["available"], 48);

    let (status, _) = t
        .send(
            "GET",
            &format!("/theatres/{}/seats", PrincipalId::new()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send("GET", "/theatres/not-a-uuid/seats", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_requires_principal() {
    let t = setup().await;

    let (status, json) = t
        .send("POST", "/bookings", None, Some(t.booking_body(&["A1"])))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_direct_booking_is_paid() {
    let t = setup().await;
    let caller = user();

    let json = t.book(caller, &["B3", "B4"]).await;

    assert_eq!(json["payment_state"], "PAID");
    assert_eq!(json["payment_mode"], "direct");
    assert_eq!(json["seats"], json!(["B3", "B4"]));
    assert_eq!(json["payer_id"], caller.id.to_string());
    assert_eq!(json["amount"], 50_000);
    assert!(
        json["ticket"]
            .as_str()
            .unwrap()
            .starts_with("data:application/json;base64,")
    );
}

#[tokio::test]
async fn test_conflict_names_taken_seats() {
    let t = setup().await;
    t.book(user(), &["A1"]).await;

    let (status, json) = t
        .send(
            "POST",
            "/bookings",
            Some(user()),
            Some(t.booking_body(&["A1", "A2"])),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "SEATS_ALREADY_BOOKED");
    assert_eq!(json["seats"], json!(["A1"]));
}

#[tokio::test]
async fn test_invalid_seat_is_bad_request() {
    let t = setup().await;

    let (status, json) = t
        .send(
            "POST",
            "/bookings",
            Some(user()),
            Some(t.booking_body(&["A1", "Z99"])),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_SEAT");
    assert_eq!(json["seats"], json!(["Z99"]));
}

#[tokio::test]
async fn test_order_then_verify() {
    let t = setup().await;
    let caller = user();

    let (status, json) = t
        .send(
            "POST",
            "/bookings/orders",
            Some(caller),
            Some(t.booking_body(&["C1"])),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["booking"]["payment_state"], "PENDING");
    assert_eq!(json["order"]["currency"], "INR");
    assert_eq!(json["order"]["amount"], 25_000);

    let booking_id = json["booking"]["id"].as_str().unwrap().to_string();
    let order_id = json["order"]["order_id"].as_str().unwrap().to_string();
    let paid = t.collaborators.gateway.complete_payment(&order_id).unwrap();

    let (status, json) = t
        .send(
            "POST",
            "/bookings/verify",
            Some(caller),
            Some(json!({
                "booking_id": booking_id,
                "order_id": paid.order_id,
                "payment_id": paid.payment_id,
                "signature": paid.signature,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["payment_state"], "PAID");
    assert_eq!(json["payment_id"], paid.payment_id);
    assert!(json["ticket"].is_string());
}

#[tokio::test]
async fn test_forged_signature_is_rejected() {
    let t = setup().await;
    let caller = user();

    let (_, json) = t
        .send(
            "POST",
            "/bookings/orders",
            Some(caller),
            Some(t.booking_body(&["C2"])),
        )
        .await;

    let (status, json) = t
        .send(
            "POST",
            "/bookings/verify",
            Some(caller),
            Some(json!({
                "booking_id": json["booking"]["id"],
                "order_id": json["order"]["order_id"],
                "payment_id": "pay_forged",
                "signature": "deadbeef",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "PAYMENT_SIGNATURE_INVALID");
}

#[tokio::test]
async fn test_verify_after_cancel_reports_paid_but_unavailable() {
    let t = setup().await;
    let caller = user();

    let (_, json) = t
        .send(
            "POST",
            "/bookings/orders",
            Some(caller),
            Some(t.booking_body(&["C3", "C4"])),
        )
        .await;
    let booking_id = json["booking"]["id"].as_str().unwrap().to_string();
    let order_id = json["order"]["order_id"].as_str().unwrap().to_string();

    let (status, _) = t
        .send("DELETE", &format!("/bookings/{booking_id}"), Some(caller), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let paid = t.collaborators.gateway.complete_payment(&order_id).unwrap();
    let (status, json) = t
        .send(
            "POST",
            "/bookings/verify",
            Some(caller),
            Some(json!({
                "booking_id": booking_id,
                "order_id": paid.order_id,
                "payment_id": paid.payment_id,
                "signature": paid.signature,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT, "{json}");
    assert_eq!(json["code"], "PAID_BUT_SEATS_UNAVAILABLE");
    assert_eq!(json["seats"], json!(["C3", "C4"]));
}

#[tokio::test]
async fn test_cancel_is_owner_only_and_idempotent() {
    let t = setup().await;
    let owner = user();
    let booking = t.book(owner, &["D5"]).await;
    let uri = format!("/bookings/{}", booking["id"].as_str().unwrap());

    let (status, json) = t.send("DELETE", &uri, Some(user()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");

    let (status, json) = t.send("DELETE", &uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment_state"], "CANCELLED");

    let (status, json) = t.send("DELETE", &uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment_state"], "CANCELLED");

    // D5 is free again
    t.book(user(), &["D5"]).await;
}

#[tokio::test]
async fn test_reassign_is_admin_only() {
    let t = setup().await;
    let owner = user();
    let booking = t.book(owner, &["E1"]).await;
    let uri = format!("/bookings/{}/seats", booking["id"].as_str().unwrap());
    let body = json!({ "seats": ["E2"] });

    let (status, _) = t.send("PUT", &uri, Some(owner), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = t.send("PUT", &uri, Some(admin()), Some(body)).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["seats"], json!(["E2"]));
    assert_eq!(json["payment_state"], "PAID");
}

#[tokio::test]
async fn test_listing_and_history() {
    let t = setup().await;
    let owner = user();
    let booking = t.book(owner, &["A9"]).await;
    t.book(user(), &["A10"]).await;

    let (status, _) = t.send("GET", "/bookings/all", Some(owner), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = t.send("GET", "/bookings/all", Some(admin()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (status, json) = t
        .send(
            "GET",
            &format!("/bookings/user/{}", owner.id),
            Some(owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let id = booking["id"].as_str().unwrap();
    let (status, json) = t
        .send("GET", &format!("/bookings/{id}"), Some(owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id);

    let (status, json) = t
        .send("GET", &format!("/bookings/{id}/history"), Some(owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec!["BookingCreated", "SeatsClaimed", "PaymentSettled", "TicketIssued"]
    );

    let (status, _) = t
        .send(
            "GET",
            &format!("/bookings/{}", PrincipalId::new()),
            Some(owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
