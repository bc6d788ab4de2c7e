//! HTTP API server with observability for the seat booking engine.
//!
//! Provides REST endpoints for reserving seats, confirming payments,
//! cancelling and reassigning bookings, with structured logging (tracing)
//! and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod demo;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use reservation::{
    DataUrlRenderer, InMemoryCatalog, InMemoryPaymentGateway, PaymentSignatureVerifier,
    ReservationCoordinator, ReservationError, TicketIssuer,
};
use seat_store::ReservationStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::{AppState, SharedState};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: ReservationStore + Clone + 'static>(
    state: SharedState<S>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/theatres/{id}/seats", get(routes::theatres::seat_map::<S>))
        .route("/bookings", post(routes::bookings::create::<S>))
        .route("/bookings/orders", post(routes::bookings::create_order::<S>))
        .route("/bookings/verify", post(routes::bookings::verify::<S>))
        .route("/bookings/all", get(routes::bookings::list_all::<S>))
        .route(
            "/bookings/user/{payer_id}",
            get(routes::bookings::list_for_payer::<S>),
        )
        .route(
            "/bookings/{id}",
            get(routes::bookings::get::<S>).delete(routes::bookings::cancel::<S>),
        )
        .route("/bookings/{id}/history", get(routes::bookings::history::<S>))
        .route(
            "/bookings/{id}/seats",
            put(routes::bookings::reassign_seats::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// In-memory collaborators wired into the default state.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: InMemoryCatalog,
    pub gateway: InMemoryPaymentGateway,
    pub renderer: DataUrlRenderer,
}

/// Creates the default application state with the given store and
/// in-memory catalog, gateway and renderer.
pub fn create_default_state<S: ReservationStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Result<(SharedState<S>, Collaborators), ReservationError> {
    let verifier = PaymentSignatureVerifier::new(&config.payment_secret)?;
    let catalog = InMemoryCatalog::new();
    let gateway = InMemoryPaymentGateway::new(verifier.clone());
    let renderer = DataUrlRenderer::new();

    let issuer = TicketIssuer::new(Arc::new(catalog.clone()), Arc::new(renderer.clone()));
    let coordinator = ReservationCoordinator::new(
        store,
        Arc::new(gateway.clone()),
        verifier,
        issuer,
        config.policy(),
    );

    let state = Arc::new(AppState { coordinator });
    Ok((
        state,
        Collaborators {
            catalog,
            gateway,
            renderer,
        },
    ))
}
