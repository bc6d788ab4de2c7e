//! Booking endpoints: reserve, pay, settle, cancel, reassign and list.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{BookingId, MovieId, PrincipalId, TheatreId};
use domain::{Aggregate, Booking, BookingEvent, PaymentMode};
use reservation::{OrderHandle, ReserveRequest, SettleRequest};
use seat_store::ReservationStore;
use serde::{Deserialize, Serialize};

use super::{SharedState, parse_id};
use crate::auth::Caller;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub theatre_id: String,
    pub movie_id: String,
    pub seats: Vec<String>,
}

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    pub booking_id: String,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Deserialize)]
pub struct ReassignSeatsRequest {
    pub seats: Vec<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct BookingResponse {
    pub id: String,
    pub payer_id: String,
    pub theatre_id: String,
    pub movie_id: String,
    pub seats: Vec<String>,
    pub payment_mode: String,
    pub payment_state: String,
    pub amount: i64,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub ticket: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub version: i64,
}

impl From<&Booking> for BookingResponse {
    fn from(booking: &Booking) -> Self {
        let payment = booking.payment_ref();
        Self {
            id: booking.id().to_string(),
            payer_id: booking.payer_id().to_string(),
            theatre_id: booking.theatre_id().to_string(),
            movie_id: booking.movie_id().to_string(),
            seats: booking.seats().to_strings(),
            payment_mode: booking.payment_mode().as_str().to_string(),
            payment_state: booking.payment_state().as_str().to_string(),
            amount: booking.amount().minor_units(),
            order_id: payment.map(|p| p.order_id.clone()),
            payment_id: payment.and_then(|p| p.payment_id.clone()),
            ticket: booking.ticket().map(|t| t.as_str().to_string()),
            failure_reason: booking.failure_reason().map(String::from),
            created_at: booking.created_at().to_rfc3339(),
            version: booking.version().as_i64(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order: OrderHandle,
    pub booking: BookingResponse,
}

/// Response type for recorded booking events.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub booking_id: String,
    pub version: i64,
    pub recorded_at: String,
    pub payload: BookingEvent,
}

// -- Handlers --

/// POST /bookings: book seats and pay immediately.
#[tracing::instrument(skip(state, req), fields(principal_id = %principal.id))]
pub async fn create<S: ReservationStore + Clone + 'static>(
    State(state): State<SharedState<S>>,
    Caller(principal): Caller,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let request = reserve_request(req, PaymentMode::Direct)?;
    let reservation = state.coordinator.reserve(&principal, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::from(&reservation.booking)),
    ))
}

/// POST /bookings/orders: book seats pending payment and create a gateway order.
#[tracing::instrument(skip(state, req), fields(principal_id = %principal.id))]
pub async fn create_order<S: ReservationStore + Clone + 'static>(
    State(state): State<SharedState<S>>,
    Caller(principal): Caller,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let request = reserve_request(req, PaymentMode::Deferred)?;
    let reservation = state.coordinator.reserve(&principal, request).await?;

    let order = reservation.order.ok_or_else(|| {
        ApiError::Reservation(reservation::ReservationError::InvalidState(
            "deferred booking has no payment order".to_string(),
        ))
    })?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            order,
            booking: BookingResponse::from(&reservation.booking),
        }),
    ))
}

/// POST /bookings/verify: confirm payment for a pending booking.
#[tracing::instrument(skip(state, req), fields(principal_id = %principal.id))]
pub async fn verify<S: ReservationStore + Clone + 'static>(
    State(state): State<SharedState<S>>,
    Caller(principal): Caller,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id: BookingId = parse_id(&req.booking_id, "booking")?;

    // Only the payer (or an admin) may confirm a booking's payment
    state.coordinator.get_booking(&principal, booking_id).await?;

    let booking = state
        .coordinator
        .settle(SettleRequest {
            booking_id,
            order_id: req.order_id,
            payment_id: req.payment_id,
            signature: req.signature,
        })
        .await?;

    Ok(Json(BookingResponse::from(&booking)))
}

/// GET /bookings/all: every booking (admin only).
#[tracing::instrument(skip(state), fields(principal_id = %principal.id))]
pub async fn list_all<S: ReservationStore + Clone + 'static>(
    State(state): State<SharedState<S>>,
    Caller(principal): Caller,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = state.coordinator.all_bookings(&principal).await?;
    Ok(Json(bookings.iter().map(BookingResponse::from).collect()))
}

/// GET /bookings/user/:payer_id: bookings paid for by one user.
#[tracing::instrument(skip(state), fields(principal_id = %principal.id))]
pub async fn list_for_payer<S: ReservationStore + Clone + 'static>(
    State(state): State<SharedState<S>>,
    Caller(principal): Caller,
    Path(payer_id): Path<String>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let payer_id: PrincipalId = parse_id(&payer_id, "user")?;
    let bookings = state
        .coordinator
        .bookings_for_payer(&principal, payer_id)
        .await?;
    Ok(Json(bookings.iter().map(BookingResponse::from).collect()))
}

/// GET /bookings/:id: one booking.
#[tracing::instrument(skip(state), fields(principal_id = %principal.id))]
pub async fn get<S: ReservationStore + Clone + 'static>(
    State(state): State<SharedState<S>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id: BookingId = parse_id(&id, "booking")?;
    let booking = state.coordinator.get_booking(&principal, booking_id).await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// GET /bookings/:id/history: recorded events of a booking.
#[tracing::instrument(skip(state), fields(principal_id = %principal.id))]
pub async fn history<S: ReservationStore + Clone + 'static>(
    State(state): State<SharedState<S>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let booking_id: BookingId = parse_id(&id, "booking")?;
    let envelopes = state
        .coordinator
        .booking_history(&principal, booking_id)
        .await?;

    let responses = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            booking_id: e.booking_id.to_string(),
            version: e.version.as_i64(),
            recorded_at: e.recorded_at.to_rfc3339(),
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}

/// DELETE /bookings/:id: cancel a booking and release its seats.
#[tracing::instrument(skip(state), fields(principal_id = %principal.id))]
pub async fn cancel<S: ReservationStore + Clone + 'static>(
    State(state): State<SharedState<S>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id: BookingId = parse_id(&id, "booking")?;
    let booking = state.coordinator.cancel(&principal, booking_id).await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// PUT /bookings/:id/seats: move a booking to other seats (admin only).
#[tracing::instrument(skip(state, req), fields(principal_id = %principal.id))]
pub async fn reassign_seats<S: ReservationStore + Clone + 'static>(
    State(state): State<SharedState<S>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    Json(req): Json<ReassignSeatsRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id: BookingId = parse_id(&id, "booking")?;
    let booking = state
        .coordinator
        .reassign_seats(&principal, booking_id, &req.seats)
        .await?;
    Ok(Json(BookingResponse::from(&booking)))
}

fn reserve_request(
    req: CreateBookingRequest,
    payment_mode: PaymentMode,
) -> Result<ReserveRequest, ApiError> {
    let theatre_id: TheatreId = parse_id(&req.theatre_id, "theatre")?;
    let movie_id: MovieId = parse_id(&req.movie_id, "movie")?;
    Ok(ReserveRequest {
        theatre_id,
        movie_id,
        seats: req.seats,
        payment_mode,
    })
}
