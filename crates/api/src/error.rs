//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reservation::ReservationError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No usable principal headers on the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Engine error.
    #[error(transparent)]
    Reservation(#[from] ReservationError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Reservation(err) => reservation_status(err),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Reservation(err) => err.code(),
        }
    }
}

fn reservation_status(err: &ReservationError) -> StatusCode {
    match err {
        ReservationError::InvalidInput(_)
        | ReservationError::InvalidSeat { .. }
        | ReservationError::PaymentSignatureInvalid
        | ReservationError::OrderMismatch { .. } => StatusCode::BAD_REQUEST,
        ReservationError::Forbidden(_) => StatusCode::FORBIDDEN,
        ReservationError::BookingNotFound(_) | ReservationError::TheatreNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ReservationError::SeatsAlreadyBooked { .. }
        | ReservationError::InvalidState(_)
        | ReservationError::PaidButSeatsUnavailable { .. } => StatusCode::CONFLICT,
        ReservationError::Gateway(_)
        | ReservationError::Renderer(_)
        | ReservationError::Catalog(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        metrics::counter!("http_errors_total", "code" => code).increment(1);

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": code,
        });
        if let ApiError::Reservation(err) = &self {
            if let Some(seats) = err.seats() {
                body["seats"] = serde_json::json!(seats.to_strings());
            }
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BookingId;
    use domain::SeatSet;

    #[test]
    fn test_status_mapping() {
        let seats = SeatSet::parse_request(["A1"]).unwrap();
        let cases = [
            (ReservationError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ReservationError::PaymentSignatureInvalid, StatusCode::BAD_REQUEST),
            (ReservationError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ReservationError::BookingNotFound(BookingId::new()), StatusCode::NOT_FOUND),
            (
                ReservationError::SeatsAlreadyBooked { seats: seats.clone() },
                StatusCode::CONFLICT,
            ),
            (
                ReservationError::PaidButSeatsUnavailable {
                    booking_id: BookingId::new(),
                    payment_id: "pay_1".into(),
                    seats,
                },
                StatusCode::CONFLICT,
            ),
            (ReservationError::Gateway("down".into()), StatusCode::BAD_GATEWAY),
            (ReservationError::Catalog("down".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
        assert_eq!(
            ApiError::Unauthorized("missing".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_conflict_body_names_seats() {
        let seats = SeatSet::parse_request(["A2", "A1"]).unwrap();
        let response = ApiError::from(ReservationError::SeatsAlreadyBooked { seats }).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "SEATS_ALREADY_BOOKED");
        assert_eq!(json["seats"], serde_json::json!(["A1", "A2"]));
    }
}
