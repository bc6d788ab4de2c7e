//! Payment settlement: gateway orders, signature verification and the
//! PENDING to PAID transition.

use std::sync::Arc;

use chrono::Utc;
use common::BookingId;
use domain::{Aggregate, Booking, PaymentState, SeatSet, Theatre};
use seat_store::{ClaimOutcome, ReservationStore, StoreTransaction};
use serde::{Deserialize, Serialize};

use crate::coordinator::{abort, record};
use crate::error::{ReservationError, Result};
use crate::policy::ReservationPolicy;
use crate::services::{OrderHandle, PaymentGateway};
use crate::signature::{PaymentSignatureVerifier, Verification};
use crate::ticket::TicketIssuer;

/// Payment confirmation submitted by the client for a deferred booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleRequest {
    pub booking_id: BookingId,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

enum SettleOutcome {
    Settled(Booking),
    AlreadySettled(Booking),
    /// Money was taken but the seats are gone. `recorded` is false when the
    /// same payment was already reported and nothing new was written.
    SeatsUnavailable {
        booking: Booking,
        seats: SeatSet,
        recorded: bool,
    },
}

/// Drives deferred bookings from PENDING to PAID.
pub struct PaymentSettlement<S> {
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    verifier: PaymentSignatureVerifier,
    issuer: TicketIssuer,
    policy: ReservationPolicy,
}

impl<S> PaymentSettlement<S>
where
    S: ReservationStore + Clone,
{
    pub fn new(
        store: S,
        gateway: Arc<dyn PaymentGateway>,
        verifier: PaymentSignatureVerifier,
        issuer: TicketIssuer,
        policy: ReservationPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            issuer,
            policy,
        }
    }

    pub fn policy(&self) -> &ReservationPolicy {
        &self.policy
    }

    /// Creates a gateway order for `unit_price * |seats|`. Claims nothing.
    #[tracing::instrument(skip(self, theatre, seats), fields(theatre_id = %theatre.id(), seats = %seats))]
    pub async fn create_order(&self, theatre: &Theatre, seats: &SeatSet) -> Result<OrderHandle> {
        let amount = theatre.price_for(seats.len());
        let receipt = format!("rcpt_{}", Utc::now().timestamp_millis());
        let order = self
            .gateway
            .create_order(amount, &self.policy.currency, &receipt)
            .await?;

        tracing::info!(order_id = %order.order_id, amount = %amount, "payment order created");
        Ok(order)
    }

    /// Checks the gateway signature over `order_id|payment_id`.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> Verification {
        self.verifier.verify(order_id, payment_id, signature)
    }

    /// Confirms payment for a PENDING booking and issues its ticket.
    ///
    /// If the seats were not claimed when the order was created they are
    /// claimed now. Losing that claim records the booking as FAILED and
    /// returns [`ReservationError::PaidButSeatsUnavailable`] so the payment
    /// can be refunded. A verified payment for a booking that was already
    /// cancelled or failed is recorded and reported the same way.
    #[tracing::instrument(
        skip(self, request),
        fields(booking_id = %request.booking_id, order_id = %request.order_id)
    )]
    pub async fn settle(&self, request: SettleRequest) -> Result<Booking> {
        if self.verify(&request.order_id, &request.payment_id, &request.signature)
            == Verification::Forged
        {
            tracing::warn!(
                target: "security",
                booking_id = %request.booking_id,
                order_id = %request.order_id,
                payment_id = %request.payment_id,
                "forged payment signature rejected"
            );
            metrics::counter!("payment_signature_forged_total").increment(1);
            return Err(ReservationError::PaymentSignatureInvalid);
        }

        let mut tx = self.store.begin().await?;
        match self.settle_in(&mut *tx, &request).await {
            Ok(SettleOutcome::Settled(booking)) => {
                tx.commit().await?;
                metrics::counter!("settlements_total").increment(1);
                tracing::info!(seats = %booking.seats(), "payment settled");
                Ok(booking)
            }
            Ok(SettleOutcome::AlreadySettled(booking)) => {
                tx.rollback().await?;
                tracing::debug!("payment already settled");
                Ok(booking)
            }
            Ok(SettleOutcome::SeatsUnavailable {
                booking,
                seats,
                recorded,
            }) => {
                if recorded {
                    tx.commit().await?;
                    metrics::counter!("paid_but_seats_unavailable_total").increment(1);
                } else {
                    tx.rollback().await?;
                }
                tracing::error!(
                    booking_id = %booking.id(),
                    payment_id = %request.payment_id,
                    state = %booking.payment_state(),
                    seats = %seats,
                    replay = !recorded,
                    "payment captured but seats are unavailable; refund required"
                );
                Err(ReservationError::PaidButSeatsUnavailable {
                    booking_id: booking.id(),
                    payment_id: request.payment_id,
                    seats,
                })
            }
            Err(e) => {
                abort(tx, &e).await;
                Err(e)
            }
        }
    }

    async fn settle_in(
        &self,
        tx: &mut dyn StoreTransaction,
        request: &SettleRequest,
    ) -> Result<SettleOutcome> {
        let mut booking = tx.booking(request.booking_id).await?;

        if booking.order_id() != Some(request.order_id.as_str()) {
            return Err(ReservationError::OrderMismatch {
                booking_id: booking.id(),
            });
        }

        let settled_payment = booking
            .payment_ref()
            .and_then(|payment| payment.payment_id.as_deref());
        if booking.payment_state() == PaymentState::Paid
            && settled_payment == Some(request.payment_id.as_str())
        {
            return Ok(SettleOutcome::AlreadySettled(booking));
        }

        // The hold was cancelled or lost before the payment arrived.
        if booking.payment_state().can_record_unhonoured_payment() {
            let seats = booking.seats().clone();
            if settled_payment == Some(request.payment_id.as_str()) {
                return Ok(SettleOutcome::SeatsUnavailable {
                    booking,
                    seats,
                    recorded: false,
                });
            }

            let expected = booking.version();
            let mut events = Vec::new();
            let unhonoured = booking.record_unhonoured_payment(
                request.payment_id.clone(),
                request.signature.clone(),
                format!("payment arrived after booking became {}", booking.payment_state()),
                Utc::now(),
            )?;
            record(&mut booking, &mut events, unhonoured);
            let version = tx.update_booking(&booking, expected, &events).await?;
            booking.set_version(version);
            return Ok(SettleOutcome::SeatsUnavailable {
                booking,
                seats,
                recorded: true,
            });
        }

        if !booking.payment_state().can_settle() {
            return Err(ReservationError::InvalidState(format!(
                "booking {} is {}",
                booking.id(),
                booking.payment_state()
            )));
        }

        let theatre = tx.theatre(booking.theatre_id()).await?;
        let expected = booking.version();
        let now = Utc::now();
        let mut events = Vec::new();

        if !booking.seats_held() {
            match tx.try_claim(theatre.id(), booking.seats()).await? {
                ClaimOutcome::Claimed => {
                    let claimed = booking.claim_seats(now)?;
                    record(&mut booking, &mut events, claimed);
                }
                ClaimOutcome::Conflict(seats) | ClaimOutcome::InvalidSeats(seats) => {
                    let failed = booking.fail_payment(
                        Some(request.payment_id.clone()),
                        Some(request.signature.clone()),
                        format!("seats unavailable at settlement: {seats}"),
                        now,
                    )?;
                    record(&mut booking, &mut events, failed);
                    let version = tx.update_booking(&booking, expected, &events).await?;
                    booking.set_version(version);
                    return Ok(SettleOutcome::SeatsUnavailable {
                        booking,
                        seats,
                        recorded: true,
                    });
                }
            }
        }

        let settled = booking.settle(
            Some(request.payment_id.clone()),
            Some(request.signature.clone()),
            now,
        )?;
        record(&mut booking, &mut events, settled);

        let ticket = self.issuer.issue(&booking, &theatre).await?;
        let issued = booking.issue_ticket(ticket, now)?;
        record(&mut booking, &mut events, issued);

        let version = tx.update_booking(&booking, expected, &events).await?;
        booking.set_version(version);
        Ok(SettleOutcome::Settled(booking))
    }
}

impl<S> std::fmt::Debug for PaymentSettlement<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentSettlement")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
