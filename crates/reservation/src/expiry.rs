//! Expiry of abandoned PENDING bookings.

use std::time::Duration;

use chrono::{DateTime, Utc};
use seat_store::ReservationStore;

use crate::coordinator::ReservationCoordinator;
use crate::error::{ReservationError, Result};

/// Cancels PENDING bookings older than a TTL so their seats return to sale.
#[derive(Debug, Clone)]
pub struct PendingHoldSweeper<S> {
    coordinator: ReservationCoordinator<S>,
    ttl: chrono::Duration,
}

impl<S> PendingHoldSweeper<S>
where
    S: ReservationStore + Clone + 'static,
{
    pub fn new(coordinator: ReservationCoordinator<S>, ttl: Duration) -> Result<Self> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| ReservationError::InvalidInput(format!("hold TTL out of range: {e}")))?;
        Ok(Self { coordinator, ttl })
    }

    /// Expires every PENDING booking created before `now - ttl`.
    ///
    /// Each booking is cancelled in its own transaction; a booking settled
    /// in the meantime is left alone. Returns the number expired.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.ttl;
        let stale = self
            .coordinator
            .store()
            .pending_bookings_created_before(cutoff)
            .await?;

        let mut expired = 0;
        for booking in stale {
            match self.coordinator.expire_pending(booking.id(), cutoff).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(booking_id = %booking.id(), error = %e, "failed to expire hold");
                }
            }
        }

        if expired > 0 {
            metrics::counter!("pending_holds_expired_total").increment(expired as u64);
            tracing::info!(expired, "expired pending holds");
        }
        Ok(expired)
    }

    /// Sweeps every `every` until the task is dropped.
    pub async fn run(self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep(Utc::now()).await {
                tracing::warn!(error = %e, "hold sweep failed");
            }
        }
    }
}
