//! Engine-level policies.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// When deferred bookings claim their seats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimTiming {
    /// Claim when the gateway order is created. Abandoned payments hold
    /// seats until cancelled or expired.
    #[default]
    AtOrder,

    /// Claim when payment settles. A lost race after payment surfaces as
    /// `PaidButSeatsUnavailable`.
    AtSettlement,
}

impl ClaimTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimTiming::AtOrder => "at_order",
            ClaimTiming::AtSettlement => "at_settlement",
        }
    }
}

impl std::str::FromStr for ClaimTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "at_order" => Ok(ClaimTiming::AtOrder),
            "at_settlement" => Ok(ClaimTiming::AtSettlement),
            other => Err(format!("unknown claim timing: {other}")),
        }
    }
}

impl std::fmt::Display for ClaimTiming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Policy knobs for the reservation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationPolicy {
    pub claim_timing: ClaimTiming,

    /// Currency code passed to the payment gateway.
    pub currency: String,

    /// PENDING bookings older than this are cancelled by the sweeper.
    /// `None` keeps holds until settled or cancelled.
    pub pending_hold_ttl: Option<Duration>,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            claim_timing: ClaimTiming::AtOrder,
            currency: "INR".to_string(),
            pending_hold_ttl: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_claims_at_order_without_expiry() {
        let policy = ReservationPolicy::default();
        assert_eq!(policy.claim_timing, ClaimTiming::AtOrder);
        assert_eq!(policy.currency, "INR");
        assert!(policy.pending_hold_ttl.is_none());
    }

    #[test]
    fn claim_timing_parses() {
        assert_eq!("at_settlement".parse(), Ok(ClaimTiming::AtSettlement));
        assert_eq!("AT_ORDER".parse(), Ok(ClaimTiming::AtOrder));
        assert!("later".parse::<ClaimTiming>().is_err());
    }
}
