//! Booking payment state machine.

use serde::{Deserialize, Serialize};

/// Payment state of a booking.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Paid ──────► Cancelled
///           ├──► Failed ────► Cancelled
///           └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    /// Awaiting payment confirmation.
    #[default]
    Pending,

    /// Payment confirmed; seats held and ticket issued.
    Paid,

    /// Payment could not be honoured; seats are not held.
    Failed,

    /// Booking was cancelled and its seats released (terminal state).
    Cancelled,
}

impl PaymentState {
    /// Returns true if payment can be settled in this state.
    pub fn can_settle(&self) -> bool {
        matches!(self, PaymentState::Pending)
    }

    /// Returns true if payment can be marked failed in this state.
    pub fn can_fail(&self) -> bool {
        matches!(self, PaymentState::Pending)
    }

    /// Returns true if a verified payment arriving now cannot be honoured
    /// because the booking no longer holds seats.
    pub fn can_record_unhonoured_payment(&self) -> bool {
        matches!(self, PaymentState::Failed | PaymentState::Cancelled)
    }

    /// Returns true if a ticket can be issued in this state.
    pub fn can_issue_ticket(&self) -> bool {
        matches!(self, PaymentState::Paid)
    }

    /// Returns true if seats can be reassigned in this state.
    pub fn can_reassign(&self) -> bool {
        matches!(self, PaymentState::Pending | PaymentState::Paid)
    }

    /// Returns true if the booking can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentState::Cancelled)
    }

    /// Returns the state name as stored and reported.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "PENDING",
            PaymentState::Paid => "PAID",
            PaymentState::Failed => "FAILED",
            PaymentState::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentState::Pending),
            "PAID" => Ok(PaymentState::Paid),
            "FAILED" => Ok(PaymentState::Failed),
            "CANCELLED" => Ok(PaymentState::Cancelled),
            other => Err(format!("unknown payment state: {other}")),
        }
    }
}

/// How the booking is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// No gateway step; the booking is paid on creation.
    #[default]
    Direct,

    /// Payment goes through the external gateway and settles later.
    Deferred,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Direct => "direct",
            PaymentMode::Deferred => "deferred",
        }
    }
}

impl std::fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_pending() {
        assert_eq!(PaymentState::default(), PaymentState::Pending);
    }

    #[test]
    fn only_pending_can_settle() {
        assert!(PaymentState::Pending.can_settle());
        assert!(!PaymentState::Paid.can_settle());
        assert!(!PaymentState::Failed.can_settle());
        assert!(!PaymentState::Cancelled.can_settle());
    }

    #[test]
    fn reassign_allowed_for_pending_and_paid() {
        assert!(PaymentState::Pending.can_reassign());
        assert!(PaymentState::Paid.can_reassign());
        assert!(!PaymentState::Failed.can_reassign());
        assert!(!PaymentState::Cancelled.can_reassign());
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(PaymentState::Cancelled.is_terminal());
        assert!(!PaymentState::Cancelled.can_cancel());
        assert!(PaymentState::Failed.can_cancel());
    }

    #[test]
    fn state_names_round_trip() {
        for state in [
            PaymentState::Pending,
            PaymentState::Paid,
            PaymentState::Failed,
            PaymentState::Cancelled,
        ] {
            assert_eq!(state.as_str().parse::<PaymentState>(), Ok(state));
        }
        assert_eq!(
            serde_json::to_value(PaymentState::Paid).unwrap(),
            serde_json::json!("PAID")
        );
    }
}
