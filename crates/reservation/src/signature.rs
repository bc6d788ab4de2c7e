//! Payment signature verification.
//!
//! The gateway signs `order_id|payment_id` with HMAC-SHA256 using the shared
//! key secret and hands the hex digest to the client.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ReservationError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Outcome of verifying a client-supplied payment signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Authentic,
    Forged,
}

impl Verification {
    pub fn is_authentic(&self) -> bool {
        matches!(self, Verification::Authentic)
    }
}

/// Signs and verifies payment confirmations with the server-held secret.
#[derive(Clone)]
pub struct PaymentSignatureVerifier {
    keyed: HmacSha256,
}

impl std::fmt::Debug for PaymentSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentSignatureVerifier")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl PaymentSignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(ReservationError::InvalidInput(
                "payment key secret must not be empty".to_string(),
            ));
        }
        let keyed = HmacSha256::new_from_slice(secret)
            .map_err(|e| ReservationError::InvalidInput(e.to_string()))?;
        Ok(Self { keyed })
    }

    fn mac(&self, order_id: &str, payment_id: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac
    }

    /// Hex-encoded signature the gateway would produce.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        hex::encode(self.mac(order_id, payment_id).finalize().into_bytes())
    }

    /// Verifies `signature` in constant time.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> Verification {
        let Ok(provided) = hex::decode(signature.trim()) else {
            return Verification::Forged;
        };
        match self.mac(order_id, payment_id).verify_slice(&provided) {
            Ok(()) => Verification::Authentic,
            Err(_) => Verification::Forged,
        }
    }
}
