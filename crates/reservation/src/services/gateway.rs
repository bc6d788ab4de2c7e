//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use domain::Money;
use serde::{Deserialize, Serialize};

use crate::error::ReservationError;
use crate::signature::PaymentSignatureVerifier;

/// An order created at the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHandle {
    pub order_id: String,

    /// Amount in minor currency units.
    pub amount: Money,

    pub currency: String,

    pub receipt: String,
}

/// What the client receives from the gateway after paying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Trait for the external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates an order the client can pay against.
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<OrderHandle, ReservationError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    orders: HashMap<String, OrderHandle>,
    next_order: u32,
    next_payment: u32,
    fail_on_create_order: bool,
}

/// In-memory payment gateway for testing.
///
/// Signs completed payments with the same secret the server verifies with.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
    signer: PaymentSignatureVerifier,
}

impl InMemoryPaymentGateway {
    pub fn new(signer: PaymentSignatureVerifier) -> Self {
        Self {
            state: Arc::default(),
            signer,
        }
    }

    /// Configures the gateway to fail on the next create-order calls.
    pub fn set_fail_on_create_order(&self, fail: bool) {
        super::lock(&self.state).fail_on_create_order = fail;
    }

    /// Returns the number of orders created.
    pub fn order_count(&self) -> usize {
        super::lock(&self.state).orders.len()
    }

    pub fn order(&self, order_id: &str) -> Option<OrderHandle> {
        super::lock(&self.state).orders.get(order_id).cloned()
    }

    /// Simulates the client completing checkout for an order.
    ///
    /// Returns `None` for unknown orders.
    pub fn complete_payment(&self, order_id: &str) -> Option<PaymentConfirmation> {
        let mut state = super::lock(&self.state);
        if !state.orders.contains_key(order_id) {
            return None;
        }
        state.next_payment += 1;
        let payment_id = format!("pay_{:04}", state.next_payment);
        let signature = self.signer.sign(order_id, &payment_id);

        Some(PaymentConfirmation {
            order_id: order_id.to_string(),
            payment_id,
            signature,
        })
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<OrderHandle, ReservationError> {
        let mut state = super::lock(&self.state);

        if state.fail_on_create_order {
            return Err(ReservationError::Gateway(
                "Order creation declined".to_string(),
            ));
        }

        state.next_order += 1;
        let order = OrderHandle {
            order_id: format!("order_{:04}", state.next_order),
            amount,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        };
        state.orders.insert(order.order_id.clone(), order.clone());

        Ok(order)
    }
}
