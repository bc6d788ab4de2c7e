//! External collaborators: catalog, payment gateway and ticket renderer.
//!
//! Each collaborator is a trait with an in-memory implementation used by
//! tests and the default server setup.

pub mod catalog;
pub mod gateway;
pub mod renderer;

pub use catalog::{Catalog, InMemoryCatalog, Movie};
pub use gateway::{InMemoryPaymentGateway, OrderHandle, PaymentConfirmation, PaymentGateway};
pub use renderer::{DataUrlRenderer, TicketRenderer};

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

// A panic while holding one of these locks cannot leave the plain
// collections inside half-updated, so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
