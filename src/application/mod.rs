//! Application layer: the checkout pipeline and its orchestration.
//!
//! `CheckoutEngine` is the entry point. It composes the cart store, the
//! payment gateway, the order finalizer, the subscription scheduler and the
//! penalty ledger over the ports declared in `domain::ports`.

pub mod cart;
pub mod engine;
pub mod finalizer;
pub mod gateway;
pub mod ledger;
pub mod locks;
pub mod scheduler;

pub use engine::{CheckoutEngine, Confirmation, Ports};
pub use finalizer::Finalization;
pub use scheduler::{RenewalOutcome, TickReport};
