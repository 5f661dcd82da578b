//! Crypto Payments
//!
//! Invoicing and confirmation tracking against the chain status service.

mod client;
mod poller;
mod sink;

pub use client::*;
pub use poller::*;
pub use sink::*;
