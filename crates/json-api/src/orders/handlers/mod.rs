//! Order Handlers

pub(crate) mod cancel;
pub(crate) mod card_payment;
pub(crate) mod create;
pub(crate) mod get;
pub(crate) mod index;
pub(crate) mod payment;
