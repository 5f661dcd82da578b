//! Cart
//!
//! Carts live in the client; the server only prices them.

pub(crate) mod quote;
