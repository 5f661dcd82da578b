//! Postgres-backed test support.


pub(crate) use context::{PAYMENT_WINDOW, TestContext};
pub(crate) use db::TestDb;
