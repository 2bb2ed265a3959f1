//! Adapters that host a [`Gate`](crate::Gate) inside an HTTP framework.

#[cfg(feature = "axum")]
pub mod axum;
