//! Wire models for the ledger-indexing service.

pub mod models;
