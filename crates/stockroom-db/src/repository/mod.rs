//! # Repositories
//!
//! Plain-function data access, one module per aggregate. Every function is
//! generic over [`sqlx::SqliteExecutor`] so the same call works against the
//! pool (ad-hoc reads) or a `&mut SqliteConnection` inside an engine
//! transaction.
//!
//! Repositories never orchestrate: multi-row lifecycles (reserve → deduct,
//! restock + rollup) belong to the engines, which own the transaction.

pub mod cart;
pub mod catalog;
pub mod expense;
pub mod invoice;
pub mod order;
pub mod payment;
pub mod returns;
