//! # stockroom-core: Pure Business Logic
//!
//! The heart of the Stockroom back office. Everything in this crate is a
//! pure function or a plain type: no database, no network, no clocks beyond
//! accepting timestamps as values.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Stockroom Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Outer surfaces (HTTP/POS/admin — out of scope)     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         stockroom-engine: invoices, orders, returns, finance    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         stockroom-db: stock ledger, repositories, migrations    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ stockroom-core (THIS CRATE) ★                    │   │
//! │  │     money • types • errors • finance buckets • validation       │   │
//! │  │     NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Decimal money**: all amounts are fixed-point decimals serialized as
//!    strings; native floats never touch money
//! 2. **Explicit errors**: typed thiserror enums, never strings or panics
//! 3. **Sum types at the seams**: "exactly one of invoice/order" is a tagged
//!    enum, not a pair of nullable foreign keys

pub mod error;
pub mod finance;
pub mod money;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult};
pub use finance::{FeedEntry, FeedKind, SafeBreakdown, SafeBucket, SafeSnapshot};
pub use money::Money;
pub use types::*;
pub use validation::ValidationError;
