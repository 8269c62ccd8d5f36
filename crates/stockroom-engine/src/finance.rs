//! # Finance Reconciliation
//!
//! Read-side cash-position snapshot. Derived from payments, in-flight
//! orders, returns and expenses on every call; holds no state of its own and
//! tolerates read skew against concurrent writers — it is an advisory
//! reporting view, not a ledger of record.
//!
//! ## Income Rules
//! ```text
//! + completed payments whose invoice is settled (paid / *_returned)
//!   or orphaned (no invoice)                 → bucket by method code
//! + in-flight orders with no Payment rows yet → (total − shipping),
//!                                               bucket guessed from label
//! − counting returns' refund_total            → bucket from refund_method,
//!                                               falling back via parent
//! − period expenses                           → net only, no bucket
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;

use stockroom_core::finance::{FeedEntry, FeedKind, SafeBucket, SafeSnapshot};
use stockroom_core::types::{InvoiceStatus, ReturnRecord, ReturnTarget};
use stockroom_core::Money;
use stockroom_db::repository::{expense, order, payment, returns};
use stockroom_db::Database;

use crate::error::EngineResult;

/// Optional inclusive date range for the snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub struct FinanceReconciliation {
    db: Database,
}

impl FinanceReconciliation {
    pub fn new(db: Database) -> Self {
        FinanceReconciliation { db }
    }

    /// Builds a point-in-time cash-position snapshot over `range`, with the
    /// newest `recent_limit` feed entries attached.
    pub async fn snapshot(&self, range: DateRange, recent_limit: usize) -> EngineResult<SafeSnapshot> {
        let pool = self.db.pool();
        let mut snap = SafeSnapshot::default();

        // 1. Completed payments on settled invoices, plus orphans.
        let payments = payment::completed_payments_in_range(pool, range.from, range.to).await?;
        for row in payments {
            if !counts_as_income(row.invoice_status) {
                continue;
            }
            let bucket = SafeBucket::from_code(&row.method_code);
            snap.credit(bucket, row.amount);
            snap.recent.push(FeedEntry {
                kind: FeedKind::Payment,
                id: row.id,
                label: row.method_code,
                amount: row.amount,
                occurred_at: row.created_at,
            });
        }

        // 2. In-flight orders that have no Payment rows yet: expected income
        //    of (total − shipping), bucketed by the declared payment label.
        let orders = order::in_flight_orders_in_range(pool, range.from, range.to).await?;
        for ord in orders {
            let amount = ord.total - ord.shipping_fee;
            let bucket = SafeBucket::infer_from_label(&ord.payment_method);
            snap.credit(bucket, amount);
            snap.recent.push(FeedEntry {
                kind: FeedKind::Order,
                id: ord.id,
                label: ord.payment_method,
                amount,
                occurred_at: ord.created_at,
            });
        }

        // 3. Refunds.
        let refunds = returns::returns_in_range(pool, range.from, range.to).await?;
        for ret in refunds {
            let bucket = self.refund_bucket(&ret).await?;
            snap.debit(bucket, ret.refund_total);
            snap.recent.push(FeedEntry {
                kind: FeedKind::Return,
                id: ret.id,
                label: ret.reason,
                amount: -ret.refund_total,
                occurred_at: ret.created_at,
            });
        }

        // 4. Expenses.
        let expenses = expense::expenses_in_range(pool, range.from, range.to).await?;
        let mut total_expenses = Money::zero();
        for exp in expenses {
            total_expenses += exp.amount;
            snap.recent.push(FeedEntry {
                kind: FeedKind::Expense,
                id: exp.id,
                label: exp.description,
                amount: -exp.amount,
                occurred_at: exp.incurred_at,
            });
        }
        snap.settle_expenses(total_expenses);

        // 5. Combined feed, newest first.
        snap.trim_feed(recent_limit);

        debug!(
            total_income = %snap.total_income,
            net = %snap.net_cash_in_hand,
            "finance snapshot built"
        );
        Ok(snap)
    }

    /// Bucket for a refund: explicit `refund_method` code first, else
    /// inferred from the parent — an order's declared payment label, or an
    /// invoice's most recent completed payment — defaulting to `cash_pos`.
    async fn refund_bucket(&self, ret: &ReturnRecord) -> EngineResult<SafeBucket> {
        if let Some(code) = &ret.refund_method {
            return Ok(SafeBucket::from_code(code));
        }

        let pool = self.db.pool();
        let bucket = match &ret.target {
            ReturnTarget::Order(id) => match order::get_order(pool, id).await? {
                Some(ord) => SafeBucket::infer_from_label(&ord.payment_method),
                None => SafeBucket::CashPos,
            },
            ReturnTarget::Invoice(id) => {
                match payment::latest_method_code_for_invoice(pool, id).await? {
                    Some(code) => SafeBucket::from_code(&code),
                    None => SafeBucket::CashPos,
                }
            }
        };
        Ok(bucket)
    }
}

/// A payment counts as income when its invoice is settled — `paid`, or in a
/// post-paid returned state (the refund side is subtracted separately by the
/// returns step) — or when it is orphaned.
fn counts_as_income(invoice_status: Option<InvoiceStatus>) -> bool {
    match invoice_status {
        None => true,
        Some(
            InvoiceStatus::Paid | InvoiceStatus::PartiallyReturned | InvoiceStatus::Returned,
        ) => true,
        Some(_) => false,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
