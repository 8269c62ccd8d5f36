//! # Finance Buckets
//!
//! Pure classification and accumulation logic for the cash-position
//! ("safe") snapshot. The queries that feed these types live in the engine
//! crate; everything here is side-effect free and unit-testable.
//!
//! ## Buckets
//! Income and refunds are grouped by payment channel:
//! `cash_pos`, `cod`, `vodafone_cash`, `instapay`, `fawry`, `other`.
//!
//! The snapshot is an advisory, point-in-time reporting view. It is
//! re-derived on every call and tolerates read skew against concurrent
//! writers; it is NOT a ledger of record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Safe Bucket
// =============================================================================

/// A named cash-position bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafeBucket {
    CashPos,
    Cod,
    VodafoneCash,
    Instapay,
    Fawry,
    Other,
}

impl SafeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafeBucket::CashPos => "cash_pos",
            SafeBucket::Cod => "cod",
            SafeBucket::VodafoneCash => "vodafone_cash",
            SafeBucket::Instapay => "instapay",
            SafeBucket::Fawry => "fawry",
            SafeBucket::Other => "other",
        }
    }

    /// Maps a payment-method CODE (exact, as seeded by bootstrap) to its
    /// bucket. Unknown codes land in `other`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "cash_pos" => SafeBucket::CashPos,
            "cod" => SafeBucket::Cod,
            "vodafone_cash" => SafeBucket::VodafoneCash,
            "instapay" => SafeBucket::Instapay,
            "fawry" => SafeBucket::Fawry,
            _ => SafeBucket::Other,
        }
    }

    /// Guesses a bucket from a free-form payment label (an order's declared
    /// payment method). Substring match; unmatched labels default to `cod`,
    /// the dominant channel for in-flight online orders.
    pub fn infer_from_label(label: &str) -> Self {
        let lowered = label.to_lowercase();
        if lowered.contains("vodafone") {
            SafeBucket::VodafoneCash
        } else if lowered.contains("insta") {
            SafeBucket::Instapay
        } else if lowered.contains("fawry") {
            SafeBucket::Fawry
        } else {
            SafeBucket::Cod
        }
    }
}

impl std::fmt::Display for SafeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Breakdown & Snapshot
// =============================================================================

/// Per-bucket cash amounts. Credits add, debits subtract; a bucket can go
/// negative (refunds can exceed same-period income).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafeBreakdown {
    pub cash_pos: Money,
    pub cod: Money,
    pub vodafone_cash: Money,
    pub instapay: Money,
    pub fawry: Money,
    pub other: Money,
}

impl SafeBreakdown {
    pub fn credit(&mut self, bucket: SafeBucket, amount: Money) {
        *self.slot(bucket) += amount;
    }

    pub fn debit(&mut self, bucket: SafeBucket, amount: Money) {
        *self.slot(bucket) -= amount;
    }

    pub fn get(&self, bucket: SafeBucket) -> Money {
        match bucket {
            SafeBucket::CashPos => self.cash_pos,
            SafeBucket::Cod => self.cod,
            SafeBucket::VodafoneCash => self.vodafone_cash,
            SafeBucket::Instapay => self.instapay,
            SafeBucket::Fawry => self.fawry,
            SafeBucket::Other => self.other,
        }
    }

    fn slot(&mut self, bucket: SafeBucket) -> &mut Money {
        match bucket {
            SafeBucket::CashPos => &mut self.cash_pos,
            SafeBucket::Cod => &mut self.cod,
            SafeBucket::VodafoneCash => &mut self.vodafone_cash,
            SafeBucket::Instapay => &mut self.instapay,
            SafeBucket::Fawry => &mut self.fawry,
            SafeBucket::Other => &mut self.other,
        }
    }
}

/// What produced a feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Payment,
    Order,
    Return,
    Expense,
}

/// One row of the combined "recent transactions" feed. `amount` is signed:
/// income positive, refunds/expenses negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub kind: FeedKind,
    pub id: String,
    pub label: String,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Point-in-time cash position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafeSnapshot {
    pub breakdown: SafeBreakdown,
    pub total_income: Money,
    pub total_expenses: Money,
    /// `total_income − total_expenses`.
    pub net_cash_in_hand: Money,
    pub recent: Vec<FeedEntry>,
}

impl SafeSnapshot {
    /// Adds income to a bucket and the running total.
    pub fn credit(&mut self, bucket: SafeBucket, amount: Money) {
        self.breakdown.credit(bucket, amount);
        self.total_income += amount;
    }

    /// Subtracts a refund from a bucket and the running total.
    pub fn debit(&mut self, bucket: SafeBucket, amount: Money) {
        self.breakdown.debit(bucket, amount);
        self.total_income -= amount;
    }

    /// Records period expenses and finalizes `net_cash_in_hand`. Call once,
    /// after all credits/debits.
    pub fn settle_expenses(&mut self, total_expenses: Money) {
        self.total_expenses = total_expenses;
        self.net_cash_in_hand = self.total_income - total_expenses;
    }

    /// Sorts the feed newest-first and keeps the top `limit` entries.
    pub fn trim_feed(&mut self, limit: usize) {
        self.recent
            .sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        self.recent.truncate(limit);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn code_mapping_is_exact() {
        assert_eq!(SafeBucket::from_code("cash_pos"), SafeBucket::CashPos);
        assert_eq!(SafeBucket::from_code("fawry"), SafeBucket::Fawry);
        assert_eq!(SafeBucket::from_code("visa"), SafeBucket::Other);
    }

    #[test]
    fn label_inference_defaults_to_cod() {
        assert_eq!(
            SafeBucket::infer_from_label("Vodafone Cash"),
            SafeBucket::VodafoneCash
        );
        assert_eq!(
            SafeBucket::infer_from_label("InstaPay transfer"),
            SafeBucket::Instapay
        );
        assert_eq!(SafeBucket::infer_from_label("Fawry kiosk"), SafeBucket::Fawry);
        assert_eq!(
            SafeBucket::infer_from_label("cash on delivery"),
            SafeBucket::Cod
        );
    }

    #[test]
    fn snapshot_credit_debit_settle() {
        // 100 cash income, 40 cash_pos refund
        let mut snap = SafeSnapshot::default();
        snap.credit(SafeBucket::CashPos, money("100"));
        snap.debit(SafeBucket::CashPos, money("40"));
        snap.settle_expenses(Money::zero());

        assert_eq!(snap.breakdown.cash_pos, money("60"));
        assert_eq!(snap.total_income, money("60"));
        assert_eq!(snap.net_cash_in_hand, money("60"));
    }

    #[test]
    fn expenses_reduce_net_only() {
        let mut snap = SafeSnapshot::default();
        snap.credit(SafeBucket::Cod, money("200"));
        snap.settle_expenses(money("50"));
        assert_eq!(snap.total_income, money("200"));
        assert_eq!(snap.net_cash_in_hand, money("150"));
    }

    #[test]
    fn bucket_can_go_negative() {
        let mut snap = SafeSnapshot::default();
        snap.debit(SafeBucket::Instapay, money("25"));
        assert_eq!(snap.breakdown.instapay, money("-25"));
        assert_eq!(snap.total_income, money("-25"));
    }

    #[test]
    fn feed_trims_newest_first() {
        use chrono::TimeZone;
        let at = |h| Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap();
        let entry = |h: u32| FeedEntry {
            kind: FeedKind::Payment,
            id: format!("p{h}"),
            label: "payment".into(),
            amount: money("1"),
            occurred_at: at(h),
        };

        let mut snap = SafeSnapshot::default();
        snap.recent = vec![entry(1), entry(9), entry(5)];
        snap.trim_feed(2);

        let ids: Vec<&str> = snap.recent.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["p9", "p5"]);
    }
}
