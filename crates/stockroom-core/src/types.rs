//! # Domain Types
//!
//! Core domain types for the inventory ledger and sales/fulfillment engines.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog:    Product ──► Variant        Location    Employee           │
//! │                                                                         │
//! │  Ledger:     StockItem (location, variant) quantity / reserved          │
//! │                                                                         │
//! │  POS:        Invoice ──► InvoiceItem    Payment     CommissionRecord   │
//! │                                                                         │
//! │  Online:     Order ──► OrderItem        CartItem                        │
//! │                                                                         │
//! │  Returns:    ReturnRecord ──► ReturnItem                                │
//! │              (ReturnTarget / ReturnLineSource sum types)                │
//! │                                                                         │
//! │  Finance:    Expense    PaymentMethod                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Line items copy unit price and cost price from the catalog at transaction
//! time. Profit reporting stays correct even if the catalog price changes
//! later.
//!
//! ## "Exactly One Of" as a Sum Type
//! A return references exactly one invoice OR one order, and each return line
//! exactly one invoice line OR one order line. [`ReturnTarget`] and
//! [`ReturnLineSource`] make that invariant unrepresentable to break, instead
//! of a pair of nullable foreign keys policed at runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Commission Rate
// =============================================================================

/// Employee commission rate in basis points (bps).
///
/// 1 basis point = 0.01%. 250 bps = 2.5% of per-invoice profit margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CommissionRate(u32);

impl CommissionRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        CommissionRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Commission owed on a profit amount: `profit × rate`.
    pub fn commission_on(&self, profit: Money) -> Money {
        profit.basis_points(self.0)
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A stocking/fulfillment location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Location {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A product with default pricing. Variants may override either price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub name: String,
    pub cost_price: Money,
    pub retail_price: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sellable variant of a product.
///
/// `cost_price` / `retail_price` are overrides; `None` means "use the
/// product-level price" (see `VariantPricing`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Variant {
    pub id: String,
    pub product_id: String,
    pub sku: String,
    pub cost_price: Option<Money>,
    pub retail_price: Option<Money>,
    /// Unit weight used for shipping quotes.
    pub weight_grams: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Resolved pricing for a variant: variant override, falling back to the
/// product-level price where the override is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct VariantPricing {
    pub cost_price: Money,
    pub retail_price: Money,
}

/// Employee master record; the commission rate feeds invoice commissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Employee {
    pub id: String,
    pub name: String,
    /// Commission rate in basis points (250 = 2.5%).
    pub commission_rate_bps: i64,
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn commission_rate(&self) -> CommissionRate {
        CommissionRate::from_bps(self.commission_rate_bps.max(0) as u32)
    }
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Physical stock for one (location, variant) pair.
///
/// ## Invariants
/// - `quantity >= 0` at all times, enforced by the database via conditional
///   deduct updates (application code never pre-checks-then-writes)
/// - available = `quantity - reserved_quantity` gates new reservations
///
/// Created lazily on first stock movement; never deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockItem {
    pub id: String,
    pub location_id: String,
    pub variant_id: String,
    /// Physical units present.
    pub quantity: i64,
    /// Units soft-held for pending invoices.
    pub reserved_quantity: i64,
    /// Reorder threshold for the low-stock report.
    pub min_stock_level: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// Units that can still be promised to a new transaction.
    #[inline]
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }

    pub fn is_low(&self) -> bool {
        self.quantity <= self.min_stock_level
    }
}

// =============================================================================
// POS Invoices
// =============================================================================

/// Invoice lifecycle.
///
/// ```text
/// draft/pending → partially_paid → paid            (terminal success)
/// pending/partially_paid → cancelled               (terminal abort)
/// paid → partially_returned → returned             (via ReturnsEngine)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    PartiallyPaid,
    Paid,
    Cancelled,
    PartiallyReturned,
    Returned,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::PartiallyReturned => "partially_returned",
            InvoiceStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// POS sale header. Stock is RESERVED at creation and DEDUCTED on
/// completion (full payment); see the stock ledger glossary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,
    pub location_id: String,
    pub employee_id: String,
    pub status: InvoiceStatus,
    pub subtotal: Money,
    pub total: Money,
    /// Accumulated across payments; completion triggers at `>= total`.
    pub paid_amount: Money,
    pub commission_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Invoice line with catalog snapshot taken at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub variant_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub cost_price: Money,
    /// `(unit_price − cost_price) × quantity`, snapshotted.
    pub profit_margin: Money,
    pub line_total: Money,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payments
// =============================================================================

/// Payment row status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Completed => "completed",
            PaymentState::Failed => "failed",
            PaymentState::Refunded => "refunded",
        }
    }
}

/// A payment, linked to at most one invoice.
///
/// Orphaned payments (`invoice_id = None`) are legal and count as income in
/// the finance view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub invoice_id: Option<String>,
    pub method_id: String,
    pub amount: Money,
    pub status: PaymentState,
    pub created_at: DateTime<Utc>,
}

/// A configured payment channel (seeded by the bootstrap step).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentMethod {
    pub id: String,
    /// Stable machine code: `cash_pos`, `cod`, `vodafone_cash`, ...
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

// =============================================================================
// Online Orders
// =============================================================================

/// Online order lifecycle. Transitions after creation are driven by the
/// external fulfillment process; the core persists them without stock
/// side-effects (stock left the pool at order creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    PartiallyReturned,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::PartiallyReturned => "partially_returned",
            OrderStatus::Returned => "returned",
        }
    }

    /// Statuses counted as "in flight" by the finance view.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Confirmed
                | OrderStatus::Processing
                | OrderStatus::Shipped
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment progress on an order, tracked separately from fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    PartiallyPaid,
    Refunded,
    PartiallyRefunded,
}

impl OrderPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderPaymentStatus::Pending => "pending",
            OrderPaymentStatus::Paid => "paid",
            OrderPaymentStatus::PartiallyPaid => "partially_paid",
            OrderPaymentStatus::Refunded => "refunded",
            OrderPaymentStatus::PartiallyRefunded => "partially_refunded",
        }
    }

    /// True when Payment rows already exist for this order, so the finance
    /// view must not double-count the order itself as income.
    pub fn has_payment_rows(&self) -> bool {
        matches!(
            self,
            OrderPaymentStatus::Paid
                | OrderPaymentStatus::PartiallyPaid
                | OrderPaymentStatus::Refunded
        )
    }
}

/// Online sale header. Stock is deducted at creation (no reservation phase).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub user_id: String,
    /// Fulfillment location chosen at creation; returns restock here.
    pub location_id: String,
    pub delivery_address_id: String,
    /// Declared payment channel, free-form (finance buckets by substring).
    pub payment_method: String,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line with cost snapshotted at creation for profit integrity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub variant_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub cost_price: Money,
    pub line_total: Money,
    pub created_at: DateTime<Utc>,
}

/// A shopping-cart line; `create_order` consumes and clears the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartItem {
    pub id: String,
    pub user_id: String,
    pub variant_id: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Returns
// =============================================================================

/// What a return is filed against: exactly one invoice or one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReturnTarget {
    Invoice(String),
    Order(String),
}

impl ReturnTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            ReturnTarget::Invoice(_) => "invoice",
            ReturnTarget::Order(_) => "order",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ReturnTarget::Invoice(id) | ReturnTarget::Order(id) => id,
        }
    }

    /// Rebuilds the target from its at-rest (kind, id) columns.
    pub fn from_parts(kind: &str, id: String) -> Result<Self, CoreError> {
        match kind {
            "invoice" => Ok(ReturnTarget::Invoice(id)),
            "order" => Ok(ReturnTarget::Order(id)),
            other => Err(CoreError::not_found("ReturnTarget kind", other)),
        }
    }
}

/// Which original line a return line refunds: exactly one invoice line or
/// one order line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReturnLineSource {
    InvoiceLine(String),
    OrderLine(String),
}

impl ReturnLineSource {
    pub fn kind(&self) -> &'static str {
        match self {
            ReturnLineSource::InvoiceLine(_) => "invoice_line",
            ReturnLineSource::OrderLine(_) => "order_line",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ReturnLineSource::InvoiceLine(id) | ReturnLineSource::OrderLine(id) => id,
        }
    }

    pub fn from_parts(kind: &str, id: String) -> Result<Self, CoreError> {
        match kind {
            "invoice_line" => Ok(ReturnLineSource::InvoiceLine(id)),
            "order_line" => Ok(ReturnLineSource::OrderLine(id)),
            other => Err(CoreError::not_found("ReturnLineSource kind", other)),
        }
    }
}

/// Return status. Returns restock immediately at creation, so a created
/// return is `approved`; `rejected`/`cancelled` returns are excluded from
/// quantity and refund sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Rejected => "rejected",
            ReturnStatus::Cancelled => "cancelled",
        }
    }
}

/// A processed return against an invoice or order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub id: String,
    pub target: ReturnTarget,
    pub reason: String,
    /// Refund channel; when unset, finance falls back through the parent's
    /// payment method, defaulting to `cash_pos`.
    pub refund_method: Option<String>,
    pub refund_total: Money,
    pub status: ReturnStatus,
    pub created_at: DateTime<Utc>,
}

/// One returned line.
///
/// Invariant: across all non-rejected returns, the summed quantity per
/// original line never exceeds the original line quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnItem {
    pub id: String,
    pub return_id: String,
    pub source: ReturnLineSource,
    pub quantity: i64,
    /// `original unit price × returned quantity`.
    pub refund_amount: Money,
    pub created_at: DateTime<Utc>,
}

// Manual FromRow impls: the tagged target/source enums live in two columns
// at rest (kind + id) and must be rebuilt on read.
#[cfg(feature = "sqlx")]
mod return_rows {
    use sqlx::sqlite::SqliteRow;
    use sqlx::Row;

    use super::{ReturnItem, ReturnLineSource, ReturnRecord, ReturnTarget};

    impl sqlx::FromRow<'_, SqliteRow> for ReturnRecord {
        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            let kind: String = row.try_get("target_kind")?;
            let target_id: String = row.try_get("target_id")?;
            let target = ReturnTarget::from_parts(&kind, target_id).map_err(|e| {
                sqlx::Error::ColumnDecode {
                    index: "target_kind".to_string(),
                    source: Box::new(e),
                }
            })?;

            Ok(ReturnRecord {
                id: row.try_get("id")?,
                target,
                reason: row.try_get("reason")?,
                refund_method: row.try_get("refund_method")?,
                refund_total: row.try_get("refund_total")?,
                status: row.try_get("status")?,
                created_at: row.try_get("created_at")?,
            })
        }
    }

    impl sqlx::FromRow<'_, SqliteRow> for ReturnItem {
        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            let kind: String = row.try_get("source_kind")?;
            let source_id: String = row.try_get("source_id")?;
            let source = ReturnLineSource::from_parts(&kind, source_id).map_err(|e| {
                sqlx::Error::ColumnDecode {
                    index: "source_kind".to_string(),
                    source: Box::new(e),
                }
            })?;

            Ok(ReturnItem {
                id: row.try_get("id")?,
                return_id: row.try_get("return_id")?,
                source,
                quantity: row.try_get("quantity")?,
                refund_amount: row.try_get("refund_amount")?,
                created_at: row.try_get("created_at")?,
            })
        }
    }
}

// =============================================================================
// Commission & Expenses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Settled,
    Voided,
}

/// Derived commission: one per invoice when the amount is positive.
/// `amount = profit margin × employee rate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CommissionRecord {
    pub id: String,
    pub invoice_id: String,
    pub employee_id: String,
    pub amount: Money,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}

/// A period expense, subtracted by the finance view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: Money,
    pub incurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_is_quantity_minus_reserved() {
        let item = StockItem {
            id: "s1".into(),
            location_id: "loc-1".into(),
            variant_id: "var-1".into(),
            quantity: 10,
            reserved_quantity: 4,
            min_stock_level: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(item.available(), 6);
        assert!(!item.is_low());
    }

    #[test]
    fn commission_rate_math() {
        let rate = CommissionRate::from_bps(250); // 2.5%
        let profit: Money = "120".parse().unwrap();
        assert_eq!(rate.commission_on(profit).storage_string(), "3.00");
        assert!(CommissionRate::from_bps(0).is_zero());
    }

    #[test]
    fn return_target_round_trips_parts() {
        let t = ReturnTarget::Order("ord-1".into());
        let rebuilt = ReturnTarget::from_parts(t.kind(), t.id().to_string()).unwrap();
        assert_eq!(t, rebuilt);
        assert!(ReturnTarget::from_parts("customer", "x".into()).is_err());
    }

    #[test]
    fn return_line_source_round_trips_parts() {
        let s = ReturnLineSource::InvoiceLine("line-1".into());
        let rebuilt = ReturnLineSource::from_parts(s.kind(), s.id().to_string()).unwrap();
        assert_eq!(s, rebuilt);
    }

    #[test]
    fn in_flight_statuses() {
        assert!(OrderStatus::Pending.is_in_flight());
        assert!(OrderStatus::Shipped.is_in_flight());
        assert!(!OrderStatus::Delivered.is_in_flight());
        assert!(!OrderStatus::Cancelled.is_in_flight());
    }

    #[test]
    fn payment_rows_flag_prevents_double_count() {
        assert!(OrderPaymentStatus::Paid.has_payment_rows());
        assert!(OrderPaymentStatus::PartiallyPaid.has_payment_rows());
        assert!(OrderPaymentStatus::Refunded.has_payment_rows());
        assert!(!OrderPaymentStatus::Pending.has_payment_rows());
        assert!(!OrderPaymentStatus::PartiallyRefunded.has_payment_rows());
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&InvoiceStatus::PartiallyPaid).unwrap();
        assert_eq!(json, "\"partially_paid\"");
        let back: InvoiceStatus = serde_json::from_str("\"partially_returned\"").unwrap();
        assert_eq!(back, InvoiceStatus::PartiallyReturned);
    }

    #[test]
    fn return_target_serde_is_tagged() {
        let t = ReturnTarget::Invoice("inv-9".into());
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "{\"kind\":\"invoice\",\"id\":\"inv-9\"}");
    }
}
