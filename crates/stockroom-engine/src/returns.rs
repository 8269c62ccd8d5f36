//! # Returns Engine
//!
//! Partial and full returns against an invoice or an order. One transaction
//! covers the over-return guard, the restock, the return rows and the parent
//! status rollup, so two concurrent partial returns against the same line
//! cannot both see the pre-update returned sum.
//!
//! ## Cumulative Quantity Guard
//! ```text
//! remaining = original line qty − Σ(returned qty over non-rejected returns)
//! requested > remaining  →  InvalidStateTransition, whole return rejected
//! ```
//! Lines within one request that reference the same original line count
//! against each other too, not just against previously persisted returns.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use stockroom_core::types::{
    InvoiceStatus, OrderPaymentStatus, OrderStatus, ReturnItem, ReturnLineSource, ReturnRecord,
    ReturnStatus, ReturnTarget,
};
use stockroom_core::{validation, CoreError, Money};
use stockroom_db::repository::{invoice, order, returns};
use stockroom_db::{ledger, Database};

use crate::error::{EngineError, EngineResult};
use crate::hooks::{DomainEvent, EventSink};

/// One requested return line.
#[derive(Debug, Clone)]
pub struct ReturnLineRequest {
    pub source: ReturnLineSource,
    pub quantity: i64,
}

/// A return request against exactly one invoice or order.
#[derive(Debug, Clone)]
pub struct ReturnRequest {
    pub target: ReturnTarget,
    pub reason: String,
    pub lines: Vec<ReturnLineRequest>,
    /// Refund channel; `None` lets finance infer one from the parent.
    pub refund_method: Option<String>,
    /// Include the order's shipping fee in the refund total. Ignored for
    /// invoice targets (POS sales carry no shipping).
    pub refund_shipping: bool,
}

/// A return with its lines.
#[derive(Debug, Clone)]
pub struct ReturnDetail {
    pub record: ReturnRecord,
    pub items: Vec<ReturnItem>,
}

/// The parent row fields the return flow needs, regardless of target kind.
struct ParentSummary {
    location_id: String,
    total: Money,
    shipping_fee: Money,
}

pub struct ReturnsEngine {
    db: Database,
    events: Arc<dyn EventSink>,
}

impl ReturnsEngine {
    pub fn new(db: Database, events: Arc<dyn EventSink>) -> Self {
        ReturnsEngine { db, events }
    }

    /// Processes a return: guards cumulative quantities, restocks each line
    /// at the parent's location, persists the return and rolls the parent's
    /// status up — all in one transaction.
    #[instrument(skip(self, request), fields(target_kind = request.target.kind(), target_id = request.target.id()))]
    pub async fn create_return(&self, request: ReturnRequest) -> EngineResult<ReturnRecord> {
        validation::non_empty_lines("lines", &request.lines)?;
        validation::required("reason", &request.reason)?;
        for line in &request.lines {
            validation::positive_quantity("quantity", line.quantity)?;
        }

        let mut tx = self.db.begin().await?;

        let parent = load_parent(&mut tx, &request.target).await?;

        let return_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut refund_total = Money::zero();
        let mut items = Vec::with_capacity(request.lines.len());
        // Return items are persisted after the loop, so earlier lines in this
        // request are not yet visible to returned_quantity_for_source.
        let mut requested_so_far: HashMap<&ReturnLineSource, i64> = HashMap::new();

        for line in &request.lines {
            let original = load_original_line(&mut tx, &request.target, &line.source).await?;

            let already = returns::returned_quantity_for_source(&mut *tx, &line.source).await?
                + requested_so_far.get(&line.source).copied().unwrap_or(0);
            let remaining = original.quantity - already;
            if line.quantity > remaining {
                return Err(CoreError::invalid_transition(
                    original.entity,
                    line.source.id(),
                    format!("{already} of {} units already returned", original.quantity),
                    "return",
                )
                .into());
            }

            *requested_so_far.entry(&line.source).or_insert(0) += line.quantity;

            ledger::add(&mut tx, &original.variant_id, &parent.location_id, line.quantity)
                .await?;

            let refund_amount = original.unit_price.times(line.quantity);
            refund_total += refund_amount;

            items.push(ReturnItem {
                id: Uuid::new_v4().to_string(),
                return_id: return_id.clone(),
                source: line.source.clone(),
                quantity: line.quantity,
                refund_amount,
                created_at: now,
            });
        }

        if request.refund_shipping && parent.shipping_fee.is_positive() {
            refund_total += parent.shipping_fee;
        }

        let record = ReturnRecord {
            id: return_id.clone(),
            target: request.target.clone(),
            reason: request.reason.clone(),
            refund_method: request.refund_method.clone(),
            refund_total,
            status: ReturnStatus::Approved,
            created_at: now,
        };

        returns::insert_return(&mut *tx, &record).await?;
        for item in &items {
            returns::insert_return_item(&mut *tx, item).await?;
        }

        roll_up_parent(&mut tx, &request.target, parent.total).await?;

        tx.commit().await.map_err(EngineError::from)?;

        info!(return_id = %record.id, refund_total = %record.refund_total, "return created");
        self.events.notify(&DomainEvent::ReturnCreated {
            return_id: record.id.clone(),
            refund_total: record.refund_total,
        });
        Ok(record)
    }

    /// Loads a return with its lines.
    pub async fn get_return(&self, return_id: &str) -> EngineResult<ReturnDetail> {
        let record = returns::get_return(self.db.pool(), return_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Return", return_id))?;
        let items = returns::get_return_items(self.db.pool(), return_id).await?;

        Ok(ReturnDetail { record, items })
    }
}

async fn load_parent(
    tx: &mut Transaction<'_, Sqlite>,
    target: &ReturnTarget,
) -> EngineResult<ParentSummary> {
    match target {
        ReturnTarget::Invoice(id) => {
            let inv = invoice::get_invoice(&mut **tx, id)
                .await?
                .ok_or_else(|| CoreError::not_found("Invoice", id))?;
            if inv.status == InvoiceStatus::Cancelled {
                return Err(
                    CoreError::invalid_transition("Invoice", id, inv.status.as_str(), "return")
                        .into(),
                );
            }
            Ok(ParentSummary {
                location_id: inv.location_id,
                total: inv.total,
                shipping_fee: Money::zero(),
            })
        }
        ReturnTarget::Order(id) => {
            let ord = order::get_order(&mut **tx, id)
                .await?
                .ok_or_else(|| CoreError::not_found("Order", id))?;
            if ord.status == OrderStatus::Cancelled {
                return Err(
                    CoreError::invalid_transition("Order", id, ord.status.as_str(), "return")
                        .into(),
                );
            }
            Ok(ParentSummary {
                location_id: ord.location_id,
                total: ord.total,
                shipping_fee: ord.shipping_fee,
            })
        }
    }
}

/// The original-line fields the guard and refund math need.
struct OriginalLine {
    entity: &'static str,
    variant_id: String,
    quantity: i64,
    unit_price: Money,
}

/// Loads the original line behind a return line and checks it belongs to
/// the return's target. A mismatched kind or parent is reported as NotFound:
/// that line does not exist under this target.
async fn load_original_line(
    tx: &mut Transaction<'_, Sqlite>,
    target: &ReturnTarget,
    source: &ReturnLineSource,
) -> EngineResult<OriginalLine> {
    match (target, source) {
        (ReturnTarget::Invoice(parent_id), ReturnLineSource::InvoiceLine(line_id)) => {
            let item = invoice::get_invoice_item(&mut **tx, line_id)
                .await?
                .filter(|item| &item.invoice_id == parent_id)
                .ok_or_else(|| CoreError::not_found("InvoiceItem", line_id))?;
            Ok(OriginalLine {
                entity: "InvoiceItem",
                variant_id: item.variant_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
        }
        (ReturnTarget::Order(parent_id), ReturnLineSource::OrderLine(line_id)) => {
            let item = order::get_order_item(&mut **tx, line_id)
                .await?
                .filter(|item| &item.order_id == parent_id)
                .ok_or_else(|| CoreError::not_found("OrderItem", line_id))?;
            Ok(OriginalLine {
                entity: "OrderItem",
                variant_id: item.variant_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
        }
        (_, source) => Err(CoreError::not_found(
            match source {
                ReturnLineSource::InvoiceLine(_) => "InvoiceItem",
                ReturnLineSource::OrderLine(_) => "OrderItem",
            },
            source.id(),
        )
        .into()),
    }
}

/// Recomputes the refunded-so-far sum (including the return just inserted,
/// since we are inside its transaction) and writes the parent's rollup.
async fn roll_up_parent(
    tx: &mut Transaction<'_, Sqlite>,
    target: &ReturnTarget,
    parent_total: Money,
) -> EngineResult<()> {
    let all = returns::returns_for_target(&mut **tx, target.kind(), target.id()).await?;
    let refunded: Money = all.iter().map(|r| r.refund_total).sum();
    let fully = refunded >= parent_total;

    match target {
        ReturnTarget::Invoice(id) => {
            let status = if fully {
                InvoiceStatus::Returned
            } else {
                InvoiceStatus::PartiallyReturned
            };
            invoice::set_status(&mut **tx, id, status).await?;
        }
        ReturnTarget::Order(id) => {
            let (status, payment_status) = if fully {
                (OrderStatus::Returned, OrderPaymentStatus::Refunded)
            } else {
                (
                    OrderStatus::PartiallyReturned,
                    OrderPaymentStatus::PartiallyRefunded,
                )
            };
            order::set_return_rollup(&mut **tx, id, status, payment_status).await?;
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
