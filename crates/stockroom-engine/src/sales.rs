//! # Sales Engine (POS Invoices)
//!
//! Invoice lifecycle:
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Invoice Lifecycle                                  │
//! │                                                                         │
//! │  create_invoice      reserve stock per line, snapshot prices,          │
//! │                      pre-compute commission        → pending           │
//! │  create_payment      append Payment, accumulate paid_amount            │
//! │                      paid ≥ total → auto-complete  → paid              │
//! │                      else                          → partially_paid    │
//! │  complete_invoice    deduct per line (consumes the reservation)        │
//! │  cancel_invoice      paid → restock (add); else → release hold         │
//! │                      void pending commission       → cancelled         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation is one transaction: a failing line aborts the whole
//! invoice, never leaving partial reservations or deductions behind.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use stockroom_core::types::{
    CommissionRecord, CommissionStatus, Invoice, InvoiceItem, InvoiceStatus, Payment, PaymentState,
};
use stockroom_core::{validation, CoreError, Money};
use stockroom_db::repository::{catalog, invoice, payment};
use stockroom_db::{ledger, Database};

use crate::error::{EngineError, EngineResult};
use crate::hooks::{DomainEvent, EventSink};

/// One requested invoice line. `unit_price = None` means "sell at the
/// variant's resolved retail price".
#[derive(Debug, Clone)]
pub struct InvoiceLineRequest {
    pub variant_id: String,
    pub quantity: i64,
    pub unit_price: Option<Money>,
}

/// An invoice with its lines and payments.
#[derive(Debug, Clone)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
}

pub struct SalesEngine {
    db: Database,
    events: Arc<dyn EventSink>,
}

impl SalesEngine {
    pub fn new(db: Database, events: Arc<dyn EventSink>) -> Self {
        SalesEngine { db, events }
    }

    /// Creates a POS invoice: reserves stock per line, snapshots pricing,
    /// and pre-computes the employee commission.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn create_invoice(
        &self,
        lines: Vec<InvoiceLineRequest>,
        location_id: &str,
        employee_id: &str,
    ) -> EngineResult<Invoice> {
        validation::non_empty_lines("lines", &lines)?;
        validation::required("location_id", location_id)?;
        validation::required("employee_id", employee_id)?;
        for line in &lines {
            validation::positive_quantity("quantity", line.quantity)?;
        }

        let mut tx = self.db.begin().await?;

        catalog::get_location(&mut *tx, location_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Location", location_id))?;
        let employee = catalog::get_employee(&mut *tx, employee_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Employee", employee_id))?;

        let invoice_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut subtotal = Money::zero();
        let mut total_profit = Money::zero();
        let mut items = Vec::with_capacity(lines.len());

        for line in &lines {
            let pricing = catalog::variant_pricing(&mut *tx, &line.variant_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Variant", &line.variant_id))?;

            // Atomic soft hold; a losing race aborts the whole invoice.
            ledger::reserve(&mut tx, &line.variant_id, location_id, line.quantity).await?;

            let unit_price = line.unit_price.unwrap_or(pricing.retail_price);
            let cost_price = pricing.cost_price;
            let line_total = unit_price.times(line.quantity);
            let profit_margin = (unit_price - cost_price).times(line.quantity);

            subtotal += line_total;
            total_profit += profit_margin;

            items.push(InvoiceItem {
                id: Uuid::new_v4().to_string(),
                invoice_id: invoice_id.clone(),
                variant_id: line.variant_id.clone(),
                quantity: line.quantity,
                unit_price,
                cost_price,
                profit_margin,
                line_total,
                created_at: now,
            });
        }

        let commission_amount = employee.commission_rate().commission_on(total_profit);

        let record = Invoice {
            id: invoice_id.clone(),
            location_id: location_id.to_string(),
            employee_id: employee_id.to_string(),
            status: InvoiceStatus::Pending,
            subtotal,
            total: subtotal,
            paid_amount: Money::zero(),
            commission_amount,
            created_at: now,
            updated_at: now,
        };

        invoice::insert_invoice(&mut *tx, &record).await?;
        for item in &items {
            invoice::insert_invoice_item(&mut *tx, item).await?;
        }

        if commission_amount.is_positive() {
            invoice::insert_commission(
                &mut *tx,
                &CommissionRecord {
                    id: Uuid::new_v4().to_string(),
                    invoice_id: invoice_id.clone(),
                    employee_id: employee_id.to_string(),
                    amount: commission_amount,
                    status: CommissionStatus::Pending,
                    created_at: now,
                },
            )
            .await?;
        }

        tx.commit().await.map_err(EngineError::from)?;

        info!(invoice_id = %record.id, total = %record.total, "invoice created");
        Ok(record)
    }

    /// Records a payment against a pending/partially-paid invoice.
    ///
    /// When accumulated payments reach the total, the invoice auto-completes
    /// inside the same transaction (stock deducted, status `paid`).
    #[instrument(skip(self))]
    pub async fn create_payment(
        &self,
        invoice_id: &str,
        method_id: &str,
        amount: Money,
    ) -> EngineResult<Invoice> {
        validation::positive_amount("amount", amount)?;

        let mut tx = self.db.begin().await?;

        let record = invoice::get_invoice(&mut *tx, invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", invoice_id))?;

        match record.status {
            InvoiceStatus::Draft | InvoiceStatus::Pending | InvoiceStatus::PartiallyPaid => {}
            other => {
                return Err(CoreError::invalid_transition(
                    "Invoice",
                    invoice_id,
                    other.as_str(),
                    "pay",
                )
                .into());
            }
        }

        payment::method_by_id(&mut *tx, method_id)
            .await?
            .ok_or_else(|| CoreError::not_found("PaymentMethod", method_id))?;

        payment::insert_payment(
            &mut *tx,
            &Payment {
                id: Uuid::new_v4().to_string(),
                invoice_id: Some(invoice_id.to_string()),
                method_id: method_id.to_string(),
                amount,
                status: PaymentState::Completed,
                created_at: Utc::now(),
            },
        )
        .await?;

        let paid_amount = record.paid_amount + amount;
        let completed = paid_amount >= record.total;

        let status = if completed {
            deduct_invoice_lines(&mut tx, invoice_id, &record.location_id).await?;
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::PartiallyPaid
        };
        invoice::apply_payment(&mut *tx, invoice_id, paid_amount, status).await?;

        tx.commit().await.map_err(EngineError::from)?;

        info!(invoice_id, paid = %paid_amount, status = %status, "payment recorded");
        if completed {
            self.events.notify(&DomainEvent::InvoiceCompleted {
                invoice_id: invoice_id.to_string(),
                total: record.total,
            });
        }

        let mut updated = record;
        updated.paid_amount = paid_amount;
        updated.status = status;
        Ok(updated)
    }

    /// Completes an invoice: converts each line's reservation into a
    /// physical deduction. Rejected when already paid or cancelled.
    #[instrument(skip(self))]
    pub async fn complete_invoice(&self, invoice_id: &str) -> EngineResult<()> {
        let mut tx = self.db.begin().await?;

        let record = invoice::get_invoice(&mut *tx, invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", invoice_id))?;

        match record.status {
            InvoiceStatus::Draft | InvoiceStatus::Pending | InvoiceStatus::PartiallyPaid => {}
            other => {
                return Err(CoreError::invalid_transition(
                    "Invoice",
                    invoice_id,
                    other.as_str(),
                    "complete",
                )
                .into());
            }
        }

        deduct_invoice_lines(&mut tx, invoice_id, &record.location_id).await?;
        invoice::set_status(&mut *tx, invoice_id, InvoiceStatus::Paid).await?;

        tx.commit().await.map_err(EngineError::from)?;

        info!(invoice_id, "invoice completed");
        self.events.notify(&DomainEvent::InvoiceCompleted {
            invoice_id: invoice_id.to_string(),
            total: record.total,
        });
        Ok(())
    }

    /// Cancels an invoice, compensating whatever stock movement happened:
    /// restock if the invoice was paid (stock was deducted), release the
    /// hold otherwise. A second cancel is rejected, so compensation runs
    /// exactly once.
    #[instrument(skip(self))]
    pub async fn cancel_invoice(&self, invoice_id: &str) -> EngineResult<()> {
        let mut tx = self.db.begin().await?;

        let record = invoice::get_invoice(&mut *tx, invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", invoice_id))?;

        if record.status == InvoiceStatus::Cancelled {
            return Err(CoreError::invalid_transition(
                "Invoice",
                invoice_id,
                record.status.as_str(),
                "cancel",
            )
            .into());
        }

        let was_paid = record.status == InvoiceStatus::Paid;
        let items = invoice::get_invoice_items(&mut *tx, invoice_id).await?;

        for item in &items {
            if was_paid {
                ledger::add(&mut tx, &item.variant_id, &record.location_id, item.quantity)
                    .await?;
            } else {
                ledger::release(&mut tx, &item.variant_id, &record.location_id, item.quantity)
                    .await?;
            }
        }

        invoice::void_commissions(&mut *tx, invoice_id).await?;
        invoice::set_status(&mut *tx, invoice_id, InvoiceStatus::Cancelled).await?;

        tx.commit().await.map_err(EngineError::from)?;

        info!(invoice_id, was_paid, "invoice cancelled");
        Ok(())
    }

    /// Loads an invoice with its lines and payments.
    pub async fn get_invoice(&self, invoice_id: &str) -> EngineResult<InvoiceDetail> {
        let record = invoice::get_invoice(self.db.pool(), invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", invoice_id))?;
        let items = invoice::get_invoice_items(self.db.pool(), invoice_id).await?;
        let payments = payment::get_payments_for_invoice(self.db.pool(), invoice_id).await?;

        Ok(InvoiceDetail {
            invoice: record,
            items,
            payments,
        })
    }
}

/// Deducts every line of an invoice (completion path). Runs inside the
/// caller's transaction.
async fn deduct_invoice_lines(
    tx: &mut Transaction<'_, Sqlite>,
    invoice_id: &str,
    location_id: &str,
) -> EngineResult<()> {
    let items = invoice::get_invoice_items(&mut **tx, invoice_id).await?;
    for item in &items {
        ledger::deduct(tx, &item.variant_id, location_id, item.quantity).await?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
