use chrono::{NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    auth::{consts, require, Authorizer},
    entities::{
        item::{self, Entity as ItemEntity},
        payment::{self, PayableType},
        purchase::{self, Entity as PurchaseEntity, PurchaseStatus},
        purchase_item::{self, Entity as PurchaseItemEntity},
        supplier::{self, Entity as SupplierEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        catalog::require_items,
        codes::CodeGenerator,
        ledger::{self, Discount},
        payments::{check_amount, check_cents, payments_for, record_payment, PaymentInput},
    },
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseLineInput {
    pub item_id: i64,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Recorded per line; the line total stays `quantity * unit_price`.
    #[serde(default)]
    pub item_discount: Decimal,
    #[serde(default)]
    pub item_tax: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseInput {
    pub supplier_id: i64,
    pub purchase_date: NaiveDate,
    pub reference_no: Option<String>,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub other_charges: Decimal,
    #[serde(default)]
    pub paid: Decimal,
    #[serde(default = "default_method")]
    pub payment_method: String,
    pub notes: Option<String>,
    pub items: Vec<PurchaseLineInput>,
}

fn default_method() -> String {
    "cash".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseDetail {
    pub purchase: purchase::Model,
    pub items: Vec<purchase_item::Model>,
    pub payments: Vec<payment::Model>,
}

/// Header amounts of a purchase, derived from its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseTotals {
    pub total_qty: Decimal,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub due: Decimal,
}

impl PurchaseTotals {
    pub fn status(&self) -> PurchaseStatus {
        status_for_due(self.due)
    }
}

fn status_for_due(due: Decimal) -> PurchaseStatus {
    if due <= Decimal::ZERO {
        PurchaseStatus::Completed
    } else {
        PurchaseStatus::Pending
    }
}

pub fn compute_totals(input: &PurchaseInput) -> Result<PurchaseTotals, ServiceError> {
    if input.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "A purchase needs at least one item".to_string(),
        ));
    }
    for (index, line) in input.items.iter().enumerate() {
        if line.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Item {} quantity must be positive, got: {}",
                index + 1,
                line.quantity
            )));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Item {} unit price cannot be negative",
                index + 1
            )));
        }
    }
    if input.discount.is_negative() {
        return Err(ServiceError::ValidationError(
            "Discount cannot be negative".to_string(),
        ));
    }
    if matches!(input.discount, Discount::Percentage(p) if p > dec!(100)) {
        return Err(ServiceError::ValidationError(
            "Percentage discount cannot exceed 100".to_string(),
        ));
    }
    if input.other_charges < Decimal::ZERO || input.paid < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Other charges and paid amount cannot be negative".to_string(),
        ));
    }
    check_cents(input.paid)?;

    let total_qty: Decimal = input.items.iter().map(|l| l.quantity).sum();
    let subtotal = ledger::subtotal(input.items.iter().map(|l| (l.quantity, l.unit_price)));
    let discount = input.discount.amount(subtotal);
    let total = ledger::document_total(subtotal, input.other_charges, discount, Decimal::ZERO);
    if total < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Discount {} exceeds subtotal plus charges",
            discount
        )));
    }

    Ok(PurchaseTotals {
        total_qty,
        subtotal,
        discount,
        total,
        due: ledger::purchase_due(total, input.paid),
    })
}

async fn load_purchase<C: ConnectionTrait>(
    conn: &C,
    id: i64,
) -> Result<purchase::Model, ServiceError> {
    PurchaseEntity::find_by_id(id)
        .filter(purchase::Column::DeletedAt.is_null())
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Purchase {} not found", id)))
}

/// Adds received stock to product items and records the last purchase price as cost.
async fn receive_stock<C: ConnectionTrait>(
    conn: &C,
    line: &PurchaseLineInput,
) -> Result<(), ServiceError> {
    let Some(model) = ItemEntity::find_by_id(line.item_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
    else {
        return Ok(());
    };
    if !model.is_product() {
        return Ok(());
    }

    let stock = model.stock + line.quantity;
    let mut active: item::ActiveModel = model.into();
    active.stock = Set(stock);
    active.cost = Set(line.unit_price);
    active.updated_at = Set(Utc::now());
    active
        .update(conn)
        .await
        .map_err(|e| ServiceError::transaction_failed("update item stock", e))?;
    Ok(())
}

#[derive(Clone)]
pub struct PurchaseService {
    db: Arc<DatabaseConnection>,
    codes: CodeGenerator,
    event_sender: Option<EventSender>,
}

impl PurchaseService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        codes: CodeGenerator,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            codes,
            event_sender,
        }
    }

    /// Records goods bought from a supplier, updating product stock and
    /// recording any amount paid up front.
    #[instrument(skip(self, actor, input), fields(supplier_id = input.supplier_id))]
    pub async fn create_purchase(
        &self,
        actor: &dyn Authorizer,
        input: PurchaseInput,
    ) -> Result<PurchaseDetail, ServiceError> {
        require(actor, consts::PURCHASES_CREATE)?;
        let totals = compute_totals(&input)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        SupplierEntity::find_by_id(input.supplier_id)
            .filter(supplier::Column::DeletedAt.is_null())
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Supplier {} does not exist",
                    input.supplier_id
                ))
            })?;
        let item_ids: Vec<i64> = input.items.iter().map(|l| l.item_id).collect();
        require_items(&txn, &item_ids).await?;

        let code = self.codes.generate::<PurchaseEntity, _>(&txn).await?;
        let now = Utc::now();
        let created = purchase::ActiveModel {
            code: Set(code),
            supplier_id: Set(input.supplier_id),
            purchase_date: Set(input.purchase_date),
            reference_no: Set(input.reference_no.clone()),
            total_qty: Set(totals.total_qty),
            subtotal: Set(totals.subtotal),
            discount_type: Set(input.discount.kind()),
            discount_value: Set(input.discount.value()),
            discount: Set(totals.discount),
            other_charges: Set(input.other_charges),
            tax: Set(Decimal::ZERO),
            total: Set(totals.total),
            paid: Set(input.paid),
            due: Set(totals.due),
            status: Set(totals.status()),
            notes: Set(input.notes.clone()),
            created_by: Set(actor.actor_id()),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::transaction_failed("insert purchase", e))?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let item = purchase_item::ActiveModel {
                purchase_id: Set(created.id),
                item_id: Set(line.item_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                item_discount: Set(line.item_discount),
                item_tax: Set(line.item_tax),
                total: Set(ledger::line_total(line.quantity, line.unit_price)),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("insert purchase item", e))?;
            items.push(item);
            receive_stock(&txn, line).await?;
        }

        let mut payments = Vec::new();
        if input.paid > Decimal::ZERO {
            let upfront = PaymentInput {
                method: input.payment_method.clone(),
                ..PaymentInput::cash(input.paid, input.purchase_date)
            };
            payments.push(
                record_payment(
                    &txn,
                    &self.codes,
                    PayableType::Purchase,
                    created.id,
                    &upfront,
                    actor.actor_id(),
                )
                .await?,
            );
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("bagworks.purchases.created", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseCreated {
                    purchase_id: created.id,
                    supplier_id: created.supplier_id,
                    due: created.due,
                })
                .await;
        }
        info!(purchase_id = created.id, code = %created.code, due = %created.due, "Purchase created");

        Ok(PurchaseDetail {
            purchase: created,
            items,
            payments,
        })
    }

    /// Pays down a purchase. The amount may not exceed the current due.
    #[instrument(skip(self, actor, input), fields(amount = %input.amount))]
    pub async fn receive_purchase_payment(
        &self,
        actor: &dyn Authorizer,
        purchase_id: i64,
        input: PaymentInput,
    ) -> Result<purchase::Model, ServiceError> {
        require(actor, consts::PURCHASES_CREATE)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = load_purchase(&txn, purchase_id).await?;
        if existing.status == PurchaseStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(format!(
                "Purchase {} is cancelled",
                purchase_id
            )));
        }
        check_amount(input.amount, existing.due)?;

        let payment = record_payment(
            &txn,
            &self.codes,
            PayableType::Purchase,
            purchase_id,
            &input,
            actor.actor_id(),
        )
        .await?;

        let paid = ledger::round_money(existing.paid + input.amount);
        let due = ledger::purchase_due(existing.total, paid);
        let mut active: purchase::ActiveModel = existing.into();
        active.paid = Set(paid);
        active.due = Set(due);
        active.status = Set(status_for_due(due));
        active.updated_at = Set(Utc::now());
        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("update purchase payment totals", e))?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("bagworks.payments.made", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PaymentReceived {
                    payment_id: payment.id,
                    payable_type: PayableType::Purchase.to_string(),
                    payable_id: purchase_id,
                    amount: payment.amount,
                })
                .await;
        }
        info!(purchase_id, due = %updated.due, "Purchase payment recorded");
        Ok(updated)
    }

    pub async fn get_purchase(
        &self,
        actor: &dyn Authorizer,
        id: i64,
    ) -> Result<PurchaseDetail, ServiceError> {
        require(actor, consts::PURCHASES_READ)?;
        let db = &*self.db;
        let purchase = load_purchase(db, id).await?;
        let items = PurchaseItemEntity::find()
            .filter(purchase_item::Column::PurchaseId.eq(id))
            .order_by_asc(purchase_item::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let payments = payments_for(db, PayableType::Purchase, id).await?;
        Ok(PurchaseDetail {
            purchase,
            items,
            payments,
        })
    }
}
