use chrono::{NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    auth::{consts, require, Authorizer},
    config::LedgerSettings,
    entities::{
        customer::{self, Entity as CustomerEntity},
        customer_balance_entry::{self, BalanceReason},
        payment::{self, PayableType},
        production::{self, ProductionStatus},
        production_item::{self, Entity as ProductionItemEntity},
        sale::{self, Entity as SaleEntity, SaleStatus, SaleType},
        sale_item::{self, Entity as SaleItemEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        codes::CodeGenerator,
        customers::{adjust_balance, customer_for_actor, publish_adjustments, DocumentRef},
        ledger,
        payments::{check_amount, check_cents, payments_for, record_payment, PaymentInput},
        productions::{force_production_status, live_sale_for_production, load_production},
    },
};

/// A sold line. Cost fields are stored as given and never re-read from the
/// production afterwards.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SaleLineInput {
    pub production_item_id: Option<i64>,
    pub item_name: String,
    pub size: Option<String>,
    pub gsm: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub envelope_weight: Decimal,
    #[serde(default)]
    pub envelope_price: Decimal,
    #[serde(default)]
    pub loop_weight: Decimal,
    #[serde(default)]
    pub loop_price: Decimal,
    #[serde(default)]
    pub print_cost: Decimal,
    #[serde(default)]
    pub sewing_cost: Decimal,
    pub quantity: Decimal,
    #[serde(default)]
    pub price_per_piece: Decimal,
    #[serde(default)]
    pub total_price: Decimal,
}

impl From<&production_item::Model> for SaleLineInput {
    fn from(item: &production_item::Model) -> Self {
        Self {
            production_item_id: Some(item.id),
            item_name: item.product_name.clone(),
            size: item.size.clone(),
            gsm: None,
            color: None,
            envelope_weight: item.envelope_weight,
            envelope_price: item.envelope_price,
            loop_weight: item.loop_weight,
            loop_price: item.loop_price,
            print_cost: item.print_cost,
            sewing_cost: item.sewing_cost,
            quantity: item.quantity,
            price_per_piece: item.price_per_piece,
            total_price: item.total_price,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleInput {
    pub customer_id: i64,
    /// `None` for a direct sale without a production order.
    pub production_id: Option<i64>,
    #[serde(default = "default_sale_type")]
    pub sale_type: SaleType,
    pub sale_date: NaiveDate,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub other_costs: Decimal,
    pub grand_total: Decimal,
    /// Paid at the counter when the sale is raised. On update it must equal
    /// the stored amount; later money goes through payments.
    #[serde(default)]
    pub paid_amount: Decimal,
    #[serde(default)]
    pub advance_adjusted: Decimal,
    pub note: Option<String>,
    pub items: Vec<SaleLineInput>,
}

fn default_sale_type() -> SaleType {
    SaleType::Wholesale
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleDetail {
    pub sale: sale::Model,
    pub items: Vec<sale_item::Model>,
    pub payments: Vec<payment::Model>,
}

/// Result of recording a payment against a sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalePayment {
    pub payment: payment::Model,
    pub sale: sale::Model,
    pub balance_entry: customer_balance_entry::Model,
}

fn validate_input(input: &SaleInput, verify_totals: bool) -> Result<Decimal, ServiceError> {
    if input.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "A sale needs at least one item".to_string(),
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
        if line.total_price < Decimal::ZERO || line.price_per_piece < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Item {} price cannot be negative",
                index + 1
            )));
        }
        if verify_totals {
            let expected = ledger::expected_item_total(line.price_per_piece, line.quantity);
            if !ledger::within_tolerance(line.total_price, expected, ledger::PRICE_TOLERANCE) {
                return Err(ServiceError::ValidationError(format!(
                    "Item {} total {} does not match {} x {}",
                    index + 1,
                    line.total_price,
                    line.price_per_piece,
                    line.quantity
                )));
            }
        }
    }

    for (name, value) in [
        ("Discount", input.discount),
        ("Tax", input.tax),
        ("Other costs", input.other_costs),
        ("Grand total", input.grand_total),
        ("Paid amount", input.paid_amount),
        ("Advance adjusted", input.advance_adjusted),
    ] {
        if value < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "{} cannot be negative",
                name
            )));
        }
    }

    check_cents(input.paid_amount)?;

    let subtotal: Decimal = input.items.iter().map(|l| l.total_price).sum();
    let computed = ledger::document_total(subtotal, input.other_costs, input.discount, input.tax);
    if !ledger::within_tolerance(input.grand_total, computed, ledger::PRICE_TOLERANCE) {
        if verify_totals {
            return Err(ServiceError::ValidationError(format!(
                "Grand total {} does not match computed total {}",
                input.grand_total, computed
            )));
        }
        warn!(
            submitted = %input.grand_total,
            computed = %computed,
            "Sale grand total differs from its items"
        );
    }
    Ok(ledger::round_money(subtotal))
}

async fn require_live_customer<C: ConnectionTrait>(
    conn: &C,
    customer_id: i64,
) -> Result<customer::Model, ServiceError> {
    CustomerEntity::find_by_id(customer_id)
        .filter(customer::Column::DeletedAt.is_null())
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("Customer {} does not exist", customer_id))
        })
}

/// A production that can be sold: completed and not on any live sale.
async fn sellable_production<C: ConnectionTrait>(
    conn: &C,
    production_id: i64,
) -> Result<production::Model, ServiceError> {
    let production = load_production(conn, production_id).await?;
    if production.status != ProductionStatus::Completed {
        return Err(ServiceError::Conflict(format!(
            "Production {} is {}, only completed productions can be sold",
            production_id, production.status
        )));
    }
    if let Some(existing) = live_sale_for_production(conn, production_id).await? {
        return Err(ServiceError::Conflict(format!(
            "Production {} is already sold on {}",
            production_id, existing.code
        )));
    }
    Ok(production)
}

/// Returns a sale's production to completed. A production that no longer
/// exists is skipped; any other failure aborts the caller's transaction.
async fn release_production<C: ConnectionTrait>(
    conn: &C,
    production_id: i64,
) -> Result<(), ServiceError> {
    match load_production(conn, production_id).await {
        Ok(production) => {
            force_production_status(conn, production, ProductionStatus::Completed).await?;
            Ok(())
        }
        Err(ServiceError::NotFound(_)) => {
            warn!(production_id, "Sale references a missing production");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn check_production_lines<C: ConnectionTrait>(
    conn: &C,
    production_id: Option<i64>,
    lines: &[SaleLineInput],
) -> Result<(), ServiceError> {
    let referenced: Vec<i64> = lines.iter().filter_map(|l| l.production_item_id).collect();
    if referenced.is_empty() {
        return Ok(());
    }
    let Some(production_id) = production_id else {
        return Err(ServiceError::ValidationError(
            "A direct sale cannot reference production items".to_string(),
        ));
    };

    let owned: Vec<i64> = ProductionItemEntity::find()
        .select_only()
        .column(production_item::Column::Id)
        .filter(production_item::Column::ProductionId.eq(production_id))
        .into_tuple::<i64>()
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    match referenced.iter().find(|id| !owned.contains(id)) {
        Some(stray) => Err(ServiceError::ValidationError(format!(
            "Production item {} is not part of production {}",
            stray, production_id
        ))),
        None => Ok(()),
    }
}

async fn insert_lines<C: ConnectionTrait>(
    conn: &C,
    sale_id: i64,
    lines: &[SaleLineInput],
) -> Result<Vec<sale_item::Model>, ServiceError> {
    let now = Utc::now();
    let mut items = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let item = sale_item::ActiveModel {
            sale_id: Set(sale_id),
            line_no: Set(index as i32 + 1),
            production_item_id: Set(line.production_item_id),
            item_name: Set(line.item_name.clone()),
            size: Set(line.size.clone()),
            gsm: Set(line.gsm.clone()),
            color: Set(line.color.clone()),
            envelope_weight: Set(line.envelope_weight),
            envelope_price: Set(line.envelope_price),
            loop_weight: Set(line.loop_weight),
            loop_price: Set(line.loop_price),
            print_cost: Set(line.print_cost),
            sewing_cost: Set(line.sewing_cost),
            quantity: Set(line.quantity),
            price_per_piece: Set(line.price_per_piece),
            total_price: Set(line.total_price),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(|e| ServiceError::transaction_failed("insert sale item", e))?;
        items.push(item);
    }
    Ok(items)
}

async fn load_sale<C: ConnectionTrait>(conn: &C, id: i64) -> Result<sale::Model, ServiceError> {
    SaleEntity::find_by_id(id)
        .filter(sale::Column::DeletedAt.is_null())
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", id)))
}

/// Sale manager: delivers productions to customers and collects payments.
///
/// Every change to a sale's `due_amount` is mirrored onto the customer's
/// running balance in the same transaction.
#[derive(Clone)]
pub struct SaleService {
    db: Arc<DatabaseConnection>,
    codes: CodeGenerator,
    settings: LedgerSettings,
    event_sender: Option<EventSender>,
}

impl SaleService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        codes: CodeGenerator,
        settings: LedgerSettings,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            codes,
            settings,
            event_sender,
        }
    }

    /// Raises a sale, marks its production and quotation delivered and
    /// charges the due amount to the customer.
    #[instrument(skip(self, actor, input), fields(customer_id = input.customer_id, production_id = ?input.production_id))]
    pub async fn create_sale(
        &self,
        actor: &dyn Authorizer,
        input: SaleInput,
    ) -> Result<SaleDetail, ServiceError> {
        require(actor, consts::SALES_CREATE)?;
        let subtotal = validate_input(&input, self.settings.verify_item_totals)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        require_live_customer(&txn, input.customer_id).await?;

        let production = match input.production_id {
            Some(production_id) => Some(sellable_production(&txn, production_id).await?),
            None => None,
        };
        check_production_lines(&txn, input.production_id, &input.items).await?;

        let due = ledger::sale_due(input.grand_total, input.paid_amount, input.advance_adjusted);
        let code = self.codes.generate::<SaleEntity, _>(&txn).await?;
        let now = Utc::now();
        let created = sale::ActiveModel {
            code: Set(code),
            customer_id: Set(input.customer_id),
            production_id: Set(input.production_id),
            sale_type: Set(input.sale_type),
            sale_date: Set(input.sale_date),
            subtotal: Set(subtotal),
            discount: Set(input.discount),
            tax: Set(input.tax),
            other_costs: Set(input.other_costs),
            grand_total: Set(input.grand_total),
            advance_adjusted: Set(input.advance_adjusted),
            paid_amount: Set(input.paid_amount),
            due_amount: Set(due),
            status: Set(SaleStatus::Completed),
            note: Set(input.note.clone()),
            created_by: Set(actor.actor_id()),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::transaction_failed("insert sale", e))?;

        if let Some(production) = production {
            force_production_status(&txn, production, ProductionStatus::Delivered).await?;
        }

        let items = insert_lines(&txn, created.id, &input.items).await?;

        let mut payments = Vec::new();
        if input.paid_amount > Decimal::ZERO {
            let upfront = PaymentInput {
                notes: Some("Paid when the sale was raised".to_string()),
                ..PaymentInput::cash(input.paid_amount, input.sale_date)
            };
            payments.push(
                record_payment(
                    &txn,
                    &self.codes,
                    PayableType::Sale,
                    created.id,
                    &upfront,
                    actor.actor_id(),
                )
                .await?,
            );
        }

        let mut entries = Vec::new();
        if !due.is_zero() {
            entries.push(
                adjust_balance(
                    &txn,
                    created.customer_id,
                    due,
                    BalanceReason::SaleCreated,
                    Some(DocumentRef::sale(created.id)),
                )
                .await?,
            );
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("bagworks.sales.created", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::SaleCreated {
                    sale_id: created.id,
                    customer_id: created.customer_id,
                    due_amount: due,
                })
                .await;
        }
        publish_adjustments(&self.event_sender, &entries).await;
        info!(sale_id = created.id, code = %created.code, due = %due, "Sale created");

        Ok(SaleDetail {
            sale: created,
            items,
            payments,
        })
    }

    /// Edits a sale, moving its balance contribution to match the new due
    /// amount and customer. Relinking to another production returns the old
    /// one to the sellable pool.
    #[instrument(skip(self, actor, input))]
    pub async fn update_sale(
        &self,
        actor: &dyn Authorizer,
        id: i64,
        input: SaleInput,
    ) -> Result<SaleDetail, ServiceError> {
        require(actor, consts::SALES_UPDATE)?;
        let subtotal = validate_input(&input, self.settings.verify_item_totals)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = load_sale(&txn, id).await?;
        if input.paid_amount != existing.paid_amount {
            return Err(ServiceError::ValidationError(format!(
                "Paid amount is {} and can only change through payments, got: {}",
                existing.paid_amount, input.paid_amount
            )));
        }
        require_live_customer(&txn, input.customer_id).await?;

        if existing.production_id != input.production_id {
            let replacement = match input.production_id {
                Some(production_id) => Some(sellable_production(&txn, production_id).await?),
                None => None,
            };
            if let Some(old_id) = existing.production_id {
                release_production(&txn, old_id).await?;
            }
            if let Some(replacement) = replacement {
                force_production_status(&txn, replacement, ProductionStatus::Delivered).await?;
            }
        }
        check_production_lines(&txn, input.production_id, &input.items).await?;

        let old_customer = existing.customer_id;
        let old_due = existing.due_amount;
        let new_due =
            ledger::sale_due(input.grand_total, existing.paid_amount, input.advance_adjusted);

        let mut active: sale::ActiveModel = existing.into();
        active.customer_id = Set(input.customer_id);
        active.production_id = Set(input.production_id);
        active.sale_type = Set(input.sale_type);
        active.sale_date = Set(input.sale_date);
        active.subtotal = Set(subtotal);
        active.discount = Set(input.discount);
        active.tax = Set(input.tax);
        active.other_costs = Set(input.other_costs);
        active.grand_total = Set(input.grand_total);
        active.advance_adjusted = Set(input.advance_adjusted);
        active.due_amount = Set(new_due);
        active.note = Set(input.note.clone());
        active.updated_at = Set(Utc::now());
        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("update sale", e))?;

        SaleItemEntity::delete_many()
            .filter(sale_item::Column::SaleId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("delete sale items", e))?;
        let items = insert_lines(&txn, id, &input.items).await?;

        let reason = if old_customer == input.customer_id {
            BalanceReason::SaleUpdated
        } else {
            BalanceReason::SaleReassigned
        };
        let mut entries = Vec::new();
        for (customer_id, delta) in
            ledger::reassignment_deltas(old_customer, old_due, input.customer_id, new_due)
        {
            if delta.is_zero() {
                continue;
            }
            entries.push(
                adjust_balance(&txn, customer_id, delta, reason, Some(DocumentRef::sale(id)))
                    .await?,
            );
        }

        let payments = payments_for(&txn, PayableType::Sale, id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::SaleUpdated(id)).await;
        }
        publish_adjustments(&self.event_sender, &entries).await;
        info!(sale_id = id, old_due = %old_due, new_due = %new_due, "Sale updated");

        Ok(SaleDetail {
            sale: updated,
            items,
            payments,
        })
    }

    /// Records a payment against a sale and credits the customer.
    #[instrument(skip(self, actor, input), fields(amount = %input.amount))]
    pub async fn receive_payment(
        &self,
        actor: &dyn Authorizer,
        sale_id: i64,
        input: PaymentInput,
    ) -> Result<SalePayment, ServiceError> {
        require(actor, consts::PAYMENTS_COLLECT)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let sale = load_sale(&txn, sale_id).await?;
        check_amount(input.amount, sale.due_amount)?;

        let payment = record_payment(
            &txn,
            &self.codes,
            PayableType::Sale,
            sale_id,
            &input,
            actor.actor_id(),
        )
        .await?;

        let customer_id = sale.customer_id;
        let paid_amount = ledger::round_money(sale.paid_amount + input.amount);
        let due_amount = ledger::round_money(sale.due_amount - input.amount);
        let mut active: sale::ActiveModel = sale.into();
        active.paid_amount = Set(paid_amount);
        active.due_amount = Set(due_amount);
        active.updated_at = Set(Utc::now());
        let sale = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("update sale payment totals", e))?;

        let balance_entry = adjust_balance(
            &txn,
            customer_id,
            -input.amount,
            BalanceReason::PaymentReceived,
            Some(DocumentRef::payment(payment.id)),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("bagworks.payments.received", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PaymentReceived {
                    payment_id: payment.id,
                    payable_type: PayableType::Sale.to_string(),
                    payable_id: sale_id,
                    amount: payment.amount,
                })
                .await;
        }
        publish_adjustments(&self.event_sender, std::slice::from_ref(&balance_entry)).await;
        info!(sale_id, payment_id = payment.id, due = %sale.due_amount, "Payment received");

        Ok(SalePayment {
            payment,
            sale,
            balance_entry,
        })
    }

    /// Soft-deletes a sale.
    ///
    /// The remaining due is taken back off the customer's balance and the
    /// production returns to completed so it can be sold again. Items and
    /// payments stay as history.
    #[instrument(skip(self, actor))]
    pub async fn destroy_sale(&self, actor: &dyn Authorizer, id: i64) -> Result<(), ServiceError> {
        require(actor, consts::SALES_DELETE)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let sale = load_sale(&txn, id).await?;

        let mut entries = Vec::new();
        if !sale.due_amount.is_zero() {
            entries.push(
                adjust_balance(
                    &txn,
                    sale.customer_id,
                    -sale.due_amount,
                    BalanceReason::SaleDeleted,
                    Some(DocumentRef::sale(id)),
                )
                .await?,
            );
        }

        if let Some(production_id) = sale.production_id {
            release_production(&txn, production_id).await?;
        }

        let mut active: sale::ActiveModel = sale.into();
        let now = Utc::now();
        active.status = Set(SaleStatus::Cancelled);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("soft delete sale", e))?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("bagworks.sales.deleted", 1);
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::SaleDeleted(id)).await;
        }
        publish_adjustments(&self.event_sender, &entries).await;
        info!(sale_id = id, "Sale deleted");
        Ok(())
    }

    /// Loads a live sale with its items and payments. Customers only see their own.
    #[instrument(skip(self, actor))]
    pub async fn get_sale(&self, actor: &dyn Authorizer, id: i64) -> Result<SaleDetail, ServiceError> {
        require(actor, consts::SALES_READ)?;
        let db = &*self.db;
        let sale = load_sale(db, id).await?;

        if actor.is_customer() {
            let own = customer_for_actor(db, actor).await?;
            if own.id != sale.customer_id {
                return Err(ServiceError::Forbidden(format!(
                    "Sale {} does not belong to this customer",
                    id
                )));
            }
        }

        let items = SaleItemEntity::find()
            .filter(sale_item::Column::SaleId.eq(id))
            .order_by_asc(sale_item::Column::LineNo)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let payments = payments_for(db, PayableType::Sale, id).await?;

        Ok(SaleDetail {
            sale,
            items,
            payments,
        })
    }

    /// Live sales, newest first; customers see only their own.
    pub async fn list_sales(
        &self,
        actor: &dyn Authorizer,
        customer_id: Option<i64>,
    ) -> Result<Vec<sale::Model>, ServiceError> {
        require(actor, consts::SALES_READ)?;
        let db = &*self.db;

        let customer_id = if actor.is_customer() {
            Some(customer_for_actor(db, actor).await?.id)
        } else {
            customer_id
        };

        let mut query = SaleEntity::find().filter(sale::Column::DeletedAt.is_null());
        if let Some(customer_id) = customer_id {
            query = query.filter(sale::Column::CustomerId.eq(customer_id));
        }
        query
            .order_by_desc(sale::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn list_payments(
        &self,
        actor: &dyn Authorizer,
        sale_id: i64,
    ) -> Result<Vec<payment::Model>, ServiceError> {
        require(actor, consts::PAYMENTS_READ)?;
        payments_for(&*self.db, PayableType::Sale, sale_id).await
    }

    /// Sale lines prefilled from a production's items.
    pub async fn lines_from_production(
        &self,
        production_id: i64,
    ) -> Result<Vec<SaleLineInput>, ServiceError> {
        let items = ProductionItemEntity::find()
            .filter(production_item::Column::ProductionId.eq(production_id))
            .order_by_asc(production_item::Column::LineNo)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(items.iter().map(SaleLineInput::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn input(grand_total: Decimal) -> SaleInput {
        SaleInput {
            customer_id: 1,
            production_id: None,
            sale_type: SaleType::Local,
            sale_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            other_costs: Decimal::ZERO,
            grand_total,
            paid_amount: Decimal::ZERO,
            advance_adjusted: Decimal::ZERO,
            note: None,
            items: vec![SaleLineInput {
                item_name: "W-cut bag".to_string(),
                quantity: dec!(100),
                price_per_piece: dec!(10),
                total_price: dec!(1000),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn subtotal_is_sum_of_line_totals() {
        assert_eq!(validate_input(&input(dec!(1000)), false).unwrap(), dec!(1000));
    }

    #[test]
    fn grand_total_mismatch_only_fails_when_verifying() {
        assert!(validate_input(&input(dec!(900)), false).is_ok());
        assert_matches!(
            validate_input(&input(dec!(900)), true),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn negative_paid_amount_is_rejected() {
        let mut sale = input(dec!(1000));
        sale.paid_amount = dec!(-1);
        assert_matches!(
            validate_input(&sale, false),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn paid_amount_must_be_whole_cents() {
        let mut sale = input(dec!(1000));
        sale.paid_amount = dec!(100.005);
        assert_matches!(
            validate_input(&sale, false),
            Err(ServiceError::ValidationError(_))
        );
    }
}
