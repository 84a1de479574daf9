use chrono::{NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    auth::{consts, require, Authorizer},
    config::LedgerSettings,
    entities::{
        customer::{self, Entity as CustomerEntity},
        production::{self, Entity as ProductionEntity},
        quotation::{self, Entity as QuotationEntity, QuotationStatus},
        quotation_item::{self, Entity as QuotationItemEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        catalog::{require_items, CatalogEntry},
        codes::CodeGenerator,
        customers::customer_for_actor,
        ledger, lifecycle,
    },
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotationLineInput {
    pub item_id: i64,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub size: Option<String>,
    pub color: Option<String>,
    pub gsm: Option<String>,
    pub print_color: Option<String>,
    pub print_side: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotationInput {
    pub customer_id: i64,
    pub quotation_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub items: Vec<QuotationLineInput>,
    #[serde(default)]
    pub other_charges: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub advance_amount: Decimal,
    /// Subtotal as computed by the client. Informational only.
    pub submitted_subtotal: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

/// A quotation with its lines in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotationDetail {
    pub quotation: quotation::Model,
    pub items: Vec<quotation_item::Model>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotationFilter {
    pub status: Option<QuotationStatus>,
    pub customer_id: Option<i64>,
}

/// Totals computed server-side from the submitted lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QuotationTotals {
    subtotal: Decimal,
    total: Decimal,
}

fn validate_input(input: &QuotationInput) -> Result<(), ServiceError> {
    if input.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "A quotation needs at least one item".to_string(),
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

    for (name, value) in [
        ("Other charges", input.other_charges),
        ("Discount", input.discount),
        ("Advance amount", input.advance_amount),
    ] {
        if value < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "{} cannot be negative",
                name
            )));
        }
    }

    if let Some(valid_until) = input.valid_until {
        if valid_until < input.quotation_date {
            return Err(ServiceError::ValidationError(format!(
                "Valid until ({}) cannot be before the quotation date ({})",
                valid_until, input.quotation_date
            )));
        }
    }

    Ok(())
}

/// Rejects any line whose price strays from the catalog price by more than `tolerance`.
fn check_prices(
    lines: &[QuotationLineInput],
    catalog: &HashMap<i64, CatalogEntry>,
    tolerance: Decimal,
) -> Result<(), ServiceError> {
    for line in lines {
        if let Some(entry) = catalog.get(&line.item_id) {
            if !ledger::within_tolerance(line.unit_price, entry.price, tolerance) {
                counter!("bagworks.quotations.price_tampered", 1);
                warn!(
                    item_id = line.item_id,
                    submitted = %line.unit_price,
                    catalog = %entry.price,
                    "Rejected quotation line with non-catalog price"
                );
                return Err(ServiceError::PriceTampered {
                    item_id: line.item_id,
                    submitted: line.unit_price,
                    catalog: entry.price,
                });
            }
        }
    }
    Ok(())
}

fn compute_totals(input: &QuotationInput) -> Result<QuotationTotals, ServiceError> {
    let subtotal = ledger::subtotal(input.items.iter().map(|l| (l.quantity, l.unit_price)));

    if let Some(submitted) = input.submitted_subtotal {
        if submitted != subtotal {
            warn!(
                submitted = %submitted,
                computed = %subtotal,
                "Client subtotal differs from computed subtotal; using computed value"
            );
        }
    }

    let total = ledger::document_total(subtotal, input.other_charges, input.discount, Decimal::ZERO);
    if total < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Discount {} exceeds subtotal plus charges",
            input.discount
        )));
    }
    Ok(QuotationTotals { subtotal, total })
}

/// Loads a quotation that has not been soft-deleted.
pub(crate) async fn load_quotation<C: ConnectionTrait>(
    conn: &C,
    id: i64,
) -> Result<quotation::Model, ServiceError> {
    QuotationEntity::find_by_id(id)
        .filter(quotation::Column::DeletedAt.is_null())
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Quotation {} not found", id)))
}

/// Writes `status` onto a quotation as a side effect of another document.
pub(crate) async fn sync_quotation_status<C: ConnectionTrait>(
    conn: &C,
    quotation: quotation::Model,
    status: QuotationStatus,
) -> Result<quotation::Model, ServiceError> {
    if quotation.status == status {
        return Ok(quotation);
    }
    let mut active: quotation::ActiveModel = quotation.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map_err(ServiceError::db_error)
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

async fn insert_lines<C: ConnectionTrait>(
    conn: &C,
    quotation_id: i64,
    lines: &[QuotationLineInput],
    catalog: &HashMap<i64, CatalogEntry>,
) -> Result<Vec<quotation_item::Model>, ServiceError> {
    let now = Utc::now();
    let mut items = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let description = catalog
            .get(&line.item_id)
            .map(|entry| entry.name.clone())
            .unwrap_or_default();

        let item = quotation_item::ActiveModel {
            quotation_id: Set(quotation_id),
            line_no: Set(index as i32 + 1),
            item_id: Set(line.item_id),
            description: Set(description),
            size: Set(line.size.clone()),
            color: Set(line.color.clone()),
            gsm: Set(line.gsm.clone()),
            print_color: Set(line.print_color.clone()),
            print_side: Set(line.print_side.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            total: Set(ledger::line_total(line.quantity, line.unit_price)),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(|e| ServiceError::transaction_failed("insert quotation item", e))?;
        items.push(item);
    }
    Ok(items)
}

/// Quotation manager: price-locked proposals to customers.
#[derive(Clone)]
pub struct QuotationService {
    db: Arc<DatabaseConnection>,
    codes: CodeGenerator,
    settings: LedgerSettings,
    event_sender: Option<EventSender>,
}

impl QuotationService {
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

    /// Creates a pending quotation.
    ///
    /// Customer-role actors may only quote for their own customer record and
    /// must submit catalog prices; anything else is rejected before any row
    /// is written.
    #[instrument(skip(self, actor, input), fields(customer_id = input.customer_id))]
    pub async fn create_quotation(
        &self,
        actor: &dyn Authorizer,
        input: QuotationInput,
    ) -> Result<QuotationDetail, ServiceError> {
        require(actor, consts::QUOTATIONS_CREATE)?;
        validate_input(&input)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        require_live_customer(&txn, input.customer_id).await?;
        if actor.is_customer() {
            let own = customer_for_actor(&txn, actor).await?;
            if own.id != input.customer_id {
                return Err(ServiceError::Forbidden(
                    "Customers can only request quotations for themselves".to_string(),
                ));
            }
        }

        let item_ids: Vec<i64> = input.items.iter().map(|l| l.item_id).collect();
        let catalog = require_items(&txn, &item_ids).await?;
        if actor.is_customer() {
            check_prices(&input.items, &catalog, self.settings.price_tolerance)?;
        }
        let totals = compute_totals(&input)?;

        let code = self.codes.generate::<QuotationEntity, _>(&txn).await?;
        let now = Utc::now();
        let created = quotation::ActiveModel {
            code: Set(code),
            customer_id: Set(input.customer_id),
            quotation_date: Set(input.quotation_date),
            valid_until: Set(input.valid_until),
            subtotal: Set(totals.subtotal),
            other_charges: Set(input.other_charges),
            discount: Set(input.discount),
            tax: Set(Decimal::ZERO),
            total: Set(totals.total),
            advance_amount: Set(input.advance_amount),
            status: Set(QuotationStatus::Pending),
            notes: Set(input.notes.clone()),
            terms: Set(input.terms.clone()),
            created_by: Set(actor.actor_id()),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::transaction_failed("insert quotation", e))?;

        let items = insert_lines(&txn, created.id, &input.items, &catalog).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("bagworks.quotations.created", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::QuotationCreated {
                    quotation_id: created.id,
                    customer_id: created.customer_id,
                    total: created.total,
                })
                .await;
        }
        info!(
            quotation_id = created.id,
            code = %created.code,
            total = %created.total,
            "Quotation created"
        );

        Ok(QuotationDetail {
            quotation: created,
            items,
        })
    }

    /// Replaces a quotation's header and its full item list.
    #[instrument(skip(self, actor, input))]
    pub async fn update_quotation(
        &self,
        actor: &dyn Authorizer,
        id: i64,
        input: QuotationInput,
    ) -> Result<QuotationDetail, ServiceError> {
        require(actor, consts::QUOTATIONS_UPDATE)?;
        validate_input(&input)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = load_quotation(&txn, id).await?;

        if actor.is_customer() {
            let own = customer_for_actor(&txn, actor).await?;
            if existing.customer_id != own.id || input.customer_id != own.id {
                return Err(ServiceError::Forbidden(format!(
                    "Quotation {} does not belong to this customer",
                    id
                )));
            }
        }

        if matches!(
            existing.status,
            QuotationStatus::Delivered | QuotationStatus::Completed
        ) {
            return Err(ServiceError::InvalidOperation(format!(
                "Quotation {} is {} and can no longer be edited",
                id, existing.status
            )));
        }

        require_live_customer(&txn, input.customer_id).await?;
        let item_ids: Vec<i64> = input.items.iter().map(|l| l.item_id).collect();
        let catalog = require_items(&txn, &item_ids).await?;
        if actor.is_customer() {
            check_prices(&input.items, &catalog, self.settings.price_tolerance)?;
        }
        let totals = compute_totals(&input)?;

        QuotationItemEntity::delete_many()
            .filter(quotation_item::Column::QuotationId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("delete quotation items", e))?;

        let mut active: quotation::ActiveModel = existing.into();
        active.customer_id = Set(input.customer_id);
        active.quotation_date = Set(input.quotation_date);
        active.valid_until = Set(input.valid_until);
        active.subtotal = Set(totals.subtotal);
        active.other_charges = Set(input.other_charges);
        active.discount = Set(input.discount);
        active.total = Set(totals.total);
        active.advance_amount = Set(input.advance_amount);
        active.notes = Set(input.notes.clone());
        active.terms = Set(input.terms.clone());
        active.updated_at = Set(Utc::now());
        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("update quotation", e))?;

        let items = insert_lines(&txn, id, &input.items, &catalog).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::QuotationUpdated(id)).await;
        }
        info!(quotation_id = id, total = %updated.total, "Quotation updated");

        Ok(QuotationDetail {
            quotation: updated,
            items,
        })
    }

    /// Sets a quotation's status directly. Setting the current status again
    /// is a no-op.
    #[instrument(skip(self, actor))]
    pub async fn update_status(
        &self,
        actor: &dyn Authorizer,
        id: i64,
        new_status: QuotationStatus,
    ) -> Result<quotation::Model, ServiceError> {
        require(actor, consts::QUOTATIONS_APPROVE)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = load_quotation(&txn, id).await?;
        let old_status = existing.status;

        if old_status == new_status {
            return Ok(existing);
        }
        lifecycle::check_quotation_transition(
            self.settings.transition_policy,
            old_status,
            new_status,
        )?;

        let updated = sync_quotation_status(&txn, existing, new_status).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::QuotationStatusChanged {
                    quotation_id: id,
                    old_status: old_status.to_string(),
                    new_status: new_status.to_string(),
                })
                .await;
        }
        info!(quotation_id = id, from = %old_status, to = %new_status, "Quotation status changed");
        Ok(updated)
    }

    /// Loads a quotation with its items. Customers only see their own.
    #[instrument(skip(self, actor))]
    pub async fn get_quotation(
        &self,
        actor: &dyn Authorizer,
        id: i64,
    ) -> Result<QuotationDetail, ServiceError> {
        require(actor, consts::QUOTATIONS_READ)?;
        let db = &*self.db;
        let quotation = load_quotation(db, id).await?;

        if actor.is_customer() {
            let own = customer_for_actor(db, actor).await?;
            if quotation.customer_id != own.id {
                return Err(ServiceError::Forbidden(format!(
                    "Quotation {} does not belong to this customer",
                    id
                )));
            }
        }

        let items = QuotationItemEntity::find()
            .filter(quotation_item::Column::QuotationId.eq(id))
            .order_by_asc(quotation_item::Column::LineNo)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(QuotationDetail { quotation, items })
    }

    /// Lists live quotations, newest first. Customers only see their own.
    #[instrument(skip(self, actor))]
    pub async fn list_quotations(
        &self,
        actor: &dyn Authorizer,
        filter: QuotationFilter,
    ) -> Result<Vec<quotation::Model>, ServiceError> {
        require(actor, consts::QUOTATIONS_READ)?;
        let db = &*self.db;

        let mut query = QuotationEntity::find().filter(quotation::Column::DeletedAt.is_null());
        if actor.is_customer() {
            let own = customer_for_actor(db, actor).await?;
            query = query.filter(quotation::Column::CustomerId.eq(own.id));
        } else if let Some(customer_id) = filter.customer_id {
            query = query.filter(quotation::Column::CustomerId.eq(customer_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(quotation::Column::Status.eq(status));
        }

        query
            .order_by_desc(quotation::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Soft-deletes a quotation that has no production.
    #[instrument(skip(self, actor))]
    pub async fn delete_quotation(
        &self,
        actor: &dyn Authorizer,
        id: i64,
    ) -> Result<(), ServiceError> {
        require(actor, consts::QUOTATIONS_DELETE)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = load_quotation(&txn, id).await?;

        let productions = ProductionEntity::find()
            .filter(production::Column::QuotationId.eq(id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if productions > 0 {
            return Err(ServiceError::Conflict(format!(
                "Quotation {} has a production order; delete it first",
                id
            )));
        }

        let mut active: quotation::ActiveModel = existing.into();
        let now = Utc::now();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&txn).await.map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::QuotationDeleted(id)).await;
        }
        info!(quotation_id = id, "Quotation deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn input(lines: Vec<(i64, Decimal, Decimal)>) -> QuotationInput {
        QuotationInput {
            customer_id: 1,
            quotation_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            valid_until: None,
            items: lines
                .into_iter()
                .map(|(item_id, quantity, unit_price)| QuotationLineInput {
                    item_id,
                    quantity,
                    unit_price,
                    ..Default::default()
                })
                .collect(),
            other_charges: Decimal::ZERO,
            discount: Decimal::ZERO,
            advance_amount: Decimal::ZERO,
            submitted_subtotal: None,
            notes: None,
            terms: None,
        }
    }

    #[test]
    fn empty_item_list_is_rejected() {
        assert_matches!(
            validate_input(&input(vec![])),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert_matches!(
            validate_input(&input(vec![(1, dec!(0), dec!(5))])),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn validity_cannot_precede_date() {
        let mut q = input(vec![(1, dec!(1), dec!(5))]);
        q.valid_until = NaiveDate::from_ymd_opt(2024, 5, 31);
        assert_matches!(validate_input(&q), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn computed_subtotal_wins_over_submitted() {
        let mut q = input(vec![(1, dec!(10), dec!(5.00)), (2, dec!(5), dec!(8.00))]);
        q.submitted_subtotal = Some(dec!(1.00));
        q.discount = dec!(10);
        let totals = compute_totals(&q).unwrap();
        assert_eq!(totals.subtotal, dec!(90.00));
        assert_eq!(totals.total, dec!(80.00));
    }

    #[test]
    fn oversized_discount_is_rejected() {
        let mut q = input(vec![(1, dec!(1), dec!(5.00))]);
        q.discount = dec!(6);
        assert_matches!(compute_totals(&q), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn price_check_uses_tolerance() {
        let catalog: HashMap<i64, CatalogEntry> = [(
            1,
            CatalogEntry {
                id: 1,
                name: "Loop bag".into(),
                price: dec!(5.00),
            },
        )]
        .into_iter()
        .collect();

        let ok = input(vec![(1, dec!(1), dec!(5.01))]);
        assert!(check_prices(&ok.items, &catalog, ledger::PRICE_TOLERANCE).is_ok());

        let tampered = input(vec![(1, dec!(1), dec!(4.50))]);
        assert_matches!(
            check_prices(&tampered.items, &catalog, ledger::PRICE_TOLERANCE),
            Err(ServiceError::PriceTampered { item_id: 1, .. })
        );
    }
}
