use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    auth::{consts, require, Authorizer},
    config::LedgerSettings,
    entities::{
        production::{self, Entity as ProductionEntity, ProductionStatus},
        production_item::{self, Entity as ProductionItemEntity},
        quotation::{Entity as QuotationEntity, QuotationStatus},
        quotation_item::{self, Entity as QuotationItemEntity},
        sale::{self, Entity as SaleEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        codes::CodeGenerator,
        ledger,
        lifecycle::{self, quotation_status_for},
        quotations::{load_quotation, sync_quotation_status},
    },
};

/// One costed production line. `total_price` is supplied by the caller; the
/// cost drivers are kept for reference.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProductionLineInput {
    pub quotation_item_id: Option<i64>,
    pub product_name: String,
    pub size: Option<String>,
    pub quantity: Decimal,
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
    #[serde(default)]
    pub price_per_piece: Decimal,
    #[serde(default)]
    pub total_price: Decimal,
    #[serde(default)]
    pub wastage_kg: Decimal,
    #[serde(default)]
    pub wastage_piece: Decimal,
}

impl ProductionLineInput {
    fn money_fields(&self) -> [(&'static str, Decimal); 10] {
        [
            ("envelope weight", self.envelope_weight),
            ("envelope price", self.envelope_price),
            ("loop weight", self.loop_weight),
            ("loop price", self.loop_price),
            ("print cost", self.print_cost),
            ("sewing cost", self.sewing_cost),
            ("price per piece", self.price_per_piece),
            ("total price", self.total_price),
            ("wastage kg", self.wastage_kg),
            ("wastage piece", self.wastage_piece),
        ]
    }
}

/// Editable part of a production order.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductionInput {
    #[serde(default = "default_status")]
    pub status: ProductionStatus,
    pub total_cost: Decimal,
    pub note: Option<String>,
    pub items: Vec<ProductionLineInput>,
}

fn default_status() -> ProductionStatus {
    ProductionStatus::Pending
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionDetail {
    pub production: production::Model,
    pub items: Vec<production_item::Model>,
}

pub(crate) fn validate_lines(
    lines: &[ProductionLineInput],
    verify_totals: bool,
) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "A production needs at least one item".to_string(),
        ));
    }

    for (index, line) in lines.iter().enumerate() {
        let line_no = index + 1;
        if line.product_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Item {} needs a product name",
                line_no
            )));
        }
        if line.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Item {} quantity must be positive, got: {}",
                line_no, line.quantity
            )));
        }
        if let Some((name, _)) = line
            .money_fields()
            .into_iter()
            .find(|(_, value)| *value < Decimal::ZERO)
        {
            return Err(ServiceError::ValidationError(format!(
                "Item {} {} cannot be negative",
                line_no, name
            )));
        }
        if verify_totals {
            let expected = ledger::expected_item_total(line.price_per_piece, line.quantity);
            if !ledger::within_tolerance(line.total_price, expected, ledger::PRICE_TOLERANCE) {
                return Err(ServiceError::ValidationError(format!(
                    "Item {} total {} does not match {} x {}",
                    line_no, line.total_price, line.price_per_piece, line.quantity
                )));
            }
        }
    }
    Ok(())
}

fn validate_input(input: &ProductionInput, verify_totals: bool) -> Result<(), ServiceError> {
    if !lifecycle::is_manual_production_status(input.status) {
        return Err(ServiceError::ValidationError(format!(
            "Status '{}' is set by raising a sale",
            input.status
        )));
    }
    if input.total_cost < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Total cost cannot be negative".to_string(),
        ));
    }
    validate_lines(&input.items, verify_totals)
}

/// Loads a production by id.
pub(crate) async fn load_production<C: ConnectionTrait>(
    conn: &C,
    id: i64,
) -> Result<production::Model, ServiceError> {
    ProductionEntity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Production {} not found", id)))
}

/// The non-deleted sale raised against a production, if any.
pub(crate) async fn live_sale_for_production<C: ConnectionTrait>(
    conn: &C,
    production_id: i64,
) -> Result<Option<sale::Model>, ServiceError> {
    SaleEntity::find()
        .filter(sale::Column::ProductionId.eq(production_id))
        .filter(sale::Column::DeletedAt.is_null())
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Moves a production to `status` and writes the implied status onto its
/// quotation. No transition check.
pub(crate) async fn force_production_status<C: ConnectionTrait>(
    conn: &C,
    production: production::Model,
    status: ProductionStatus,
) -> Result<production::Model, ServiceError> {
    let quotation = QuotationEntity::find_by_id(production.quotation_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if let Some(quotation) = quotation {
        sync_quotation_status(conn, quotation, quotation_status_for(status)).await?;
    }

    if production.status == status {
        return Ok(production);
    }
    let mut active: production::ActiveModel = production.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map_err(ServiceError::db_error)
}

async fn check_quotation_lines<C: ConnectionTrait>(
    conn: &C,
    quotation_id: i64,
    lines: &[ProductionLineInput],
) -> Result<(), ServiceError> {
    let referenced: Vec<i64> = lines.iter().filter_map(|l| l.quotation_item_id).collect();
    if referenced.is_empty() {
        return Ok(());
    }

    let owned: Vec<i64> = QuotationItemEntity::find()
        .select_only()
        .column(quotation_item::Column::Id)
        .filter(quotation_item::Column::QuotationId.eq(quotation_id))
        .into_tuple::<i64>()
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    match referenced.iter().find(|id| !owned.contains(id)) {
        Some(stray) => Err(ServiceError::ValidationError(format!(
            "Quotation item {} is not part of quotation {}",
            stray, quotation_id
        ))),
        None => Ok(()),
    }
}

async fn insert_lines<C: ConnectionTrait>(
    conn: &C,
    production_id: i64,
    lines: &[ProductionLineInput],
) -> Result<Vec<production_item::Model>, ServiceError> {
    let now = Utc::now();
    let mut items = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let item = production_item::ActiveModel {
            production_id: Set(production_id),
            line_no: Set(index as i32 + 1),
            quotation_item_id: Set(line.quotation_item_id),
            product_name: Set(line.product_name.trim().to_string()),
            size: Set(line.size.clone()),
            quantity: Set(line.quantity),
            envelope_weight: Set(line.envelope_weight),
            envelope_price: Set(line.envelope_price),
            loop_weight: Set(line.loop_weight),
            loop_price: Set(line.loop_price),
            print_cost: Set(line.print_cost),
            sewing_cost: Set(line.sewing_cost),
            price_per_piece: Set(line.price_per_piece),
            total_price: Set(line.total_price),
            wastage_kg: Set(line.wastage_kg),
            wastage_piece: Set(line.wastage_piece),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(|e| ServiceError::transaction_failed("insert production item", e))?;
        items.push(item);
    }
    Ok(items)
}

async fn items_of<C: ConnectionTrait>(
    conn: &C,
    production_id: i64,
) -> Result<Vec<production_item::Model>, ServiceError> {
    ProductionItemEntity::find()
        .filter(production_item::Column::ProductionId.eq(production_id))
        .order_by_asc(production_item::Column::LineNo)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Production manager: work orders raised from quotations.
#[derive(Clone)]
pub struct ProductionService {
    db: Arc<DatabaseConnection>,
    codes: CodeGenerator,
    settings: LedgerSettings,
    event_sender: Option<EventSender>,
}

impl ProductionService {
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

    /// Raises the production order for a quotation.
    ///
    /// The quotation's advance is copied onto the production and the
    /// quotation status follows the production status. Everything is written
    /// in one transaction.
    #[instrument(skip(self, actor, input), fields(status = %input.status))]
    pub async fn create_production(
        &self,
        actor: &dyn Authorizer,
        quotation_id: i64,
        input: ProductionInput,
    ) -> Result<ProductionDetail, ServiceError> {
        require(actor, consts::PRODUCTION_CREATE)?;
        validate_input(&input, self.settings.verify_item_totals)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let quotation = load_quotation(&txn, quotation_id).await?;

        let existing = ProductionEntity::find()
            .filter(production::Column::QuotationId.eq(quotation_id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Quotation {} already has a production order",
                quotation_id
            )));
        }

        let quotation_target = quotation_status_for(input.status);
        lifecycle::check_quotation_transition(
            self.settings.transition_policy,
            quotation.status,
            quotation_target,
        )?;
        check_quotation_lines(&txn, quotation_id, &input.items).await?;

        let code = self.codes.generate::<ProductionEntity, _>(&txn).await?;
        let advance_amount = quotation.advance_amount;
        let now = Utc::now();
        let created = production::ActiveModel {
            code: Set(code),
            quotation_id: Set(quotation_id),
            status: Set(input.status),
            total_cost: Set(input.total_cost),
            advance_amount: Set(advance_amount),
            final_cost: Set(ledger::final_cost(input.total_cost, advance_amount)),
            note: Set(input.note.clone()),
            created_by: Set(actor.actor_id()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::transaction_failed("insert production", e))?;

        let items = insert_lines(&txn, created.id, &input.items).await?;
        sync_quotation_status(&txn, quotation, quotation_target).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("bagworks.productions.created", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::ProductionCreated {
                    production_id: created.id,
                    quotation_id,
                })
                .await;
        }
        info!(
            production_id = created.id,
            quotation_id,
            final_cost = %created.final_cost,
            "Production created"
        );

        Ok(ProductionDetail {
            production: created,
            items,
        })
    }

    /// Replaces a production's costing and items, moving its status if asked.
    #[instrument(skip(self, actor, input), fields(status = %input.status))]
    pub async fn update_production(
        &self,
        actor: &dyn Authorizer,
        id: i64,
        input: ProductionInput,
    ) -> Result<ProductionDetail, ServiceError> {
        require(actor, consts::PRODUCTION_UPDATE)?;
        validate_input(&input, self.settings.verify_item_totals)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = load_production(&txn, id).await?;
        let old_status = existing.status;

        if old_status == ProductionStatus::Delivered {
            return Err(ServiceError::InvalidOperation(format!(
                "Production {} has been delivered and can no longer be edited",
                id
            )));
        }
        lifecycle::check_production_transition(
            self.settings.transition_policy,
            old_status,
            input.status,
        )?;
        check_quotation_lines(&txn, existing.quotation_id, &input.items).await?;

        ProductionItemEntity::delete_many()
            .filter(production_item::Column::ProductionId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("delete production items", e))?;

        let advance_amount = existing.advance_amount;
        let mut active: production::ActiveModel = existing.into();
        active.total_cost = Set(input.total_cost);
        active.final_cost = Set(ledger::final_cost(input.total_cost, advance_amount));
        active.note = Set(input.note.clone());
        active.updated_at = Set(Utc::now());
        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("update production", e))?;

        let items = insert_lines(&txn, id, &input.items).await?;
        let updated = force_production_status(&txn, updated, input.status).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if old_status != input.status {
            counter!("bagworks.productions.status_changed", 1);
            if let Some(sender) = &self.event_sender {
                sender
                    .send_or_log(Event::ProductionStatusChanged {
                        production_id: id,
                        old_status: old_status.to_string(),
                        new_status: input.status.to_string(),
                    })
                    .await;
            }
        }
        info!(production_id = id, from = %old_status, to = %input.status, "Production updated");

        Ok(ProductionDetail {
            production: updated,
            items,
        })
    }

    /// Deletes a production and its items, reverting the quotation to pending.
    #[instrument(skip(self, actor))]
    pub async fn delete_production(
        &self,
        actor: &dyn Authorizer,
        id: i64,
    ) -> Result<(), ServiceError> {
        require(actor, consts::PRODUCTION_DELETE)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = load_production(&txn, id).await?;

        if let Some(sale) = live_sale_for_production(&txn, id).await? {
            return Err(ServiceError::Conflict(format!(
                "Production {} is sold on sale {}",
                id, sale.code
            )));
        }

        let quotation_id = existing.quotation_id;
        if let Some(quotation) = QuotationEntity::find_by_id(quotation_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
        {
            sync_quotation_status(&txn, quotation, QuotationStatus::Pending).await?;
        }

        // Deleted sales keep their history but lose the link.
        SaleEntity::update_many()
            .col_expr(sale::Column::ProductionId, Expr::value(Option::<i64>::None))
            .filter(sale::Column::ProductionId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("unlink deleted sales", e))?;

        ProductionItemEntity::delete_many()
            .filter(production_item::Column::ProductionId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("delete production items", e))?;
        ProductionEntity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| ServiceError::transaction_failed("delete production", e))?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::ProductionDeleted {
                    production_id: id,
                    quotation_id,
                })
                .await;
        }
        info!(production_id = id, quotation_id, "Production deleted");
        Ok(())
    }

    pub async fn get_production(
        &self,
        actor: &dyn Authorizer,
        id: i64,
    ) -> Result<ProductionDetail, ServiceError> {
        require(actor, consts::PRODUCTION_READ)?;
        let db = &*self.db;
        let production = load_production(db, id).await?;
        let items = items_of(db, id).await?;
        Ok(ProductionDetail { production, items })
    }

    /// Productions that can be sold: completed and not on a live sale.
    #[instrument(skip(self, actor))]
    pub async fn list_completed_unsold(
        &self,
        actor: &dyn Authorizer,
    ) -> Result<Vec<production::Model>, ServiceError> {
        require(actor, consts::PRODUCTION_READ)?;
        let db = &*self.db;

        let sold: Vec<i64> = SaleEntity::find()
            .select_only()
            .column(sale::Column::ProductionId)
            .filter(sale::Column::DeletedAt.is_null())
            .filter(sale::Column::ProductionId.is_not_null())
            .into_tuple::<Option<i64>>()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .flatten()
            .collect();

        let mut query =
            ProductionEntity::find().filter(production::Column::Status.eq(ProductionStatus::Completed));
        if !sold.is_empty() {
            query = query.filter(production::Column::Id.is_not_in(sold));
        }
        query
            .order_by_desc(production::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Production raised for a quotation, if any.
    pub async fn find_by_quotation(
        &self,
        quotation_id: i64,
    ) -> Result<Option<production::Model>, ServiceError> {
        ProductionEntity::find()
            .filter(production::Column::QuotationId.eq(quotation_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, price_per_piece: Decimal, total_price: Decimal) -> ProductionLineInput {
        ProductionLineInput {
            product_name: "D-cut bag".to_string(),
            quantity,
            price_per_piece,
            total_price,
            ..Default::default()
        }
    }

    #[test]
    fn totals_are_trusted_unless_verification_is_on() {
        let lines = vec![line(dec!(100), dec!(2.50), dec!(300))];
        assert!(validate_lines(&lines, false).is_ok());
        assert_matches!(
            validate_lines(&lines, true),
            Err(ServiceError::ValidationError(_))
        );

        let exact = vec![line(dec!(100), dec!(2.50), dec!(250.01))];
        assert!(validate_lines(&exact, true).is_ok());
    }

    #[test]
    fn negative_cost_driver_is_rejected() {
        let mut bad = line(dec!(10), dec!(1), dec!(10));
        bad.print_cost = dec!(-1);
        let err = validate_lines(&[bad], false).unwrap_err();
        assert!(err.to_string().contains("print cost"));
    }

    #[test]
    fn delivered_cannot_be_requested() {
        let input = ProductionInput {
            status: ProductionStatus::Delivered,
            total_cost: dec!(500),
            note: None,
            items: vec![line(dec!(1), dec!(1), dec!(1))],
        };
        assert_matches!(
            validate_input(&input, false),
            Err(ServiceError::ValidationError(_))
        );
    }
}
