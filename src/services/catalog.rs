use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    auth::{consts, require, Authorizer},
    entities::{
        item::{self, Entity as ItemEntity},
        RecordStatus,
    },
    errors::ServiceError,
    services::codes::CodeGenerator,
};

/// What quotations need from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
}

impl From<item::Model> for CatalogEntry {
    fn from(model: item::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: model.price,
        }
    }
}

/// Looks up a live catalog item.
pub async fn find_item<C: ConnectionTrait>(
    conn: &C,
    item_id: i64,
) -> Result<Option<CatalogEntry>, ServiceError> {
    Ok(ItemEntity::find_by_id(item_id)
        .filter(item::Column::DeletedAt.is_null())
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .map(CatalogEntry::from))
}

/// Looks up several items at once, failing with a validation error naming
/// the first unknown id.
pub async fn require_items<C: ConnectionTrait>(
    conn: &C,
    item_ids: &[i64],
) -> Result<HashMap<i64, CatalogEntry>, ServiceError> {
    let found: HashMap<i64, CatalogEntry> = ItemEntity::find()
        .filter(item::Column::Id.is_in(item_ids.iter().copied()))
        .filter(item::Column::DeletedAt.is_null())
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|m| (m.id, CatalogEntry::from(m)))
        .collect();

    if let Some(missing) = item_ids.iter().find(|id| !found.contains_key(id)) {
        return Err(ServiceError::ValidationError(format!(
            "Item {} does not exist",
            missing
        )));
    }
    Ok(found)
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewItem {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// `product` or `raw_material`; defaults to `product`.
    pub kind: Option<String>,
    pub unit: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub cost: Decimal,
    pub size: Option<String>,
    pub gsm: Option<String>,
    pub color: Option<String>,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    codes: CodeGenerator,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, codes: CodeGenerator) -> Self {
        Self { db, codes }
    }

    #[instrument(skip(self, actor, input), fields(name = %input.name))]
    pub async fn create_item(
        &self,
        actor: &dyn Authorizer,
        input: NewItem,
    ) -> Result<item::Model, ServiceError> {
        require(actor, consts::ITEMS_CREATE)?;
        input.validate()?;
        if input.price < Decimal::ZERO || input.cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Item price and cost cannot be negative".to_string(),
            ));
        }
        let kind = input.kind.unwrap_or_else(|| "product".to_string());
        if kind != "product" && kind != "raw_material" {
            return Err(ServiceError::ValidationError(format!(
                "Unknown item kind '{}'",
                kind
            )));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let code = self.codes.generate::<ItemEntity, _>(&txn).await?;
        let now = Utc::now();
        let created = item::ActiveModel {
            code: Set(code),
            name: Set(input.name.trim().to_string()),
            kind: Set(kind),
            unit: Set(input.unit),
            price: Set(input.price),
            cost: Set(input.cost),
            stock: Set(Decimal::ZERO),
            size: Set(input.size),
            gsm: Set(input.gsm),
            color: Set(input.color),
            status: Set(RecordStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(item_id = created.id, code = %created.code, "Catalog item created");
        Ok(created)
    }

    pub async fn find_item(&self, item_id: i64) -> Result<Option<CatalogEntry>, ServiceError> {
        find_item(&*self.db, item_id).await
    }

    /// Changes the catalog price. Existing quotations keep their prices.
    #[instrument(skip(self, actor))]
    pub async fn update_price(
        &self,
        actor: &dyn Authorizer,
        item_id: i64,
        price: Decimal,
    ) -> Result<item::Model, ServiceError> {
        require(actor, consts::ITEMS_UPDATE)?;
        if price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Item price cannot be negative".to_string(),
            ));
        }
        let model = ItemEntity::find_by_id(item_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        let mut active: item::ActiveModel = model.into();
        active.price = Set(price);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await.map_err(ServiceError::db_error)
    }

    /// Renames an item. Quotation lines keep the name captured when written.
    #[instrument(skip(self, actor))]
    pub async fn rename_item(
        &self,
        actor: &dyn Authorizer,
        item_id: i64,
        name: String,
    ) -> Result<item::Model, ServiceError> {
        require(actor, consts::ITEMS_UPDATE)?;
        if name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Item name cannot be empty".to_string(),
            ));
        }
        let model = ItemEntity::find_by_id(item_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        let mut active: item::ActiveModel = model.into();
        active.name = Set(name.trim().to_string());
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await.map_err(ServiceError::db_error)
    }

    pub async fn active_items(&self) -> Result<Vec<item::Model>, ServiceError> {
        ItemEntity::find()
            .filter(item::Column::Status.eq(RecordStatus::Active))
            .filter(item::Column::DeletedAt.is_null())
            .order_by_asc(item::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}
