use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::{Validate, ValidationError};

use crate::{
    auth::{consts, require, Authorizer},
    entities::{
        purchase::{self, Entity as PurchaseEntity, PurchaseStatus},
        supplier::{self, Entity as SupplierEntity},
        RecordStatus,
    },
    errors::ServiceError,
    services::{codes::CodeGenerator, ledger::round_money},
};

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("negative_opening_balance"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewSupplier {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub company_name: Option<String>,
    #[validate(length(min = 3, max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub opening_balance: Decimal,
}

/// A supplier with the amount currently owed to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierSummary {
    pub supplier: supplier::Model,
    pub total_due: Decimal,
}

/// Opening balance plus the due of every live, non-cancelled purchase.
pub async fn supplier_due<C: ConnectionTrait>(
    conn: &C,
    supplier: &supplier::Model,
) -> Result<Decimal, ServiceError> {
    let dues: Vec<Decimal> = PurchaseEntity::find()
        .select_only()
        .column(purchase::Column::Due)
        .filter(purchase::Column::SupplierId.eq(supplier.id))
        .filter(purchase::Column::DeletedAt.is_null())
        .filter(purchase::Column::Status.ne(PurchaseStatus::Cancelled))
        .into_tuple::<Decimal>()
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(round_money(
        supplier.opening_balance + dues.into_iter().sum::<Decimal>(),
    ))
}

#[derive(Clone)]
pub struct SupplierService {
    db: Arc<DatabaseConnection>,
    codes: CodeGenerator,
}

impl SupplierService {
    pub fn new(db: Arc<DatabaseConnection>, codes: CodeGenerator) -> Self {
        Self { db, codes }
    }

    #[instrument(skip(self, actor, input), fields(name = %input.name))]
    pub async fn create_supplier(
        &self,
        actor: &dyn Authorizer,
        input: NewSupplier,
    ) -> Result<supplier::Model, ServiceError> {
        require(actor, consts::SUPPLIERS_CREATE)?;
        input.validate()?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let code = self.codes.generate::<SupplierEntity, _>(&txn).await?;
        let now = Utc::now();
        let created = supplier::ActiveModel {
            code: Set(code),
            name: Set(input.name.trim().to_string()),
            company_name: Set(input.company_name),
            phone: Set(input.phone),
            email: Set(input.email),
            address: Set(input.address),
            opening_balance: Set(input.opening_balance),
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

        info!(supplier_id = created.id, code = %created.code, "Supplier created");
        Ok(created)
    }

    pub async fn get_supplier(&self, id: i64) -> Result<supplier::Model, ServiceError> {
        SupplierEntity::find_by_id(id)
            .filter(supplier::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", id)))
    }

    /// Amount owed to a supplier, derived from its purchases on every call.
    pub async fn total_due(&self, id: i64) -> Result<Decimal, ServiceError> {
        let supplier = self.get_supplier(id).await?;
        supplier_due(&*self.db, &supplier).await
    }

    pub async fn list_suppliers(
        &self,
        actor: &dyn Authorizer,
    ) -> Result<Vec<SupplierSummary>, ServiceError> {
        require(actor, consts::SUPPLIERS_READ)?;
        let db = &*self.db;
        let suppliers = SupplierEntity::find()
            .filter(supplier::Column::DeletedAt.is_null())
            .order_by_asc(supplier::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut summaries = Vec::with_capacity(suppliers.len());
        for supplier in suppliers {
            let total_due = supplier_due(db, &supplier).await?;
            summaries.push(SupplierSummary {
                supplier,
                total_due,
            });
        }
        Ok(summaries)
    }
}
