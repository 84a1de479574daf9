use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::Deserialize;

use crate::{
    entities::payment::{self, Entity as PaymentEntity, PayableType, PaymentStatus},
    errors::ServiceError,
    services::{codes::CodeGenerator, ledger::round_money},
};

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    #[serde(default = "default_method")]
    pub method: String,
    pub reference_no: Option<String>,
    pub notes: Option<String>,
}

fn default_method() -> String {
    "cash".to_string()
}

impl PaymentInput {
    pub fn cash(amount: Decimal, payment_date: NaiveDate) -> Self {
        Self {
            amount,
            payment_date,
            method: default_method(),
            reference_no: None,
            notes: None,
        }
    }
}

/// Rejects money amounts finer than a cent.
pub fn check_cents(amount: Decimal) -> Result<(), ServiceError> {
    if amount != round_money(amount) {
        return Err(ServiceError::ValidationError(format!(
            "Amount {} has fractions of a cent",
            amount
        )));
    }
    Ok(())
}

/// A payment must be positive, in whole cents, and may not exceed what is
/// still owed.
pub fn check_amount(amount: Decimal, due: Decimal) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Payment amount must be positive, got: {}",
            amount
        )));
    }
    check_cents(amount)?;
    if amount > due {
        return Err(ServiceError::ValidationError(format!(
            "Payment of {} exceeds the outstanding due of {}",
            amount, due
        )));
    }
    Ok(())
}

/// Inserts an approved payment collected and approved by `actor_id`.
pub(crate) async fn record_payment<C: ConnectionTrait>(
    conn: &C,
    codes: &CodeGenerator,
    payable_type: PayableType,
    payable_id: i64,
    input: &PaymentInput,
    actor_id: i64,
) -> Result<payment::Model, ServiceError> {
    let code = codes.generate::<PaymentEntity, _>(conn).await?;
    let now = Utc::now();
    payment::ActiveModel {
        code: Set(code),
        payable_type: Set(payable_type),
        payable_id: Set(payable_id),
        amount: Set(input.amount),
        payment_date: Set(input.payment_date),
        method: Set(input.method.clone()),
        reference_no: Set(input.reference_no.clone()),
        notes: Set(input.notes.clone()),
        status: Set(PaymentStatus::Approved),
        collected_by: Set(actor_id),
        approved_by: Set(Some(actor_id)),
        approved_at: Set(Some(now)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(|e| ServiceError::transaction_failed("insert payment", e))
}

/// Payments recorded against one document, oldest first.
pub async fn payments_for<C: ConnectionTrait>(
    conn: &C,
    payable_type: PayableType,
    payable_id: i64,
) -> Result<Vec<payment::Model>, ServiceError> {
    PaymentEntity::find()
        .filter(payment::Column::PayableType.eq(payable_type))
        .filter(payment::Column::PayableId.eq(payable_id))
        .order_by_asc(payment::Column::Id)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}
