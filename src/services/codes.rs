//! Human readable document codes such as `SALE-00042` or `PROD-1718000000`.

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    EntityTrait, QueryFilter, QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CodeSettings;
use crate::entities::{
    code_sequence, customer, item, payment, production, purchase, quotation, sale, supplier,
};
use crate::errors::ServiceError;

const MAX_CODE_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CodeStrategy {
    /// `prefix + pad(max(id) + 1)`, soft-deleted rows included. Two writers
    /// racing here can produce the same code; the unique index rejects the
    /// second insert.
    MaxId,
    /// `prefix + unix seconds`, bumped while the code is taken.
    Timestamp,
    /// `prefix + pad(n)` from an atomically incremented row in `code_sequences`.
    Counter,
}

/// An entity that carries a generated code.
pub trait Coded: EntityTrait {
    /// Row name in `code_sequences`.
    const SEQUENCE: &'static str;
    const PREFIX: &'static str;

    fn id_column() -> Self::Column;
    fn code_column() -> Self::Column;
    fn strategy(settings: &CodeSettings) -> CodeStrategy;
}

macro_rules! coded {
    ($entity:path, $module:ident, $sequence:literal, $prefix:literal, $field:ident) => {
        impl Coded for $entity {
            const SEQUENCE: &'static str = $sequence;
            const PREFIX: &'static str = $prefix;

            fn id_column() -> Self::Column {
                $module::Column::Id
            }

            fn code_column() -> Self::Column {
                $module::Column::Code
            }

            fn strategy(settings: &CodeSettings) -> CodeStrategy {
                settings.$field
            }
        }
    };
}

coded!(item::Entity, item, "items", "ITM-", item);
coded!(customer::Entity, customer, "customers", "CUS-", customer);
coded!(supplier::Entity, supplier, "suppliers", "SUP-", supplier);
coded!(quotation::Entity, quotation, "quotations", "QT-", quotation);
coded!(production::Entity, production, "productions", "PROD-", production);
coded!(sale::Entity, sale, "sales", "SALE-", sale);
coded!(payment::Entity, payment, "payments", "PAY-", payment);
coded!(purchase::Entity, purchase, "purchases", "PUR-", purchase);

pub fn format_code(prefix: &str, value: i64, padding: usize) -> String {
    format!("{}{:0width$}", prefix, value, width = padding)
}

/// Generates codes according to the configured per-entity strategy.
#[derive(Debug, Clone, Default)]
pub struct CodeGenerator {
    settings: CodeSettings,
}

impl CodeGenerator {
    pub fn new(settings: CodeSettings) -> Self {
        Self { settings }
    }

    /// Next code for `E`. Run it on the transaction that inserts the row.
    pub async fn generate<E, C>(&self, conn: &C) -> Result<String, ServiceError>
    where
        E: Coded,
        C: ConnectionTrait,
    {
        self.generate_with::<E, C>(
            conn,
            E::strategy(&self.settings),
            E::PREFIX,
            self.settings.padding,
        )
        .await
    }

    pub async fn generate_with<E, C>(
        &self,
        conn: &C,
        strategy: CodeStrategy,
        prefix: &str,
        padding: usize,
    ) -> Result<String, ServiceError>
    where
        E: Coded,
        C: ConnectionTrait,
    {
        let code = match strategy {
            CodeStrategy::MaxId => {
                let next = max_id::<E, C>(conn).await? + 1;
                format_code(prefix, next, padding)
            }
            CodeStrategy::Timestamp => timestamp_code::<E, C>(conn, prefix).await?,
            CodeStrategy::Counter => counter_code::<E, C>(conn, prefix, padding).await?,
        };
        debug!(sequence = E::SEQUENCE, %strategy, code = code.as_str(), "generated code");
        Ok(code)
    }
}

async fn max_id<E, C>(conn: &C) -> Result<i64, ServiceError>
where
    E: Coded,
    C: ConnectionTrait,
{
    let max = E::find()
        .select_only()
        .column_as(Expr::col(E::id_column()).max(), "max_id")
        .into_tuple::<Option<i64>>()
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .flatten();
    Ok(max.unwrap_or(0))
}

async fn code_taken<E, C>(conn: &C, code: &str) -> Result<bool, ServiceError>
where
    E: Coded,
    C: ConnectionTrait,
{
    let existing = E::find()
        .filter(E::code_column().eq(code))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(existing.is_some())
}

async fn timestamp_code<E, C>(conn: &C, prefix: &str) -> Result<String, ServiceError>
where
    E: Coded,
    C: ConnectionTrait,
{
    let mut stamp = Utc::now().timestamp();
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = format!("{}{}", prefix, stamp);
        if !code_taken::<E, C>(conn, &code).await? {
            return Ok(code);
        }
        stamp += 1;
    }
    Err(ServiceError::InternalError(format!(
        "No free {} code after {} attempts",
        E::SEQUENCE,
        MAX_CODE_ATTEMPTS
    )))
}

async fn counter_code<E, C>(conn: &C, prefix: &str, padding: usize) -> Result<String, ServiceError>
where
    E: Coded,
    C: ConnectionTrait,
{
    for _ in 0..MAX_CODE_ATTEMPTS {
        let value = next_counter_value::<E, C>(conn).await?;
        let code = format_code(prefix, value, padding);
        if !code_taken::<E, C>(conn, &code).await? {
            return Ok(code);
        }
        warn!(
            sequence = E::SEQUENCE,
            code = code.as_str(),
            "sequence produced a code already in use, advancing"
        );
    }
    Err(ServiceError::InternalError(format!(
        "No free {} code after {} attempts",
        E::SEQUENCE,
        MAX_CODE_ATTEMPTS
    )))
}

async fn next_counter_value<E, C>(conn: &C) -> Result<i64, ServiceError>
where
    E: Coded,
    C: ConnectionTrait,
{
    if let Some(value) = bump_counter(conn, E::SEQUENCE).await? {
        return Ok(value);
    }

    // First use: seed from the highest id so codes continue where
    // id-derived codes left off.
    let seeded = max_id::<E, C>(conn).await? + 1;
    let row = code_sequence::ActiveModel {
        name: Set(E::SEQUENCE.to_string()),
        last_value: Set(seeded),
        updated_at: Set(Utc::now()),
    };
    match row.insert(conn).await {
        Ok(_) => Ok(seeded),
        Err(e) => {
            // Another writer seeded it first.
            debug!(sequence = E::SEQUENCE, "seed insert failed ({}), retrying bump", e);
            bump_counter(conn, E::SEQUENCE).await?.ok_or_else(|| {
                ServiceError::InternalError(format!("Sequence {} could not be seeded", E::SEQUENCE))
            })
        }
    }
}

async fn bump_counter<C: ConnectionTrait>(
    conn: &C,
    sequence: &str,
) -> Result<Option<i64>, ServiceError> {
    let result = code_sequence::Entity::update_many()
        .col_expr(
            code_sequence::Column::LastValue,
            Expr::col(code_sequence::Column::LastValue).add(1),
        )
        .col_expr(code_sequence::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(code_sequence::Column::Name.eq(sequence))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Ok(None);
    }

    let row = code_sequence::Entity::find_by_id(sequence.to_string())
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(row.map(|r| r.last_value))
}
