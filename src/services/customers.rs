use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{
    auth::{consts, require, Authorizer},
    entities::{
        customer::{self, Entity as CustomerEntity},
        customer_balance_entry::{self, BalanceReason, Entity as BalanceEntryEntity},
        sale::{self, Entity as SaleEntity},
        RecordStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{codes::CodeGenerator, ledger::round_money},
};

/// Document that caused a balance movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentRef {
    pub kind: &'static str,
    pub id: i64,
}

impl DocumentRef {
    pub fn sale(id: i64) -> Self {
        Self { kind: "sale", id }
    }

    pub fn payment(id: i64) -> Self {
        Self { kind: "payment", id }
    }
}

/// Applies `delta` to a customer's running balance and journals it.
///
/// Every change to `customers.current_balance` goes through here, on the
/// caller's transaction. The read-modify-write takes no row lock.
pub async fn adjust_balance<C: ConnectionTrait>(
    conn: &C,
    customer_id: i64,
    delta: Decimal,
    reason: BalanceReason,
    reference: Option<DocumentRef>,
) -> Result<customer_balance_entry::Model, ServiceError> {
    let customer = CustomerEntity::find_by_id(customer_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;

    let delta = round_money(delta);
    let balance_after = round_money(customer.current_balance + delta);
    let now = Utc::now();

    let mut active: customer::ActiveModel = customer.into();
    active.current_balance = Set(balance_after);
    active.updated_at = Set(now);
    active.update(conn).await.map_err(ServiceError::db_error)?;

    let entry = customer_balance_entry::ActiveModel {
        customer_id: Set(customer_id),
        delta: Set(delta),
        balance_after: Set(balance_after),
        reason: Set(reason),
        reference_type: Set(reference.map(|r| r.kind.to_string())),
        reference_id: Set(reference.map(|r| r.id)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)?;

    counter!("bagworks.customer_balance.adjustments", 1);
    Ok(entry)
}

/// Publishes committed balance movements.
pub(crate) async fn publish_adjustments(
    sender: &Option<EventSender>,
    entries: &[customer_balance_entry::Model],
) {
    if let Some(sender) = sender {
        for entry in entries {
            sender
                .send_or_log(Event::CustomerBalanceAdjusted {
                    customer_id: entry.customer_id,
                    delta: entry.delta,
                    balance_after: entry.balance_after,
                    reason: entry.reason.to_string(),
                })
                .await;
        }
    }
}

/// Resolves the customer record a customer-role actor acts for, matched by phone.
pub async fn customer_for_actor<C: ConnectionTrait>(
    conn: &C,
    actor: &dyn Authorizer,
) -> Result<customer::Model, ServiceError> {
    let phone = actor.phone().ok_or_else(|| {
        ServiceError::Forbidden(format!("Actor {} has no phone on record", actor.actor_id()))
    })?;

    find_by_phone(conn, phone).await?.ok_or_else(|| {
        ServiceError::Forbidden(format!(
            "No customer record is linked to actor {}",
            actor.actor_id()
        ))
    })
}

pub async fn find_by_phone<C: ConnectionTrait>(
    conn: &C,
    phone: &str,
) -> Result<Option<customer::Model>, ServiceError> {
    CustomerEntity::find()
        .filter(customer::Column::Phone.eq(phone))
        .filter(customer::Column::DeletedAt.is_null())
        .order_by_asc(customer::Column::Id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewCustomer {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub company_name: Option<String>,
    #[validate(length(min = 3, max = 32))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub credit_limit: Decimal,
    #[serde(default)]
    pub opening_balance: Decimal,
}

/// Stored balance compared with what the journal and the live sales imply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceReconciliation {
    pub customer_id: i64,
    pub stored_balance: Decimal,
    /// Sum of journal deltas.
    pub journal_balance: Decimal,
    /// Opening balance plus live sale dues plus manual adjustments.
    pub document_balance: Decimal,
}

impl BalanceReconciliation {
    pub fn is_consistent(&self) -> bool {
        self.stored_balance == self.journal_balance && self.stored_balance == self.document_balance
    }

    pub fn drift(&self) -> Decimal {
        self.stored_balance - self.document_balance
    }
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    codes: CodeGenerator,
    event_sender: Option<EventSender>,
}

impl CustomerService {
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

    /// Registers a customer. The opening balance seeds the running balance
    /// and is journaled.
    #[instrument(skip(self, actor, input), fields(phone = %input.phone))]
    pub async fn create_customer(
        &self,
        actor: &dyn Authorizer,
        input: NewCustomer,
    ) -> Result<customer::Model, ServiceError> {
        require(actor, consts::CUSTOMERS_CREATE)?;
        input.validate()?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        if find_by_phone(&txn, &input.phone).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A customer with phone {} already exists",
                input.phone
            )));
        }

        let code = self.codes.generate::<CustomerEntity, _>(&txn).await?;
        let now = Utc::now();
        let created = customer::ActiveModel {
            code: Set(code),
            name: Set(input.name.trim().to_string()),
            company_name: Set(input.company_name),
            phone: Set(input.phone),
            email: Set(input.email),
            address: Set(input.address),
            credit_limit: Set(input.credit_limit),
            opening_balance: Set(input.opening_balance),
            current_balance: Set(Decimal::ZERO),
            status: Set(RecordStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        let mut entries = Vec::new();
        if !input.opening_balance.is_zero() {
            entries.push(
                adjust_balance(
                    &txn,
                    created.id,
                    input.opening_balance,
                    BalanceReason::OpeningBalance,
                    None,
                )
                .await?,
            );
        }

        txn.commit().await.map_err(ServiceError::db_error)?;
        publish_adjustments(&self.event_sender, &entries).await;

        let created = self.get_customer(created.id).await?;
        info!(customer_id = created.id, code = %created.code, "Customer created");
        Ok(created)
    }

    pub async fn get_customer(&self, id: i64) -> Result<customer::Model, ServiceError> {
        CustomerEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))
    }

    /// Full customer list; requires `customers:read`.
    #[instrument(skip(self, actor))]
    pub async fn list_customers(
        &self,
        actor: &dyn Authorizer,
    ) -> Result<Vec<customer::Model>, ServiceError> {
        require(actor, consts::CUSTOMERS_READ)?;
        CustomerEntity::find()
            .filter(customer::Column::DeletedAt.is_null())
            .order_by_asc(customer::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn current_balance(&self, customer_id: i64) -> Result<Decimal, ServiceError> {
        Ok(self.get_customer(customer_id).await?.current_balance)
    }

    /// Manual correction of a balance, journaled as such.
    #[instrument(skip(self, actor))]
    pub async fn adjust_customer_balance(
        &self,
        actor: &dyn Authorizer,
        customer_id: i64,
        delta: Decimal,
    ) -> Result<customer_balance_entry::Model, ServiceError> {
        require(actor, consts::CUSTOMERS_UPDATE)?;
        if delta.is_zero() {
            return Err(ServiceError::ValidationError(
                "Adjustment must be non-zero".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let entry = adjust_balance(
            &txn,
            customer_id,
            delta,
            BalanceReason::ManualAdjustment,
            None,
        )
        .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        publish_adjustments(&self.event_sender, std::slice::from_ref(&entry)).await;
        Ok(entry)
    }

    pub async fn balance_history(
        &self,
        customer_id: i64,
    ) -> Result<Vec<customer_balance_entry::Model>, ServiceError> {
        BalanceEntryEntity::find()
            .filter(customer_balance_entry::Column::CustomerId.eq(customer_id))
            .order_by_asc(customer_balance_entry::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Compares the stored balance with the journal and with live sales.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, customer_id: i64) -> Result<BalanceReconciliation, ServiceError> {
        let customer = self.get_customer(customer_id).await?;
        let entries = self.balance_history(customer_id).await?;

        let journal_balance: Decimal = entries.iter().map(|e| e.delta).sum();
        let manual: Decimal = entries
            .iter()
            .filter(|e| e.reason == BalanceReason::ManualAdjustment)
            .map(|e| e.delta)
            .sum();

        let live_dues: Decimal = SaleEntity::find()
            .filter(sale::Column::CustomerId.eq(customer_id))
            .filter(sale::Column::DeletedAt.is_null())
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .iter()
            .map(|s| s.due_amount)
            .sum();

        let report = BalanceReconciliation {
            customer_id,
            stored_balance: customer.current_balance,
            journal_balance: round_money(journal_balance),
            document_balance: round_money(customer.opening_balance + live_dues + manual),
        };

        if !report.is_consistent() {
            warn!(
                customer_id,
                stored = %report.stored_balance,
                journal = %report.journal_balance,
                documents = %report.document_balance,
                "customer balance drift detected"
            );
        }
        Ok(report)
    }

    /// Reconciles every live customer.
    pub async fn reconcile_all(&self) -> Result<Vec<BalanceReconciliation>, ServiceError> {
        let ids: Vec<i64> = CustomerEntity::find()
            .filter(customer::Column::DeletedAt.is_null())
            .order_by_asc(customer::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            reports.push(self.reconcile(id).await?);
        }
        Ok(reports)
    }
}
