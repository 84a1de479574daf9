use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub mod code_sequence;
pub mod customer;
pub mod customer_balance_entry;
pub mod item;
pub mod payment;
pub mod production;
pub mod production_item;
pub mod purchase;
pub mod purchase_item;
pub mod quotation;
pub mod quotation_item;
pub mod sale;
pub mod sale_item;
pub mod supplier;

/// Active flag shared by master records (items, customers, suppliers).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}
