use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sold line. Cost fields are copied from the production item at sale time
/// and stay fixed when the production is later edited.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sale_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub sale_id: i64,
    pub line_no: i32,
    pub production_item_id: Option<i64>,
    pub item_name: String,
    pub size: Option<String>,
    pub gsm: Option<String>,
    pub color: Option<String>,
    pub envelope_weight: Decimal,
    pub envelope_price: Decimal,
    pub loop_weight: Decimal,
    pub loop_price: Decimal,
    pub print_cost: Decimal,
    pub sewing_cost: Decimal,
    pub quantity: Decimal,
    pub price_per_piece: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale::Entity",
        from = "Column::SaleId",
        to = "super::sale::Column::Id",
        on_delete = "Cascade"
    )]
    Sale,
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sale.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
