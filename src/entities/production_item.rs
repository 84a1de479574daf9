use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub production_id: i64,
    pub line_no: i32,
    pub quotation_item_id: Option<i64>,
    pub product_name: String,
    pub size: Option<String>,
    pub quantity: Decimal,
    pub envelope_weight: Decimal,
    pub envelope_price: Decimal,
    pub loop_weight: Decimal,
    pub loop_price: Decimal,
    pub print_cost: Decimal,
    pub sewing_cost: Decimal,
    pub price_per_piece: Decimal,
    pub total_price: Decimal,
    pub wastage_kg: Decimal,
    pub wastage_piece: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::production::Entity",
        from = "Column::ProductionId",
        to = "super::production::Column::Id",
        on_delete = "Cascade"
    )]
    Production,
}

impl Related<super::production::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Production.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
