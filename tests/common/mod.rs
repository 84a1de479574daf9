#![allow(dead_code)]

use std::sync::Arc;

use bagworks_erp::{
    auth::{rbac, Actor},
    config::LedgerSettings,
    db,
    entities::{customer, item, production::ProductionStatus, sale::SaleType},
    events::{self, Event},
    services::{
        catalog::NewItem,
        customers::NewCustomer,
        productions::{ProductionDetail, ProductionInput, ProductionLineInput},
        quotations::{QuotationDetail, QuotationInput, QuotationLineInput},
        sales::{SaleInput, SaleLineInput},
        ServiceContainer, ServiceFactory,
    },
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tokio::sync::mpsc;

/// Services over a fresh in-memory SQLite database.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub services: ServiceContainer,
    pub manager: Actor,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(LedgerSettings::default(), None).await
    }

    pub async fn with_ledger(ledger: LedgerSettings) -> Self {
        Self::build(ledger, None).await
    }

    /// App whose services publish into a channel the test can drain.
    pub async fn with_events() -> (Self, mpsc::Receiver<Event>) {
        let (sender, rx) = events::channel(256);
        (Self::build(LedgerSettings::default(), Some(sender)).await, rx)
    }

    async fn build(ledger: LedgerSettings, sender: Option<events::EventSender>) -> Self {
        let pool = db::connect_in_memory()
            .await
            .expect("in-memory database");
        let db = Arc::new(pool);
        let factory = ServiceFactory::with_defaults(db.clone(), sender).with_ledger_settings(ledger);
        Self {
            db,
            services: ServiceContainer::new(&factory),
            manager: Actor::new(1, &[rbac::MANAGER]),
        }
    }

    pub async fn seed_customer(&self, name: &str, phone: &str) -> customer::Model {
        self.services
            .customers
            .create_customer(
                &self.manager,
                NewCustomer {
                    name: name.to_string(),
                    phone: phone.to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("seed customer")
    }

    pub async fn seed_item(&self, name: &str, price: Decimal) -> item::Model {
        self.services
            .catalog
            .create_item(
                &self.manager,
                NewItem {
                    name: name.to_string(),
                    price,
                    ..Default::default()
                },
            )
            .await
            .expect("seed item")
    }

    pub async fn seed_quotation(
        &self,
        customer_id: i64,
        lines: &[(i64, Decimal, Decimal)],
        advance_amount: Decimal,
    ) -> QuotationDetail {
        let mut input = quotation_input(customer_id, lines);
        input.advance_amount = advance_amount;
        self.services
            .quotations
            .create_quotation(&self.manager, input)
            .await
            .expect("seed quotation")
    }

    pub async fn seed_production(
        &self,
        quotation_id: i64,
        total_cost: Decimal,
        status: ProductionStatus,
    ) -> ProductionDetail {
        self.services
            .productions
            .create_production(
                &self.manager,
                quotation_id,
                production_input(status, total_cost),
            )
            .await
            .expect("seed production")
    }

    /// Customer, one item, a quotation with `advance` and a completed production.
    pub async fn seed_sellable(&self, phone: &str, advance: Decimal) -> (customer::Model, ProductionDetail) {
        let customer = self.seed_customer("Rahim Traders", phone).await;
        let item = self.seed_item("Loop handle bag", dec!(10.00)).await;
        let quotation = self
            .seed_quotation(customer.id, &[(item.id, dec!(100), dec!(10.00))], advance)
            .await;
        let production = self
            .seed_production(
                quotation.quotation.id,
                dec!(500),
                ProductionStatus::Completed,
            )
            .await;
        (customer, production)
    }

    /// Installs a SQLite trigger that aborts every write matching `event`,
    /// e.g. `BEFORE INSERT ON sale_items`.
    pub async fn abort_on(&self, name: &str, event: &str) {
        let sql = format!(
            "CREATE TRIGGER {} {} BEGIN SELECT RAISE(ABORT, '{} blocked'); END;",
            name, event, name
        );
        self.db
            .execute_unprepared(&sql)
            .await
            .expect("install trigger");
    }

    pub async fn balance(&self, customer_id: i64) -> Decimal {
        self.services
            .customers
            .current_balance(customer_id)
            .await
            .expect("customer balance")
    }
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

pub fn quotation_input(customer_id: i64, lines: &[(i64, Decimal, Decimal)]) -> QuotationInput {
    QuotationInput {
        customer_id,
        quotation_date: date(),
        valid_until: NaiveDate::from_ymd_opt(2024, 6, 30),
        items: lines
            .iter()
            .map(|&(item_id, quantity, unit_price)| QuotationLineInput {
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

pub fn production_input(
    status: ProductionStatus,
    total_cost: Decimal,
) -> ProductionInput {
    ProductionInput {
        status,
        total_cost,
        note: None,
        items: vec![ProductionLineInput {
            product_name: "Loop handle bag".to_string(),
            size: Some("12x16".to_string()),
            quantity: dec!(100),
            envelope_weight: dec!(0.05),
            envelope_price: dec!(1.20),
            print_cost: dec!(0.50),
            sewing_cost: dec!(0.30),
            price_per_piece: dec!(5.00),
            total_price: dec!(500.00),
            ..Default::default()
        }],
    }
}

/// Sale whose single line sums to `grand_total`.
pub fn sale_input(
    customer_id: i64,
    production_id: Option<i64>,
    grand_total: Decimal,
    paid_amount: Decimal,
    advance_adjusted: Decimal,
) -> SaleInput {
    SaleInput {
        customer_id,
        production_id,
        sale_type: SaleType::Wholesale,
        sale_date: date(),
        discount: Decimal::ZERO,
        tax: Decimal::ZERO,
        other_costs: Decimal::ZERO,
        grand_total,
        paid_amount,
        advance_adjusted,
        note: None,
        items: vec![SaleLineInput {
            item_name: "Loop handle bag".to_string(),
            quantity: dec!(100),
            price_per_piece: grand_total / dec!(100),
            total_price: grand_total,
            ..Default::default()
        }],
    }
}
