mod common;

use bagworks_erp::{
    db,
    entities::{customer, production::ProductionStatus, supplier, RecordStatus},
    services::codes::{CodeGenerator, CodeStrategy},
};
use chrono::Utc;
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ActiveValue::Set};

#[tokio::test]
async fn counter_codes_are_sequential() {
    let app = TestApp::new().await;
    let first = app.seed_customer("One", "01300000001").await;
    let second = app.seed_customer("Two", "01300000002").await;

    assert_eq!(first.code, "CUS-00001");
    assert_eq!(second.code, "CUS-00002");
}

#[tokio::test]
async fn max_id_strategy_follows_highest_row() {
    let app = TestApp::new().await;
    app.seed_customer("One", "01300000003").await;
    app.seed_customer("Two", "01300000004").await;

    let code = CodeGenerator::default()
        .generate_with::<customer::Entity, _>(&*app.db, CodeStrategy::MaxId, "C-", 3)
        .await
        .unwrap();
    assert_eq!(code, "C-003");
}

#[tokio::test]
async fn timestamp_codes_stay_unique_within_a_second() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Stamp", "01300000005").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;

    let mut codes = Vec::new();
    for _ in 0..3 {
        let quotation = app
            .seed_quotation(customer.id, &[(bag.id, dec!(10), dec!(5.00))], dec!(0))
            .await;
        let production = app
            .seed_production(quotation.quotation.id, dec!(50), ProductionStatus::Pending)
            .await;
        codes.push(production.production.code);
    }

    for code in &codes {
        let digits = code.strip_prefix("PROD-").unwrap();
        assert!(digits.chars().all(|c| c.is_ascii_digit()), "{}", code);
    }
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 3);
}

#[tokio::test]
async fn counter_seeds_from_existing_rows() {
    let pool = db::connect_in_memory().await.unwrap();
    let now = Utc::now();
    for legacy in ["OLD-A", "OLD-B"] {
        supplier::ActiveModel {
            code: Set(legacy.to_string()),
            name: Set(format!("Imported {}", legacy)),
            company_name: Set(None),
            phone: Set(None),
            email: Set(None),
            address: Set(None),
            opening_balance: Set(Decimal::ZERO),
            status: Set(RecordStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&pool)
        .await
        .unwrap();
    }

    let codes = CodeGenerator::default();
    let next = codes.generate::<supplier::Entity, _>(&pool).await.unwrap();
    let after = codes.generate::<supplier::Entity, _>(&pool).await.unwrap();
    assert_eq!(next, "SUP-00003");
    assert_eq!(after, "SUP-00004");
}
