//! Quotation manager: pricing, ownership, item replacement and status rules.

mod common;

use assert_matches::assert_matches;
use bagworks_erp::{
    auth::{rbac, Actor},
    config::{LedgerSettings, TransitionPolicy},
    entities::{
        production::ProductionStatus,
        quotation::{self, QuotationStatus},
        quotation_item,
    },
    errors::ServiceError,
    services::quotations::QuotationFilter,
};
use common::{quotation_input, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn staff_quotation_recomputes_totals_server_side() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Karim Stores", "01700000001").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let box_bag = app.seed_item("Box bag", dec!(8.00)).await;

    let mut input = quotation_input(
        customer.id,
        &[(bag.id, dec!(10), dec!(5.00)), (box_bag.id, dec!(5), dec!(8.00))],
    );
    input.discount = dec!(10);
    input.submitted_subtotal = Some(dec!(1.00));

    let detail = app
        .services
        .quotations
        .create_quotation(&app.manager, input)
        .await
        .unwrap();

    let q = &detail.quotation;
    assert!(q.code.starts_with("QT-"));
    assert_eq!(q.status, QuotationStatus::Pending);
    assert_eq!(q.subtotal, dec!(90));
    assert_eq!(q.total, dec!(80));
    assert_eq!(q.tax, dec!(0));
    assert_eq!(detail.items.len(), 2);
    assert_eq!(detail.items[0].description, "D-cut bag");
    assert_eq!(detail.items[1].total, dec!(40));
}

#[tokio::test]
async fn fractional_quantities_are_summed_before_rounding() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Karim Stores", "01700000009").await;
    let strap = app.seed_item("Strap (metre)", dec!(0.33)).await;

    let detail = app
        .services
        .quotations
        .create_quotation(
            &app.manager,
            quotation_input(
                customer.id,
                &[(strap.id, dec!(1.5), dec!(0.33)), (strap.id, dec!(1.5), dec!(0.33))],
            ),
        )
        .await
        .unwrap();

    assert_eq!(detail.quotation.subtotal, dec!(0.99));
    assert_eq!(detail.quotation.total, dec!(0.99));
    assert_eq!(detail.items[0].total, dec!(0.50));
}

#[tokio::test]
async fn customer_price_tampering_writes_nothing() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Portal Buyer", "01700000002").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let actor = Actor::customer(42, "01700000002");

    let result = app
        .services
        .quotations
        .create_quotation(&actor, quotation_input(customer.id, &[(bag.id, dec!(100), dec!(4.50))]))
        .await;

    assert_matches!(
        result,
        Err(ServiceError::PriceTampered { item_id, submitted, catalog })
            if item_id == bag.id && submitted == dec!(4.50) && catalog == dec!(5.00)
    );
    assert_eq!(quotation::Entity::find().count(&*app.db).await.unwrap(), 0);
    assert_eq!(quotation_item::Entity::find().count(&*app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn customer_price_within_tolerance_is_accepted() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Portal Buyer", "01700000003").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let actor = Actor::customer(43, "01700000003");

    let detail = app
        .services
        .quotations
        .create_quotation(&actor, quotation_input(customer.id, &[(bag.id, dec!(10), dec!(5.01))]))
        .await
        .unwrap();
    assert_eq!(detail.quotation.created_by, 43);
}

#[tokio::test]
async fn customer_cannot_quote_for_someone_else() {
    let app = TestApp::new().await;
    app.seed_customer("Own Record", "01700000004").await;
    let other = app.seed_customer("Someone Else", "01700000005").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let actor = Actor::customer(44, "01700000004");

    let result = app
        .services
        .quotations
        .create_quotation(&actor, quotation_input(other.id, &[(bag.id, dec!(1), dec!(5.00))]))
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn customer_without_matching_record_is_forbidden() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Known", "01700000006").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let stranger = Actor::customer(45, "01999999999");

    let result = app
        .services
        .quotations
        .create_quotation(&stranger, quotation_input(customer.id, &[(bag.id, dec!(1), dec!(5.00))]))
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn actor_without_capability_is_forbidden() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Known", "01700000007").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let nobody = Actor::new(99, &[]);

    let result = app
        .services
        .quotations
        .create_quotation(&nobody, quotation_input(customer.id, &[(bag.id, dec!(1), dec!(5.00))]))
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn unknown_item_is_a_validation_error() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Known", "01700000008").await;

    let result = app
        .services
        .quotations
        .create_quotation(&app.manager, quotation_input(customer.id, &[(9999, dec!(1), dec!(5.00))]))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn update_replaces_items_wholesale() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Karim Stores", "01700000009").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let box_bag = app.seed_item("Box bag", dec!(8.00)).await;
    let created = app
        .seed_quotation(
            customer.id,
            &[(bag.id, dec!(10), dec!(5.00)), (box_bag.id, dec!(5), dec!(8.00))],
            dec!(0),
        )
        .await;

    let updated = app
        .services
        .quotations
        .update_quotation(
            &app.manager,
            created.quotation.id,
            quotation_input(customer.id, &[(box_bag.id, dec!(20), dec!(8.00))]),
        )
        .await
        .unwrap();

    assert_eq!(updated.items.len(), 1);
    assert_eq!(updated.quotation.total, dec!(160));
    assert_eq!(quotation_item::Entity::find().count(&*app.db).await.unwrap(), 1);

    let fetched = app
        .services
        .quotations
        .get_quotation(&app.manager, created.quotation.id)
        .await
        .unwrap();
    assert_eq!(fetched.items[0].item_id, box_bag.id);
    assert_eq!(fetched.items[0].line_no, 1);
}

#[tokio::test]
async fn customer_cannot_edit_another_customers_quotation() {
    let app = TestApp::new().await;
    let owner = app.seed_customer("Owner", "01700000010").await;
    app.seed_customer("Intruder", "01700000011").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let quotation = app.seed_quotation(owner.id, &[(bag.id, dec!(1), dec!(5.00))], dec!(0)).await;

    let intruder = Actor::customer(46, "01700000011");
    let result = app
        .services
        .quotations
        .update_quotation(
            &intruder,
            quotation.quotation.id,
            quotation_input(owner.id, &[(bag.id, dec!(2), dec!(5.00))]),
        )
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));

    let read = app
        .services
        .quotations
        .get_quotation(&intruder, quotation.quotation.id)
        .await;
    assert_matches!(read, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn status_update_is_idempotent_and_checked() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Karim Stores", "01700000012").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let quotation = app.seed_quotation(customer.id, &[(bag.id, dec!(1), dec!(5.00))], dec!(0)).await;
    let id = quotation.quotation.id;
    let quotations = &app.services.quotations;

    let same = quotations
        .update_status(&app.manager, id, QuotationStatus::Pending)
        .await
        .unwrap();
    assert_eq!(same.status, QuotationStatus::Pending);

    let approved = quotations
        .update_status(&app.manager, id, QuotationStatus::Approved)
        .await
        .unwrap();
    assert_eq!(approved.status, QuotationStatus::Approved);

    let jump = quotations
        .update_status(&app.manager, id, QuotationStatus::Delivered)
        .await;
    assert_matches!(
        jump,
        Err(ServiceError::InvalidTransition { entity: "quotation", .. })
    );

    let staff = Actor::new(7, &[rbac::STAFF]);
    assert_matches!(
        quotations.update_status(&staff, id, QuotationStatus::Rejected).await,
        Err(ServiceError::Forbidden(_))
    );
}

#[tokio::test]
async fn permissive_policy_accepts_any_transition() {
    let app = TestApp::with_ledger(LedgerSettings {
        transition_policy: TransitionPolicy::Permissive,
        ..Default::default()
    })
    .await;
    let customer = app.seed_customer("Karim Stores", "01700000013").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let quotation = app.seed_quotation(customer.id, &[(bag.id, dec!(1), dec!(5.00))], dec!(0)).await;

    let delivered = app
        .services
        .quotations
        .update_status(&app.manager, quotation.quotation.id, QuotationStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(delivered.status, QuotationStatus::Delivered);
}

#[tokio::test]
async fn customers_only_list_their_own_quotations() {
    let app = TestApp::new().await;
    let mine = app.seed_customer("Mine", "01700000014").await;
    let theirs = app.seed_customer("Theirs", "01700000015").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    app.seed_quotation(mine.id, &[(bag.id, dec!(1), dec!(5.00))], dec!(0)).await;
    app.seed_quotation(theirs.id, &[(bag.id, dec!(2), dec!(5.00))], dec!(0)).await;
    app.seed_quotation(theirs.id, &[(bag.id, dec!(3), dec!(5.00))], dec!(0)).await;

    let actor = Actor::customer(47, "01700000014");
    let listed = app
        .services
        .quotations
        .list_quotations(&actor, QuotationFilter::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].customer_id, mine.id);

    let all = app
        .services
        .quotations
        .list_quotations(&app.manager, QuotationFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn delete_is_soft_and_blocked_by_production() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Karim Stores", "01700000016").await;
    let bag = app.seed_item("D-cut bag", dec!(5.00)).await;
    let free = app.seed_quotation(customer.id, &[(bag.id, dec!(1), dec!(5.00))], dec!(0)).await;
    let produced = app.seed_quotation(customer.id, &[(bag.id, dec!(2), dec!(5.00))], dec!(0)).await;
    app.seed_production(produced.quotation.id, dec!(100), ProductionStatus::Pending)
        .await;

    let quotations = &app.services.quotations;
    assert_matches!(
        quotations.delete_quotation(&app.manager, produced.quotation.id).await,
        Err(ServiceError::Conflict(_))
    );

    quotations
        .delete_quotation(&app.manager, free.quotation.id)
        .await
        .unwrap();
    assert_matches!(
        quotations.get_quotation(&app.manager, free.quotation.id).await,
        Err(ServiceError::NotFound(_))
    );

    let row = quotation::Entity::find_by_id(free.quotation.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(row.deleted_at.is_some());
}
