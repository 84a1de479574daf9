//! Sale manager: due arithmetic, customer balance movements, payments and reversal.

mod common;

use assert_matches::assert_matches;
use bagworks_erp::{
    auth::{rbac, Actor},
    entities::{
        customer_balance_entry::{self, BalanceReason},
        payment::{self, PayableType, PaymentStatus},
        production::{self, ProductionStatus},
        quotation::{self, QuotationStatus},
        sale, sale_item,
    },
    errors::ServiceError,
    events::Event,
    services::payments::PaymentInput,
};
use common::{date, sale_input, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};

async fn production_status(app: &TestApp, id: i64) -> ProductionStatus {
    production::Entity::find_by_id(id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
        .status
}

async fn quotation_status(app: &TestApp, id: i64) -> QuotationStatus {
    quotation::Entity::find_by_id(id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn sale_charges_due_and_delivers_production() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000001", dec!(100)).await;

    let detail = app
        .services
        .sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(300), dec!(100)),
        )
        .await
        .unwrap();

    assert!(detail.sale.code.starts_with("SALE-"));
    assert_eq!(detail.sale.due_amount, dec!(600));
    assert_eq!(detail.sale.subtotal, dec!(1000));
    assert_eq!(app.balance(customer.id).await, dec!(600));

    assert_eq!(
        production_status(&app, production.production.id).await,
        ProductionStatus::Delivered
    );
    assert_eq!(
        quotation_status(&app, production.production.quotation_id).await,
        QuotationStatus::Delivered
    );

    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.payments.len(), 1);
    assert_eq!(detail.payments[0].amount, dec!(300));
    assert_eq!(detail.payments[0].payable_type, PayableType::Sale);

    let history = app
        .services
        .customers
        .balance_history(customer.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].reason, BalanceReason::SaleCreated);
    assert_eq!(history[0].reference_id, Some(detail.sale.id));
}

#[tokio::test]
async fn production_can_only_be_sold_once_and_only_when_completed() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000002", dec!(0)).await;
    let sales = &app.services.sales;

    sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(0), dec!(0)),
        )
        .await
        .unwrap();

    let twice = sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(0), dec!(0)),
        )
        .await;
    assert_matches!(twice, Err(ServiceError::Conflict(_)));

    let bag = app.seed_item("Box bag", dec!(8.00)).await;
    let quotation = app
        .seed_quotation(customer.id, &[(bag.id, dec!(10), dec!(8.00))], dec!(0))
        .await;
    let working = app
        .seed_production(quotation.quotation.id, dec!(80), ProductionStatus::Working)
        .await;
    let unfinished = sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(working.production.id), dec!(80), dec!(0), dec!(0)),
        )
        .await;
    assert_matches!(unfinished, Err(ServiceError::Conflict(_)));

    assert_eq!(app.balance(customer.id).await, dec!(1000));
}

#[tokio::test]
async fn direct_sale_needs_no_production() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Walk-in", "01900000003").await;

    let detail = app
        .services
        .sales
        .create_sale(&app.manager, sale_input(customer.id, None, dec!(250), dec!(250), dec!(0)))
        .await
        .unwrap();

    assert_eq!(detail.sale.production_id, None);
    assert_eq!(detail.sale.due_amount, dec!(0));
    assert_eq!(app.balance(customer.id).await, dec!(0));
    assert!(app
        .services
        .customers
        .balance_history(customer.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn updating_due_applies_net_difference() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000004", dec!(100)).await;
    let sales = &app.services.sales;
    let created = sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(300), dec!(100)),
        )
        .await
        .unwrap();

    let updated = sales
        .update_sale(
            &app.manager,
            created.sale.id,
            sale_input(customer.id, Some(production.production.id), dec!(800), dec!(300), dec!(100)),
        )
        .await
        .unwrap();

    assert_eq!(updated.sale.due_amount, dec!(400));
    assert_eq!(app.balance(customer.id).await, dec!(400));

    let history = app
        .services
        .customers
        .balance_history(customer.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].reason, BalanceReason::SaleUpdated);
    assert_eq!(history[1].delta, dec!(-200));
}

#[tokio::test]
async fn payment_equal_to_due_settles_the_sale() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000005", dec!(100)).await;
    let sales = &app.services.sales;
    let created = sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(300), dec!(100)),
        )
        .await
        .unwrap();

    let collector = Actor::new(7, &[rbac::MARKETING_OFFICER]);
    let received = sales
        .receive_payment(&collector, created.sale.id, PaymentInput::cash(dec!(600), date()))
        .await
        .unwrap();

    assert_eq!(received.sale.due_amount, dec!(0));
    assert_eq!(received.sale.paid_amount, dec!(900));
    assert_eq!(received.balance_entry.reason, BalanceReason::PaymentReceived);
    assert_eq!(app.balance(customer.id).await, dec!(0));

    let payment = &received.payment;
    assert!(payment.code.starts_with("PAY-"));
    assert_eq!(payment.status, PaymentStatus::Approved);
    assert_eq!(payment.collected_by, 7);
    assert_eq!(payment.approved_by, Some(7));
    assert!(payment.approved_at.is_some());

    let payments = sales.list_payments(&app.manager, created.sale.id).await.unwrap();
    assert_eq!(payments.len(), 2);
}

#[tokio::test]
async fn overpayment_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000006", dec!(100)).await;
    let sales = &app.services.sales;
    let created = sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(0), dec!(100)),
        )
        .await
        .unwrap();
    assert_eq!(created.sale.due_amount, dec!(900));

    let over = sales
        .receive_payment(&app.manager, created.sale.id, PaymentInput::cash(dec!(900.01), date()))
        .await;
    assert_matches!(over, Err(ServiceError::ValidationError(_)));

    let zero = sales
        .receive_payment(&app.manager, created.sale.id, PaymentInput::cash(dec!(0), date()))
        .await;
    assert_matches!(zero, Err(ServiceError::ValidationError(_)));

    let fraction_of_cent = sales
        .receive_payment(&app.manager, created.sale.id, PaymentInput::cash(dec!(0.005), date()))
        .await;
    assert_matches!(fraction_of_cent, Err(ServiceError::ValidationError(_)));

    let sale = sales.get_sale(&app.manager, created.sale.id).await.unwrap();
    assert_eq!(sale.sale.due_amount, dec!(900));
    assert_eq!(sale.sale.paid_amount + sale.sale.due_amount + sale.sale.advance_adjusted, dec!(1000));
    assert!(sale.payments.is_empty());
    assert_eq!(payment::Entity::find().count(&*app.db).await.unwrap(), 0);
    assert_eq!(app.balance(customer.id).await, dec!(900));
}

#[tokio::test]
async fn payment_requires_collect_capability() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000007", dec!(0)).await;
    let created = app
        .services
        .sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(0), dec!(0)),
        )
        .await
        .unwrap();

    let staff = Actor::new(8, &[rbac::STAFF]);
    let result = app
        .services
        .sales
        .receive_payment(&staff, created.sale.id, PaymentInput::cash(dec!(10), date()))
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn reassigning_customer_moves_the_due() {
    let app = TestApp::new().await;
    let (first, production) = app.seed_sellable("01900000008", dec!(0)).await;
    let second = app.seed_customer("Second Buyer", "01900000009").await;
    let sales = &app.services.sales;
    let created = sales
        .create_sale(
            &app.manager,
            sale_input(first.id, Some(production.production.id), dec!(600), dec!(0), dec!(0)),
        )
        .await
        .unwrap();

    sales
        .update_sale(
            &app.manager,
            created.sale.id,
            sale_input(second.id, Some(production.production.id), dec!(700), dec!(0), dec!(0)),
        )
        .await
        .unwrap();

    assert_eq!(app.balance(first.id).await, dec!(0));
    assert_eq!(app.balance(second.id).await, dec!(700));

    let moved = app.services.customers.balance_history(second.id).await.unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].reason, BalanceReason::SaleReassigned);
}

#[tokio::test]
async fn relinking_production_frees_the_old_one() {
    let app = TestApp::new().await;
    let (customer, old) = app.seed_sellable("01900000010", dec!(0)).await;
    let bag = app.seed_item("Box bag", dec!(8.00)).await;
    let quotation = app
        .seed_quotation(customer.id, &[(bag.id, dec!(10), dec!(8.00))], dec!(0))
        .await;
    let new = app
        .seed_production(quotation.quotation.id, dec!(80), ProductionStatus::Completed)
        .await;

    let sales = &app.services.sales;
    let created = sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(old.production.id), dec!(1000), dec!(0), dec!(0)),
        )
        .await
        .unwrap();
    sales
        .update_sale(
            &app.manager,
            created.sale.id,
            sale_input(customer.id, Some(new.production.id), dec!(1000), dec!(0), dec!(0)),
        )
        .await
        .unwrap();

    assert_eq!(production_status(&app, old.production.id).await, ProductionStatus::Completed);
    assert_eq!(
        quotation_status(&app, old.production.quotation_id).await,
        QuotationStatus::ProductionReady
    );
    assert_eq!(production_status(&app, new.production.id).await, ProductionStatus::Delivered);
    assert_eq!(
        quotation_status(&app, new.production.quotation_id).await,
        QuotationStatus::Delivered
    );
}

#[tokio::test]
async fn destroying_a_sale_reverses_it() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000011", dec!(0)).await;
    let sales = &app.services.sales;
    let created = sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(600), dec!(0), dec!(0)),
        )
        .await
        .unwrap();
    sales
        .receive_payment(&app.manager, created.sale.id, PaymentInput::cash(dec!(200), date()))
        .await
        .unwrap();
    assert_eq!(app.balance(customer.id).await, dec!(400));

    sales.destroy_sale(&app.manager, created.sale.id).await.unwrap();

    assert_eq!(app.balance(customer.id).await, dec!(0));
    assert_eq!(
        production_status(&app, production.production.id).await,
        ProductionStatus::Completed
    );
    assert_eq!(
        quotation_status(&app, production.production.quotation_id).await,
        QuotationStatus::ProductionReady
    );
    assert_matches!(
        sales.get_sale(&app.manager, created.sale.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_eq!(payment::Entity::find().count(&*app.db).await.unwrap(), 1);

    let unsold = app
        .services
        .productions
        .list_completed_unsold(&app.manager)
        .await
        .unwrap();
    assert!(unsold.iter().any(|p| p.id == production.production.id));

    let report = app.services.customers.reconcile(customer.id).await.unwrap();
    assert!(report.is_consistent(), "{:?}", report);
}

#[tokio::test]
async fn balances_reconcile_after_mixed_activity() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000012", dec!(50)).await;
    let sales = &app.services.sales;

    let first = sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(200), dec!(50)),
        )
        .await
        .unwrap();
    sales
        .receive_payment(&app.manager, first.sale.id, PaymentInput::cash(dec!(150), date()))
        .await
        .unwrap();
    sales
        .update_sale(
            &app.manager,
            first.sale.id,
            sale_input(customer.id, Some(production.production.id), dec!(900), dec!(350), dec!(50)),
        )
        .await
        .unwrap();
    sales
        .create_sale(&app.manager, sale_input(customer.id, None, dec!(120), dec!(20), dec!(0)))
        .await
        .unwrap();

    // 900 - 350 paid - 50 advance, plus 100 on the direct sale
    assert_eq!(app.balance(customer.id).await, dec!(600));
    let report = app.services.customers.reconcile(customer.id).await.unwrap();
    assert!(report.is_consistent(), "{:?}", report);
}

#[tokio::test]
async fn customers_only_read_their_own_sales() {
    let app = TestApp::new().await;
    let (owner, production) = app.seed_sellable("01900000013", dec!(0)).await;
    app.seed_customer("Other", "01900000014").await;
    let created = app
        .services
        .sales
        .create_sale(
            &app.manager,
            sale_input(owner.id, Some(production.production.id), dec!(100), dec!(0), dec!(0)),
        )
        .await
        .unwrap();

    let owner_actor = Actor::customer(50, "01900000013");
    let other_actor = Actor::customer(51, "01900000014");
    let sales = &app.services.sales;

    assert!(sales.get_sale(&owner_actor, created.sale.id).await.is_ok());
    assert_matches!(
        sales.get_sale(&other_actor, created.sale.id).await,
        Err(ServiceError::Forbidden(_))
    );
    assert!(sales.list_sales(&other_actor, Some(owner.id)).await.unwrap().is_empty());
}

#[tokio::test]
async fn committed_sale_publishes_events() {
    let (app, mut rx) = TestApp::with_events().await;
    let (customer, production) = app.seed_sellable("01900000015", dec!(0)).await;

    let created = app
        .services
        .sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(500), dec!(0), dec!(0)),
        )
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&Event::SaleCreated {
        sale_id: created.sale.id,
        customer_id: customer.id,
        due_amount: dec!(500),
    }));
    assert!(seen.iter().any(|e| matches!(
        e,
        Event::CustomerBalanceAdjusted { customer_id, reason, .. }
            if *customer_id == customer.id && reason == "sale_created"
    )));
}

#[tokio::test]
async fn sale_lines_can_be_prefilled_from_production() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000016", dec!(0)).await;
    let sales = &app.services.sales;

    let lines = sales
        .lines_from_production(production.production.id)
        .await
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].production_item_id, Some(production.items[0].id));
    assert_eq!(lines[0].item_name, "Loop handle bag");
    assert_eq!(lines[0].size.as_deref(), Some("12x16"));

    let mut input = sale_input(customer.id, Some(production.production.id), dec!(500), dec!(0), dec!(0));
    input.items = lines;
    let detail = sales.create_sale(&app.manager, input).await.unwrap();

    let item = &detail.items[0];
    assert_eq!(item.production_item_id, Some(production.items[0].id));
    assert_eq!(item.print_cost, dec!(0.50));
    assert_eq!(item.total_price, dec!(500));
    assert_eq!(detail.sale.due_amount, dec!(500));
}

#[tokio::test]
async fn paid_amount_changes_only_through_payments() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000017", dec!(0)).await;
    let sales = &app.services.sales;
    let created = sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(300), dec!(0)),
        )
        .await
        .unwrap();

    let edited = sales
        .update_sale(
            &app.manager,
            created.sale.id,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(500), dec!(0)),
        )
        .await;
    assert_matches!(edited, Err(ServiceError::ValidationError(_)));

    let stored = sales.get_sale(&app.manager, created.sale.id).await.unwrap();
    assert_eq!(stored.sale.paid_amount, dec!(300));
    assert_eq!(stored.sale.due_amount, dec!(700));
    assert_eq!(app.balance(customer.id).await, dec!(700));
}

#[tokio::test]
async fn failed_journal_write_rolls_back_the_whole_sale() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000018", dec!(0)).await;

    // Sale, items, payment and production status are written before the journal.
    app.abort_on("freeze_journal", "BEFORE INSERT ON customer_balance_entries")
        .await;

    let result = app
        .services
        .sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(1000), dec!(300), dec!(0)),
        )
        .await;

    assert_matches!(
        result,
        Err(ServiceError::TransactionFailed(_) | ServiceError::DatabaseError(_))
    );
    assert_eq!(sale::Entity::find().count(&*app.db).await.unwrap(), 0);
    assert_eq!(sale_item::Entity::find().count(&*app.db).await.unwrap(), 0);
    assert_eq!(payment::Entity::find().count(&*app.db).await.unwrap(), 0);
    assert_eq!(
        customer_balance_entry::Entity::find().count(&*app.db).await.unwrap(),
        0
    );
    assert_eq!(
        production_status(&app, production.production.id).await,
        ProductionStatus::Completed
    );
    assert_eq!(
        quotation_status(&app, production.production.quotation_id).await,
        QuotationStatus::ProductionReady
    );
    assert_eq!(app.balance(customer.id).await, dec!(0));
}

#[tokio::test]
async fn unreadable_production_aborts_sale_removal() {
    let app = TestApp::new().await;
    let (customer, production) = app.seed_sellable("01900000019", dec!(0)).await;
    let sales = &app.services.sales;
    let created = sales
        .create_sale(
            &app.manager,
            sale_input(customer.id, Some(production.production.id), dec!(600), dec!(0), dec!(0)),
        )
        .await
        .unwrap();

    app.db
        .execute_unprepared("ALTER TABLE productions RENAME TO productions_offline")
        .await
        .unwrap();

    let result = sales.destroy_sale(&app.manager, created.sale.id).await;
    assert_matches!(result, Err(ServiceError::DatabaseError(_)));

    let stored = sale::Entity::find_by_id(created.sale.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.deleted_at.is_none());
    assert_eq!(app.balance(customer.id).await, dec!(600));
    assert_eq!(
        customer_balance_entry::Entity::find().count(&*app.db).await.unwrap(),
        1
    );
}
