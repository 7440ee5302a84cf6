mod common;

use std::sync::{Arc, atomic::Ordering};

use common::{FailingOrders, TestApp, purchase, rental};
use rental_commerce_api::{
    dto::orders::UpdateOrderStatusRequest,
    error::AppError,
    models::{OrderStatus, OrderType, Role, StockStatus},
    repository::InMemoryStore,
    routes::params::OrderListQuery,
    services::{admin_service, order_service},
};

fn status(label: &str) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status: label.to_string(),
    }
}

#[tokio::test]
async fn purchase_reserves_stock_and_prices_the_order() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let product = app.product(100, 10).await;

    let order = order_service::create_order(&app.state, &user, purchase(&[(product.id, 2)]))
        .await?
        .data
        .expect("order");

    assert_eq!(order.order_status, OrderStatus::Pending);
    assert_eq!(order.order_type, OrderType::Purchase);
    assert!(order.order_code.starts_with('R'));
    assert_eq!(order.order_code.len(), 17);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].unit_price, 100);
    assert_eq!(order.totals.sub_total, 200);
    assert_eq!(order.totals.delivery_charge, 1000);
    assert_eq!(order.totals.taxes, 20);
    assert_eq!(order.totals.grand_total, 1220);
    assert_eq!(order.invoice_address, order.delivery_address);

    let stored = app.product_by_id(product.id).await;
    assert_eq!(stored.stock, 8);
    assert_eq!(stored.stock_status, StockStatus::LowStock);

    assert_eq!(app.notifier.kinds(), vec!["order_placed"]);
    Ok(())
}

#[tokio::test]
async fn duplicate_lines_are_merged_before_the_stock_check() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let product = app.product(50, 3).await;

    let err = order_service::create_order(
        &app.state,
        &user,
        purchase(&[(product.id, 2), (product.id, 2)]),
    )
    .await
    .expect_err("4 units requested, 3 available");

    assert!(matches!(
        err,
        AppError::InsufficientStock {
            requested: 4,
            available: 3,
            ..
        }
    ));
    assert_eq!(app.stock_of(product.id).await, 3);
    assert!(app.notifier.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_line_releases_earlier_reservations() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let plenty = app.product(10, 20).await;
    let scarce = app.product(10, 1).await;

    let err = order_service::create_order(
        &app.state,
        &user,
        purchase(&[(plenty.id, 5), (scarce.id, 2)]),
    )
    .await
    .expect_err("second line is short");

    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(app.stock_of(plenty.id).await, 20);
    assert_eq!(app.stock_of(scarce.id).await, 1);
    Ok(())
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let app = TestApp::new();
    let user = app.user(Role::User).await;

    let err = order_service::create_order(
        &app.state,
        &user,
        purchase(&[(uuid::Uuid::new_v4(), 1)]),
    )
    .await
    .expect_err("no such product");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn rental_checks_stock_without_taking_it() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let product = app.product(300, 2).await;

    let order = order_service::create_order(&app.state, &user, rental(&[(product.id, 2)]))
        .await?
        .data
        .expect("order");
    assert_eq!(order.order_type, OrderType::Rental);
    assert!(order.rental_start_date.is_some());
    assert!(!order.is_confirmed);
    assert_eq!(app.stock_of(product.id).await, 2);

    let err = order_service::create_order(&app.state, &user, rental(&[(product.id, 3)]))
        .await
        .expect_err("more than on hand");
    assert!(matches!(err, AppError::InsufficientStock { .. }));
    Ok(())
}

#[tokio::test]
async fn rental_requires_an_ordered_window() {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let product = app.product(300, 2).await;

    let mut missing = rental(&[(product.id, 1)]);
    missing.rental_end_date = None;
    let err = order_service::create_order(&app.state, &user, missing)
        .await
        .expect_err("no end date");
    assert!(matches!(err, AppError::Validation(_)));

    let mut inverted = rental(&[(product.id, 1)]);
    std::mem::swap(&mut inverted.rental_start_date, &mut inverted.rental_end_date);
    let err = order_service::create_order(&app.state, &user, inverted)
        .await
        .expect_err("end before start");
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn purchase_ignores_a_rental_window() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let product = app.product(300, 5).await;

    let mut request = purchase(&[(product.id, 1)]);
    request.rental_start_date = rental(&[]).rental_start_date;
    request.rental_end_date = rental(&[]).rental_end_date;

    let order = order_service::create_order(&app.state, &user, request)
        .await?
        .data
        .expect("order");
    assert_eq!(order.order_type, OrderType::Purchase);
    assert!(order.rental_start_date.is_none());
    assert!(order.rental_end_date.is_none());
    assert_eq!(app.stock_of(product.id).await, 4);
    Ok(())
}

#[tokio::test]
async fn totals_out_of_range_are_rejected_before_stock_moves() {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let product = app.product(i64::MAX / 2, 10).await;

    let err = order_service::create_order(&app.state, &user, purchase(&[(product.id, 3)]))
        .await
        .expect_err("total overflows");
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(app.stock_of(product.id).await, 10);
    assert!(app.notifier.kinds().is_empty());
}

#[tokio::test]
async fn status_only_moves_forward() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let admin = app.user(Role::Admin).await;
    let product = app.product(100, 5).await;
    let order = order_service::create_order(&app.state, &user, purchase(&[(product.id, 1)]))
        .await?
        .data
        .expect("order");

    let delivered =
        admin_service::update_order_status(&app.state, &admin, order.id, status("Delivered"))
            .await?
            .data
            .expect("order");
    assert_eq!(delivered.order_status, OrderStatus::Delivered);
    assert!(!delivered.is_confirmed);

    let err = admin_service::update_order_status(&app.state, &admin, order.id, status("Ready"))
        .await
        .expect_err("backward");
    assert!(matches!(err, AppError::InvalidState(_)));

    let unchanged =
        admin_service::update_order_status(&app.state, &admin, order.id, status("Delivered"))
            .await?;
    assert_eq!(unchanged.message, "Order status unchanged");

    let err = admin_service::update_order_status(&app.state, &admin, order.id, status("Shipped"))
        .await
        .expect_err("unknown label");
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(
        app.notifier.kinds(),
        vec!["order_placed", "order_status_changed"]
    );
    Ok(())
}

#[tokio::test]
async fn status_updates_are_admin_only() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let product = app.product(100, 5).await;
    let order = order_service::create_order(&app.state, &user, purchase(&[(product.id, 1)]))
        .await?
        .data
        .expect("order");

    let err = admin_service::update_order_status(&app.state, &user, order.id, status("Ready"))
        .await
        .expect_err("not admin");
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}

#[tokio::test]
async fn rental_return_restocks_exactly_once() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let admin = app.user(Role::Admin).await;
    let product = app.product(300, 4).await;

    let order = order_service::create_order(&app.state, &user, rental(&[(product.id, 3)]))
        .await?
        .data
        .expect("order");

    let ready = admin_service::update_order_status(&app.state, &admin, order.id, status("Ready"))
        .await?
        .data
        .expect("order");
    assert!(ready.is_confirmed);
    assert!(ready.return_date.is_none());

    let returned =
        admin_service::update_order_status(&app.state, &admin, order.id, status("Return"))
            .await?
            .data
            .expect("order");
    assert_eq!(returned.order_status, OrderStatus::Return);
    assert!(returned.return_date.is_some());
    assert_eq!(app.stock_of(product.id).await, 7);

    admin_service::update_order_status(&app.state, &admin, order.id, status("Return")).await?;
    assert_eq!(app.stock_of(product.id).await, 7);
    Ok(())
}

#[tokio::test]
async fn return_relabels_an_empty_shelf() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let admin = app.user(Role::Admin).await;
    let product = app.product(300, 4).await;

    let rented = order_service::create_order(&app.state, &user, rental(&[(product.id, 4)]))
        .await?
        .data
        .expect("order");
    order_service::create_order(&app.state, &user, purchase(&[(product.id, 4)])).await?;
    let empty = app.product_by_id(product.id).await;
    assert_eq!(empty.stock, 0);
    assert_eq!(empty.stock_status, StockStatus::OutOfStock);

    admin_service::update_order_status(&app.state, &admin, rented.id, status("Return")).await?;
    let restocked = app.product_by_id(product.id).await;
    assert_eq!(restocked.stock, 4);
    assert_eq!(restocked.stock_status, StockStatus::LowStock);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_returns_restock_once() -> anyhow::Result<()> {
    let app = Arc::new(TestApp::new());
    let user = app.user(Role::User).await;
    let admin = app.user(Role::Admin).await;
    let product = app.product(300, 5).await;

    let order_id = order_service::create_order(&app.state, &user, rental(&[(product.id, 2)]))
        .await?
        .data
        .expect("order")
        .id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        let admin = admin.clone();
        handles.push(tokio::spawn(async move {
            admin_service::update_order_status(&app.state, &admin, order_id, status("Return"))
                .await
                .map(|_| ())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(app.stock_of(product.id).await, 7);
    let changes = app
        .notifier
        .kinds()
        .into_iter()
        .filter(|k| *k == "order_status_changed")
        .count();
    assert_eq!(changes, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_never_oversell() -> anyhow::Result<()> {
    let app = Arc::new(TestApp::new());
    let product_id = app.product(100, 5).await.id;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let app = app.clone();
        let user = app.user(Role::User).await;
        handles.push(tokio::spawn(async move {
            order_service::create_order(&app.state, &user, purchase(&[(product_id, 1)])).await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => placed += 1,
            Err(AppError::InsufficientStock { .. }) => {}
            Err(other) => return Err(other.into()),
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(app.stock_of(product_id).await, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_buyers_racing_for_the_last_units() -> anyhow::Result<()> {
    let app = Arc::new(TestApp::new());
    let product_id = app.product(100, 3).await.id;
    let first = app.user(Role::User).await;
    let second = app.user(Role::User).await;

    let a = {
        let app = app.clone();
        tokio::spawn(async move {
            order_service::create_order(&app.state, &first, purchase(&[(product_id, 3)])).await
        })
    };
    let b = {
        let app = app.clone();
        tokio::spawn(async move {
            order_service::create_order(&app.state, &second, purchase(&[(product_id, 3)])).await
        })
    };

    let results = [a.await?, b.await?];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(AppError::InsufficientStock { .. })))
    );
    assert_eq!(app.stock_of(product_id).await, 0);
    Ok(())
}

#[tokio::test]
async fn cancel_only_while_pending() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let admin = app.user(Role::Admin).await;
    let product = app.product(100, 10).await;

    let first = order_service::create_order(&app.state, &user, purchase(&[(product.id, 4)]))
        .await?
        .data
        .expect("order");
    assert_eq!(app.stock_of(product.id).await, 6);

    order_service::cancel_order(&app.state, &user, first.id).await?;
    assert_eq!(app.stock_of(product.id).await, 10);
    let err = order_service::get_order(&app.state, &user, first.id)
        .await
        .expect_err("deleted");
    assert!(matches!(err, AppError::NotFound(_)));

    let second = order_service::create_order(&app.state, &user, purchase(&[(product.id, 1)]))
        .await?
        .data
        .expect("order");
    admin_service::update_order_status(&app.state, &admin, second.id, status("Ready")).await?;

    let err = order_service::cancel_order(&app.state, &user, second.id)
        .await
        .expect_err("already ready");
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(app.stock_of(product.id).await, 9);

    assert!(app.notifier.kinds().contains(&"order_cancelled"));
    Ok(())
}

#[tokio::test]
async fn cancelling_a_rental_leaves_stock_alone() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let product = app.product(100, 3).await;

    let order = order_service::create_order(&app.state, &user, rental(&[(product.id, 2)]))
        .await?
        .data
        .expect("order");
    order_service::cancel_order(&app.state, &user, order.id).await?;
    assert_eq!(app.stock_of(product.id).await, 3);
    Ok(())
}

#[tokio::test]
async fn cancel_relabels_restored_stock() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = app.user(Role::User).await;
    let product = app.product(100, 11).await;

    let order = order_service::create_order(&app.state, &user, purchase(&[(product.id, 3)]))
        .await?
        .data
        .expect("order");
    let reserved = app.product_by_id(product.id).await;
    assert_eq!(reserved.stock, 8);
    assert_eq!(reserved.stock_status, StockStatus::LowStock);

    order_service::cancel_order(&app.state, &user, order.id).await?;
    let restored = app.product_by_id(product.id).await;
    assert_eq!(restored.stock, 11);
    assert_eq!(restored.stock_status, StockStatus::InStock);
    Ok(())
}

#[tokio::test]
async fn other_users_cannot_see_or_cancel_an_order() -> anyhow::Result<()> {
    let app = TestApp::new();
    let owner = app.user(Role::User).await;
    let stranger = app.user(Role::User).await;
    let admin = app.user(Role::Admin).await;
    let product = app.product(100, 3).await;

    let order = order_service::create_order(&app.state, &owner, purchase(&[(product.id, 1)]))
        .await?
        .data
        .expect("order");

    let err = order_service::get_order(&app.state, &stranger, order.id)
        .await
        .expect_err("not visible");
    assert!(matches!(err, AppError::NotFound(_)));
    let err = order_service::cancel_order(&app.state, &stranger, order.id)
        .await
        .expect_err("not visible");
    assert!(matches!(err, AppError::NotFound(_)));

    admin_service::cancel_order_admin(&app.state, &admin, order.id).await?;
    assert_eq!(app.stock_of(product.id).await, 3);
    Ok(())
}

#[tokio::test]
async fn listing_is_scoped_to_the_caller_and_filterable() -> anyhow::Result<()> {
    let app = TestApp::new();
    let alice = app.user(Role::User).await;
    let bob = app.user(Role::User).await;
    let admin = app.user(Role::Admin).await;
    let product = app.product(100, 20).await;

    order_service::create_order(&app.state, &alice, purchase(&[(product.id, 1)])).await?;
    order_service::create_order(&app.state, &alice, rental(&[(product.id, 1)])).await?;
    order_service::create_order(&app.state, &bob, purchase(&[(product.id, 1)])).await?;

    let mine = order_service::list_orders(&app.state, &alice, OrderListQuery::default()).await?;
    assert_eq!(mine.data.expect("orders").items.len(), 2);
    assert_eq!(mine.meta.expect("meta").total, Some(2));

    let rentals = order_service::list_orders(
        &app.state,
        &alice,
        OrderListQuery {
            order_type: Some("rental".into()),
            ..Default::default()
        },
    )
    .await?;
    let rentals = rentals.data.expect("orders").items;
    assert_eq!(rentals.len(), 1);
    assert_eq!(rentals[0].order_type, OrderType::Rental);

    let all = admin_service::list_all_orders(&app.state, &admin, OrderListQuery::default()).await?;
    assert_eq!(all.data.expect("orders").items.len(), 3);

    let err = order_service::list_orders(
        &app.state,
        &alice,
        OrderListQuery {
            status: Some("Shipped".into()),
            ..Default::default()
        },
    )
    .await
    .expect_err("unknown status");
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn failed_insert_puts_reserved_stock_back() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let orders = Arc::new(FailingOrders::broken(store.clone()));
    let app = TestApp::with_orders(orders.clone(), store);
    let user = app.user(Role::User).await;
    let product = app.product(100, 6).await;

    let err = order_service::create_order(&app.state, &user, purchase(&[(product.id, 4)]))
        .await
        .expect_err("insert fails");
    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(orders.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(app.stock_of(product.id).await, 6);
    assert!(app.notifier.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn order_code_collisions_are_retried_then_reported() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let orders = Arc::new(FailingOrders::colliding(store.clone()));
    let app = TestApp::with_orders(orders.clone(), store);
    let user = app.user(Role::User).await;
    let product = app.product(100, 6).await;

    let err = order_service::create_order(&app.state, &user, purchase(&[(product.id, 2)]))
        .await
        .expect_err("every code collides");
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(
        orders.attempts.load(Ordering::SeqCst),
        order_service::ORDER_CODE_ATTEMPTS
    );
    assert_eq!(app.stock_of(product.id).await, 6);
    Ok(())
}
