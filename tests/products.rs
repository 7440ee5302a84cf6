mod common;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use common::{TestApp, purchase};
use rental_commerce_api::{
    dto::products::{CreateProductRequest, RateProductRequest, UpdateProductRequest},
    error::{AppError, AppResult},
    models::{Category, OrderStatus, Product, Role, StockStatus},
    repository::{
        InMemoryStore, NewProduct, Page, ProductFilter, ProductPatch, ProductRepository,
        StockChange,
    },
    routes::{
        admin::{InventoryAdjustRequest, LowStockQuery},
        params::{ProductQuery, ProductSortBy, SortOrder},
    },
    services::{admin_service, order_service, product_service},
};
use uuid::Uuid;

/// Lands one order's stock decrement of 3 between the service's read and its write.
struct RacingCatalog {
    inner: Arc<InMemoryStore>,
    fired: AtomicBool,
}

impl RacingCatalog {
    fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            fired: AtomicBool::new(false),
        }
    }

    async fn race(&self, id: Uuid) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let change = self
                .inner
                .try_decrement_stock(id, 3)
                .await
                .expect("concurrent decrement");
            assert!(matches!(change, StockChange::Applied(_)));
        }
    }
}

#[async_trait]
impl ProductRepository for RacingCatalog {
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let found = self.inner.find_product(id).await;
        self.race(id).await;
        found
    }

    async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        self.inner.find_products(ids).await
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> AppResult<(Vec<Product>, i64)> {
        self.inner.list_products(filter, page).await
    }

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product> {
        self.inner.insert_product(product).await
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> AppResult<Option<Product>> {
        self.race(id).await;
        self.inner.update_product(id, patch).await
    }

    async fn try_decrement_stock(&self, id: Uuid, quantity: i32) -> AppResult<StockChange> {
        self.inner.try_decrement_stock(id, quantity).await
    }

    async fn increment_stock(&self, id: Uuid, quantity: i32) -> AppResult<StockChange> {
        self.inner.increment_stock(id, quantity).await
    }

    async fn upsert_rating(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i32,
        review: Option<String>,
    ) -> AppResult<Option<Product>> {
        self.inner
            .upsert_rating(product_id, user_id, rating, review)
            .await
    }

    async fn remove_rating(&self, product_id: Uuid, user_id: Uuid) -> AppResult<Option<Product>> {
        self.inner.remove_rating(product_id, user_id).await
    }

    async fn list_low_stock(&self, threshold: i32, page: Page) -> AppResult<(Vec<Product>, i64)> {
        self.inner.list_low_stock(threshold, page).await
    }

    async fn count_by_stock_status(&self) -> AppResult<Vec<(StockStatus, i64)>> {
        self.inner.count_by_stock_status().await
    }
}

fn racing_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    TestApp::with_products(Arc::new(RacingCatalog::new(store.clone())), store)
}

fn new_product(name: &str, price: i64, stock: i32) -> CreateProductRequest {
    CreateProductRequest {
        name: name.to_string(),
        description: format!("{name} for rent or sale"),
        details: None,
        price,
        category: Category::Two,
        stock,
        delivery_time: None,
        return_time: None,
    }
}

#[tokio::test]
async fn admin_creates_product_with_defaults() -> anyhow::Result<()> {
    let app = TestApp::new();
    let admin = app.user(Role::Admin).await;

    let product = product_service::create_product(&app.state, &admin, new_product("Kayak", 900, 4))
        .await?
        .data
        .expect("product");
    assert_eq!(product.stock_status, StockStatus::LowStock);
    assert_eq!(product.delivery_time, "3-5 business days");
    assert_eq!(product.return_time, "30 days");
    assert_eq!(product.average_rating, 0.0);
    assert!(product.is_active);

    let audit = app.store.audit_entries();
    assert!(audit.iter().any(|e| e.action == "product_create"));
    Ok(())
}

#[tokio::test]
async fn catalog_writes_are_admin_only() {
    let app = TestApp::new();
    let user = app.user(Role::User).await;

    let err = product_service::create_product(&app.state, &user, new_product("Kayak", 900, 4))
        .await
        .expect_err("not admin");
    assert!(matches!(err, AppError::Forbidden));

    let err = product_service::create_product(
        &app.state,
        &app.user(Role::Admin).await,
        new_product("", 900, 4),
    )
    .await
    .expect_err("empty name");
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn update_recomputes_stock_status() -> anyhow::Result<()> {
    let app = TestApp::new();
    let admin = app.user(Role::Admin).await;
    let product = app.product(100, 50).await;
    assert_eq!(product.stock_status, StockStatus::InStock);

    let updated = product_service::update_product(
        &app.state,
        &admin,
        product.id,
        UpdateProductRequest {
            stock: Some(0),
            price: Some(120),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("product");
    assert_eq!(updated.stock, 0);
    assert_eq!(updated.price, 120);
    assert_eq!(updated.stock_status, StockStatus::OutOfStock);
    Ok(())
}

#[tokio::test]
async fn price_edit_keeps_a_concurrent_stock_decrement() -> anyhow::Result<()> {
    let app = racing_app();
    let admin = app.user(Role::Admin).await;
    let product = app.product(100, 20).await;

    let updated = product_service::update_product(
        &app.state,
        &admin,
        product.id,
        UpdateProductRequest {
            price: Some(150),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("product");
    assert_eq!(updated.price, 150);
    assert_eq!(updated.stock, 17);
    assert!(updated.is_active);

    let stored = app.product_by_id(product.id).await;
    assert_eq!(stored.stock, 17);
    assert_eq!(stored.stock_status, StockStatus::InStock);
    Ok(())
}

#[tokio::test]
async fn deactivation_keeps_a_concurrent_stock_decrement() -> anyhow::Result<()> {
    let app = racing_app();
    let admin = app.user(Role::Admin).await;
    let product = app.product(100, 12).await;

    product_service::deactivate_product(&app.state, &admin, product.id).await?;

    let stored = app.product_by_id(product.id).await;
    assert!(!stored.is_active);
    assert_eq!(stored.stock, 9);
    assert_eq!(stored.stock_status, StockStatus::LowStock);
    Ok(())
}

#[tokio::test]
async fn deleted_products_disappear_from_the_catalog() -> anyhow::Result<()> {
    let app = TestApp::new();
    let admin = app.user(Role::Admin).await;
    let user = app.user(Role::User).await;
    let product = app.product(100, 5).await;

    product_service::deactivate_product(&app.state, &admin, product.id).await?;

    let err = product_service::get_product(&app.state, product.id)
        .await
        .expect_err("inactive");
    assert!(matches!(err, AppError::NotFound(_)));

    let listed = product_service::list_products(&app.state, ProductQuery::default())
        .await?
        .data
        .expect("products");
    assert!(listed.items.is_empty());

    let err = order_service::create_order(&app.state, &user, purchase(&[(product.id, 1)]))
        .await
        .expect_err("cannot order inactive product");
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn list_filters_and_sorts() -> anyhow::Result<()> {
    let app = TestApp::new();
    let admin = app.user(Role::Admin).await;
    for (name, price) in [("Drill", 300), ("Ladder", 150), ("Generator", 2000)] {
        product_service::create_product(&app.state, &admin, new_product(name, price, 20)).await?;
    }

    let cheap_first = product_service::list_products(
        &app.state,
        ProductQuery {
            sort_by: Some(ProductSortBy::Price),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("products")
    .items;
    let prices: Vec<i64> = cheap_first.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![150, 300, 2000]);

    let ranged = product_service::list_products(
        &app.state,
        ProductQuery {
            min_price: Some(200),
            max_price: Some(1000),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("products")
    .items;
    assert_eq!(ranged.len(), 1);
    assert_eq!(ranged[0].name, "Drill");

    let searched = product_service::list_products(
        &app.state,
        ProductQuery {
            q: Some("gener".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("products")
    .items;
    assert_eq!(searched.len(), 1);

    let paged = product_service::list_products(
        &app.state,
        ProductQuery {
            per_page: Some(2),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(paged.data.expect("products").items.len(), 2);
    let meta = paged.meta.expect("meta");
    assert_eq!(meta.total, Some(3));
    assert_eq!(meta.total_pages, Some(2));

    let err = product_service::list_products(
        &app.state,
        ProductQuery {
            min_price: Some(500),
            max_price: Some(100),
            ..Default::default()
        },
    )
    .await
    .expect_err("inverted range");
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn ratings_are_one_per_user_and_averaged() -> anyhow::Result<()> {
    let app = TestApp::new();
    let alice = app.user(Role::User).await;
    let bob = app.user(Role::User).await;
    let product = app.product(100, 5).await;

    let rate = |rating: i32| RateProductRequest {
        rating,
        review: None,
    };

    product_service::rate_product(&app.state, &alice, product.id, rate(2)).await?;
    product_service::rate_product(&app.state, &alice, product.id, rate(4)).await?;
    let rated = product_service::rate_product(&app.state, &bob, product.id, rate(5))
        .await?
        .data
        .expect("product");
    assert_eq!(rated.total_reviews, 2);
    assert!((rated.average_rating - 4.5).abs() < f64::EPSILON);

    let err = product_service::rate_product(&app.state, &bob, product.id, rate(6))
        .await
        .expect_err("out of range");
    assert!(matches!(err, AppError::Validation(_)));

    let after = product_service::remove_rating(&app.state, &alice, product.id)
        .await?
        .data
        .expect("product");
    assert_eq!(after.total_reviews, 1);
    assert!((after.average_rating - 5.0).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn inventory_adjustments_never_go_negative() -> anyhow::Result<()> {
    let app = TestApp::new();
    let admin = app.user(Role::Admin).await;
    let product = app.product(100, 3).await;

    let added = admin_service::adjust_inventory(
        &app.state,
        &admin,
        product.id,
        InventoryAdjustRequest { delta: 9 },
    )
    .await?
    .data
    .expect("product");
    assert_eq!(added.stock, 12);
    assert_eq!(added.stock_status, StockStatus::InStock);

    let err = admin_service::adjust_inventory(
        &app.state,
        &admin,
        product.id,
        InventoryAdjustRequest { delta: -13 },
    )
    .await
    .expect_err("would go negative");
    assert!(matches!(
        err,
        AppError::InsufficientStock {
            requested: 13,
            available: 12,
            ..
        }
    ));

    let emptied = admin_service::adjust_inventory(
        &app.state,
        &admin,
        product.id,
        InventoryAdjustRequest { delta: -12 },
    )
    .await?
    .data
    .expect("product");
    assert_eq!(emptied.stock_status, StockStatus::OutOfStock);

    let err = admin_service::adjust_inventory(
        &app.state,
        &admin,
        product.id,
        InventoryAdjustRequest { delta: 0 },
    )
    .await
    .expect_err("zero delta");
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn inventory_adjustment_rejects_overflow() -> anyhow::Result<()> {
    let app = TestApp::new();
    let admin = app.user(Role::Admin).await;
    let product = app.product(100, 3).await;

    let err = admin_service::adjust_inventory(
        &app.state,
        &admin,
        product.id,
        InventoryAdjustRequest { delta: i32::MAX },
    )
    .await
    .expect_err("stock would overflow");
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(app.stock_of(product.id).await, 3);
    Ok(())
}

#[tokio::test]
async fn low_stock_report_uses_the_threshold() -> anyhow::Result<()> {
    let app = TestApp::new();
    let admin = app.user(Role::Admin).await;
    app.product(100, 2).await;
    app.product(100, 10).await;
    app.product(100, 40).await;

    let default = admin_service::list_low_stock(&app.state, &admin, LowStockQuery::default())
        .await?
        .data
        .expect("products")
        .items;
    assert_eq!(default.len(), 2);
    assert!(default.iter().all(|p| p.stock <= 10));

    let tight = admin_service::list_low_stock(
        &app.state,
        &admin,
        LowStockQuery {
            threshold: Some(5),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("products")
    .items;
    assert_eq!(tight.len(), 1);
    Ok(())
}

#[tokio::test]
async fn dashboard_counts_every_status() -> anyhow::Result<()> {
    let app = TestApp::new();
    let admin = app.user(Role::Admin).await;
    let user = app.user(Role::User).await;
    let product = app.product(100, 30).await;

    for _ in 0..3 {
        order_service::create_order(&app.state, &user, purchase(&[(product.id, 1)])).await?;
    }

    let stats = admin_service::dashboard(&app.state, &admin)
        .await?
        .data
        .expect("stats");
    assert_eq!(stats.total_orders, 3);
    assert_eq!(stats.recent_orders.len(), 3);
    assert_eq!(stats.orders_by_status.len(), OrderStatus::ALL.len());
    let pending = stats
        .orders_by_status
        .iter()
        .find(|c| c.status == OrderStatus::Pending)
        .map(|c| c.count);
    assert_eq!(pending, Some(3));
    let ready = stats
        .orders_by_status
        .iter()
        .find(|c| c.status == OrderStatus::Ready)
        .map(|c| c.count);
    assert_eq!(ready, Some(0));
    assert_eq!(stats.products_by_stock_status.len(), StockStatus::ALL.len());

    let err = admin_service::dashboard(&app.state, &user)
        .await
        .expect_err("not admin");
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}
