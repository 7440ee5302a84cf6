#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rental_commerce_api::{
    config::CommerceConfig,
    dto::orders::{CreateOrderRequest, OrderItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{
        AddressSnapshot, Category, Order, OrderStatus, OrderType, PaymentStatus, Product, Role,
    },
    notify::{Notifier, OrderEvent},
    repository::{
        InMemoryStore, NewOrder, NewProduct, NewUser, OrderFilter, OrderRepository, Page,
        ProductRepository, StatusChange, Store, UserRepository,
    },
    state::AppState,
};
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Keeps every event so tests can assert on what was emitted.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<OrderEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(OrderEvent::kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: OrderEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::with_store(Store::from_memory(store.clone()), store)
    }

    /// Same in-memory tables, but orders go through `orders` instead.
    pub fn with_orders(orders: Arc<dyn OrderRepository>, store: Arc<InMemoryStore>) -> Self {
        let mut ports = Store::from_memory(store.clone());
        ports.orders = orders;
        Self::with_store(ports, store)
    }

    /// Same in-memory tables, but catalog calls go through `products` instead.
    pub fn with_products(products: Arc<dyn ProductRepository>, store: Arc<InMemoryStore>) -> Self {
        let mut ports = Store::from_memory(store.clone());
        ports.products = products;
        Self::with_store(ports, store)
    }

    fn with_store(ports: Store, store: Arc<InMemoryStore>) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(ports, notifier.clone(), CommerceConfig::default())
            .with_webhook_secret(Some(WEBHOOK_SECRET.to_string()));
        Self {
            state,
            store,
            notifier,
        }
    }

    pub async fn user(&self, role: Role) -> AuthUser {
        let user = self
            .store
            .insert_user(NewUser {
                email: format!("{}@example.com", Uuid::new_v4()),
                user_name: "Test User".into(),
                phone_no: "5550001111".into(),
                role,
            })
            .await
            .expect("insert user");
        AuthUser {
            user_id: user.id,
            role,
        }
    }

    pub async fn product(&self, price: i64, stock: i32) -> Product {
        self.store
            .insert_product(NewProduct {
                name: format!("Tent {}", &Uuid::new_v4().to_string()[..8]),
                description: "Two person tent".into(),
                details: None,
                price,
                category: Category::One,
                stock,
                delivery_time: "3-5 business days".into(),
                return_time: "30 days".into(),
            })
            .await
            .expect("insert product")
    }

    pub async fn product_by_id(&self, product_id: Uuid) -> Product {
        self.store
            .find_product(product_id)
            .await
            .expect("find product")
            .expect("product exists")
    }

    pub async fn stock_of(&self, product_id: Uuid) -> i32 {
        self.product_by_id(product_id).await.stock
    }
}

pub fn purchase(lines: &[(Uuid, i32)]) -> CreateOrderRequest {
    CreateOrderRequest {
        items: lines
            .iter()
            .map(|(product_id, quantity)| OrderItemRequest {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
        delivery_address: AddressSnapshot {
            address: "12 Market Street".into(),
            city: Some("Pune".into()),
            state: Some("MH".into()),
            zip_code: Some("411001".into()),
            country: Some("IN".into()),
        },
        invoice_address: None,
        payment_method: "card".into(),
        order_type: None,
        delivery_date: None,
        delivery_time: None,
        rental_start_date: None,
        rental_end_date: None,
    }
}

pub fn rental(lines: &[(Uuid, i32)]) -> CreateOrderRequest {
    let start = Utc::now() + Duration::days(1);
    CreateOrderRequest {
        order_type: Some(OrderType::Rental),
        rental_start_date: Some(start),
        rental_end_date: Some(start + Duration::days(3)),
        ..purchase(lines)
    }
}

/// Delegates to the in-memory store but refuses every insert.
pub struct FailingOrders {
    inner: Arc<InMemoryStore>,
    conflict: bool,
    pub attempts: AtomicUsize,
}

impl FailingOrders {
    pub fn broken(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            conflict: false,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn colliding(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            conflict: true,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OrderRepository for FailingOrders {
    async fn insert_order(&self, order: NewOrder) -> AppResult<Order> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.conflict {
            Err(AppError::Conflict(format!(
                "order code {} already exists",
                order.order_code
            )))
        } else {
            Err(AppError::Internal(anyhow::anyhow!("connection reset")))
        }
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        self.inner.find_order(id).await
    }

    async fn find_by_payment_reference(&self, reference: &str) -> AppResult<Option<Order>> {
        self.inner.find_by_payment_reference(reference).await
    }

    async fn list_orders(&self, filter: &OrderFilter, page: Page) -> AppResult<(Vec<Order>, i64)> {
        self.inner.list_orders(filter, page).await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        change: StatusChange,
    ) -> AppResult<Option<Order>> {
        self.inner.transition_status(id, from, change).await
    }

    async fn delete_if_pending(&self, id: Uuid) -> AppResult<bool> {
        self.inner.delete_if_pending(id).await
    }

    async fn set_payment_reference(&self, id: Uuid, reference: &str) -> AppResult<Option<Order>> {
        self.inner.set_payment_reference(id, reference).await
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> AppResult<Option<Order>> {
        self.inner.transition_payment(id, from, to).await
    }

    async fn count_by_status(&self) -> AppResult<Vec<(OrderStatus, i64)>> {
        self.inner.count_by_status().await
    }
}
