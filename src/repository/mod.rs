//! Storage ports used by the services.
//!
//! Each trait method is a single atomic step against the backing store. Multi-step
//! workflows (reserve stock, then persist the order) are composed in the service
//! layer with compensation, so the same logic runs against Postgres and the
//! in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        Address, AddressSnapshot, AddressType, Category, LineItem, Notification, NotificationType,
        Order, OrderStatus, OrderTotals, OrderType, PaymentStatus, Product, Role, StockStatus, User,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{PgAuditLog, SeaOrmStore};

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.max(0) as u64,
            offset: offset.max(0) as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSort {
    Newest,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    Rating,
}

#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: ProductSort,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            min_price: None,
            max_price: None,
            sort: ProductSort::Newest,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub details: Option<String>,
    pub price: i64,
    pub category: Category,
    pub stock: i32,
    pub delivery_time: String,
    pub return_time: String,
}

/// Catalog edit. Only the fields that are `Some` are written.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub details: Option<String>,
    pub price: Option<i64>,
    pub category: Option<Category>,
    pub stock: Option<i32>,
    pub delivery_time: Option<String>,
    pub return_time: Option<String>,
    pub is_active: Option<bool>,
}

/// Outcome of an atomic conditional stock change.
#[derive(Debug, Clone)]
pub enum StockChange {
    Applied(Product),
    Insufficient { available: i32 },
    /// The counter would leave the `i32` range.
    Overflow,
    Missing,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub order_type: Option<OrderType>,
    pub oldest_first: bool,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_code: String,
    pub user_id: Uuid,
    pub items: Vec<LineItem>,
    pub delivery_address: AddressSnapshot,
    pub invoice_address: AddressSnapshot,
    pub delivery_date: Option<DateTime<Utc>>,
    pub delivery_time: Option<String>,
    pub payment_method: String,
    pub order_type: OrderType,
    pub totals: OrderTotals,
    pub currency: String,
    pub rental_start_date: Option<DateTime<Utc>>,
    pub rental_end_date: Option<DateTime<Utc>>,
}

/// Column changes applied together with a status compare-and-set.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub to: OrderStatus,
    pub confirm: bool,
    pub return_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub notification_type: Option<NotificationType>,
    pub is_read: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub related_order: Option<Uuid>,
    pub related_product: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub user_name: String,
    pub phone_no: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewAddress {
    pub address_type: AddressType,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AddressPatch {
    pub address_type: Option<AddressType>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<Value>,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>>;

    async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>>;

    /// Active products only.
    async fn list_products(&self, filter: &ProductFilter, page: Page)
    -> AppResult<(Vec<Product>, i64)>;

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product>;

    /// Write the patched columns in one step. Setting `stock` also re-derives
    /// `stock_status`; untouched counters are never written back.
    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> AppResult<Option<Product>>;

    /// Decrement stock only if the active product holds at least `quantity`.
    async fn try_decrement_stock(&self, id: Uuid, quantity: i32) -> AppResult<StockChange>;

    async fn increment_stock(&self, id: Uuid, quantity: i32) -> AppResult<StockChange>;

    /// Upsert the user's rating and refresh the aggregate.
    async fn upsert_rating(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i32,
        review: Option<String>,
    ) -> AppResult<Option<Product>>;

    async fn remove_rating(&self, product_id: Uuid, user_id: Uuid) -> AppResult<Option<Product>>;

    async fn list_low_stock(&self, threshold: i32, page: Page) -> AppResult<(Vec<Product>, i64)>;

    async fn count_by_stock_status(&self) -> AppResult<Vec<(StockStatus, i64)>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Fails with `AppError::Conflict` when the order code is already taken.
    async fn insert_order(&self, order: NewOrder) -> AppResult<Order>;

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>>;

    async fn find_by_payment_reference(&self, reference: &str) -> AppResult<Option<Order>>;

    async fn list_orders(&self, filter: &OrderFilter, page: Page) -> AppResult<(Vec<Order>, i64)>;

    /// Apply `change` only while the stored status still equals `from`.
    /// `None` means the status moved underneath the caller.
    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        change: StatusChange,
    ) -> AppResult<Option<Order>>;

    /// Delete the order only while it is still in the initial status.
    async fn delete_if_pending(&self, id: Uuid) -> AppResult<bool>;

    async fn set_payment_reference(&self, id: Uuid, reference: &str) -> AppResult<Option<Order>>;

    /// Compare-and-set on the payment status.
    async fn transition_payment(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> AppResult<Option<Order>>;

    async fn count_by_status(&self) -> AppResult<Vec<(OrderStatus, i64)>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: NewNotification) -> AppResult<Notification>;

    async fn insert_notifications(&self, notifications: Vec<NewNotification>) -> AppResult<u64>;

    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
        page: Page,
    ) -> AppResult<(Vec<Notification>, i64)>;

    async fn unread_count(&self, user_id: Uuid) -> AppResult<i64>;

    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Notification>>;

    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64>;

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> AppResult<bool>;

    async fn clear_notifications(&self, user_id: Uuid) -> AppResult<u64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn list_users(&self, page: Page) -> AppResult<(Vec<User>, i64)>;

    async fn insert_user(&self, user: NewUser) -> AppResult<User>;

    async fn update_profile(
        &self,
        id: Uuid,
        user_name: Option<String>,
        phone_no: Option<String>,
    ) -> AppResult<Option<User>>;

    async fn update_role(&self, id: Uuid, role: Role) -> AppResult<Option<User>>;

    async fn list_addresses(&self, user_id: Uuid) -> AppResult<Vec<Address>>;

    /// A new default address clears the default flag on the user's other
    /// addresses of the same type.
    async fn add_address(&self, user_id: Uuid, address: NewAddress) -> AppResult<Address>;

    async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        patch: AddressPatch,
    ) -> AppResult<Option<Address>>;

    async fn remove_address(&self, user_id: Uuid, address_id: Uuid) -> AppResult<bool>;

    /// Returns false when the product is already in the wishlist.
    async fn wishlist_add(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool>;

    async fn wishlist_remove(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool>;

    /// Newest first.
    async fn wishlist(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> AppResult<()>;
}

/// The full set of storage ports handed to the services.
#[derive(Clone)]
pub struct Store {
    pub products: Arc<dyn ProductRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub users: Arc<dyn UserRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(InMemoryStore::new()))
    }

    pub fn from_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            products: store.clone(),
            orders: store.clone(),
            notifications: store.clone(),
            users: store.clone(),
            audit: store,
        }
    }

    pub fn postgres(orm: sea_orm::DatabaseConnection, pool: crate::db::DbPool) -> Self {
        let store = Arc::new(SeaOrmStore::new(orm));
        Self {
            products: store.clone(),
            orders: store.clone(),
            notifications: store.clone(),
            users: store,
            audit: Arc::new(PgAuditLog::new(pool)),
        }
    }
}
