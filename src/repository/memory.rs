//! In-memory implementation of every storage port, for tests and local runs.
//!
//! A single `RwLock` guards all tables so each trait call is atomic, mirroring the
//! single-statement guarantees of the Postgres implementation.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{
    AddressPatch, AuditEntry, AuditRepository, NewAddress, NewNotification, NewOrder, NewProduct,
    NewUser, NotificationFilter, NotificationRepository, OrderFilter, OrderRepository, Page,
    ProductFilter, ProductPatch, ProductRepository, ProductSort, StatusChange, StockChange,
    UserRepository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        Address, Notification, Order, OrderStatus, PaymentStatus, Product, ProductRating, Role,
        StockStatus, User,
    },
};

#[derive(Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    ratings: HashMap<(Uuid, Uuid), ProductRating>,
    orders: HashMap<Uuid, Order>,
    notifications: HashMap<Uuid, Notification>,
    users: HashMap<Uuid, User>,
    addresses: HashMap<Uuid, Address>,
    wishlist: Vec<(Uuid, Uuid)>,
    audit: Vec<AuditEntry>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| AppError::Internal(anyhow!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| AppError::Internal(anyhow!("Failed to acquire write lock: {}", e)))
    }

    /// Snapshot of recorded audit entries, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.read().map(|t| t.audit.clone()).unwrap_or_default()
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let items = items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect();
    (items, total)
}

fn refresh_rating(tables: &mut Tables, product_id: Uuid) -> Option<Product> {
    let scores: Vec<i32> = tables
        .ratings
        .values()
        .filter(|r| r.product_id == product_id)
        .map(|r| r.rating)
        .collect();
    let product = tables.products.get_mut(&product_id)?;
    product.total_reviews = scores.len() as i32;
    product.average_rating = if scores.is_empty() {
        0.0
    } else {
        f64::from(scores.iter().sum::<i32>()) / scores.len() as f64
    };
    product.updated_at = Utc::now();
    Some(product.clone())
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        let tables = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> AppResult<(Vec<Product>, i64)> {
        let tables = self.read()?;
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut items: Vec<Product> = tables
            .products
            .values()
            .filter(|p| p.is_active)
            .filter(|p| filter.category.is_none_or(|c| p.category == c))
            .filter(|p| filter.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| filter.max_price.is_none_or(|max| p.price <= max))
            .filter(|p| {
                needle.as_ref().is_none_or(|n| {
                    p.name.to_lowercase().contains(n) || p.description.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();

        match filter.sort {
            ProductSort::Newest => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ProductSort::PriceAsc => items.sort_by_key(|p| p.price),
            ProductSort::PriceDesc => items.sort_by(|a, b| b.price.cmp(&a.price)),
            ProductSort::NameAsc => items.sort_by(|a, b| a.name.cmp(&b.name)),
            ProductSort::NameDesc => items.sort_by(|a, b| b.name.cmp(&a.name)),
            ProductSort::Rating => {
                items.sort_by(|a, b| b.average_rating.total_cmp(&a.average_rating))
            }
        }

        Ok(paginate(items, page))
    }

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: product.name,
            description: product.description,
            details: product.details,
            price: product.price,
            category: product.category,
            stock: product.stock,
            stock_status: StockStatus::from_stock(product.stock),
            delivery_time: product.delivery_time,
            return_time: product.return_time,
            is_active: true,
            average_rating: 0.0,
            total_reviews: 0,
            created_at: now,
            updated_at: now,
        };
        self.write()?.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> AppResult<Option<Product>> {
        let mut tables = self.write()?;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(details) = patch.details {
            product.details = Some(details);
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(category) = patch.category {
            product.category = category;
        }
        if let Some(stock) = patch.stock {
            product.stock = stock;
            product.stock_status = StockStatus::from_stock(stock);
        }
        if let Some(delivery_time) = patch.delivery_time {
            product.delivery_time = delivery_time;
        }
        if let Some(return_time) = patch.return_time {
            product.return_time = return_time;
        }
        if let Some(is_active) = patch.is_active {
            product.is_active = is_active;
        }
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn try_decrement_stock(&self, id: Uuid, quantity: i32) -> AppResult<StockChange> {
        let mut tables = self.write()?;
        let Some(product) = tables.products.get_mut(&id).filter(|p| p.is_active) else {
            return Ok(StockChange::Missing);
        };
        if product.stock < quantity {
            return Ok(StockChange::Insufficient {
                available: product.stock,
            });
        }
        product.stock -= quantity;
        product.stock_status = StockStatus::from_stock(product.stock);
        product.updated_at = Utc::now();
        Ok(StockChange::Applied(product.clone()))
    }

    async fn increment_stock(&self, id: Uuid, quantity: i32) -> AppResult<StockChange> {
        let mut tables = self.write()?;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(StockChange::Missing);
        };
        let Some(stock) = product.stock.checked_add(quantity) else {
            return Ok(StockChange::Overflow);
        };
        product.stock = stock;
        product.stock_status = StockStatus::from_stock(product.stock);
        product.updated_at = Utc::now();
        Ok(StockChange::Applied(product.clone()))
    }

    async fn upsert_rating(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i32,
        review: Option<String>,
    ) -> AppResult<Option<Product>> {
        let mut tables = self.write()?;
        if !tables.products.contains_key(&product_id) {
            return Ok(None);
        }
        tables.ratings.insert(
            (product_id, user_id),
            ProductRating {
                product_id,
                user_id,
                rating,
                review,
                created_at: Utc::now(),
            },
        );
        Ok(refresh_rating(&mut tables, product_id))
    }

    async fn remove_rating(&self, product_id: Uuid, user_id: Uuid) -> AppResult<Option<Product>> {
        let mut tables = self.write()?;
        if !tables.products.contains_key(&product_id) {
            return Ok(None);
        }
        tables.ratings.remove(&(product_id, user_id));
        Ok(refresh_rating(&mut tables, product_id))
    }

    async fn list_low_stock(&self, threshold: i32, page: Page) -> AppResult<(Vec<Product>, i64)> {
        let tables = self.read()?;
        let mut items: Vec<Product> = tables
            .products
            .values()
            .filter(|p| p.is_active && p.stock <= threshold)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.stock
                .cmp(&b.stock)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(paginate(items, page))
    }

    async fn count_by_stock_status(&self) -> AppResult<Vec<(StockStatus, i64)>> {
        let tables = self.read()?;
        Ok(StockStatus::ALL
            .iter()
            .map(|status| {
                let count = tables
                    .products
                    .values()
                    .filter(|p| p.stock_status == *status)
                    .count() as i64;
                (*status, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: NewOrder) -> AppResult<Order> {
        let mut tables = self.write()?;
        if tables
            .orders
            .values()
            .any(|o| o.order_code == order.order_code)
        {
            return Err(AppError::Conflict(format!(
                "order code {} already exists",
                order.order_code
            )));
        }
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            order_code: order.order_code,
            user_id: order.user_id,
            items: order.items,
            delivery_address: order.delivery_address,
            invoice_address: order.invoice_address,
            delivery_date: order.delivery_date,
            delivery_time: order.delivery_time,
            payment_method: order.payment_method,
            order_type: order.order_type,
            order_status: OrderStatus::INITIAL,
            payment_status: PaymentStatus::Pending,
            totals: order.totals,
            currency: order.currency,
            payment_reference: None,
            rental_start_date: order.rental_start_date,
            rental_end_date: order.rental_end_date,
            return_date: None,
            is_confirmed: false,
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    async fn find_by_payment_reference(&self, reference: &str) -> AppResult<Option<Order>> {
        Ok(self
            .read()?
            .orders
            .values()
            .find(|o| o.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter, page: Page) -> AppResult<(Vec<Order>, i64)> {
        let tables = self.read()?;
        let mut items: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| filter.user_id.is_none_or(|u| o.user_id == u))
            .filter(|o| filter.status.is_none_or(|s| o.order_status == s))
            .filter(|o| filter.order_type.is_none_or(|t| o.order_type == t))
            .cloned()
            .collect();
        if filter.oldest_first {
            items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        } else {
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Ok(paginate(items, page))
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        change: StatusChange,
    ) -> AppResult<Option<Order>> {
        let mut tables = self.write()?;
        let Some(order) = tables.orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.order_status != from {
            return Ok(None);
        }
        order.order_status = change.to;
        if change.confirm {
            order.is_confirmed = true;
        }
        if order.return_date.is_none() {
            order.return_date = change.return_date;
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn delete_if_pending(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.write()?;
        let pending = tables
            .orders
            .get(&id)
            .is_some_and(|o| o.order_status == OrderStatus::INITIAL);
        if pending {
            tables.orders.remove(&id);
        }
        Ok(pending)
    }

    async fn set_payment_reference(&self, id: Uuid, reference: &str) -> AppResult<Option<Order>> {
        let mut tables = self.write()?;
        let Some(order) = tables.orders.get_mut(&id) else {
            return Ok(None);
        };
        order.payment_reference = Some(reference.to_string());
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> AppResult<Option<Order>> {
        let mut tables = self.write()?;
        let Some(order) = tables
            .orders
            .get_mut(&id)
            .filter(|o| o.payment_status == from)
        else {
            return Ok(None);
        };
        order.payment_status = to;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn count_by_status(&self) -> AppResult<Vec<(OrderStatus, i64)>> {
        let tables = self.read()?;
        Ok(OrderStatus::ALL
            .iter()
            .map(|status| {
                let count = tables
                    .orders
                    .values()
                    .filter(|o| o.order_status == *status)
                    .count() as i64;
                (*status, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn insert_notification(&self, notification: NewNotification) -> AppResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            title: notification.title,
            message: notification.message,
            notification_type: notification.notification_type,
            is_read: false,
            related_order: notification.related_order,
            related_product: notification.related_product,
            created_at: Utc::now(),
        };
        self.write()?
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn insert_notifications(&self, notifications: Vec<NewNotification>) -> AppResult<u64> {
        let mut count = 0;
        for notification in notifications {
            self.insert_notification(notification).await?;
            count += 1;
        }
        Ok(count)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
        page: Page,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let tables = self.read()?;
        let mut items: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .filter(|n| {
                filter
                    .notification_type
                    .is_none_or(|t| n.notification_type == t)
            })
            .filter(|n| filter.is_read.is_none_or(|r| n.is_read == r))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(items, page))
    }

    async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .read()?
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Notification>> {
        let mut tables = self.write()?;
        let Some(notification) = tables
            .notifications
            .get_mut(&id)
            .filter(|n| n.user_id == user_id)
        else {
            return Ok(None);
        };
        notification.is_read = true;
        Ok(Some(notification.clone()))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let mut tables = self.write()?;
        let mut count = 0;
        for notification in tables
            .notifications
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            count += 1;
        }
        Ok(count)
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> AppResult<bool> {
        let mut tables = self.write()?;
        let owned = tables
            .notifications
            .get(&id)
            .is_some_and(|n| n.user_id == user_id);
        if owned {
            tables.notifications.remove(&id);
        }
        Ok(owned)
    }

    async fn clear_notifications(&self, user_id: Uuid) -> AppResult<u64> {
        let mut tables = self.write()?;
        let before = tables.notifications.len();
        tables.notifications.retain(|_, n| n.user_id != user_id);
        Ok((before - tables.notifications.len()) as u64)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn list_users(&self, page: Page) -> AppResult<(Vec<User>, i64)> {
        let tables = self.read()?;
        let mut items: Vec<User> = tables.users.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(items, page))
    }

    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.write()?;
        let email = user.email.to_lowercase();
        if tables.users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict(format!("email {email} already exists")));
        }
        let user = User {
            id: Uuid::new_v4(),
            email,
            user_name: user.user_name,
            phone_no: user.phone_no,
            role: user.role,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        user_name: Option<String>,
        phone_no: Option<String>,
    ) -> AppResult<Option<User>> {
        let mut tables = self.write()?;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(user_name) = user_name {
            user.user_name = user_name;
        }
        if let Some(phone_no) = phone_no {
            user.phone_no = phone_no;
        }
        Ok(Some(user.clone()))
    }

    async fn update_role(&self, id: Uuid, role: Role) -> AppResult<Option<User>> {
        let mut tables = self.write()?;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.role = role;
        Ok(Some(user.clone()))
    }

    async fn list_addresses(&self, user_id: Uuid) -> AppResult<Vec<Address>> {
        let tables = self.read()?;
        let mut items: Vec<Address> = tables
            .addresses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn add_address(&self, user_id: Uuid, address: NewAddress) -> AppResult<Address> {
        let mut tables = self.write()?;
        if address.is_default {
            clear_default(&mut tables, user_id, address.address_type, None);
        }
        let address = Address {
            id: Uuid::new_v4(),
            user_id,
            address_type: address.address_type,
            address: address.address,
            city: address.city,
            state: address.state,
            zip_code: address.zip_code,
            country: address.country,
            is_default: address.is_default,
            created_at: Utc::now(),
        };
        tables.addresses.insert(address.id, address.clone());
        Ok(address)
    }

    async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        patch: AddressPatch,
    ) -> AppResult<Option<Address>> {
        let mut tables = self.write()?;
        let Some(current) = tables
            .addresses
            .get(&address_id)
            .filter(|a| a.user_id == user_id)
            .cloned()
        else {
            return Ok(None);
        };
        let address_type = patch.address_type.unwrap_or(current.address_type);
        if patch.is_default == Some(true) {
            clear_default(&mut tables, user_id, address_type, Some(address_id));
        }
        let Some(address) = tables.addresses.get_mut(&address_id) else {
            return Ok(None);
        };
        address.address_type = address_type;
        if let Some(v) = patch.address {
            address.address = v;
        }
        if let Some(v) = patch.city {
            address.city = v;
        }
        if let Some(v) = patch.state {
            address.state = v;
        }
        if let Some(v) = patch.zip_code {
            address.zip_code = v;
        }
        if let Some(v) = patch.country {
            address.country = v;
        }
        if let Some(v) = patch.is_default {
            address.is_default = v;
        }
        Ok(Some(address.clone()))
    }

    async fn remove_address(&self, user_id: Uuid, address_id: Uuid) -> AppResult<bool> {
        let mut tables = self.write()?;
        let owned = tables
            .addresses
            .get(&address_id)
            .is_some_and(|a| a.user_id == user_id);
        if owned {
            tables.addresses.remove(&address_id);
        }
        Ok(owned)
    }

    async fn wishlist_add(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        let mut tables = self.write()?;
        if tables.wishlist.contains(&(user_id, product_id)) {
            return Ok(false);
        }
        tables.wishlist.push((user_id, product_id));
        Ok(true)
    }

    async fn wishlist_remove(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        let mut tables = self.write()?;
        let before = tables.wishlist.len();
        tables.wishlist.retain(|entry| *entry != (user_id, product_id));
        Ok(tables.wishlist.len() != before)
    }

    async fn wishlist(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .read()?
            .wishlist
            .iter()
            .rev()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, p)| *p)
            .collect())
    }
}

fn clear_default(
    tables: &mut Tables,
    user_id: Uuid,
    address_type: crate::models::AddressType,
    except: Option<Uuid>,
) {
    for address in tables.addresses.values_mut().filter(|a| {
        a.user_id == user_id && a.address_type == address_type && Some(a.id) != except
    }) {
        address.is_default = false;
    }
}

#[async_trait]
impl AuditRepository for InMemoryStore {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        self.write()?.audit.push(entry);
        Ok(())
    }
}
