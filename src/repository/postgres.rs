use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use super::{
    AddressPatch, AuditEntry, AuditRepository, NewAddress, NewNotification, NewOrder, NewProduct,
    NewUser, NotificationFilter, NotificationRepository, OrderFilter, OrderRepository, Page,
    ProductFilter, ProductPatch, ProductRepository, ProductSort, StatusChange, StockChange,
    UserRepository,
};
use crate::{
    db::DbPool,
    entity::{
        notifications::{
            ActiveModel as NotificationActive, Column as NotificationCol,
            Entity as Notifications, Model as NotificationModel,
        },
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        product_ratings::{
            ActiveModel as RatingActive, Column as RatingCol, Entity as ProductRatings,
        },
        products::{
            ActiveModel as ProductActive, Column as ProdCol, Entity as Products,
            Model as ProductModel,
        },
        user_addresses::{
            ActiveModel as AddressActive, Column as AddressCol, Entity as UserAddresses,
            Model as AddressModel,
        },
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
        wishlist_items::{
            ActiveModel as WishlistActive, Column as WishlistCol, Entity as WishlistItems,
        },
    },
    error::{AppError, AppResult},
    models::{
        Address, AddressType, LineItem, Notification, Order, OrderStatus, OrderTotals,
        PaymentStatus, Product, Role, StockStatus, User,
    },
};

/// sea-orm backed implementation of the catalog, order, notification and user ports.
#[derive(Clone)]
pub struct SeaOrmStore {
    orm: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

fn unique_or_orm(err: DbErr, conflict: impl Into<String>) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(conflict.into()),
        _ => AppError::OrmError(err),
    }
}

fn product_from_entity(model: ProductModel) -> AppResult<Product> {
    Ok(Product {
        id: model.id,
        name: model.name,
        description: model.description,
        details: model.details,
        price: model.price,
        category: model.category.parse()?,
        stock: model.stock,
        stock_status: model.stock_status.parse()?,
        delivery_time: model.delivery_time,
        return_time: model.return_time,
        is_active: model.is_active,
        average_rating: model.average_rating,
        total_reviews: model.total_reviews,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn line_item_from_entity(model: OrderItemModel) -> LineItem {
    LineItem {
        product_id: model.product_id,
        product_name: model.product_name,
        quantity: model.quantity,
        unit_price: model.unit_price,
    }
}

fn order_from_entity(model: OrderModel, items: Vec<LineItem>) -> AppResult<Order> {
    Ok(Order {
        id: model.id,
        order_code: model.order_code,
        user_id: model.user_id,
        items,
        delivery_address: serde_json::from_value(model.delivery_address)
            .map_err(|e| AppError::Internal(e.into()))?,
        invoice_address: serde_json::from_value(model.invoice_address)
            .map_err(|e| AppError::Internal(e.into()))?,
        delivery_date: model.delivery_date.map(|dt| dt.with_timezone(&Utc)),
        delivery_time: model.delivery_time,
        payment_method: model.payment_method,
        order_type: model.order_type.parse()?,
        order_status: model.order_status.parse()?,
        payment_status: model.payment_status.parse()?,
        totals: OrderTotals {
            sub_total: model.sub_total,
            delivery_charge: model.delivery_charge,
            taxes: model.taxes,
            discount: model.discount,
            grand_total: model.grand_total,
        },
        currency: model.currency,
        payment_reference: model.payment_reference,
        rental_start_date: model.rental_start_date.map(|dt| dt.with_timezone(&Utc)),
        rental_end_date: model.rental_end_date.map(|dt| dt.with_timezone(&Utc)),
        return_date: model.return_date.map(|dt| dt.with_timezone(&Utc)),
        is_confirmed: model.is_confirmed,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn notification_from_entity(model: NotificationModel) -> AppResult<Notification> {
    Ok(Notification {
        id: model.id,
        user_id: model.user_id,
        title: model.title,
        message: model.message,
        notification_type: model.notification_type.parse()?,
        is_read: model.is_read,
        related_order: model.related_order,
        related_product: model.related_product,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn user_from_entity(model: UserModel) -> AppResult<User> {
    Ok(User {
        id: model.id,
        email: model.email,
        user_name: model.user_name,
        phone_no: model.phone_no,
        role: model.role.parse()?,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn address_from_entity(model: AddressModel) -> AppResult<Address> {
    Ok(Address {
        id: model.id,
        user_id: model.user_id,
        address_type: model.address_type.parse()?,
        address: model.address,
        city: model.city,
        state: model.state,
        zip_code: model.zip_code,
        country: model.country,
        is_default: model.is_default,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, Vec<LineItem>>> {
    let mut grouped: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }
    let rows = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .order_by_asc(OrderItemCol::LineNo)
        .all(conn)
        .await?;
    for row in rows {
        grouped
            .entry(row.order_id)
            .or_default()
            .push(line_item_from_entity(row));
    }
    Ok(grouped)
}

async fn refresh_rating<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<Option<Product>> {
    let Some(product) = Products::find_by_id(product_id).one(conn).await? else {
        return Ok(None);
    };
    let scores: Vec<i32> = ProductRatings::find()
        .filter(RatingCol::ProductId.eq(product_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();
    let average = if scores.is_empty() {
        0.0
    } else {
        f64::from(scores.iter().sum::<i32>()) / scores.len() as f64
    };

    let mut active: ProductActive = product.into();
    active.average_rating = Set(average);
    active.total_reviews = Set(scores.len() as i32);
    active.updated_at = Set(now());
    let product = active.update(conn).await?;
    product_from_entity(product).map(Some)
}

/// Re-derive the stock label after a counter change, inside the same transaction.
async fn sync_stock_status<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<Option<Product>> {
    let Some(product) = Products::find_by_id(id).one(conn).await? else {
        return Ok(None);
    };
    let status = StockStatus::from_stock(product.stock);
    let mut active: ProductActive = product.into();
    active.stock_status = Set(status.as_str().to_string());
    let product = active.update(conn).await?;
    product_from_entity(product).map(Some)
}

#[async_trait]
impl ProductRepository for SeaOrmStore {
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Products::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(product_from_entity)
            .transpose()
    }

    async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut by_id: HashMap<Uuid, Product> = Products::find()
            .filter(ProdCol::Id.is_in(ids.to_vec()))
            .all(&self.orm)
            .await?
            .into_iter()
            .map(|m| product_from_entity(m).map(|p| (p.id, p)))
            .collect::<AppResult<_>>()?;
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> AppResult<(Vec<Product>, i64)> {
        let mut condition = Condition::all().add(ProdCol::IsActive.eq(true));

        if let Some(category) = filter.category {
            condition = condition.add(ProdCol::Category.eq(category.as_str()));
        }

        if let Some(search) = filter.search.as_ref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            condition = condition.add(
                Condition::any()
                    .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                    .add(Expr::col(ProdCol::Description).ilike(pattern)),
            );
        }

        if let Some(min_price) = filter.min_price {
            condition = condition.add(ProdCol::Price.gte(min_price));
        }

        if let Some(max_price) = filter.max_price {
            condition = condition.add(ProdCol::Price.lte(max_price));
        }

        let finder = Products::find().filter(condition);
        let finder = match filter.sort {
            ProductSort::Newest => finder.order_by_desc(ProdCol::CreatedAt),
            ProductSort::PriceAsc => finder.order_by_asc(ProdCol::Price),
            ProductSort::PriceDesc => finder.order_by_desc(ProdCol::Price),
            ProductSort::NameAsc => finder.order_by_asc(ProdCol::Name),
            ProductSort::NameDesc => finder.order_by_desc(ProdCol::Name),
            ProductSort::Rating => finder.order_by_desc(ProdCol::AverageRating),
        };

        let total = finder.clone().count(&self.orm).await? as i64;

        let items = finder
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((items, total))
    }

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product> {
        let now = now();
        let model = ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(product.name),
            description: Set(product.description),
            details: Set(product.details),
            price: Set(product.price),
            category: Set(product.category.as_str().to_string()),
            stock: Set(product.stock),
            stock_status: Set(StockStatus::from_stock(product.stock).as_str().to_string()),
            delivery_time: Set(product.delivery_time),
            return_time: Set(product.return_time),
            is_active: Set(true),
            average_rating: Set(0.0),
            total_reviews: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.orm)
        .await?;
        product_from_entity(model)
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> AppResult<Option<Product>> {
        let txn = self.orm.begin().await?;

        let mut update =
            Products::update_many().col_expr(ProdCol::UpdatedAt, Expr::value(now()));
        if let Some(name) = patch.name {
            update = update.col_expr(ProdCol::Name, Expr::value(name));
        }
        if let Some(description) = patch.description {
            update = update.col_expr(ProdCol::Description, Expr::value(description));
        }
        if let Some(details) = patch.details {
            update = update.col_expr(ProdCol::Details, Expr::value(details));
        }
        if let Some(price) = patch.price {
            update = update.col_expr(ProdCol::Price, Expr::value(price));
        }
        if let Some(category) = patch.category {
            update = update.col_expr(ProdCol::Category, Expr::value(category.as_str()));
        }
        if let Some(stock) = patch.stock {
            update = update
                .col_expr(ProdCol::Stock, Expr::value(stock))
                .col_expr(
                    ProdCol::StockStatus,
                    Expr::value(StockStatus::from_stock(stock).as_str()),
                );
        }
        if let Some(delivery_time) = patch.delivery_time {
            update = update.col_expr(ProdCol::DeliveryTime, Expr::value(delivery_time));
        }
        if let Some(return_time) = patch.return_time {
            update = update.col_expr(ProdCol::ReturnTime, Expr::value(return_time));
        }
        if let Some(is_active) = patch.is_active {
            update = update.col_expr(ProdCol::IsActive, Expr::value(is_active));
        }

        let result = update.filter(ProdCol::Id.eq(id)).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }

        let product = Products::find_by_id(id).one(&txn).await?;
        txn.commit().await?;
        product.map(product_from_entity).transpose()
    }

    async fn try_decrement_stock(&self, id: Uuid, quantity: i32) -> AppResult<StockChange> {
        let txn = self.orm.begin().await?;

        let result = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::value(now()))
            .filter(ProdCol::Id.eq(id))
            .filter(ProdCol::IsActive.eq(true))
            .filter(ProdCol::Stock.gte(quantity))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            let current = Products::find_by_id(id).one(&txn).await?;
            return Ok(match current.filter(|p| p.is_active) {
                Some(p) => StockChange::Insufficient { available: p.stock },
                None => StockChange::Missing,
            });
        }

        let product = sync_stock_status(&txn, id).await?;
        txn.commit().await?;
        Ok(product.map_or(StockChange::Missing, StockChange::Applied))
    }

    async fn increment_stock(&self, id: Uuid, quantity: i32) -> AppResult<StockChange> {
        let txn = self.orm.begin().await?;

        let result = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::value(now()))
            .filter(ProdCol::Id.eq(id))
            .filter(ProdCol::Stock.lte(i32::MAX.saturating_sub(quantity)))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            let exists = Products::find_by_id(id).one(&txn).await?.is_some();
            return Ok(if exists {
                StockChange::Overflow
            } else {
                StockChange::Missing
            });
        }

        let product = sync_stock_status(&txn, id).await?;
        txn.commit().await?;
        Ok(product.map_or(StockChange::Missing, StockChange::Applied))
    }

    async fn upsert_rating(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i32,
        review: Option<String>,
    ) -> AppResult<Option<Product>> {
        let txn = self.orm.begin().await?;
        if Products::find_by_id(product_id).one(&txn).await?.is_none() {
            return Ok(None);
        }

        let existing = ProductRatings::find()
            .filter(RatingCol::ProductId.eq(product_id))
            .filter(RatingCol::UserId.eq(user_id))
            .one(&txn)
            .await?;

        match existing {
            Some(current) => {
                let mut active: RatingActive = current.into();
                active.rating = Set(rating);
                active.review = Set(review);
                active.created_at = Set(now());
                active.update(&txn).await?;
            }
            None => {
                RatingActive {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product_id),
                    user_id: Set(user_id),
                    rating: Set(rating),
                    review: Set(review),
                    created_at: Set(now()),
                }
                .insert(&txn)
                .await?;
            }
        }

        let product = refresh_rating(&txn, product_id).await?;
        txn.commit().await?;
        Ok(product)
    }

    async fn remove_rating(&self, product_id: Uuid, user_id: Uuid) -> AppResult<Option<Product>> {
        let txn = self.orm.begin().await?;
        ProductRatings::delete_many()
            .filter(RatingCol::ProductId.eq(product_id))
            .filter(RatingCol::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        let product = refresh_rating(&txn, product_id).await?;
        txn.commit().await?;
        Ok(product)
    }

    async fn list_low_stock(&self, threshold: i32, page: Page) -> AppResult<(Vec<Product>, i64)> {
        let finder = Products::find()
            .filter(ProdCol::IsActive.eq(true))
            .filter(ProdCol::Stock.lte(threshold))
            .order_by_asc(ProdCol::Stock)
            .order_by_desc(ProdCol::CreatedAt);

        let total = finder.clone().count(&self.orm).await? as i64;

        let items = finder
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((items, total))
    }

    async fn count_by_stock_status(&self) -> AppResult<Vec<(StockStatus, i64)>> {
        let rows: Vec<(String, i64)> = Products::find()
            .select_only()
            .column(ProdCol::StockStatus)
            .column_as(ProdCol::Id.count(), "count")
            .group_by(ProdCol::StockStatus)
            .into_tuple()
            .all(&self.orm)
            .await?;
        rows.into_iter()
            .map(|(status, count)| Ok((status.parse()?, count)))
            .collect()
    }
}

#[async_trait]
impl OrderRepository for SeaOrmStore {
    async fn insert_order(&self, order: NewOrder) -> AppResult<Order> {
        let txn = self.orm.begin().await?;
        let now = now();
        let code = order.order_code.clone();

        let model = OrderActive {
            id: Set(Uuid::new_v4()),
            order_code: Set(order.order_code),
            user_id: Set(order.user_id),
            delivery_address: Set(serde_json::to_value(&order.delivery_address)
                .map_err(|e| AppError::Internal(e.into()))?),
            invoice_address: Set(serde_json::to_value(&order.invoice_address)
                .map_err(|e| AppError::Internal(e.into()))?),
            delivery_date: Set(order.delivery_date.map(Into::into)),
            delivery_time: Set(order.delivery_time),
            payment_method: Set(order.payment_method),
            order_type: Set(order.order_type.as_str().to_string()),
            order_status: Set(OrderStatus::INITIAL.as_str().to_string()),
            payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
            sub_total: Set(order.totals.sub_total),
            delivery_charge: Set(order.totals.delivery_charge),
            taxes: Set(order.totals.taxes),
            discount: Set(order.totals.discount),
            grand_total: Set(order.totals.grand_total),
            currency: Set(order.currency),
            payment_reference: Set(None),
            rental_start_date: Set(order.rental_start_date.map(Into::into)),
            rental_end_date: Set(order.rental_end_date.map(Into::into)),
            return_date: Set(None),
            is_confirmed: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| unique_or_orm(e, format!("order code {code} already exists")))?;

        for (line_no, item) in order.items.iter().enumerate() {
            OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(model.id),
                line_no: Set(line_no as i32),
                product_id: Set(item.product_id),
                product_name: Set(item.product_name.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        order_from_entity(model, order.items)
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let Some(model) = Orders::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };
        let mut items = load_items(&self.orm, vec![model.id]).await?;
        let items = items.remove(&model.id).unwrap_or_default();
        order_from_entity(model, items).map(Some)
    }

    async fn find_by_payment_reference(&self, reference: &str) -> AppResult<Option<Order>> {
        let Some(model) = Orders::find()
            .filter(OrderCol::PaymentReference.eq(reference))
            .one(&self.orm)
            .await?
        else {
            return Ok(None);
        };
        let mut items = load_items(&self.orm, vec![model.id]).await?;
        let items = items.remove(&model.id).unwrap_or_default();
        order_from_entity(model, items).map(Some)
    }

    async fn list_orders(&self, filter: &OrderFilter, page: Page) -> AppResult<(Vec<Order>, i64)> {
        let mut condition = Condition::all();
        if let Some(user_id) = filter.user_id {
            condition = condition.add(OrderCol::UserId.eq(user_id));
        }
        if let Some(status) = filter.status {
            condition = condition.add(OrderCol::OrderStatus.eq(status.as_str()));
        }
        if let Some(order_type) = filter.order_type {
            condition = condition.add(OrderCol::OrderType.eq(order_type.as_str()));
        }

        let finder = Orders::find().filter(condition);
        let finder = if filter.oldest_first {
            finder.order_by_asc(OrderCol::CreatedAt)
        } else {
            finder.order_by_desc(OrderCol::CreatedAt)
        };

        let total = finder.clone().count(&self.orm).await? as i64;

        let models = finder
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.orm)
            .await?;

        let mut items = load_items(&self.orm, models.iter().map(|m| m.id).collect()).await?;
        let orders = models
            .into_iter()
            .map(|m| {
                let lines = items.remove(&m.id).unwrap_or_default();
                order_from_entity(m, lines)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok((orders, total))
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        change: StatusChange,
    ) -> AppResult<Option<Order>> {
        let mut update = Orders::update_many()
            .col_expr(OrderCol::OrderStatus, Expr::value(change.to.as_str()))
            .col_expr(OrderCol::UpdatedAt, Expr::value(now()));
        if change.confirm {
            update = update.col_expr(OrderCol::IsConfirmed, Expr::value(true));
        }
        if let Some(return_date) = change.return_date {
            let return_date: DateTimeWithTimeZone = return_date.into();
            update = update.col_expr(
                OrderCol::ReturnDate,
                SimpleExpr::from(Func::coalesce([
                    Expr::col(OrderCol::ReturnDate).into(),
                    Expr::value(return_date),
                ])),
            );
        }

        let result = update
            .filter(OrderCol::Id.eq(id))
            .filter(OrderCol::OrderStatus.eq(from.as_str()))
            .exec(&self.orm)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_order(id).await
    }

    async fn delete_if_pending(&self, id: Uuid) -> AppResult<bool> {
        let result = Orders::delete_many()
            .filter(OrderCol::Id.eq(id))
            .filter(OrderCol::OrderStatus.eq(OrderStatus::INITIAL.as_str()))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn set_payment_reference(&self, id: Uuid, reference: &str) -> AppResult<Option<Order>> {
        let result = Orders::update_many()
            .col_expr(OrderCol::PaymentReference, Expr::value(reference))
            .col_expr(OrderCol::UpdatedAt, Expr::value(now()))
            .filter(OrderCol::Id.eq(id))
            .exec(&self.orm)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_order(id).await
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> AppResult<Option<Order>> {
        let result = Orders::update_many()
            .col_expr(OrderCol::PaymentStatus, Expr::value(to.as_str()))
            .col_expr(OrderCol::UpdatedAt, Expr::value(now()))
            .filter(OrderCol::Id.eq(id))
            .filter(OrderCol::PaymentStatus.eq(from.as_str()))
            .exec(&self.orm)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_order(id).await
    }

    async fn count_by_status(&self) -> AppResult<Vec<(OrderStatus, i64)>> {
        let rows: Vec<(String, i64)> = Orders::find()
            .select_only()
            .column(OrderCol::OrderStatus)
            .column_as(OrderCol::Id.count(), "count")
            .group_by(OrderCol::OrderStatus)
            .into_tuple()
            .all(&self.orm)
            .await?;
        rows.into_iter()
            .map(|(status, count)| Ok((status.parse()?, count)))
            .collect()
    }
}

#[async_trait]
impl NotificationRepository for SeaOrmStore {
    async fn insert_notification(&self, notification: NewNotification) -> AppResult<Notification> {
        let model = NotificationActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(notification.user_id),
            title: Set(notification.title),
            message: Set(notification.message),
            notification_type: Set(notification.notification_type.as_str().to_string()),
            is_read: Set(false),
            related_order: Set(notification.related_order),
            related_product: Set(notification.related_product),
            created_at: Set(now()),
        }
        .insert(&self.orm)
        .await?;
        notification_from_entity(model)
    }

    async fn insert_notifications(&self, notifications: Vec<NewNotification>) -> AppResult<u64> {
        if notifications.is_empty() {
            return Ok(0);
        }
        let count = notifications.len() as u64;
        let created_at = now();
        let models = notifications.into_iter().map(|n| NotificationActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(n.user_id),
            title: Set(n.title),
            message: Set(n.message),
            notification_type: Set(n.notification_type.as_str().to_string()),
            is_read: Set(false),
            related_order: Set(n.related_order),
            related_product: Set(n.related_product),
            created_at: Set(created_at),
        });
        Notifications::insert_many(models).exec(&self.orm).await?;
        Ok(count)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
        page: Page,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let mut condition = Condition::all().add(NotificationCol::UserId.eq(user_id));
        if let Some(kind) = filter.notification_type {
            condition = condition.add(NotificationCol::NotificationType.eq(kind.as_str()));
        }
        if let Some(is_read) = filter.is_read {
            condition = condition.add(NotificationCol::IsRead.eq(is_read));
        }

        let finder = Notifications::find()
            .filter(condition)
            .order_by_desc(NotificationCol::CreatedAt);

        let total = finder.clone().count(&self.orm).await? as i64;

        let items = finder
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(notification_from_entity)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((items, total))
    }

    async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        let count = Notifications::find()
            .filter(NotificationCol::UserId.eq(user_id))
            .filter(NotificationCol::IsRead.eq(false))
            .count(&self.orm)
            .await?;
        Ok(count as i64)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Notification>> {
        let Some(model) = Notifications::find_by_id(id)
            .filter(NotificationCol::UserId.eq(user_id))
            .one(&self.orm)
            .await?
        else {
            return Ok(None);
        };
        let mut active: NotificationActive = model.into();
        active.is_read = Set(true);
        let model = active.update(&self.orm).await?;
        notification_from_entity(model).map(Some)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = Notifications::update_many()
            .col_expr(NotificationCol::IsRead, Expr::value(true))
            .filter(NotificationCol::UserId.eq(user_id))
            .filter(NotificationCol::IsRead.eq(false))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = Notifications::delete_many()
            .filter(NotificationCol::Id.eq(id))
            .filter(NotificationCol::UserId.eq(user_id))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn clear_notifications(&self, user_id: Uuid) -> AppResult<u64> {
        let result = Notifications::delete_many()
            .filter(NotificationCol::UserId.eq(user_id))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl UserRepository for SeaOrmStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Users::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(user_from_entity)
            .transpose()
    }

    async fn list_users(&self, page: Page) -> AppResult<(Vec<User>, i64)> {
        let finder = Users::find().order_by_desc(UserCol::CreatedAt);
        let total = finder.clone().count(&self.orm).await? as i64;
        let items = finder
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(user_from_entity)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let email = user.email.to_lowercase();
        let model = UserActive {
            id: Set(Uuid::new_v4()),
            email: Set(email.clone()),
            user_name: Set(user.user_name),
            phone_no: Set(user.phone_no),
            role: Set(user.role.as_str().to_string()),
            is_active: Set(true),
            created_at: NotSet,
        }
        .insert(&self.orm)
        .await
        .map_err(|e| unique_or_orm(e, format!("email {email} already exists")))?;
        user_from_entity(model)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        user_name: Option<String>,
        phone_no: Option<String>,
    ) -> AppResult<Option<User>> {
        let Some(model) = Users::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };
        let mut active: UserActive = model.into();
        if let Some(user_name) = user_name {
            active.user_name = Set(user_name);
        }
        if let Some(phone_no) = phone_no {
            active.phone_no = Set(phone_no);
        }
        let model = active.update(&self.orm).await?;
        user_from_entity(model).map(Some)
    }

    async fn update_role(&self, id: Uuid, role: Role) -> AppResult<Option<User>> {
        let Some(model) = Users::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };
        let mut active: UserActive = model.into();
        active.role = Set(role.as_str().to_string());
        let model = active.update(&self.orm).await?;
        user_from_entity(model).map(Some)
    }

    async fn list_addresses(&self, user_id: Uuid) -> AppResult<Vec<Address>> {
        UserAddresses::find()
            .filter(AddressCol::UserId.eq(user_id))
            .order_by_asc(AddressCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(address_from_entity)
            .collect()
    }

    async fn add_address(&self, user_id: Uuid, address: NewAddress) -> AppResult<Address> {
        let txn = self.orm.begin().await?;
        if address.is_default {
            clear_default(&txn, user_id, address.address_type, None).await?;
        }
        let model = AddressActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            address_type: Set(address.address_type.as_str().to_string()),
            address: Set(address.address),
            city: Set(address.city),
            state: Set(address.state),
            zip_code: Set(address.zip_code),
            country: Set(address.country),
            is_default: Set(address.is_default),
            created_at: Set(now()),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        address_from_entity(model)
    }

    async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        patch: AddressPatch,
    ) -> AppResult<Option<Address>> {
        let txn = self.orm.begin().await?;
        let Some(model) = UserAddresses::find_by_id(address_id)
            .filter(AddressCol::UserId.eq(user_id))
            .one(&txn)
            .await?
        else {
            return Ok(None);
        };

        let current_type: AddressType = model.address_type.parse()?;
        let address_type = patch.address_type.unwrap_or(current_type);
        if patch.is_default == Some(true) {
            clear_default(&txn, user_id, address_type, Some(address_id)).await?;
        }

        let mut active: AddressActive = model.into();
        active.address_type = Set(address_type.as_str().to_string());
        if let Some(v) = patch.address {
            active.address = Set(v);
        }
        if let Some(v) = patch.city {
            active.city = Set(v);
        }
        if let Some(v) = patch.state {
            active.state = Set(v);
        }
        if let Some(v) = patch.zip_code {
            active.zip_code = Set(v);
        }
        if let Some(v) = patch.country {
            active.country = Set(v);
        }
        if let Some(v) = patch.is_default {
            active.is_default = Set(v);
        }
        let model = active.update(&txn).await?;
        txn.commit().await?;
        address_from_entity(model).map(Some)
    }

    async fn remove_address(&self, user_id: Uuid, address_id: Uuid) -> AppResult<bool> {
        let result = UserAddresses::delete_many()
            .filter(AddressCol::Id.eq(address_id))
            .filter(AddressCol::UserId.eq(user_id))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn wishlist_add(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        let inserted = WishlistActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            created_at: Set(now()),
        }
        .insert(&self.orm)
        .await;
        match inserted {
            Ok(_) => Ok(true),
            Err(err) => match unique_or_orm(err, "wishlist entry exists") {
                AppError::Conflict(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn wishlist_remove(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        let result = WishlistItems::delete_many()
            .filter(WishlistCol::UserId.eq(user_id))
            .filter(WishlistCol::ProductId.eq(product_id))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn wishlist(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = WishlistItems::find()
            .filter(WishlistCol::UserId.eq(user_id))
            .order_by_desc(WishlistCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(|w| w.product_id)
            .collect();
        Ok(ids)
    }
}

async fn clear_default<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    address_type: AddressType,
    except: Option<Uuid>,
) -> AppResult<()> {
    let mut condition = Condition::all()
        .add(AddressCol::UserId.eq(user_id))
        .add(AddressCol::AddressType.eq(address_type.as_str()));
    if let Some(except) = except {
        condition = condition.add(AddressCol::Id.ne(except));
    }
    UserAddresses::update_many()
        .col_expr(AddressCol::IsDefault, Expr::value(false))
        .filter(condition)
        .exec(conn)
        .await?;
    Ok(())
}

/// Audit writer on the raw sqlx pool.
#[derive(Clone)]
pub struct PgAuditLog {
    pool: DbPool,
}

impl PgAuditLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditLog {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource)
        .bind(entry.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
