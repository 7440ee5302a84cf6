use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{OrderList, UpdateOrderStatusRequest},
    dto::products::ProductList,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{LOW_STOCK_LIMIT, Order, OrderStatus, Product, StockStatus},
    repository::{OrderFilter, Page},
    response::{ApiResponse, Meta},
    routes::admin::{
        DashboardStats, InventoryAdjustRequest, LowStockQuery, OrderStatusCount, StockStatusCount,
    },
    routes::params::OrderListQuery,
    services::{inventory_service, order_service},
    state::AppState,
};

const RECENT_ORDERS: i64 = 5;

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();
    let filter = order_service::order_filter(&query, None)?;

    let (orders, total) = state
        .store
        .orders
        .list_orders(&filter, Page::new(limit, offset))
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    order_service::get_order(state, user, id).await
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    order_service::advance_status(state, user, id, payload).await
}

pub async fn cancel_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    order_service::cancel_order(state, user, id).await
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(LOW_STOCK_LIMIT);
    if threshold < 0 {
        return Err(AppError::validation("threshold cannot be negative"));
    }
    let (page, limit, offset) = query.pagination().normalize();

    let (items, total) = state
        .store
        .products
        .list_low_stock(threshold, Page::new(limit, offset))
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", ProductList { items }, Some(meta)))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let updated = inventory_service::adjust_stock(state, id, payload.delta).await?;

    log_audit(
        state,
        Some(user.user_id),
        "inventory_adjust",
        Some("products"),
        Some(serde_json::json!({ "product_id": updated.id, "delta": payload.delta })),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory updated",
        updated,
        Some(Meta::empty()),
    ))
}

pub async fn dashboard(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<DashboardStats>> {
    ensure_admin(user)?;

    let order_counts = state.store.orders.count_by_status().await?;
    let orders_by_status: Vec<OrderStatusCount> = OrderStatus::ALL
        .iter()
        .map(|status| OrderStatusCount {
            status: *status,
            count: order_counts
                .iter()
                .find(|(s, _)| s == status)
                .map_or(0, |(_, c)| *c),
        })
        .collect();

    let stock_counts = state.store.products.count_by_stock_status().await?;
    let products_by_stock_status: Vec<StockStatusCount> = StockStatus::ALL
        .iter()
        .map(|status| StockStatusCount {
            status: *status,
            count: stock_counts
                .iter()
                .find(|(s, _)| s == status)
                .map_or(0, |(_, c)| *c),
        })
        .collect();

    let (recent_orders, total_orders) = state
        .store
        .orders
        .list_orders(&OrderFilter::default(), Page::new(RECENT_ORDERS, 0))
        .await?;

    let stats = DashboardStats {
        total_orders,
        orders_by_status,
        products_by_stock_status,
        recent_orders,
    };
    Ok(ApiResponse::success("Dashboard", stats, Some(Meta::empty())))
}
