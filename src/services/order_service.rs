use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::log_audit,
    dto::orders::{CreateOrderRequest, OrderItemRequest, OrderList, UpdateOrderStatusRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{LineItem, Order, OrderStatus, OrderTotals, OrderType},
    notify::OrderEvent,
    repository::{NewOrder, OrderFilter, Page, StatusChange},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::inventory_service,
    state::AppState,
};

/// Attempts at drawing a fresh order code before giving up.
pub const ORDER_CODE_ATTEMPTS: usize = 5;

const STATUS_CAS_ATTEMPTS: usize = 8;
const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `R` + `yyMMdd` + 10 base-36 characters taken from a v4 UUID.
pub fn generate_order_code(now: DateTime<Utc>) -> String {
    let mut entropy = Uuid::new_v4().as_u128();
    let mut code = format!("R{}", now.format("%y%m%d"));
    for _ in 0..10 {
        code.push(BASE36[(entropy % 36) as usize] as char);
        entropy /= 36;
    }
    code
}

/// Merge repeated product ids by summing quantities, keeping first-seen order.
fn merge_lines(items: &[OrderItemRequest]) -> AppResult<Vec<(Uuid, i32)>> {
    if items.is_empty() {
        return Err(AppError::validation("order must contain at least one item"));
    }
    let mut merged: Vec<(Uuid, i32)> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity < 1 {
            return Err(AppError::validation(format!(
                "quantity for product {} must be at least 1",
                item.product_id
            )));
        }
        match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, quantity)) => {
                *quantity = quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| AppError::validation("quantity out of range"))?;
            }
            None => merged.push((item.product_id, item.quantity)),
        }
    }
    Ok(merged)
}

/// The rental window to store: required and ordered for rentals, dropped for purchases.
fn rental_window(
    payload: &CreateOrderRequest,
    order_type: OrderType,
) -> AppResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    match (order_type, payload.rental_start_date, payload.rental_end_date) {
        (OrderType::Rental, Some(start), Some(end)) if start <= end => Ok(Some((start, end))),
        (OrderType::Rental, Some(_), Some(_)) => Err(AppError::validation(
            "rental start date must not be after the end date",
        )),
        (OrderType::Rental, _, _) => Err(AppError::validation(
            "rental orders require a rental start and end date",
        )),
        (OrderType::Purchase, _, _) => Ok(None),
    }
}

/// Resolve products and freeze name and price into line items.
async fn price_lines(state: &AppState, lines: &[(Uuid, i32)]) -> AppResult<Vec<LineItem>> {
    let ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();
    let products = state.store.products.find_products(&ids).await?;

    lines
        .iter()
        .map(|(product_id, quantity)| {
            let product = products
                .iter()
                .find(|p| p.id == *product_id && p.is_active)
                .ok_or_else(|| AppError::NotFound(format!("Product {product_id}")))?;
            if *quantity > product.stock {
                return Err(AppError::InsufficientStock {
                    product_id: *product_id,
                    requested: *quantity,
                    available: product.stock,
                });
            }
            Ok(LineItem {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: *quantity,
                unit_price: product.price,
            })
        })
        .collect()
}

async fn persist_order(
    state: &AppState,
    user: &AuthUser,
    payload: &CreateOrderRequest,
    order_type: OrderType,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    items: &[LineItem],
    totals: OrderTotals,
) -> AppResult<Order> {
    for attempt in 1..=ORDER_CODE_ATTEMPTS {
        let order_code = generate_order_code(Utc::now());
        let new_order = NewOrder {
            order_code: order_code.clone(),
            user_id: user.user_id,
            items: items.to_vec(),
            delivery_address: payload.delivery_address.clone(),
            invoice_address: payload
                .invoice_address
                .clone()
                .unwrap_or_else(|| payload.delivery_address.clone()),
            delivery_date: payload.delivery_date,
            delivery_time: payload.delivery_time.clone(),
            payment_method: payload.payment_method.clone(),
            order_type,
            totals,
            currency: state.commerce.currency.clone(),
            rental_start_date: window.map(|(start, _)| start),
            rental_end_date: window.map(|(_, end)| end),
        };

        match state.store.orders.insert_order(new_order).await {
            Err(AppError::Conflict(reason)) => {
                tracing::warn!(attempt, %order_code, %reason, "order code collision, retrying");
            }
            other => return other,
        }
    }

    Err(AppError::Conflict(
        "could not allocate a unique order code".into(),
    ))
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    payload.validate()?;
    if payload.delivery_address.address.trim().is_empty() {
        return Err(AppError::validation("delivery address is required"));
    }

    let order_type = payload.order_type.unwrap_or(OrderType::Purchase);
    let window = rental_window(&payload, order_type)?;

    let lines = merge_lines(&payload.items)?;
    let items = price_lines(state, &lines).await?;
    let totals = OrderTotals::compute(&items, &state.commerce, 0)?;

    let is_purchase = order_type == OrderType::Purchase;
    if is_purchase {
        inventory_service::reserve_lines(state, &items).await?;
    }

    let persisted = persist_order(state, user, &payload, order_type, window, &items, totals).await;
    let order = match persisted {
        Ok(order) => order,
        Err(err) => {
            if is_purchase {
                tracing::warn!(error = %err, "order insert failed, releasing reserved stock");
                inventory_service::restock_lines(state, &items).await;
            }
            return Err(err);
        }
    };

    tracing::info!(
        order_id = %order.id,
        order_code = %order.order_code,
        order_type = %order.order_type,
        grand_total = order.totals.grand_total,
        "order created"
    );

    state.notifier.notify(OrderEvent::OrderPlaced(order.clone()));

    log_audit(
        state,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "order_code": order.order_code })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        order,
        Some(Meta::empty()),
    ))
}

pub fn order_filter(query: &OrderListQuery, user_id: Option<Uuid>) -> AppResult<OrderFilter> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    let order_type = query
        .order_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<OrderType>)
        .transpose()?;
    Ok(OrderFilter {
        user_id,
        status,
        order_type,
        oldest_first: matches!(query.sort_order, Some(SortOrder::Asc)),
    })
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let filter = order_filter(&query, Some(user.user_id))?;

    let (orders, total) = state
        .store
        .orders
        .list_orders(&filter, Page::new(limit, offset))
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Owners see their own orders; everyone else gets `NotFound`.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = find_visible_order(state, user, id).await?;
    Ok(ApiResponse::success("Order found", order, Some(Meta::empty())))
}

pub(crate) async fn find_visible_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<Order> {
    state
        .store
        .orders
        .find_order(id)
        .await?
        .filter(|o| user.is_admin() || o.user_id == user.user_id)
        .ok_or_else(|| AppError::not_found("Order"))
}

/// Cancel a pending order. Purchases give their stock back; rentals never took any.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = find_visible_order(state, user, id).await?;

    if order.order_status != OrderStatus::INITIAL {
        return Err(AppError::InvalidState(format!(
            "only {} orders can be cancelled, order is {}",
            OrderStatus::INITIAL,
            order.order_status
        )));
    }

    if !state.store.orders.delete_if_pending(id).await? {
        return match state.store.orders.find_order(id).await? {
            Some(current) => Err(AppError::InvalidState(format!(
                "only {} orders can be cancelled, order is {}",
                OrderStatus::INITIAL,
                current.order_status
            ))),
            None => Err(AppError::not_found("Order")),
        };
    }

    if order.order_type == OrderType::Purchase {
        inventory_service::restock_lines(state, &order.items).await;
    }

    tracing::info!(order_id = %order.id, order_code = %order.order_code, "order cancelled");
    state.notifier.notify(OrderEvent::Cancelled(order.clone()));

    log_audit(
        state,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "order_code": order.order_code })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        order,
        Some(Meta::empty()),
    ))
}

/// Move an order forward through its lifecycle.
///
/// The write is a compare-and-set on the status read just before, so two
/// concurrent requests for the same target apply side effects once: the loser
/// reloads, sees the target already reached and returns it unchanged.
pub async fn advance_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let target: OrderStatus = payload.status.parse()?;

    for _ in 0..STATUS_CAS_ATTEMPTS {
        let current = state
            .store
            .orders
            .find_order(id)
            .await?
            .ok_or_else(|| AppError::not_found("Order"))?;
        let from = current.order_status;

        if from == target {
            return Ok(ApiResponse::success(
                "Order status unchanged",
                current,
                Some(Meta::empty()),
            ));
        }
        if !from.can_advance_to(target) {
            return Err(AppError::InvalidState(format!(
                "cannot move order from {from} to {target}"
            )));
        }

        let rental = current.is_rental();
        let change = StatusChange {
            to: target,
            confirm: rental && target.rank() >= OrderStatus::Ready.rank(),
            return_date: (rental && target == OrderStatus::Return).then(Utc::now),
        };

        let Some(updated) = state
            .store
            .orders
            .transition_status(id, from, change)
            .await?
        else {
            tracing::debug!(order_id = %id, %from, %target, "status moved concurrently, reloading");
            continue;
        };

        if rental && target == OrderStatus::Return {
            inventory_service::restock_lines(state, &updated.items).await;
        }

        tracing::info!(order_id = %id, %from, to = %target, "order status changed");
        state.notifier.notify(OrderEvent::StatusChanged {
            order: updated.clone(),
            from,
            to: target,
        });

        log_audit(
            state,
            Some(user.user_id),
            "order_status_update",
            Some("orders"),
            Some(serde_json::json!({
                "order_id": id,
                "from": from,
                "to": target,
            })),
        )
        .await;

        return Ok(ApiResponse::success(
            "Order updated",
            updated,
            Some(Meta::empty()),
        ));
    }

    Err(AppError::InvalidState(
        "order status is changing concurrently, try again".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_code_has_prefix_date_and_base36_tail() {
        let now = DateTime::parse_from_rfc3339("2024-03-07T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let code = generate_order_code(now);
        assert_eq!(code.len(), 17);
        assert!(code.starts_with("R240307"));
        assert!(code[7..].bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn order_codes_differ() {
        let now = Utc::now();
        assert_ne!(generate_order_code(now), generate_order_code(now));
    }

    #[test]
    fn merge_sums_duplicate_products() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_lines(&[
            OrderItemRequest { product_id: a, quantity: 1 },
            OrderItemRequest { product_id: b, quantity: 2 },
            OrderItemRequest { product_id: a, quantity: 3 },
        ])
        .unwrap();
        assert_eq!(merged, vec![(a, 4), (b, 2)]);
    }

    #[test]
    fn merge_rejects_empty_and_zero_quantity() {
        assert!(matches!(merge_lines(&[]), Err(AppError::Validation(_))));
        let zero = [OrderItemRequest {
            product_id: Uuid::new_v4(),
            quantity: 0,
        }];
        assert!(matches!(merge_lines(&zero), Err(AppError::Validation(_))));
    }
}
