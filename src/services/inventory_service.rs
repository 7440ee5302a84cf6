//! Stock counters as a side effect of order creation, return and cancellation.

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{LineItem, Product},
    repository::StockChange,
    state::AppState,
};

/// Decrement every line atomically. On the first failure the lines already
/// taken are put back before the error is returned.
pub async fn reserve_lines(state: &AppState, items: &[LineItem]) -> AppResult<()> {
    let mut reserved: Vec<LineItem> = Vec::with_capacity(items.len());

    for item in items {
        let failure = match state
            .store
            .products
            .try_decrement_stock(item.product_id, item.quantity)
            .await
        {
            Ok(StockChange::Applied(product)) => {
                tracing::debug!(
                    product_id = %product.id,
                    stock = product.stock,
                    status = %product.stock_status,
                    "stock reserved"
                );
                reserved.push(item.clone());
                continue;
            }
            Ok(StockChange::Insufficient { available }) => AppError::InsufficientStock {
                product_id: item.product_id,
                requested: item.quantity,
                available,
            },
            Ok(StockChange::Missing) => AppError::NotFound(format!("Product {}", item.product_id)),
            Ok(StockChange::Overflow) => AppError::validation("stock out of range"),
            Err(err) => err,
        };

        restock_lines(state, &reserved).await;
        return Err(failure);
    }

    Ok(())
}

/// Put every line back. Failures are logged per line and do not stop the rest.
pub async fn restock_lines(state: &AppState, items: &[LineItem]) {
    for item in items {
        match state
            .store
            .products
            .increment_stock(item.product_id, item.quantity)
            .await
        {
            Ok(StockChange::Applied(product)) => tracing::debug!(
                product_id = %product.id,
                stock = product.stock,
                "stock restored"
            ),
            Ok(StockChange::Overflow) => tracing::error!(
                product_id = %item.product_id,
                quantity = item.quantity,
                "restock would overflow stock"
            ),
            Ok(_) => tracing::warn!(product_id = %item.product_id, "restock target missing"),
            Err(err) => tracing::error!(
                error = %err,
                product_id = %item.product_id,
                quantity = item.quantity,
                "restock failed"
            ),
        }
    }
}

/// Signed manual adjustment. Negative deltas never take stock below zero.
pub async fn adjust_stock(state: &AppState, product_id: Uuid, delta: i32) -> AppResult<Product> {
    if delta == 0 {
        return Err(AppError::validation("delta must not be 0"));
    }

    let change = if delta > 0 {
        state.store.products.increment_stock(product_id, delta).await?
    } else {
        let quantity = delta.checked_neg().ok_or_else(|| AppError::validation("delta out of range"))?;
        state.store.products.try_decrement_stock(product_id, quantity).await?
    };

    match change {
        StockChange::Applied(product) => Ok(product),
        StockChange::Insufficient { available } => Err(AppError::InsufficientStock {
            product_id,
            requested: -delta,
            available,
        }),
        StockChange::Overflow => Err(AppError::validation("stock out of range")),
        StockChange::Missing => Err(AppError::NotFound(format!("Product {product_id}"))),
    }
}
