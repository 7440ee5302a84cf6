use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::log_audit,
    dto::products::{
        CreateProductRequest, DEFAULT_DELIVERY_TIME, DEFAULT_RETURN_TIME, ProductList,
        RateProductRequest, UpdateProductRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    repository::{NewProduct, Page, ProductFilter, ProductPatch, ProductSort},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

fn product_sort(query: &ProductQuery) -> ProductSort {
    let order = query.sort_order.as_ref();
    match query.sort_by {
        None | Some(ProductSortBy::CreatedAt) => ProductSort::Newest,
        Some(ProductSortBy::Price) => match order {
            Some(SortOrder::Desc) => ProductSort::PriceDesc,
            _ => ProductSort::PriceAsc,
        },
        Some(ProductSortBy::Name) => match order {
            Some(SortOrder::Desc) => ProductSort::NameDesc,
            _ => ProductSort::NameAsc,
        },
        Some(ProductSortBy::Rating) => ProductSort::Rating,
    }
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(AppError::validation("min_price cannot exceed max_price"));
        }
    }

    let filter = ProductFilter {
        category: query.category,
        search: query.q.clone().filter(|q| !q.trim().is_empty()),
        min_price: query.min_price,
        max_price: query.max_price,
        sort: product_sort(&query),
    };

    let (items, total) = state
        .store
        .products
        .list_products(&filter, Page::new(limit, offset))
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub(crate) async fn find_active_product(state: &AppState, id: Uuid) -> AppResult<Product> {
    state
        .store
        .products
        .find_product(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::not_found("Product"))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = find_active_product(state, id).await?;
    Ok(ApiResponse::success("Product found", product, Some(Meta::empty())))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    payload.validate()?;

    let product = state
        .store
        .products
        .insert_product(NewProduct {
            name: payload.name,
            description: payload.description,
            details: payload.details,
            price: payload.price,
            category: payload.category,
            stock: payload.stock,
            delivery_time: payload
                .delivery_time
                .unwrap_or_else(|| DEFAULT_DELIVERY_TIME.to_string()),
            return_time: payload
                .return_time
                .unwrap_or_else(|| DEFAULT_RETURN_TIME.to_string()),
        })
        .await?;

    log_audit(
        state,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    payload.validate()?;

    let patch = ProductPatch {
        name: payload.name,
        description: payload.description,
        details: payload.details,
        price: payload.price,
        category: payload.category,
        stock: payload.stock,
        delivery_time: payload.delivery_time,
        return_time: payload.return_time,
        is_active: None,
    };
    let product = state
        .store
        .products
        .update_product(id, patch)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    log_audit(
        state,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated",
        product,
        Some(Meta::empty()),
    ))
}

/// Soft delete; order history keeps pointing at the row.
pub async fn deactivate_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    find_active_product(state, id).await?;
    let product = state
        .store
        .products
        .update_product(
            id,
            ProductPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    log_audit(
        state,
        Some(user.user_id),
        "product_deactivate",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn rate_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    payload.validate()?;
    find_active_product(state, id).await?;

    let review = payload.review.filter(|r| !r.trim().is_empty());
    let product = state
        .store
        .products
        .upsert_rating(id, user.user_id, payload.rating, review)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    Ok(ApiResponse::success(
        "Rating saved",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn remove_rating(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    let product = state
        .store
        .products
        .remove_rating(id, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    Ok(ApiResponse::success(
        "Rating removed",
        product,
        Some(Meta::empty()),
    ))
}
