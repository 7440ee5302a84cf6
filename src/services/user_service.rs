use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::log_audit,
    dto::users::{
        AddressList, AddressRequest, UpdateAddressRequest, UpdateProfileRequest,
        UpdateRoleRequest, UserList, Wishlist,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Address, User},
    repository::{AddressPatch, NewAddress, Page},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::product_service::find_active_product,
    state::AppState,
};

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    payload.validate()?;
    let updated = state
        .store
        .users
        .update_profile(
            user.user_id,
            payload.user_name.map(|n| n.trim().to_string()),
            payload.phone_no.map(|p| p.trim().to_string()),
        )
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ApiResponse::success(
        "Profile updated",
        updated,
        Some(Meta::empty()),
    ))
}

pub async fn list_addresses(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AddressList>> {
    let items = state.store.users.list_addresses(user.user_id).await?;
    Ok(ApiResponse::success(
        "Addresses",
        AddressList { items },
        Some(Meta::empty()),
    ))
}

pub async fn add_address(
    state: &AppState,
    user: &AuthUser,
    payload: AddressRequest,
) -> AppResult<ApiResponse<Address>> {
    payload.validate()?;
    let address = state
        .store
        .users
        .add_address(
            user.user_id,
            NewAddress {
                address_type: payload.address_type,
                address: payload.address,
                city: payload.city,
                state: payload.state,
                zip_code: payload.zip_code,
                country: payload.country,
                is_default: payload.is_default,
            },
        )
        .await?;
    Ok(ApiResponse::success(
        "Address added",
        address,
        Some(Meta::empty()),
    ))
}

pub async fn update_address(
    state: &AppState,
    user: &AuthUser,
    address_id: Uuid,
    payload: UpdateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    payload.validate()?;
    let patch = AddressPatch {
        address_type: payload.address_type,
        address: payload.address,
        city: payload.city,
        state: payload.state,
        zip_code: payload.zip_code,
        country: payload.country,
        is_default: payload.is_default,
    };
    let address = state
        .store
        .users
        .update_address(user.user_id, address_id, patch)
        .await?
        .ok_or_else(|| AppError::not_found("Address"))?;
    Ok(ApiResponse::success(
        "Address updated",
        address,
        Some(Meta::empty()),
    ))
}

pub async fn remove_address(
    state: &AppState,
    user: &AuthUser,
    address_id: Uuid,
) -> AppResult<ApiResponse<AddressList>> {
    if !state
        .store
        .users
        .remove_address(user.user_id, address_id)
        .await?
    {
        return Err(AppError::not_found("Address"));
    }
    list_addresses(state, user).await
}

pub async fn get_wishlist(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Wishlist>> {
    let ids = state.store.users.wishlist(user.user_id).await?;
    let items = state
        .store
        .products
        .find_products(&ids)
        .await?
        .into_iter()
        .filter(|p| p.is_active)
        .collect();
    Ok(ApiResponse::success(
        "Wishlist",
        Wishlist { items },
        Some(Meta::empty()),
    ))
}

pub async fn add_to_wishlist(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<Wishlist>> {
    find_active_product(state, product_id).await?;
    if !state
        .store
        .users
        .wishlist_add(user.user_id, product_id)
        .await?
    {
        return Err(AppError::validation("Product already in wishlist"));
    }
    get_wishlist(state, user).await
}

pub async fn remove_from_wishlist(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<Wishlist>> {
    if !state
        .store
        .users
        .wishlist_remove(user.user_id, product_id)
        .await?
    {
        return Err(AppError::not_found("Wishlist item"));
    }
    get_wishlist(state, user).await
}

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();
    let (items, total) = state
        .store
        .users
        .list_users(Page::new(limit, offset))
        .await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn update_role(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let updated = state
        .store
        .users
        .update_role(id, payload.role)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    log_audit(
        state,
        Some(user.user_id),
        "user_role_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": id, "role": updated.role })),
    )
    .await;

    Ok(ApiResponse::success(
        "User role updated",
        updated,
        Some(Meta::empty()),
    ))
}
