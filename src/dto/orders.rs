use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{AddressSnapshot, Order, OrderType};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
    pub delivery_address: AddressSnapshot,
    /// Defaults to the delivery address.
    pub invoice_address: Option<AddressSnapshot>,
    #[validate(length(min = 1, message = "payment method is required"))]
    pub payment_method: String,
    pub order_type: Option<OrderType>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub delivery_time: Option<String>,
    pub rental_start_date: Option<DateTime<Utc>>,
    pub rental_end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
