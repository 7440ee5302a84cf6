use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Category, Product};

pub const DEFAULT_DELIVERY_TIME: &str = "3-5 business days";
pub const DEFAULT_RETURN_TIME: &str = "30 days";

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    pub details: Option<String>,
    #[validate(range(min = 0, message = "price cannot be negative"))]
    pub price: i64,
    pub category: Category,
    #[validate(range(min = 0, message = "stock cannot be negative"))]
    pub stock: i32,
    pub delivery_time: Option<String>,
    pub return_time: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub details: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    pub category: Option<Category>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub delivery_time: Option<String>,
    pub return_time: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RateProductRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 1000))]
    pub review: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
