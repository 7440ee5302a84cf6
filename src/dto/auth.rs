use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Bearer token payload. `role` carries the `Role` label.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
