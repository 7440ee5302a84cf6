use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::CommerceConfig,
    error::{AppError, AppResult},
};

/// Closed string-backed enums. The label is both the wire and the column value.
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(AppError::Validation(format!(
                        "'{}' is not a valid {}",
                        other,
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

labelled_enum!(Role {
    User => "user",
    Admin => "admin",
});

labelled_enum!(Category {
    One => "Category 1",
    Two => "Category 2",
    Three => "Category 3",
});

labelled_enum!(StockStatus {
    InStock => "In Stock",
    LowStock => "Low Stock",
    OutOfStock => "Out of Stock",
});

labelled_enum!(
    /// Fulfillment lifecycle, in order.
    OrderStatus {
        Pending => "Pending",
        Ready => "Ready",
        Pickup => "Pickup",
        Delivered => "Delivered",
        Return => "Return",
    }
);

labelled_enum!(OrderType {
    Purchase => "purchase",
    Rental => "rental",
});

labelled_enum!(PaymentStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

labelled_enum!(NotificationType {
    Order => "order",
    Payment => "payment",
    Delivery => "delivery",
    System => "system",
});

labelled_enum!(AddressType {
    Delivery => "delivery",
    Invoice => "invoice",
});

/// Upper bound (inclusive) of the `Low Stock` band.
pub const LOW_STOCK_LIMIT: i32 = 10;

impl StockStatus {
    /// The only place stock thresholds live; every stock mutation goes through here.
    pub fn from_stock(stock: i32) -> Self {
        if stock <= 0 {
            StockStatus::OutOfStock
        } else if stock <= LOW_STOCK_LIMIT {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

impl OrderStatus {
    pub const INITIAL: OrderStatus = OrderStatus::Pending;

    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Ready => 1,
            OrderStatus::Pickup => 2,
            OrderStatus::Delivered => 3,
            OrderStatus::Return => 4,
        }
    }

    /// Forward-only: the same state or any later one.
    pub fn can_advance_to(&self, target: OrderStatus) -> bool {
        target.rank() >= self.rank()
    }
}

impl PaymentStatus {
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        matches!(
            (self, target),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Failed, PaymentStatus::Completed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub user_name: String,
    pub phone_no: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address_type: AddressType,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub details: Option<String>,
    pub price: i64,
    pub category: Category,
    pub stock: i32,
    pub stock_status: StockStatus,
    pub delivery_time: String,
    pub return_time: String,
    pub is_active: bool,
    pub average_rating: f64,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductRating {
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Copied onto the order at checkout; later edits to the user's address book do not touch it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddressSnapshot {
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    /// Price captured when the order was placed.
    pub unit_price: i64,
}

impl LineItem {
    /// `None` when price times quantity leaves the `i64` range.
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderTotals {
    pub sub_total: i64,
    pub delivery_charge: i64,
    pub taxes: i64,
    pub discount: i64,
    pub grand_total: i64,
}

impl OrderTotals {
    pub fn compute(items: &[LineItem], config: &CommerceConfig, discount: i64) -> AppResult<Self> {
        let out_of_range = || AppError::validation("order total out of range");

        let sub_total = items
            .iter()
            .try_fold(0_i64, |acc, item| {
                item.line_total().and_then(|line| acc.checked_add(line))
            })
            .ok_or_else(out_of_range)?;
        let delivery_charge = if sub_total > config.free_delivery_threshold {
            0
        } else {
            config.delivery_charge
        };
        // round half up to the smallest currency unit
        let taxes = sub_total
            .checked_mul(config.tax_rate_bps)
            .and_then(|t| t.checked_add(5_000))
            .map(|t| t / 10_000)
            .ok_or_else(out_of_range)?;
        let grand_total = sub_total
            .checked_add(delivery_charge)
            .and_then(|t| t.checked_add(taxes))
            .and_then(|t| t.checked_sub(discount))
            .ok_or_else(out_of_range)?;

        Ok(Self {
            sub_total,
            delivery_charge,
            taxes,
            discount,
            grand_total,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_code: String,
    pub user_id: Uuid,
    pub items: Vec<LineItem>,
    pub delivery_address: AddressSnapshot,
    pub invoice_address: AddressSnapshot,
    pub delivery_date: Option<DateTime<Utc>>,
    pub delivery_time: Option<String>,
    pub payment_method: String,
    pub order_type: OrderType,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub currency: String,
    pub payment_reference: Option<String>,
    pub rental_start_date: Option<DateTime<Utc>>,
    pub rental_end_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_rental(&self) -> bool {
        self.order_type == OrderType::Rental
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub related_order: Option<Uuid>,
    pub related_product: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: i64, quantity: i32) -> LineItem {
        LineItem {
            product_id: Uuid::new_v4(),
            product_name: "Tent".into(),
            quantity,
            unit_price: price,
        }
    }

    #[test]
    fn stock_status_thresholds() {
        assert_eq!(StockStatus::from_stock(0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_stock(1), StockStatus::LowStock);
        assert_eq!(StockStatus::from_stock(5), StockStatus::LowStock);
        assert_eq!(StockStatus::from_stock(10), StockStatus::LowStock);
        assert_eq!(StockStatus::from_stock(11), StockStatus::InStock);
    }

    #[test]
    fn totals_charge_delivery_below_threshold() {
        let config = CommerceConfig::default();
        let totals = OrderTotals::compute(&[item(100, 2)], &config, 0).unwrap();
        assert_eq!(totals.sub_total, 200);
        assert_eq!(totals.delivery_charge, 1000);
        assert_eq!(totals.taxes, 20);
        assert_eq!(totals.grand_total, 1220);
    }

    #[test]
    fn totals_free_delivery_only_strictly_above_threshold() {
        let config = CommerceConfig::default();
        let at = OrderTotals::compute(&[item(500, 2)], &config, 0).unwrap();
        assert_eq!(at.delivery_charge, 1000);

        let above = OrderTotals::compute(&[item(1001, 1)], &config, 0).unwrap();
        assert_eq!(above.delivery_charge, 0);
        assert_eq!(above.taxes, 100);
        assert_eq!(above.grand_total, 1101);
    }

    #[test]
    fn totals_subtract_discount() {
        let config = CommerceConfig::default();
        let totals = OrderTotals::compute(&[item(2000, 1)], &config, 150).unwrap();
        assert_eq!(
            totals.grand_total,
            totals.sub_total + totals.delivery_charge + totals.taxes - 150
        );
    }

    #[test]
    fn totals_reject_overflow() {
        let config = CommerceConfig::default();
        let huge = OrderTotals::compute(&[item(i64::MAX / 2, 3)], &config, 0);
        assert!(matches!(huge, Err(AppError::Validation(_))));

        // the line fits but the tax multiplication does not
        let taxed = OrderTotals::compute(&[item(i64::MAX / 100, 1)], &config, 0);
        assert!(matches!(taxed, Err(AppError::Validation(_))));

        let summed = OrderTotals::compute(&[item(i64::MAX, 1), item(1, 1)], &config, 0);
        assert!(matches!(summed, Err(AppError::Validation(_))));
    }

    #[test]
    fn order_status_is_forward_only() {
        assert!(OrderStatus::Pending.can_advance_to(OrderStatus::Ready));
        assert!(OrderStatus::Pending.can_advance_to(OrderStatus::Return));
        assert!(OrderStatus::Pickup.can_advance_to(OrderStatus::Pickup));
        assert!(!OrderStatus::Delivered.can_advance_to(OrderStatus::Ready));
    }

    #[test]
    fn payment_completed_is_terminal() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Completed));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Completed));
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        assert_eq!("Low Stock".parse::<StockStatus>().ok(), Some(StockStatus::LowStock));
        assert_eq!("Category 2".parse::<Category>().ok(), Some(Category::Two));
        assert!("Shipped".parse::<OrderStatus>().is_err());
    }
}
