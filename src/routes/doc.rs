use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        notifications::{
            AffectedCount, BulkNotificationRequest, NotificationList, SendNotificationRequest,
            UnreadCount,
        },
        orders::{CreateOrderRequest, OrderItemRequest, OrderList, UpdateOrderStatusRequest},
        payments::{
            ConfirmPaymentRequest, PaymentIntentRequest, PaymentOutcome, WebhookAck, WebhookData,
            WebhookEvent, WebhookObject,
        },
        products::{CreateProductRequest, ProductList, RateProductRequest, UpdateProductRequest},
        users::{
            AddressList, AddressRequest, UpdateAddressRequest, UpdateProfileRequest,
            UpdateRoleRequest, UserList, Wishlist,
        },
    },
    models::{
        Address, AddressSnapshot, AddressType, Category, LineItem, Notification, NotificationType,
        Order, OrderStatus, OrderTotals, OrderType, PaymentStatus, Product, Role, StockStatus,
        User,
    },
    response::{ApiResponse, Meta},
    routes::{admin, health, notifications, orders, params, payments, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::rate_product,
        products::remove_rating,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        payments::register_intent,
        payments::confirm_payment,
        payments::webhook,
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::delete_notification,
        notifications::clear_notifications,
        notifications::send_notification,
        notifications::send_bulk,
        users::update_profile,
        users::list_addresses,
        users::add_address,
        users::update_address,
        users::remove_address,
        users::get_wishlist,
        users::add_to_wishlist,
        users::remove_from_wishlist,
        admin::list_users,
        admin::update_user_role,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::cancel_order_admin,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::dashboard
    ),
    components(
        schemas(
            User,
            Role,
            Address,
            AddressType,
            Product,
            Category,
            StockStatus,
            Order,
            OrderStatus,
            OrderType,
            PaymentStatus,
            OrderTotals,
            LineItem,
            AddressSnapshot,
            Notification,
            NotificationType,
            CreateProductRequest,
            UpdateProductRequest,
            RateProductRequest,
            ProductList,
            CreateOrderRequest,
            OrderItemRequest,
            UpdateOrderStatusRequest,
            OrderList,
            PaymentIntentRequest,
            ConfirmPaymentRequest,
            PaymentOutcome,
            WebhookEvent,
            WebhookData,
            WebhookObject,
            WebhookAck,
            NotificationList,
            UnreadCount,
            AffectedCount,
            SendNotificationRequest,
            BulkNotificationRequest,
            UpdateProfileRequest,
            AddressRequest,
            UpdateAddressRequest,
            UpdateRoleRequest,
            AddressList,
            Wishlist,
            UserList,
            admin::LowStockQuery,
            admin::InventoryAdjustRequest,
            admin::DashboardStats,
            admin::OrderStatusCount,
            admin::StockStatusCount,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::NotificationQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<NotificationList>,
            ApiResponse<admin::DashboardStats>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog and ratings"),
        (name = "Orders", description = "Order creation and lifecycle"),
        (name = "Payments", description = "Payment confirmation and gateway webhook"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Users", description = "Profile, addresses and wishlist"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
