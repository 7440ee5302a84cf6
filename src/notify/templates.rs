use crate::models::{NotificationType, Order, OrderStatus};

use super::OrderEvent;

/// In-app notification text plus the matching e-mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub subject: String,
    pub body: String,
}

pub fn render(event: &OrderEvent) -> Rendered {
    match event {
        OrderEvent::OrderPlaced(order) => Rendered {
            title: "Order Placed".into(),
            message: format!(
                "Your order {} has been placed successfully. Total amount: {} {}",
                order.order_code,
                order.totals.grand_total,
                order.currency
            ),
            notification_type: NotificationType::Order,
            subject: format!("Order Confirmed - {}", order.order_code),
            body: order_summary(order),
        },
        OrderEvent::StatusChanged { order, from, to } => Rendered {
            title: "Order Status Update".into(),
            message: format!(
                "Your order {} status has been updated from {} to {}.",
                order.order_code, from, to
            ),
            notification_type: status_notification_type(*to),
            subject: format!("Order Status Update - {}", order.order_code),
            body: format!(
                "Order {}\nPrevious status: {}\nNew status: {}\n",
                order.order_code, from, to
            ),
        },
        OrderEvent::Cancelled(order) => Rendered {
            title: "Order Cancelled".into(),
            message: format!("Your order {} has been cancelled.", order.order_code),
            notification_type: NotificationType::Order,
            subject: format!("Order Cancelled - {}", order.order_code),
            body: format!("Order {} was cancelled before fulfillment.\n", order.order_code),
        },
        OrderEvent::PaymentCompleted(order) => Rendered {
            title: "Payment completed".into(),
            message: format!("Your payment for order {} has been completed.", order.order_code),
            notification_type: NotificationType::Payment,
            subject: format!("Payment Confirmed - Order {}", order.order_code),
            body: format!(
                "We received {} {} for order {}.\n",
                order.totals.grand_total, order.currency, order.order_code
            ),
        },
        OrderEvent::PaymentFailed(order) => Rendered {
            title: "Payment failed".into(),
            message: format!("Your payment for order {} has failed.", order.order_code),
            notification_type: NotificationType::Payment,
            subject: format!("Payment Failed - Order {}", order.order_code),
            body: format!(
                "The payment for order {} did not go through. You can retry it from your orders page.\n",
                order.order_code
            ),
        },
    }
}

fn status_notification_type(to: OrderStatus) -> NotificationType {
    match to {
        OrderStatus::Pickup | OrderStatus::Delivered => NotificationType::Delivery,
        _ => NotificationType::Order,
    }
}

fn order_summary(order: &Order) -> String {
    let mut body = format!("Order {} ({})\n\n", order.order_code, order.order_type);
    for item in &order.items {
        body.push_str(&format!(
            "{} x{} @ {}\n",
            item.product_name, item.quantity, item.unit_price
        ));
    }
    let totals = &order.totals;
    body.push_str(&format!(
        "\nSub total: {}\nDelivery: {}\nTaxes: {}\nGrand total: {} {}\n",
        totals.sub_total, totals.delivery_charge, totals.taxes, totals.grand_total, order.currency
    ));
    body
}
