//! Fire-and-forget dispatch of order and payment events.
//!
//! Services hand events to a [`Notifier`] after the primary state change is
//! persisted. The production notifier pushes onto a bounded channel drained by
//! [`NotificationWorker`], which stores the in-app notification and sends mail.

use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

use crate::models::{Order, OrderStatus};

pub mod mailer;
pub mod templates;
pub mod worker;

pub use mailer::{Email, LogMailer, Mailer};
pub use worker::NotificationWorker;

#[derive(Debug, Clone)]
pub enum OrderEvent {
    OrderPlaced(Order),
    StatusChanged {
        order: Order,
        from: OrderStatus,
        to: OrderStatus,
    },
    Cancelled(Order),
    PaymentCompleted(Order),
    PaymentFailed(Order),
}

impl OrderEvent {
    pub fn order(&self) -> &Order {
        match self {
            OrderEvent::OrderPlaced(order)
            | OrderEvent::Cancelled(order)
            | OrderEvent::PaymentCompleted(order)
            | OrderEvent::PaymentFailed(order) => order,
            OrderEvent::StatusChanged { order, .. } => order,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "order_placed",
            OrderEvent::StatusChanged { .. } => "order_status_changed",
            OrderEvent::Cancelled(_) => "order_cancelled",
            OrderEvent::PaymentCompleted(_) => "payment_completed",
            OrderEvent::PaymentFailed(_) => "payment_failed",
        }
    }
}

/// Never blocks and never fails the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: OrderEvent);
}

#[derive(Clone)]
pub struct ChannelNotifier {
    tx: Sender<OrderEvent>,
}

impl ChannelNotifier {
    pub fn new(buffer: usize) -> (Self, Receiver<OrderEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: OrderEvent) {
        let order_id = event.order().id;
        let kind = event.kind();
        match self.tx.try_send(event) {
            Ok(()) => tracing::debug!(%order_id, kind, "event queued"),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%order_id, kind, "notification queue full, event dropped")
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(%order_id, kind, "notification worker stopped, event dropped")
            }
        }
    }
}
