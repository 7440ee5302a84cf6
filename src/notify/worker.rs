use std::sync::Arc;

use tokio::sync::mpsc::Receiver;

use super::{Email, Mailer, OrderEvent, templates};
use crate::{
    error::AppResult,
    repository::{NewNotification, NotificationRepository, Store, UserRepository},
};

/// Drains the event channel until every sender is dropped.
pub struct NotificationWorker {
    notifications: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationWorker {
    pub fn new(store: &Store, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            notifications: store.notifications.clone(),
            users: store.users.clone(),
            mailer,
        }
    }

    pub async fn run(self, mut rx: Receiver<OrderEvent>) {
        tracing::info!("notification worker started");

        while let Some(event) = rx.recv().await {
            let order_id = event.order().id;
            let kind = event.kind();
            if let Err(err) = self.handle(event).await {
                tracing::error!(error = %err, %order_id, kind, "failed to deliver notification");
            }
        }

        tracing::info!("notification channel closed, worker stopping");
    }

    pub async fn handle(&self, event: OrderEvent) -> AppResult<()> {
        let rendered = templates::render(&event);
        let order = event.order();

        // in-app and email delivery fail independently
        match self
            .notifications
            .insert_notification(NewNotification {
                user_id: order.user_id,
                title: rendered.title,
                message: rendered.message,
                notification_type: rendered.notification_type,
                related_order: Some(order.id),
                related_product: None,
            })
            .await
        {
            Ok(notification) => {
                tracing::debug!(notification_id = %notification.id, "notification stored")
            }
            Err(err) => tracing::error!(
                error = %err,
                order_id = %order.id,
                "failed to store notification"
            ),
        }

        let Some(user) = self.users.find_user(order.user_id).await? else {
            tracing::warn!(user_id = %order.user_id, "order owner missing, email skipped");
            return Ok(());
        };

        if let Err(err) = self
            .mailer
            .send(Email {
                to: user.email,
                subject: rendered.subject,
                body: rendered.body,
            })
            .await
        {
            tracing::warn!(error = %err, user_id = %user.id, "email delivery failed");
        }

        Ok(())
    }
}
