// Notification presentation
// Applies host defaults, materializes the image best-effort within a bounded
// wait, and hands the result to the platform adapter

use std::sync::Arc;

use super::config::PresentationConfig;
use super::payload::NormalizedNotification;
use super::platform::{DeliveryReceipt, PlatformAdapter, PresentationRequest};
use super::{NotificationId, PushResult};
use crate::backends::image_utils;

pub struct NotificationPresenter {
    adapter: Arc<dyn PlatformAdapter>,
    config: PresentationConfig,
}

impl NotificationPresenter {
    pub fn new(adapter: Arc<dyn PlatformAdapter>, config: PresentationConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &PresentationConfig {
        &self.config
    }

    /// Build the request for `notification` without touching the network
    pub fn prepare(&self, notification: &NormalizedNotification) -> PresentationRequest {
        let display = &notification.display;
        PresentationRequest {
            notification_id: NotificationId::generate(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            image_path: None,
            image_url: notification.image_url.clone(),
            sound: display
                .sound
                .clone()
                .or_else(|| self.config.default_sound.clone()),
            icon: display
                .icon
                .clone()
                .or_else(|| self.config.default_icon.clone()),
            priority: display.priority.unwrap_or(self.config.default_priority),
            channel_id: display
                .channel_id
                .clone()
                .or_else(|| self.config.default_channel_id.clone()),
            data: notification.data.clone(),
        }
    }

    /// Show `notification` on the host surface.
    ///
    /// Image failures and timeouts degrade to a text-only notification; only
    /// the adapter's own failure is returned.
    pub async fn present(&self, notification: &NormalizedNotification) -> PushResult<DeliveryReceipt> {
        self.present_prepared(self.prepare(notification)).await
    }

    /// Show an already prepared request
    pub async fn present_prepared(&self, mut request: PresentationRequest) -> PushResult<DeliveryReceipt> {
        if let Some(url) = request.image_url.clone() {
            let timeout = self.config.image_fetch_timeout;
            match tokio::time::timeout(timeout, image_utils::resolve_image(&url)).await {
                Ok(Ok(image)) => request.image_path = Some(image.path),
                Ok(Err(e)) => {
                    tracing::warn!(
                        notification_id = %request.notification_id,
                        error = %e,
                        "Presenting without image"
                    );
                },
                Err(_) => {
                    tracing::warn!(
                        notification_id = %request.notification_id,
                        url = %url,
                        timeout_ms = timeout.as_millis() as u64,
                        "Image fetch timed out, presenting without image"
                    );
                },
            }
        }

        let receipt = self.adapter.present_native(&request).await?;
        tracing::debug!(
            notification_id = %request.notification_id,
            platform = %receipt.platform,
            native_id = %receipt.native_id,
            with_image = request.image_path.is_some(),
            "Notification presented"
        );
        Ok(receipt)
    }
}
