// Linux desktop adapter over the freedesktop D-Bus Notifications interface
// There is no push transport on the desktop; the adapter only presents
// notifications and keeps the registration token in the app data directory

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;
use zbus::Connection;
use zbus::zvariant::Value;

use super::storage::FileTokenSlot;
use crate::components::platform::{
    AdapterFuture, DeliveryReceipt, PermissionKind, PermissionOutcome, Platform, PlatformAdapter,
    PresentationRequest,
};
use crate::components::{Priority, PushError, PushResult};

const NOTIFICATIONS_SERVICE: &str = "org.freedesktop.Notifications";

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications",
    gen_blocking = false
)]
trait Notifications {
    /// Send a notification to the desktop notification daemon
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    /// Get the capabilities supported by the notification server
    fn get_capabilities(&self) -> zbus::Result<Vec<String>>;
}

#[derive(Clone)]
pub struct LinuxAdapter {
    app_name: String,
    connection: Arc<OnceCell<Connection>>,
    token_slot: FileTokenSlot,
}

impl LinuxAdapter {
    pub fn new(app_name: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            app_name: app_name.into(),
            connection: Arc::new(OnceCell::new()),
            token_slot: FileTokenSlot::in_dir(data_dir),
        }
    }

    async fn get_connection(&self) -> PushResult<Connection> {
        self.connection
            .get_or_try_init(|| async {
                Connection::session()
                    .await
                    .map_err(|e| PushError::platform(Platform::Linux, "connect_session_bus", e))
            })
            .await
            .cloned()
    }

    fn create_hints<'a>(&'a self, request: &'a PresentationRequest) -> HashMap<&'a str, Value<'a>> {
        let mut hints = HashMap::new();

        let urgency = match request.priority {
            Priority::Min | Priority::Low => 0u8,
            Priority::Default => 1u8,
            Priority::High | Priority::Max => 2u8,
        };
        hints.insert("urgency", Value::U8(urgency));

        if let Some(path) = &request.image_path {
            hints.insert("image-path", Value::from(path.to_string_lossy().into_owned()));
        }

        // "default" means the daemon's own sound, which needs no hint
        if let Some(sound) = &request.sound
            && sound != "default"
        {
            hints.insert("sound-name", Value::from(sound.as_str()));
        }

        if let Some(channel) = &request.channel_id {
            hints.insert("category", Value::from(channel.as_str()));
        }

        hints.insert("desktop-entry", Value::from(self.app_name.as_str()));
        hints
    }
}

impl PlatformAdapter for LinuxAdapter {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn present_native<'a>(
        &'a self,
        request: &'a PresentationRequest,
    ) -> AdapterFuture<'a, DeliveryReceipt> {
        Box::pin(async move {
            let connection = self.get_connection().await?;
            let proxy = NotificationsProxy::new(&connection)
                .await
                .map_err(|e| PushError::platform(Platform::Linux, "create_proxy", e))?;

            // Clicking the body invokes the "default" action, which is how the
            // data of a tapped notification comes back
            let actions: &[&str] = if request.data.is_empty() {
                &[]
            } else {
                &["default", ""]
            };
            let app_icon = request.icon.as_deref().unwrap_or_default();

            let native_id = proxy
                .notify(
                    &self.app_name,
                    0,
                    app_icon,
                    &request.title,
                    &request.body,
                    actions,
                    self.create_hints(request),
                    -1,
                )
                .await
                .map_err(|e| PushError::platform(Platform::Linux, "notify", e))?;

            Ok(DeliveryReceipt::new(
                Platform::Linux,
                request.notification_id,
                native_id.to_string(),
            )
            .with_image(request.image_path.is_some())
            .with_metadata("platform_api", "D-Bus")
            .with_metadata("dbus_service", NOTIFICATIONS_SERVICE))
        })
    }

    fn persist_token<'a>(&'a self, token: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let slot = self.token_slot.clone();
            let token = token.to_string();
            tokio::task::spawn_blocking(move || slot.write(&token))
                .await
                .map_err(|e| PushError::platform(Platform::Linux, "persist_token", e))??;
            Ok(())
        })
    }

    fn read_token(&self) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move {
            let slot = self.token_slot.clone();
            let token = tokio::task::spawn_blocking(move || slot.read())
                .await
                .map_err(|e| PushError::platform(Platform::Linux, "read_token", e))??;
            Ok(token)
        })
    }

    fn request_permission<'a>(
        &'a self,
        kinds: &'a [PermissionKind],
    ) -> AdapterFuture<'a, PermissionOutcome> {
        Box::pin(async move {
            // Desktop daemons show everything they receive; reachability of the
            // service is the only thing that can be checked
            let connection = self.get_connection().await?;
            let proxy = NotificationsProxy::new(&connection)
                .await
                .map_err(|e| PushError::platform(Platform::Linux, "create_proxy", e))?;
            let capabilities = proxy
                .get_capabilities()
                .await
                .map_err(|e| PushError::platform(Platform::Linux, "get_capabilities", e))?;
            tracing::debug!(?kinds, ?capabilities, "Notification daemon reachable");
            Ok(PermissionOutcome::Granted)
        })
    }
}
