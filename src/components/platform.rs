// Narrow platform adapter seam
// Each host (FCM on Android, APNs through UserNotifications, Web Push, desktop
// notification daemons) implements these four calls and nothing else

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::{NotificationId, Priority, PushResult};

/// Boxed future returned by adapter calls
pub type AdapterFuture<'a, T> = Pin<Box<dyn Future<Output = PushResult<T>> + Send + 'a>>;

/// Push platforms a host adapter can represent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Firebase Cloud Messaging
    Android,
    /// APNs through UserNotifications
    IOs,
    /// APNs through UserNotifications on the desktop
    MacOS,
    /// Service worker with the Push API
    Web,
    /// freedesktop D-Bus notifications, no push transport
    Linux,
    /// In-process adapter without an OS surface
    #[default]
    Headless,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Android => "Android",
            Platform::IOs => "iOS",
            Platform::MacOS => "macOS",
            Platform::Web => "Web",
            Platform::Linux => "Linux",
            Platform::Headless => "Headless",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Permission kinds an application may ask for when registering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionKind {
    Alert,
    Badge,
    Sound,
    CarPlay,
    CriticalAlert,
    ProvidesAppNotificationSettings,
    Provisional,
}

impl PermissionKind {
    /// Parse a wire name; unknown names yield `None` and are ignored by callers
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "alert" => Some(PermissionKind::Alert),
            "badge" => Some(PermissionKind::Badge),
            "sound" => Some(PermissionKind::Sound),
            "carPlay" => Some(PermissionKind::CarPlay),
            "criticalAlert" => Some(PermissionKind::CriticalAlert),
            "providesAppNotificationSettings" => {
                Some(PermissionKind::ProvidesAppNotificationSettings)
            },
            "provisional" => Some(PermissionKind::Provisional),
            _ => None,
        }
    }

    /// Provisional delivery needs no prior consent
    pub fn needs_consent(&self) -> bool {
        !matches!(self, PermissionKind::Provisional)
    }
}

/// Answer of an adapter to a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
    /// A system prompt is showing; the host reports the answer later through
    /// the permission gate under this request code
    Pending { request_code: i32 },
}

/// Fully defaulted notification handed to the host surface
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationRequest {
    pub notification_id: NotificationId,
    pub title: String,
    pub body: String,
    /// Local file of the downloaded image; `None` means text-only
    pub image_path: Option<PathBuf>,
    /// Original image reference, for hosts that load images themselves
    pub image_url: Option<String>,
    pub sound: Option<String>,
    pub icon: Option<String>,
    pub priority: Priority,
    pub channel_id: Option<String>,
    /// Attached to the notification and returned on click
    pub data: HashMap<String, String>,
}

/// Proof of hand-off to the host notification surface
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub platform: Platform,
    pub notification_id: NotificationId,
    pub native_id: String,
    pub delivered_at: SystemTime,
    pub with_image: bool,
    pub metadata: HashMap<String, String>,
}

impl DeliveryReceipt {
    pub fn new(platform: Platform, notification_id: NotificationId, native_id: String) -> Self {
        Self {
            platform,
            notification_id,
            native_id,
            delivered_at: SystemTime::now(),
            with_image: false,
            metadata: HashMap::new(),
        }
    }

    pub fn with_image(mut self, with_image: bool) -> Self {
        self.with_image = with_image;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The only calls the shared core makes into a host platform
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Show a notification on the host surface
    fn present_native<'a>(
        &'a self,
        request: &'a PresentationRequest,
    ) -> AdapterFuture<'a, DeliveryReceipt>;

    /// Durably store the serialized registration token, replacing any previous one
    fn persist_token<'a>(&'a self, token: &'a str) -> AdapterFuture<'a, ()>;

    /// Read back the serialized registration token
    fn read_token(&self) -> AdapterFuture<'_, Option<String>>;

    /// Ask for notification permission with the given kinds
    fn request_permission<'a>(
        &'a self,
        kinds: &'a [PermissionKind],
    ) -> AdapterFuture<'a, PermissionOutcome>;
}
