// Shared push-notification core: payload normalization, presentation,
// cold-start recovery and registration token bookkeeping

use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod channel;
pub mod config;
pub mod lifecycle;
pub mod localization;
pub mod payload;
pub mod permission;
pub mod platform;
pub mod presenter;
pub mod recovery;
pub mod serde_time;
pub mod service_worker;
pub mod token;

pub use channel::{
    ChannelEventSink, EventSink, MethodCall, MethodResult, PushEvent, methods,
};
pub use config::{FirebaseOptions, LocalizationConfig, PresentationConfig, PushConfig};
pub use lifecycle::{
    AdapterLifecycle, AdapterState, DeliveryPath, DeliveryState, StateTransition,
};
pub use localization::{LocalizationTable, MissingTranslation, format_template};
pub use payload::{
    DisplayOptions, NormalizedNotification, Normalizer, PushPayload, normalize, normalize_with,
};
pub use permission::{
    AuthorizationStatus, NOTIFICATION_PERMISSION_REQUEST_CODE, PendingPermission,
    PermissionGate, RegistrationDecision, registration_decision,
};
pub use platform::{
    AdapterFuture, DeliveryReceipt, PermissionKind, PermissionOutcome, Platform,
    PlatformAdapter, PresentationRequest,
};
pub use presenter::NotificationPresenter;
pub use recovery::{
    INITIAL_DATA_EXTRA, RecoveryInbox, RecoveryToken, decode, encode, initial_from_extras,
    recovery_url, take_from_url,
};
pub use service_worker::{ClickOutcome, ClientHost, ServiceWorker, WorkerPhase};
pub use token::{RegistrationToken, TokenStore, WebPushSubscription};

/// Boxed cause attached to platform failures for diagnostics
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Identifier handed to the host notification surface for each presented notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(Uuid);

impl NotificationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NotificationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Display priority of a notification, ordered from least to most intrusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    /// Shown silently, collapsed where the platform supports it
    Min = -2,
    Low = -1,
    #[default]
    Default = 0,
    /// Heads-up on platforms that support it
    High = 1,
    Max = 2,
}

impl Priority {
    /// Parse a payload priority: the names used by the Web payloads, the FCM
    /// `PRIORITY_*` names, or the Android level -2..=2
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if let Ok(level) = value.parse::<i64>() {
            return Self::from_level(level);
        }
        match value.strip_prefix("priority_").unwrap_or(&value) {
            "min" => Some(Priority::Min),
            "low" => Some(Priority::Low),
            "default" | "normal" => Some(Priority::Default),
            "high" => Some(Priority::High),
            "max" | "urgent" => Some(Priority::Max),
            _ => None,
        }
    }

    /// Android `NotificationCompat` priority level
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            -2 => Some(Priority::Min),
            -1 => Some(Priority::Low),
            0 => Some(Priority::Default),
            1 => Some(Priority::High),
            2 => Some(Priority::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Min => "min",
            Priority::Low => "low",
            Priority::Default => "default",
            Priority::High => "high",
            Priority::Max => "max",
        }
    }
}

/// Error type for every fallible operation in the crate
#[derive(Debug, Error)]
pub enum PushError {
    /// Recovery payload could not be decoded
    #[error("malformed recovery token: {reason}")]
    MalformedToken { reason: String },

    /// Image download or decode failed
    #[error("failed to fetch image '{url}': {message}")]
    ImageFetchFailed { url: String, message: String },

    /// Unknown RPC method name
    #[error("method '{0}' is not implemented")]
    UnsupportedMethod(String),

    /// An OS or vendor call failed
    #[error("{platform} call '{operation}' failed: {source}")]
    PlatformCallFailed {
        platform: String,
        operation: String,
        #[source]
        source: BoxError,
    },

    /// A second permission prompt was started while one is still pending
    #[error("permission request {request_code} is already in flight")]
    PermissionRequestInFlight { request_code: i32 },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid arguments for '{method}': {message}")]
    InvalidArguments { method: String, message: String },

    /// Plugin was used before the host attached it
    #[error("plugin is not attached")]
    NotAttached,

    /// Plugin was used after detach
    #[error("plugin is detached")]
    Detached,

    #[error("token storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PushError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        PushError::MalformedToken {
            reason: reason.into(),
        }
    }

    pub fn platform(
        platform: Platform,
        operation: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        PushError::PlatformCallFailed {
            platform: platform.name().to_string(),
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Stable machine-readable code for this error class
    pub fn code(&self) -> &'static str {
        match self {
            PushError::MalformedToken { .. } => "malformed_token",
            PushError::ImageFetchFailed { .. } => "image_fetch_failed",
            PushError::UnsupportedMethod(_) => "unsupported_method",
            PushError::PlatformCallFailed { .. } => "platform_call_failed",
            PushError::PermissionRequestInFlight { .. } => "permission_request_in_flight",
            PushError::InvalidTransition { .. } => "invalid_transition",
            PushError::InvalidArguments { .. } => "invalid_arguments",
            PushError::NotAttached => "not_attached",
            PushError::Detached => "detached",
            PushError::Storage(_) => "storage",
            PushError::Serialization(_) => "serialization",
        }
    }
}

/// Result alias used throughout the crate
pub type PushResult<T> = Result<T, PushError>;
