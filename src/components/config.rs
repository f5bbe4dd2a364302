// Plugin configuration, deserialized from the `initialize` argument map

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::localization::{LocalizationTable, MissingTranslation};
use super::payload::Normalizer;
use super::serde_time::{deserialize_duration_ms, serialize_duration_ms};
use super::{Priority, PushError, PushResult};

/// Channel created when `useDefaultNotificationChannel` is set
pub const DEFAULT_CHANNEL_ID: &str = "native_push_notification_channel";

/// Top-level plugin configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushConfig {
    /// Create and use the plugin's own notification channel (Android)
    pub use_default_notification_channel: bool,
    /// Firebase project credentials (Android)
    pub firebase_options: Option<FirebaseOptions>,
    /// `locales`, `translations` and `missingTranslation` sit at the top level
    #[serde(flatten)]
    pub localization: LocalizationConfig,
    pub presentation: PresentationConfig,
    /// Page a background worker opens for a click with no live client
    pub start_url: Option<Url>,
}

impl PushConfig {
    /// Parse an `initialize` argument map; `null` yields the defaults
    pub fn from_value(value: &Value) -> PushResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).map_err(|e| PushError::InvalidArguments {
            method: "initialize".to_string(),
            message: e.to_string(),
        })
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(
            self.localization.locales.clone(),
            self.localization.translations.clone(),
        )
        .with_missing_translation(self.localization.missing_translation)
    }

    /// Presentation settings with the plugin channel applied when requested
    pub fn effective_presentation(&self) -> PresentationConfig {
        let mut presentation = self.presentation.clone();
        if self.use_default_notification_channel && presentation.default_channel_id.is_none() {
            presentation.default_channel_id = Some(DEFAULT_CHANNEL_ID.to_string());
        }
        presentation
    }
}

/// Firebase project identity used to initialize messaging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseOptions {
    pub project_id: Option<String>,
    pub application_id: String,
    pub api_key: String,
}

/// Locale preferences and the translation table for localized payloads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalizationConfig {
    /// Preferred locales, most preferred first
    pub locales: Vec<String>,
    pub translations: LocalizationTable,
    pub missing_translation: MissingTranslation,
}

/// Host defaults applied when a payload leaves a display option unset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresentationConfig {
    pub default_sound: Option<String>,
    pub default_icon: Option<String>,
    pub default_priority: Priority,
    pub default_channel_id: Option<String>,
    /// Upper bound on waiting for a notification image
    #[serde(
        rename = "imageFetchTimeoutMs",
        serialize_with = "serialize_duration_ms",
        deserialize_with = "deserialize_duration_ms"
    )]
    pub image_fetch_timeout: Duration,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            default_sound: Some("default".to_string()),
            default_icon: None,
            default_priority: Priority::Default,
            default_channel_id: None,
            image_fetch_timeout: Duration::from_secs(5),
        }
    }
}
