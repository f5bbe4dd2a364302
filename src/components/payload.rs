// Inbound push payload parsing and normalization
// Handles FCM data messages, APNs userInfo dictionaries and Web Push JSON alike

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::localization::{LocalizationTable, MissingTranslation};
use super::{Priority, PushResult};

const TITLE: &str = "title";
const TITLE_KEY: &str = "titleLocalizationKey";
const TITLE_ARGS: &str = "titleLocalizationArgs";
const BODY: &str = "body";
const BODY_KEY: &str = "bodyLocalizationKey";
const BODY_ARGS: &str = "bodyLocalizationArgs";
const IMAGE: &str = "image";
const IMAGE_URL: &str = "imageUrl";
const SOUND: &str = "sound";
const ICON: &str = "icon";
const PRIORITY: &str = "priority";
const CHANNEL_ID: &str = "channelId";

/// Keys consumed by the normalizer itself
const DISPLAY_KEYS: &[&str] = &[
    TITLE, TITLE_KEY, TITLE_ARGS, BODY, BODY_KEY, BODY_ARGS, IMAGE, IMAGE_URL, SOUND, ICON,
    PRIORITY, CHANNEL_ID,
];

/// Transport-internal keys that never reach the application
const RESERVED_KEYS: &[&str] = &["aps", "from", "collapse_key", "native_push_image"];
const RESERVED_PREFIXES: &[&str] = &["google", "gcm"];

/// Raw push message as delivered by the transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushPayload(Map<String, Value>);

impl PushPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON body of a push message; anything but an object is rejected
    pub fn from_json(text: &str) -> PushResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String view of a primitive field
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(primitive_to_string)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Localization arguments arrive as a JSON array, or as a string holding
    /// one when the transport only carries string values (FCM data messages)
    fn localization_args(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(primitive_to_string).collect(),
            Some(Value::String(text)) => match serde_json::from_str::<Vec<Value>>(text) {
                Ok(items) => items.iter().filter_map(primitive_to_string).collect(),
                Err(_) => vec![text.clone()],
            },
            _ => Vec::new(),
        }
    }

    /// The application data map: every primitive field that is neither a
    /// display field nor transport-internal
    pub fn application_data(&self) -> HashMap<String, String> {
        self.0
            .iter()
            .filter(|(key, _)| !DISPLAY_KEYS.contains(&key.as_str()) && !is_reserved(key))
            .filter_map(|(key, value)| primitive_to_string(value).map(|v| (key.clone(), v)))
            .collect()
    }
}

impl From<Map<String, Value>> for PushPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<HashMap<String, String>> for PushPayload {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
    }
}

/// Presentation hints carried by the payload; `None` means "use the host default"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    pub sound: Option<String>,
    pub icon: Option<String>,
    pub priority: Option<Priority>,
    pub channel_id: Option<String>,
}

/// Fully resolved notification ready for presentation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedNotification {
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub display: DisplayOptions,
    pub data: HashMap<String, String>,
}

impl NormalizedNotification {
    /// Data-only pushes have nothing to show
    pub fn is_silent(&self) -> bool {
        self.title.is_empty() && self.body.is_empty() && self.image_url.is_none()
    }
}

/// Normalizer bound to one client's locale preferences and translations
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    pub locales: Vec<String>,
    pub translations: LocalizationTable,
    pub missing: MissingTranslation,
}

impl Normalizer {
    pub fn new(locales: Vec<String>, translations: LocalizationTable) -> Self {
        Self {
            locales,
            translations,
            missing: MissingTranslation::default(),
        }
    }

    pub fn with_missing_translation(mut self, missing: MissingTranslation) -> Self {
        self.missing = missing;
        self
    }

    pub fn normalize(&self, raw: &PushPayload) -> NormalizedNotification {
        normalize_with(raw, &self.locales, &self.translations, self.missing)
    }
}

/// Normalize with the default missing-translation policy (raw key)
pub fn normalize<S: AsRef<str>>(
    raw: &PushPayload,
    locales: &[S],
    translations: &LocalizationTable,
) -> NormalizedNotification {
    normalize_with(raw, locales, translations, MissingTranslation::default())
}

pub fn normalize_with<S: AsRef<str>>(
    raw: &PushPayload,
    locales: &[S],
    translations: &LocalizationTable,
    missing: MissingTranslation,
) -> NormalizedNotification {
    let resolve = |literal: &str, key: &str, args: &str| -> String {
        match raw.get_str(key).filter(|k| !k.is_empty()) {
            Some(key) => {
                translations.localize(locales, &key, &raw.localization_args(args), missing)
            },
            None => raw.get_str(literal).unwrap_or_default(),
        }
    };

    let image_url = raw
        .get_str(IMAGE_URL)
        .or_else(|| raw.get_str(IMAGE))
        .filter(|url| !url.is_empty());

    NormalizedNotification {
        title: resolve(TITLE, TITLE_KEY, TITLE_ARGS),
        body: resolve(BODY, BODY_KEY, BODY_ARGS),
        image_url,
        display: DisplayOptions {
            sound: raw.get_str(SOUND).filter(|s| !s.is_empty()),
            icon: raw.get_str(ICON).filter(|s| !s.is_empty()),
            priority: raw.get_str(PRIORITY).as_deref().and_then(Priority::parse),
            channel_id: raw.get_str(CHANNEL_ID).filter(|s| !s.is_empty()),
        },
        data: raw.application_data(),
    }
}

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key) || RESERVED_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Strings pass through, numbers and booleans are stringified, the rest is dropped
pub(crate) fn primitive_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
