// Registration token model and store

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::platform::PlatformAdapter;
use super::PushResult;

/// Web Push subscription as returned by `PushManager.subscribe`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WebPushSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

/// Identifier a server uses to reach this installation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistrationToken {
    WebPush(WebPushSubscription),
    /// FCM token, or hex form of an APNs device token
    Device(String),
}

impl RegistrationToken {
    pub fn device(token: impl Into<String>) -> Self {
        RegistrationToken::Device(token.into())
    }

    /// Lower-case hex of raw APNs device token bytes
    pub fn from_device_bytes(bytes: &[u8]) -> Self {
        let hex = bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>();
        RegistrationToken::Device(hex)
    }

    pub fn web_push(
        endpoint: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        RegistrationToken::WebPush(WebPushSubscription {
            endpoint: endpoint.into(),
            p256dh: p256dh.into(),
            auth: auth.into(),
        })
    }

    /// Form written to the durable slot: device tokens verbatim, subscriptions as JSON
    pub fn to_storage_string(&self) -> PushResult<String> {
        match self {
            RegistrationToken::Device(token) => Ok(token.clone()),
            RegistrationToken::WebPush(subscription) => Ok(serde_json::to_string(subscription)?),
        }
    }

    pub fn from_storage_string(stored: &str) -> PushResult<Self> {
        if stored.trim_start().starts_with('{') {
            Ok(RegistrationToken::WebPush(serde_json::from_str(stored)?))
        } else {
            Ok(RegistrationToken::Device(stored.to_string()))
        }
    }

    /// Shape returned over the method channel
    pub fn to_value(&self) -> Value {
        match self {
            RegistrationToken::Device(token) => Value::String(token.clone()),
            RegistrationToken::WebPush(subscription) => serde_json::json!({
                "endpoint": subscription.endpoint,
                "p256dh": subscription.p256dh,
                "auth": subscription.auth,
            }),
        }
    }
}

impl std::fmt::Display for RegistrationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationToken::Device(token) => f.write_str(token),
            RegistrationToken::WebPush(subscription) => f.write_str(&subscription.endpoint),
        }
    }
}

/// Last-write-wins register over the adapter's durable token slot
pub struct TokenStore {
    adapter: Arc<dyn PlatformAdapter>,
    cached: RwLock<Option<RegistrationToken>>,
    writes: tokio::sync::Mutex<()>,
}

impl TokenStore {
    pub fn new(adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self {
            adapter,
            cached: RwLock::new(None),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Store `token`. Returns `false` when it equals the current value and
    /// nothing was written.
    pub async fn save(&self, token: &RegistrationToken) -> PushResult<bool> {
        let _write = self.writes.lock().await;
        let unchanged = self.cached.read().as_ref() == Some(token);
        if unchanged {
            return Ok(false);
        }

        let stored = token.to_storage_string()?;
        self.adapter.persist_token(&stored).await?;
        *self.cached.write() = Some(token.clone());
        tracing::debug!(platform = %self.adapter.platform(), "Registration token saved");
        Ok(true)
    }

    /// Current token, or `None` if the installation never registered
    pub async fn load(&self) -> PushResult<Option<RegistrationToken>> {
        let cached = self.cached.read().clone();
        if let Some(token) = cached {
            return Ok(Some(token));
        }

        let _write = self.writes.lock().await;
        // A save may have landed while we waited for the lock
        let cached = self.cached.read().clone();
        if let Some(token) = cached {
            return Ok(Some(token));
        }

        let token = match self.adapter.read_token().await? {
            Some(stored) if !stored.is_empty() => {
                Some(RegistrationToken::from_storage_string(&stored)?)
            },
            _ => None,
        };
        if let Some(token) = &token {
            *self.cached.write() = Some(token.clone());
        }
        Ok(token)
    }
}
