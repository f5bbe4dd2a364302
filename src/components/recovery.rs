// Cold-start delivery recovery
// A clicked notification with no live client is carried to the next client
// start inside a URL fragment, then handed to the application exactly once

use std::collections::{BTreeMap, HashMap};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use super::payload::{PushPayload, primitive_to_string};
use super::{PushError, PushResult};

/// base64url (no padding) of the canonical JSON text of a data map
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecoveryToken(String);

impl RecoveryToken {
    /// Wrap text taken from a fragment or intent extra; validity is checked on decode
    pub fn from_string(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RecoveryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode a data map. Keys are sorted so equal maps give equal tokens.
pub fn encode(data: &HashMap<String, String>) -> PushResult<RecoveryToken> {
    let canonical: BTreeMap<&str, &str> = data
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let json = serde_json::to_string(&canonical)?;
    Ok(RecoveryToken(URL_SAFE_NO_PAD.encode(json.as_bytes())))
}

/// Decode a token back into its data map.
///
/// Trailing `=` padding is tolerated; the standard `+`/`/` alphabet is not.
pub fn decode(token: &RecoveryToken) -> PushResult<HashMap<String, String>> {
    let text = token.as_str().trim().trim_end_matches('=');
    if text.len() % 4 == 1 {
        return Err(PushError::malformed("length is not a valid base64 length"));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(text)
        .map_err(|e| PushError::malformed(format!("invalid base64url: {}", e)))?;
    let json = std::str::from_utf8(&bytes)
        .map_err(|e| PushError::malformed(format!("payload is not UTF-8: {}", e)))?;

    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map
            .iter()
            .filter_map(|(k, v)| primitive_to_string(v).map(|v| (k.clone(), v)))
            .collect()),
        Ok(other) => Err(PushError::malformed(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(PushError::malformed(format!("invalid JSON: {}", e))),
    }
}

/// URL the background process opens for a new client, e.g. `https://app.example/#eyJhIjoiYiJ9`
pub fn recovery_url(base: &Url, token: &RecoveryToken) -> Url {
    let mut url = base.clone();
    url.set_fragment(Some(token.as_str()));
    url
}

/// Split a recovery token off a start URL.
///
/// Returns the URL with its fragment removed, so a refresh cannot redeliver
/// the same payload, together with the token. A fragment that does not decode
/// (an app route such as `#/settings`) is no token and the URL is kept whole.
pub fn take_from_url(url: &Url) -> (Url, Option<RecoveryToken>) {
    match split_recovery_fragment(url) {
        Some((stripped, token, _)) => (stripped, Some(token)),
        None => (url.clone(), None),
    }
}

fn split_recovery_fragment(url: &Url) -> Option<(Url, RecoveryToken, HashMap<String, String>)> {
    let token = url
        .fragment()
        .filter(|fragment| !fragment.is_empty())
        .map(RecoveryToken::from_string)?;
    let data = match decode(&token) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(error = %e, "Start URL fragment is not a recovery token");
            return None;
        },
    };
    let mut stripped = url.clone();
    stripped.set_fragment(None);
    Some((stripped, token, data))
}

/// Launch extra in which a locally shown notification carries its data as JSON text
pub const INITIAL_DATA_EXTRA: &str = "native_push_data";

/// Data of the notification that launched the app, read from the launch extras.
///
/// A notification the plugin showed itself carries its data as JSON text under
/// [`INITIAL_DATA_EXTRA`]. One shown by the transport has its data directly in
/// the extras, mixed with transport-internal keys that are filtered out.
pub fn initial_from_extras(extras: &Map<String, Value>) -> HashMap<String, String> {
    let Some(encoded) = extras.get(INITIAL_DATA_EXTRA) else {
        return PushPayload::from(extras.clone()).application_data();
    };
    let parsed = match encoded {
        Value::String(text) => serde_json::from_str::<Value>(text).ok(),
        other => Some(other.clone()),
    };
    match parsed {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| primitive_to_string(v).map(|v| (k.clone(), v)))
            .collect(),
        _ => {
            tracing::warn!(extra = INITIAL_DATA_EXTRA, "Launch data is not a JSON object");
            HashMap::new()
        },
    }
}

/// One-shot holder of the initial notification of a client session
#[derive(Debug, Default)]
pub struct RecoveryInbox {
    slot: Mutex<InboxSlot>,
}

#[derive(Debug, Default)]
enum InboxSlot {
    #[default]
    Empty,
    Pending(HashMap<String, String>),
    Consumed,
}

impl RecoveryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inbox pre-filled with an already decoded payload (native cold start)
    pub fn with_payload(data: HashMap<String, String>) -> Self {
        Self {
            slot: Mutex::new(InboxSlot::Pending(data)),
        }
    }

    /// Decode `token` into the inbox. A malformed token leaves the inbox empty.
    ///
    /// Only the first offer of a session is accepted; later offers are ignored
    /// and return `false`.
    pub fn offer(&self, token: &RecoveryToken) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(*slot, InboxSlot::Empty) {
            tracing::debug!("Ignoring recovery token, inbox already used this session");
            return false;
        }

        match decode(token) {
            Ok(data) => {
                *slot = InboxSlot::Pending(data);
                true
            },
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable recovery token");
                false
            },
        }
    }

    /// Place an already decoded payload, e.g. the data of the notification
    /// that launched the app. Same first-offer-wins rule as [`Self::offer`].
    pub fn offer_payload(&self, data: HashMap<String, String>) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(*slot, InboxSlot::Empty) {
            return false;
        }
        *slot = InboxSlot::Pending(data);
        true
    }

    /// Strip a recovery token from a start URL and offer its payload.
    ///
    /// Returns the URL the host should replace its location with. A URL
    /// without a decodable token comes back unchanged and the inbox stays open.
    pub fn offer_url(&self, url: &Url) -> Url {
        match split_recovery_fragment(url) {
            Some((stripped, _, data)) => {
                if !self.offer_payload(data) {
                    tracing::debug!("Ignoring recovery token, inbox already used this session");
                }
                stripped
            },
            None => url.clone(),
        }
    }

    /// Hand out the payload once; every later call returns `None`
    pub fn take(&self) -> Option<HashMap<String, String>> {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, InboxSlot::Consumed) {
            InboxSlot::Pending(data) => Some(data),
            InboxSlot::Empty | InboxSlot::Consumed => None,
        }
    }

    pub fn has_pending(&self) -> bool {
        matches!(*self.slot.lock(), InboxSlot::Pending(_))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
