// Method-channel surface shared with the application layer
// Calls come in by name with a JSON argument value; events go out through an
// injected sink that lives exactly as long as the plugin attachment

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use super::PushError;
use super::token::RegistrationToken;

/// Method and event names on the wire
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const GET_INITIAL_NOTIFICATION: &str = "getInitialNotification";
    pub const REGISTER_FOR_REMOTE_NOTIFICATION: &str = "registerForRemoteNotification";
    pub const GET_NOTIFICATION_TOKEN: &str = "getNotificationToken";

    pub const NEW_NOTIFICATION_TOKEN: &str = "newNotificationToken";
    pub const NEW_NOTIFICATION: &str = "newNotification";

    /// Error code attached to every failed call
    pub const ERROR_CODE: &str = "native_push_error";

    /// Message type a background worker posts to a live client
    pub const CLIENT_MESSAGE_TYPE: &str = "native_push_newNotification";
}

/// Incoming call from the application layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    pub fn without_arguments(method: impl Into<String>) -> Self {
        Self::new(method, Value::Null)
    }
}

/// Reply to a method call
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResult {
    Success(Value),
    /// The method name is unknown to this plugin
    NotImplemented,
    Error {
        code: String,
        message: Option<String>,
        details: Option<Value>,
    },
}

impl MethodResult {
    pub fn success(value: impl Into<Value>) -> Self {
        MethodResult::Success(value.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MethodResult::Success(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            MethodResult::Success(value) => Some(value),
            _ => None,
        }
    }
}

impl From<PushError> for MethodResult {
    fn from(error: PushError) -> Self {
        match error {
            PushError::UnsupportedMethod(_) => MethodResult::NotImplemented,
            error => {
                let cause = std::error::Error::source(&error).map(|source| source.to_string());
                MethodResult::Error {
                    code: methods::ERROR_CODE.to_string(),
                    message: Some(error.to_string()),
                    details: Some(serde_json::json!({
                        "kind": error.code(),
                        "cause": cause,
                    })),
                }
            },
        }
    }
}

/// Events pushed to the application layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    NewNotificationToken(RegistrationToken),
    NewNotification(HashMap<String, String>),
}

impl PushEvent {
    /// Wire method name of the event
    pub fn method(&self) -> &'static str {
        match self {
            PushEvent::NewNotificationToken(_) => methods::NEW_NOTIFICATION_TOKEN,
            PushEvent::NewNotification(_) => methods::NEW_NOTIFICATION,
        }
    }

    pub fn arguments(&self) -> Value {
        match self {
            PushEvent::NewNotificationToken(token) => token.to_value(),
            PushEvent::NewNotification(data) => serde_json::json!(data),
        }
    }

    pub fn into_call(self) -> MethodCall {
        MethodCall::new(self.method(), self.arguments())
    }
}

/// Receiver of plugin events, injected at attach time
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PushEvent);
}

/// Sink forwarding events into a tokio channel the host drains
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<PushEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PushEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: PushEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Event receiver dropped, discarding push event");
        }
    }
}
