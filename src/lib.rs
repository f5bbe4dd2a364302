//! Cross-platform push-notification plugin core
//!
//! Exposes push registration, token retrieval and notification delivery to an
//! application framework through a small method-call surface plus events.
//! Platform targets plug in behind [`PlatformAdapter`]; everything else
//! (payload normalization, localization, presentation defaults, cold-start
//! recovery of clicked notifications, token bookkeeping) is shared.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use url::Url;

pub mod backends;
pub mod components;

pub use backends::{FileTokenSlot, MemoryAdapter, PlatformAdapterFactory, PromptBehavior};
pub use components::*;

/// Permission kinds asked for when a registration call names none
const DEFAULT_PERMISSION_KINDS: &[PermissionKind] = &[
    PermissionKind::Alert,
    PermissionKind::Badge,
    PermissionKind::Sound,
];

/// Plugin instances between attach and detach in this process
static LIVE_ATTACHMENTS: AtomicUsize = AtomicUsize::new(0);

/// Builder for [`NativePushPlugin`]
pub struct NativePushPluginBuilder {
    adapter: Arc<dyn PlatformAdapter>,
    sink: Option<Arc<dyn EventSink>>,
    config: Option<PushConfig>,
    initial_notification: Option<HashMap<String, String>>,
}

impl NativePushPluginBuilder {
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Configure up front instead of through the `initialize` call
    pub fn config(mut self, config: PushConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Data of the notification whose tap launched the app
    pub fn initial_notification(mut self, data: HashMap<String, String>) -> Self {
        self.initial_notification = Some(data);
        self
    }

    pub fn build(self) -> NativePushPlugin {
        let inbox = match self.initial_notification {
            Some(data) => RecoveryInbox::with_payload(data),
            None => RecoveryInbox::new(),
        };
        NativePushPlugin {
            tokens: TokenStore::new(self.adapter.clone()),
            adapter: self.adapter,
            sink: RwLock::new(self.sink),
            config: RwLock::new(self.config),
            lifecycle: Mutex::new(AdapterLifecycle::new()),
            permissions: PermissionGate::new(),
            inbox,
        }
    }
}

/// One plugin instance per host attachment
pub struct NativePushPlugin {
    adapter: Arc<dyn PlatformAdapter>,
    sink: RwLock<Option<Arc<dyn EventSink>>>,
    config: RwLock<Option<PushConfig>>,
    lifecycle: Mutex<AdapterLifecycle>,
    tokens: TokenStore,
    permissions: PermissionGate,
    inbox: RecoveryInbox,
}

impl NativePushPlugin {
    pub fn builder(adapter: Arc<dyn PlatformAdapter>) -> NativePushPluginBuilder {
        NativePushPluginBuilder {
            adapter,
            sink: None,
            config: None,
            initial_notification: None,
        }
    }

    pub fn platform(&self) -> Platform {
        self.adapter.platform()
    }

    pub fn state(&self) -> AdapterState {
        self.lifecycle.lock().state
    }

    pub fn is_initialized(&self) -> bool {
        self.config.read().is_some()
    }

    /// Host attached the plugin to its engine. Calls are rejected with
    /// [`PushError::NotAttached`] until then.
    pub fn attach(&self) -> PushResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        let was_live = lifecycle.state.is_live();
        lifecycle.transition_to(AdapterState::Attached)?;
        if !was_live {
            LIVE_ATTACHMENTS.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Host UI came to the foreground
    pub fn activate(&self) -> PushResult<()> {
        self.lifecycle.lock().transition_to(AdapterState::Active)
    }

    pub fn background(&self) -> PushResult<()> {
        self.lifecycle.lock().transition_to(AdapterState::Backgrounded)
    }

    /// Host detached the plugin. The event sink is released; later calls
    /// fail with [`PushError::Detached`]. Cached images are removed once the
    /// last attached instance in the process is gone.
    pub fn detach(&self) -> PushResult<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == AdapterState::Detached {
                return Ok(());
            }
            lifecycle.transition_to(AdapterState::Detached)?;
        }
        self.sink.write().take();
        // A registration still waiting on a prompt resolves as denied
        self.permissions.cancel(NOTIFICATION_PERMISSION_REQUEST_CODE);
        release_attachment();
        tracing::debug!(platform = %self.platform(), "Plugin detached");
        Ok(())
    }

    /// Serve one call from the application layer
    pub async fn handle(&self, call: MethodCall) -> MethodResult {
        match self.dispatch(&call).await {
            Ok(value) => MethodResult::Success(value),
            Err(PushError::UnsupportedMethod(method)) => {
                tracing::debug!(method = %method, "Unsupported method");
                MethodResult::NotImplemented
            },
            Err(e) => {
                tracing::warn!(method = %call.method, error = %e, "Method call failed");
                e.into()
            },
        }
    }

    async fn dispatch(&self, call: &MethodCall) -> PushResult<Value> {
        let state = self.state();
        if !state.is_live() {
            return Err(match state {
                AdapterState::Detached => PushError::Detached,
                _ => PushError::NotAttached,
            });
        }

        match call.method.as_str() {
            methods::INITIALIZE => {
                self.initialize(&call.arguments)?;
                Ok(Value::Null)
            },
            methods::GET_INITIAL_NOTIFICATION => Ok(self
                .initial_notification()?
                .map(|data| serde_json::json!(data))
                .unwrap_or(Value::Null)),
            methods::REGISTER_FOR_REMOTE_NOTIFICATION => {
                let kinds = parse_permission_kinds(&call.arguments)?;
                Ok(Value::Bool(self.register_for_remote_notification(&kinds).await?))
            },
            methods::GET_NOTIFICATION_TOKEN => Ok(self
                .tokens
                .load()
                .await?
                .map(|token| token.to_value())
                .unwrap_or(Value::Null)),
            other => Err(PushError::UnsupportedMethod(other.to_string())),
        }
    }

    /// Apply the configuration once; later calls keep the first one
    pub fn initialize(&self, arguments: &Value) -> PushResult<()> {
        let mut config = self.config.write();
        if config.is_some() {
            tracing::debug!("Already initialized, ignoring configuration");
            return Ok(());
        }
        let parsed = PushConfig::from_value(arguments)?;
        if let Some(firebase) = &parsed.firebase_options {
            tracing::debug!(application_id = %firebase.application_id, "Firebase options supplied");
        }
        *config = Some(parsed);
        tracing::debug!(platform = %self.adapter.platform(), "Plugin initialized");
        Ok(())
    }

    /// Payload of the notification that started this session, handed out once
    pub fn initial_notification(&self) -> PushResult<Option<HashMap<String, String>>> {
        let mut path = DeliveryPath::new(NotificationId::generate());
        path.transition_to(DeliveryState::ClientStart)?;
        let Some(data) = self.inbox.take() else {
            return Ok(None);
        };
        path.transition_to(DeliveryState::Decoded)?;
        path.transition_to(DeliveryState::DeliveredOnce)?;
        tracing::debug!(keys = data.len(), "Initial notification delivered");
        Ok(Some(data))
    }

    /// Ask for notification permission. `Ok(false)` means denied, never an error.
    pub async fn register_for_remote_notification(
        &self,
        kinds: &[PermissionKind],
    ) -> PushResult<bool> {
        let kinds = if kinds.is_empty() {
            DEFAULT_PERMISSION_KINDS
        } else {
            kinds
        };

        let pending = self.permissions.register(NOTIFICATION_PERMISSION_REQUEST_CODE)?;
        let outcome = match self.adapter.request_permission(kinds).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.permissions.cancel(pending.request_code());
                return Err(e);
            },
        };

        let granted = match outcome {
            PermissionOutcome::Granted => {
                self.permissions.cancel(pending.request_code());
                true
            },
            PermissionOutcome::Denied => {
                self.permissions.cancel(pending.request_code());
                false
            },
            PermissionOutcome::Pending { request_code }
                if request_code != pending.request_code() =>
            {
                // The host answers under its own code, which no slot waits on
                tracing::warn!(
                    expected = pending.request_code(),
                    actual = request_code,
                    "Prompt reported under an unexpected request code"
                );
                self.permissions.cancel(pending.request_code());
                false
            },
            PermissionOutcome::Pending { .. } => pending.wait().await,
        };
        tracing::info!(platform = %self.adapter.platform(), granted, "Notification permission");
        Ok(granted)
    }

    /// Host callback with the answer to a permission prompt
    pub fn on_permission_result(&self, request_code: i32, granted: bool) -> bool {
        self.permissions.resolve(request_code, granted)
    }

    /// Host callback for a fresh registration token
    pub async fn on_new_token(&self, token: RegistrationToken) -> PushResult<()> {
        self.tokens.save(&token).await?;
        self.emit(PushEvent::NewNotificationToken(token));
        Ok(())
    }

    /// Host callback for a tapped notification while the app is running
    pub fn on_notification_tapped(&self, data: HashMap<String, String>) {
        if data.is_empty() {
            return;
        }
        if self.sink.read().is_none() {
            // Nobody listens yet; keep it for getInitialNotification
            self.inbox.offer_payload(data);
            return;
        }
        self.emit(PushEvent::NewNotification(data));
    }

    /// Message posted by a background worker to this live client
    pub fn on_client_message(&self, message: &Value) -> bool {
        if message.get("type").and_then(Value::as_str) != Some(methods::CLIENT_MESSAGE_TYPE) {
            return false;
        }
        let Some(Value::Object(data)) = message.get("data") else {
            return false;
        };
        let data = data
            .iter()
            .filter_map(|(key, value)| {
                components::payload::primitive_to_string(value).map(|v| (key.clone(), v))
            })
            .collect();
        self.emit(PushEvent::NewNotification(data));
        true
    }

    /// Start of a client session. Takes the recovery token out of the start
    /// URL and returns the URL the host should show instead.
    pub fn client_start(&self, url: &Url) -> Url {
        self.inbox.offer_url(url)
    }

    /// Native cold start: the launching notification's data
    pub fn set_initial_notification(&self, data: HashMap<String, String>) -> bool {
        self.inbox.offer_payload(data)
    }

    /// Native cold start from the raw launch extras, see [`initial_from_extras`]
    pub fn set_initial_notification_from_extras(&self, extras: &Map<String, Value>) -> bool {
        let data = initial_from_extras(extras);
        if data.is_empty() {
            return false;
        }
        self.set_initial_notification(data)
    }

    /// Normalize with the configured locales and translations
    pub fn normalize(&self, payload: &PushPayload) -> NormalizedNotification {
        self.current_config().normalizer().normalize(payload)
    }

    /// Background worker for the Web target, built from the configured
    /// locales, presentation defaults and `startUrl`
    pub fn service_worker(&self, clients: Arc<dyn ClientHost>) -> PushResult<ServiceWorker> {
        let config = self.current_config();
        let Some(start_url) = config.start_url.clone() else {
            return Err(PushError::InvalidArguments {
                method: methods::INITIALIZE.to_string(),
                message: "startUrl is required for the background worker".to_string(),
            });
        };
        let presenter = NotificationPresenter::new(self.adapter.clone(), config.effective_presentation());
        Ok(ServiceWorker::new(config.normalizer(), presenter, clients, start_url))
    }

    /// Foreground or background push: normalize and show it
    pub async fn present_push(&self, payload: &PushPayload) -> PushResult<DeliveryReceipt> {
        let config = self.current_config();
        let notification = config.normalizer().normalize(payload);
        let presenter = NotificationPresenter::new(self.adapter.clone(), config.effective_presentation());
        presenter.present(&notification).await
    }

    fn current_config(&self) -> PushConfig {
        self.config.read().clone().unwrap_or_default()
    }

    fn emit(&self, event: PushEvent) {
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink.emit(event),
            None => tracing::debug!(method = event.method(), "No event sink attached"),
        }
    }
}

impl Drop for NativePushPlugin {
    fn drop(&mut self) {
        if self.lifecycle.get_mut().state.is_live() {
            release_attachment();
        }
    }
}

fn release_attachment() {
    if LIVE_ATTACHMENTS.fetch_sub(1, Ordering::SeqCst) == 1 {
        backends::image_utils::cleanup_all_cached_images();
    }
}

fn parse_permission_kinds(arguments: &Value) -> PushResult<Vec<PermissionKind>> {
    let names = match arguments {
        Value::Null => return Ok(Vec::new()),
        Value::Array(names) => names,
        Value::Object(map) => match map.get("options") {
            Some(Value::Array(names)) => names,
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(_) => return Err(invalid_kinds()),
        },
        _ => return Err(invalid_kinds()),
    };
    Ok(names
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|name| {
            let kind = PermissionKind::parse(name);
            if kind.is_none() {
                tracing::debug!(name, "Ignoring unknown permission kind");
            }
            kind
        })
        .collect())
}

fn invalid_kinds() -> PushError {
    PushError::InvalidArguments {
        method: methods::REGISTER_FOR_REMOTE_NOTIFICATION.to_string(),
        message: "expected a list of permission kinds".to_string(),
    }
}
