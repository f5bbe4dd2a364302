// Background push worker for the Web target
// Install -> activate -> push -> click, with clicks routed either to a live
// window or, when none exists, into the start URL of a new one

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{Value, json};
use url::Url;

use super::channel::methods;
use super::lifecycle::{DeliveryPath, DeliveryState};
use super::payload::{Normalizer, PushPayload};
use super::platform::AdapterFuture;
use super::presenter::NotificationPresenter;
use super::recovery::{self, RecoveryToken};
use super::{NotificationId, PushResult};

/// Window clients controlled by the worker
pub trait ClientHost: Send + Sync {
    /// Number of open window clients
    fn window_clients(&self) -> AdapterFuture<'_, usize>;

    /// Focus the first window client and post `message` to it
    fn focus_and_post<'a>(&'a self, message: &'a Value) -> AdapterFuture<'a, ()>;

    fn open_window<'a>(&'a self, url: &'a Url) -> AdapterFuture<'a, ()>;

    /// Activate a freshly installed worker without waiting for old clients to close
    fn skip_waiting(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Take control of already open clients
    fn claim_clients(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// Installation phase of the worker script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerPhase {
    #[default]
    Installing,
    Installed,
    Activated,
}

/// Where a click ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The notification carried no data
    Ignored,
    DeliveredToLiveClient,
    EncodedForNewClient { url: Url, token: RecoveryToken },
}

pub struct ServiceWorker {
    normalizer: Normalizer,
    presenter: NotificationPresenter,
    clients: Arc<dyn ClientHost>,
    start_url: Url,
    phase: Mutex<WorkerPhase>,
    paths: DashMap<NotificationId, DeliveryPath>,
}

impl ServiceWorker {
    pub fn new(
        normalizer: Normalizer,
        presenter: NotificationPresenter,
        clients: Arc<dyn ClientHost>,
        start_url: Url,
    ) -> Self {
        Self {
            normalizer,
            presenter,
            clients,
            start_url,
            phase: Mutex::new(WorkerPhase::Installing),
            paths: DashMap::new(),
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        *self.phase.lock()
    }

    pub async fn on_install(&self) -> PushResult<()> {
        self.clients.skip_waiting().await?;
        *self.phase.lock() = WorkerPhase::Installed;
        Ok(())
    }

    pub async fn on_activate(&self) -> PushResult<()> {
        self.clients.claim_clients().await?;
        *self.phase.lock() = WorkerPhase::Activated;
        Ok(())
    }

    /// Handle one push message: normalize, present, then wait for a click
    /// when there is data to hand over
    pub async fn on_push(&self, payload: &PushPayload) -> PushResult<DeliveryPath> {
        let notification = self.normalizer.normalize(payload);
        let request = self.presenter.prepare(&notification);
        let mut path = DeliveryPath::new(request.notification_id);
        path.transition_to(DeliveryState::PushReceived)?;
        path.transition_to(DeliveryState::Normalized)?;

        self.presenter.present_prepared(request).await?;
        path.transition_to(DeliveryState::Presented)?;

        if !notification.data.is_empty() {
            path.transition_to(DeliveryState::AwaitingClick)?;
            self.paths.insert(path.notification_id, path.clone());
        }
        Ok(path)
    }

    /// Handle a click on a shown notification carrying `data`
    pub async fn on_notification_click(
        &self,
        notification_id: NotificationId,
        data: &HashMap<String, String>,
    ) -> PushResult<ClickOutcome> {
        if data.is_empty() {
            self.paths.remove(&notification_id);
            return Ok(ClickOutcome::Ignored);
        }

        // The worker may have been restarted since the push; its paths are gone then
        let mut path = self
            .paths
            .remove(&notification_id)
            .map(|(_, path)| path)
            .unwrap_or_else(|| DeliveryPath::awaiting_click(notification_id));
        path.transition_to(DeliveryState::Clicked)?;

        if self.clients.window_clients().await? > 0 {
            let message = json!({
                "type": methods::CLIENT_MESSAGE_TYPE,
                "data": data,
            });
            self.clients.focus_and_post(&message).await?;
            path.transition_to(DeliveryState::DeliveredToLiveClient)?;
            tracing::debug!(%notification_id, "Click delivered to live client");
            return Ok(ClickOutcome::DeliveredToLiveClient);
        }

        let token = recovery::encode(data)?;
        let url = recovery::recovery_url(&self.start_url, &token);
        self.clients.open_window(&url).await?;
        path.transition_to(DeliveryState::EncodedForNewClient)?;
        tracing::debug!(%notification_id, "Click encoded for a new client");
        Ok(ClickOutcome::EncodedForNewClient { url, token })
    }

    /// Notifications currently waiting for a click
    pub fn awaiting_click(&self) -> usize {
        self.paths.len()
    }
}
