//! Tests for components/service_worker.rs

use std::collections::HashMap;
use std::sync::Arc;

use native_push::backends::MemoryAdapter;
use native_push::components::config::PresentationConfig;
use native_push::components::lifecycle::DeliveryState;
use native_push::components::payload::{Normalizer, PushPayload};
use native_push::components::platform::AdapterFuture;
use native_push::components::presenter::NotificationPresenter;
use native_push::components::recovery;
use native_push::components::service_worker::*;
use native_push::components::{NotificationId, Platform, methods};
use parking_lot::Mutex;
use serde_json::{Value, json};
use url::Url;

#[derive(Default)]
struct FakeClients {
    live: Mutex<usize>,
    posted: Mutex<Vec<Value>>,
    opened: Mutex<Vec<Url>>,
    claimed: Mutex<bool>,
}

impl ClientHost for FakeClients {
    fn window_clients(&self) -> AdapterFuture<'_, usize> {
        Box::pin(async move { Ok(*self.live.lock()) })
    }

    fn focus_and_post<'a>(&'a self, message: &'a Value) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            self.posted.lock().push(message.clone());
            Ok(())
        })
    }

    fn open_window<'a>(&'a self, url: &'a Url) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            self.opened.lock().push(url.clone());
            Ok(())
        })
    }

    fn claim_clients(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async move {
            *self.claimed.lock() = true;
            Ok(())
        })
    }
}

fn worker() -> (ServiceWorker, Arc<FakeClients>, Arc<MemoryAdapter>) {
    let adapter = Arc::new(MemoryAdapter::new(Platform::Web));
    let clients = Arc::new(FakeClients::default());
    let worker = ServiceWorker::new(
        Normalizer::default(),
        NotificationPresenter::new(adapter.clone(), PresentationConfig::default()),
        clients.clone(),
        Url::parse("https://app.example/").expect("valid url"),
    );
    (worker, clients, adapter)
}

fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_install_then_activate() -> anyhow::Result<()> {
    let (worker, clients, _) = worker();
    assert_eq!(worker.phase(), WorkerPhase::Installing);

    worker.on_install().await?;
    assert_eq!(worker.phase(), WorkerPhase::Installed);

    worker.on_activate().await?;
    assert_eq!(worker.phase(), WorkerPhase::Activated);
    assert!(*clients.claimed.lock());
    Ok(())
}

#[tokio::test]
async fn test_push_is_presented_and_awaits_click() -> anyhow::Result<()> {
    let (worker, _, adapter) = worker();

    let path = worker
        .on_push(&PushPayload::new().with("title", "New message").with("chat", "7"))
        .await?;

    assert_eq!(
        path.visited(),
        vec![
            DeliveryState::Idle,
            DeliveryState::PushReceived,
            DeliveryState::Normalized,
            DeliveryState::Presented,
            DeliveryState::AwaitingClick,
        ]
    );
    assert_eq!(worker.awaiting_click(), 1);
    let presented = adapter.presented();
    assert_eq!(presented[0].notification_id, path.notification_id);
    assert_eq!(presented[0].data, data(&[("chat", "7")]));
    Ok(())
}

#[tokio::test]
async fn test_data_less_push_does_not_wait_for_click() -> anyhow::Result<()> {
    let (worker, _, _) = worker();

    let path = worker.on_push(&PushPayload::new().with("title", "FYI")).await?;

    assert_eq!(path.state, DeliveryState::Presented);
    assert_eq!(worker.awaiting_click(), 0);
    Ok(())
}

#[tokio::test]
async fn test_click_with_live_client_posts_typed_message() -> anyhow::Result<()> {
    let (worker, clients, _) = worker();
    *clients.live.lock() = 2;
    let path = worker
        .on_push(&PushPayload::new().with("title", "Hi").with("a", "b"))
        .await?;

    let outcome = worker
        .on_notification_click(path.notification_id, &data(&[("a", "b")]))
        .await?;

    assert_eq!(outcome, ClickOutcome::DeliveredToLiveClient);
    assert_eq!(
        clients.posted.lock().as_slice(),
        &[json!({"type": methods::CLIENT_MESSAGE_TYPE, "data": {"a": "b"}})]
    );
    assert!(clients.opened.lock().is_empty());
    assert_eq!(worker.awaiting_click(), 0);
    Ok(())
}

#[tokio::test]
async fn test_click_without_client_opens_recovery_url() -> anyhow::Result<()> {
    let (worker, clients, _) = worker();
    let path = worker
        .on_push(&PushPayload::new().with("title", "Hi").with("a", "b"))
        .await?;

    let outcome = worker
        .on_notification_click(path.notification_id, &data(&[("a", "b")]))
        .await?;

    let ClickOutcome::EncodedForNewClient { url, token } = outcome else {
        panic!("expected an encoded click, got {outcome:?}");
    };
    assert_eq!(url.as_str(), "https://app.example/#eyJhIjoiYiJ9");
    assert_eq!(recovery::decode(&token)?, data(&[("a", "b")]));
    assert_eq!(clients.opened.lock().as_slice(), &[url]);
    Ok(())
}

#[tokio::test]
async fn test_click_after_worker_restart() -> anyhow::Result<()> {
    let (worker, clients, _) = worker();

    let outcome = worker
        .on_notification_click(NotificationId::generate(), &data(&[("k", "v")]))
        .await?;

    assert!(matches!(outcome, ClickOutcome::EncodedForNewClient { .. }));
    assert_eq!(clients.opened.lock().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_click_without_data_is_ignored() -> anyhow::Result<()> {
    let (worker, clients, _) = worker();

    let outcome = worker
        .on_notification_click(NotificationId::generate(), &HashMap::new())
        .await?;

    assert_eq!(outcome, ClickOutcome::Ignored);
    assert!(clients.opened.lock().is_empty());
    assert!(clients.posted.lock().is_empty());
    Ok(())
}
