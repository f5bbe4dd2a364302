//! Tests for components/token.rs

use std::sync::Arc;

use native_push::backends::{FileTokenSlot, MemoryAdapter};
use native_push::components::Platform;
use native_push::components::token::*;
use serde_json::json;

#[tokio::test]
async fn test_load_before_save_is_none() -> anyhow::Result<()> {
    let store = TokenStore::new(Arc::new(MemoryAdapter::new(Platform::Android)));
    assert_eq!(store.load().await?, None);
    Ok(())
}

#[tokio::test]
async fn test_last_save_wins() -> anyhow::Result<()> {
    let store = TokenStore::new(Arc::new(MemoryAdapter::new(Platform::Android)));

    assert!(store.save(&RegistrationToken::device("first")).await?);
    assert!(store.save(&RegistrationToken::device("second")).await?);

    assert_eq!(store.load().await?, Some(RegistrationToken::device("second")));
    Ok(())
}

#[tokio::test]
async fn test_unchanged_save_is_noop() -> anyhow::Result<()> {
    let store = TokenStore::new(Arc::new(MemoryAdapter::new(Platform::IOs)));
    let token = RegistrationToken::from_device_bytes(&[0xde, 0xad, 0xbe, 0xef]);

    assert!(store.save(&token).await?);
    assert!(!store.save(&token).await?);
    Ok(())
}

#[tokio::test]
async fn test_token_survives_restart_through_file_slot() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let subscription = RegistrationToken::web_push("https://push.example/abc", "key", "secret");

    let first = TokenStore::new(Arc::new(
        MemoryAdapter::new(Platform::Web).with_token_slot(FileTokenSlot::in_dir(dir.path())),
    ));
    first.save(&subscription).await?;

    let restarted = TokenStore::new(Arc::new(
        MemoryAdapter::new(Platform::Web).with_token_slot(FileTokenSlot::in_dir(dir.path())),
    ));
    assert_eq!(restarted.load().await?, Some(subscription));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_saves_leave_one_winner() -> anyhow::Result<()> {
    let store = Arc::new(TokenStore::new(Arc::new(MemoryAdapter::new(Platform::Android))));

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.save(&RegistrationToken::device(format!("token-{i}"))).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let loaded = store.load().await?.expect("a token was saved");
    assert!(loaded.to_string().starts_with("token-"));
    Ok(())
}

#[test]
fn test_device_bytes_are_lower_hex() {
    let token = RegistrationToken::from_device_bytes(&[0x00, 0x0f, 0xab, 0xff]);
    assert_eq!(token, RegistrationToken::device("000fabff"));
}

#[test]
fn test_storage_string_forms() -> anyhow::Result<()> {
    let device = RegistrationToken::device("fcm:abc");
    assert_eq!(device.to_storage_string()?, "fcm:abc");
    assert_eq!(RegistrationToken::from_storage_string("fcm:abc")?, device);

    let web = RegistrationToken::web_push("https://push.example/1", "p", "a");
    let stored = web.to_storage_string()?;
    assert_eq!(RegistrationToken::from_storage_string(&stored)?, web);
    Ok(())
}

#[test]
fn test_channel_values() {
    assert_eq!(RegistrationToken::device("t").to_value(), json!("t"));
    assert_eq!(
        RegistrationToken::web_push("https://push.example/1", "p", "a").to_value(),
        json!({"endpoint": "https://push.example/1", "p256dh": "p", "auth": "a"})
    );
}
