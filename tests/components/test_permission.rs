//! Tests for components/permission.rs

use std::collections::HashSet;
use std::sync::Arc;

use native_push::backends::{MemoryAdapter, PromptBehavior};
use native_push::components::PushError;
use native_push::components::permission::*;
use native_push::components::platform::{
    AdapterFuture, DeliveryReceipt, PermissionKind, PermissionOutcome, Platform, PlatformAdapter,
    PresentationRequest,
};
use native_push::{MethodCall, MethodResult, NativePushPlugin, methods};
use serde_json::json;

#[test]
fn test_denied_status_never_prompts() {
    let decision = registration_decision(
        AuthorizationStatus::Denied,
        &[PermissionKind::Alert],
        &HashSet::new(),
    );
    assert_eq!(decision, RegistrationDecision::Denied);
}

#[test]
fn test_authorized_prompts_only_for_new_kinds() {
    let enabled = HashSet::from([PermissionKind::Alert, PermissionKind::Sound]);

    assert_eq!(
        registration_decision(
            AuthorizationStatus::Authorized,
            &[PermissionKind::Alert, PermissionKind::Provisional],
            &enabled
        ),
        RegistrationDecision::Granted
    );
    assert_eq!(
        registration_decision(
            AuthorizationStatus::Authorized,
            &[PermissionKind::Alert, PermissionKind::Badge],
            &enabled
        ),
        RegistrationDecision::Prompt
    );
    assert_eq!(
        registration_decision(AuthorizationStatus::NotDetermined, &[], &enabled),
        RegistrationDecision::Prompt
    );
}

#[test]
fn test_unknown_kind_names_are_ignored() {
    assert_eq!(PermissionKind::parse("carPlay"), Some(PermissionKind::CarPlay));
    assert_eq!(PermissionKind::parse("hologram"), None);
}

#[tokio::test]
async fn test_gate_delivers_answer_to_waiter() -> anyhow::Result<()> {
    let gate = PermissionGate::new();
    let pending = gate.register(NOTIFICATION_PERMISSION_REQUEST_CODE)?;
    assert!(gate.is_pending());

    assert!(!gate.resolve(42, true));
    assert!(gate.resolve(NOTIFICATION_PERMISSION_REQUEST_CODE, true));
    assert!(pending.wait().await);
    assert!(!gate.is_pending());
    Ok(())
}

#[test]
fn test_reentrant_request_fails_fast() {
    let gate = PermissionGate::new();
    let _pending = gate.register(NOTIFICATION_PERMISSION_REQUEST_CODE).unwrap();

    let second = gate.register(NOTIFICATION_PERMISSION_REQUEST_CODE);
    assert!(matches!(
        second,
        Err(PushError::PermissionRequestInFlight { request_code: 1 })
    ));
}

#[test]
fn test_abandoned_waiter_frees_the_slot() {
    let gate = PermissionGate::new();
    drop(gate.register(NOTIFICATION_PERMISSION_REQUEST_CODE).unwrap());

    assert!(!gate.is_pending());
    assert!(gate.register(NOTIFICATION_PERMISSION_REQUEST_CODE).is_ok());
}

#[test]
fn test_cancelled_prompt_counts_as_denied() {
    let gate = PermissionGate::new();
    let pending = gate.register(NOTIFICATION_PERMISSION_REQUEST_CODE).unwrap();
    gate.cancel(NOTIFICATION_PERMISSION_REQUEST_CODE);

    assert!(!tokio_test::block_on(pending.wait()));
}

#[tokio::test]
async fn test_deferred_prompt_answered_through_host_callback() -> anyhow::Result<()> {
    let adapter = Arc::new(MemoryAdapter::new(Platform::Android).with_prompt(PromptBehavior::Deferred));
    let plugin = Arc::new(NativePushPlugin::builder(adapter.clone()).build());
    plugin.attach()?;

    let registering = {
        let plugin = plugin.clone();
        tokio::spawn(async move {
            plugin
                .handle(MethodCall::new(methods::REGISTER_FOR_REMOTE_NOTIFICATION, json!(null)))
                .await
        })
    };

    // Wait until the prompt is showing
    while adapter.prompts_shown() == 0 {
        tokio::task::yield_now().await;
    }

    // A second registration while the first prompt is open fails fast
    let second = plugin
        .handle(MethodCall::without_arguments(methods::REGISTER_FOR_REMOTE_NOTIFICATION))
        .await;
    assert!(matches!(second, MethodResult::Error { .. }));

    assert!(plugin.on_permission_result(NOTIFICATION_PERMISSION_REQUEST_CODE, true));
    assert_eq!(registering.await?, MethodResult::success(true));
    Ok(())
}

#[tokio::test]
async fn test_denied_registration_returns_false() -> anyhow::Result<()> {
    let adapter = Arc::new(
        MemoryAdapter::new(Platform::IOs).with_authorization(AuthorizationStatus::Denied, []),
    );
    let plugin = NativePushPlugin::builder(adapter.clone()).build();

    assert!(!plugin.register_for_remote_notification(&[PermissionKind::Alert]).await?);
    assert_eq!(adapter.prompts_shown(), 0);
    Ok(())
}

/// Opens its prompt under a request code of its own choosing
struct ForeignCodeAdapter {
    inner: MemoryAdapter,
    request_code: i32,
}

impl PlatformAdapter for ForeignCodeAdapter {
    fn platform(&self) -> Platform {
        self.inner.platform()
    }

    fn present_native<'a>(
        &'a self,
        request: &'a PresentationRequest,
    ) -> AdapterFuture<'a, DeliveryReceipt> {
        self.inner.present_native(request)
    }

    fn persist_token<'a>(&'a self, token: &'a str) -> AdapterFuture<'a, ()> {
        self.inner.persist_token(token)
    }

    fn read_token(&self) -> AdapterFuture<'_, Option<String>> {
        self.inner.read_token()
    }

    fn request_permission<'a>(
        &'a self,
        _kinds: &'a [PermissionKind],
    ) -> AdapterFuture<'a, PermissionOutcome> {
        Box::pin(async move {
            Ok(PermissionOutcome::Pending {
                request_code: self.request_code,
            })
        })
    }
}

#[tokio::test]
async fn test_prompt_under_foreign_code_is_denied_and_frees_the_slot() -> anyhow::Result<()> {
    let adapter = Arc::new(ForeignCodeAdapter {
        inner: MemoryAdapter::new(Platform::Android),
        request_code: NOTIFICATION_PERMISSION_REQUEST_CODE + 7,
    });
    let plugin = NativePushPlugin::builder(adapter).build();

    let granted = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        plugin.register_for_remote_notification(&[PermissionKind::Alert]),
    )
    .await??;
    assert!(!granted);

    // Nothing is left waiting under either code
    assert!(!plugin.on_permission_result(NOTIFICATION_PERMISSION_REQUEST_CODE + 7, true));
    assert!(!plugin.on_permission_result(NOTIFICATION_PERMISSION_REQUEST_CODE, true));
    assert!(!plugin.register_for_remote_notification(&[]).await?);
    Ok(())
}
