// Permission bookkeeping
// Hosts deliver prompt answers through a callback keyed by request code; the
// gate pairs that callback with the waiting registration call

use std::collections::HashSet;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::platform::PermissionKind;
use super::{PushError, PushResult};

/// Request code used for the notification permission prompt
pub const NOTIFICATION_PERMISSION_REQUEST_CODE: i32 = 1;

/// Platform-reported authorization status before any prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Authorized,
    /// Quiet delivery granted without an explicit prompt
    Provisional,
}

/// What a registration call should do given the current status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationDecision {
    Granted,
    Denied,
    Prompt,
}

/// Decide whether registering needs a prompt.
///
/// A denied status never prompts again. An authorized status prompts only
/// when a requested kind is not enabled yet.
pub fn registration_decision(
    status: AuthorizationStatus,
    requested: &[PermissionKind],
    enabled: &HashSet<PermissionKind>,
) -> RegistrationDecision {
    match status {
        AuthorizationStatus::Denied => RegistrationDecision::Denied,
        AuthorizationStatus::Authorized => {
            let all_enabled = requested
                .iter()
                .filter(|kind| kind.needs_consent())
                .all(|kind| enabled.contains(kind));
            if all_enabled {
                RegistrationDecision::Granted
            } else {
                RegistrationDecision::Prompt
            }
        },
        AuthorizationStatus::NotDetermined | AuthorizationStatus::Provisional => {
            RegistrationDecision::Prompt
        },
    }
}

/// Single-slot continuation for an outstanding permission prompt
#[derive(Debug, Default)]
pub struct PermissionGate {
    slot: Mutex<Option<(i32, oneshot::Sender<bool>)>>,
}

/// Receiving half of a registered prompt
#[derive(Debug)]
pub struct PendingPermission {
    request_code: i32,
    receiver: oneshot::Receiver<bool>,
}

impl PendingPermission {
    pub fn request_code(&self) -> i32 {
        self.request_code
    }

    /// Wait for the host's answer; a prompt abandoned by the host counts as denied
    pub async fn wait(self) -> bool {
        self.receiver.await.unwrap_or(false)
    }
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot before showing a prompt.
    ///
    /// Fails fast while another prompt is still awaited so that two answers
    /// can never be matched to the wrong caller.
    pub fn register(&self, request_code: i32) -> PushResult<PendingPermission> {
        let mut slot = self.slot.lock();
        if let Some((code, sender)) = slot.as_ref()
            && !sender.is_closed()
        {
            return Err(PushError::PermissionRequestInFlight {
                request_code: *code,
            });
        }

        let (sender, receiver) = oneshot::channel();
        *slot = Some((request_code, sender));
        Ok(PendingPermission {
            request_code,
            receiver,
        })
    }

    /// Deliver a prompt answer. Returns `false` when no prompt with this code is pending.
    pub fn resolve(&self, request_code: i32, granted: bool) -> bool {
        let mut slot = self.slot.lock();
        match slot.take() {
            Some((code, sender)) if code == request_code => {
                tracing::info!(request_code, granted, "Permission prompt answered");
                // Waiter may already be gone, the answer is still consumed
                let _ = sender.send(granted);
                true
            },
            other => {
                *slot = other;
                false
            },
        }
    }

    /// Release the slot without an answer
    pub fn cancel(&self, request_code: i32) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|(code, _)| *code == request_code) {
            *slot = None;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|(_, sender)| !sender.is_closed())
    }
}
