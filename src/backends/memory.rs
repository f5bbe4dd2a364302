// In-process adapter without an OS notification surface
// Records what would have been shown and answers permission prompts from a
// script; used by headless hosts and by tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use super::storage::FileTokenSlot;
use crate::components::permission::{
    AuthorizationStatus, NOTIFICATION_PERMISSION_REQUEST_CODE, RegistrationDecision,
    registration_decision,
};
use crate::components::platform::{
    AdapterFuture, DeliveryReceipt, PermissionKind, PermissionOutcome, Platform, PlatformAdapter,
    PresentationRequest,
};
use crate::components::PushError;

/// How the scripted user answers a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBehavior {
    /// Answer synchronously
    Answer(bool),
    /// Leave the prompt open; the answer arrives through the permission gate
    Deferred,
}

enum TokenBacking {
    Memory(RwLock<Option<String>>),
    File(FileTokenSlot),
}

pub struct MemoryAdapter {
    platform: Platform,
    presented: Mutex<Vec<PresentationRequest>>,
    token: TokenBacking,
    status: Mutex<AuthorizationStatus>,
    enabled: Mutex<HashSet<PermissionKind>>,
    prompt: Mutex<PromptBehavior>,
    prompts_shown: Mutex<usize>,
    failing: AtomicBool,
}

impl MemoryAdapter {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            presented: Mutex::new(Vec::new()),
            token: TokenBacking::Memory(RwLock::new(None)),
            status: Mutex::new(AuthorizationStatus::NotDetermined),
            enabled: Mutex::new(HashSet::new()),
            prompt: Mutex::new(PromptBehavior::Answer(true)),
            prompts_shown: Mutex::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Keep the token in a durable file instead of memory
    pub fn with_token_slot(mut self, slot: FileTokenSlot) -> Self {
        self.token = TokenBacking::File(slot);
        self
    }

    pub fn with_authorization(
        self,
        status: AuthorizationStatus,
        enabled: impl IntoIterator<Item = PermissionKind>,
    ) -> Self {
        *self.status.lock() = status;
        *self.enabled.lock() = enabled.into_iter().collect();
        self
    }

    pub fn with_prompt(self, prompt: PromptBehavior) -> Self {
        *self.prompt.lock() = prompt;
        self
    }

    /// Make every presentation fail as if the OS call threw
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn presented(&self) -> Vec<PresentationRequest> {
        self.presented.lock().clone()
    }

    pub fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.lock()
    }

    pub fn prompts_shown(&self) -> usize {
        *self.prompts_shown.lock()
    }

    fn answer_prompt(&self, kinds: &[PermissionKind]) -> PermissionOutcome {
        *self.prompts_shown.lock() += 1;
        match *self.prompt.lock() {
            PromptBehavior::Answer(true) => {
                *self.status.lock() = AuthorizationStatus::Authorized;
                self.enabled.lock().extend(kinds.iter().copied());
                PermissionOutcome::Granted
            },
            PromptBehavior::Answer(false) => {
                *self.status.lock() = AuthorizationStatus::Denied;
                PermissionOutcome::Denied
            },
            PromptBehavior::Deferred => PermissionOutcome::Pending {
                request_code: NOTIFICATION_PERMISSION_REQUEST_CODE,
            },
        }
    }
}

impl PlatformAdapter for MemoryAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn present_native<'a>(
        &'a self,
        request: &'a PresentationRequest,
    ) -> AdapterFuture<'a, DeliveryReceipt> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PushError::platform(
                    self.platform,
                    "present_native",
                    "notification surface unavailable",
                ));
            }

            let mut presented = self.presented.lock();
            presented.push(request.clone());
            let receipt = DeliveryReceipt::new(
                self.platform,
                request.notification_id,
                presented.len().to_string(),
            )
            .with_image(request.image_path.is_some())
            .with_metadata("platform_api", "memory");
            Ok(receipt)
        })
    }

    fn persist_token<'a>(&'a self, token: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            match &self.token {
                TokenBacking::Memory(slot) => {
                    *slot.write() = Some(token.to_string());
                    Ok(())
                },
                TokenBacking::File(slot) => {
                    let slot = slot.clone();
                    let token = token.to_string();
                    tokio::task::spawn_blocking(move || slot.write(&token))
                        .await
                        .map_err(|e| PushError::platform(self.platform, "persist_token", e))??;
                    Ok(())
                },
            }
        })
    }

    fn read_token(&self) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move {
            match &self.token {
                TokenBacking::Memory(slot) => Ok(slot.read().clone()),
                TokenBacking::File(slot) => {
                    let slot = slot.clone();
                    let token = tokio::task::spawn_blocking(move || slot.read())
                        .await
                        .map_err(|e| PushError::platform(self.platform, "read_token", e))??;
                    Ok(token)
                },
            }
        })
    }

    fn request_permission<'a>(
        &'a self,
        kinds: &'a [PermissionKind],
    ) -> AdapterFuture<'a, PermissionOutcome> {
        Box::pin(async move {
            let status = *self.status.lock();
            let decision = {
                let enabled = self.enabled.lock();
                registration_decision(status, kinds, &enabled)
            };
            Ok(match decision {
                RegistrationDecision::Granted => PermissionOutcome::Granted,
                RegistrationDecision::Denied => PermissionOutcome::Denied,
                RegistrationDecision::Prompt => self.answer_prompt(kinds),
            })
        })
    }
}
