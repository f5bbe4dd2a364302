// State machines for the background delivery path and the adapter attachment
// Transitions are validated and recorded so a stuck notification can be traced

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NotificationId, PushError, PushResult};

/// States a push travels through on the background delivery path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryState {
    #[default]
    Idle,
    PushReceived,
    Normalized,
    /// Shown on the host surface
    Presented,
    /// Shown and waiting for the user
    AwaitingClick,
    Clicked,
    /// Terminal: data posted to a running client
    DeliveredToLiveClient,
    /// Terminal for the background process: data carried in a start URL
    EncodedForNewClient,
    /// Consumption side, in the new client session
    ClientStart,
    Decoded,
    /// Terminal: payload handed to the application once
    DeliveredOnce,
}

impl DeliveryState {
    pub fn can_transition_to(&self, target: &DeliveryState) -> bool {
        use DeliveryState::*;

        matches!(
            (self, target),
            (Idle, PushReceived)
                | (PushReceived, Normalized)
                | (Normalized, Presented)
                | (Normalized, AwaitingClick)
                | (Presented, AwaitingClick)
                | (AwaitingClick, Clicked)
                | (Clicked, DeliveredToLiveClient)
                | (Clicked, EncodedForNewClient)
                | (Idle, ClientStart)
                | (ClientStart, Decoded)
                | (Decoded, DeliveredOnce)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::DeliveredToLiveClient
                | DeliveryState::EncodedForNewClient
                | DeliveryState::DeliveredOnce
        )
    }
}

/// Recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition<S> {
    pub from_state: Option<S>,
    pub to_state: S,
    pub timestamp: DateTime<Utc>,
}

/// Delivery path of one notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPath {
    pub notification_id: NotificationId,
    pub state: DeliveryState,
    pub history: Vec<StateTransition<DeliveryState>>,
}

impl DeliveryPath {
    pub fn new(notification_id: NotificationId) -> Self {
        Self {
            notification_id,
            state: DeliveryState::Idle,
            history: vec![StateTransition {
                from_state: None,
                to_state: DeliveryState::Idle,
                timestamp: Utc::now(),
            }],
        }
    }

    /// Path of a shown notification whose earlier history was lost, e.g.
    /// because the background worker was restarted between push and click
    pub fn awaiting_click(notification_id: NotificationId) -> Self {
        Self {
            notification_id,
            state: DeliveryState::AwaitingClick,
            history: vec![StateTransition {
                from_state: None,
                to_state: DeliveryState::AwaitingClick,
                timestamp: Utc::now(),
            }],
        }
    }

    pub fn transition_to(&mut self, new_state: DeliveryState) -> PushResult<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(PushError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", new_state),
            });
        }

        tracing::trace!(
            notification_id = %self.notification_id,
            from = ?self.state,
            to = ?new_state,
            "Delivery state transition"
        );
        self.history.push(StateTransition {
            from_state: Some(self.state),
            to_state: new_state,
            timestamp: Utc::now(),
        });
        self.state = new_state;
        Ok(())
    }

    /// Every state visited so far, oldest first
    pub fn visited(&self) -> Vec<DeliveryState> {
        self.history.iter().map(|t| t.to_state).collect()
    }
}

/// Attachment of the plugin to its host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterState {
    #[default]
    Uninitialized,
    Attached,
    /// Host UI in the foreground
    Active,
    Backgrounded,
    Detached,
}

impl AdapterState {
    pub fn can_transition_to(&self, target: &AdapterState) -> bool {
        use AdapterState::*;

        matches!(
            (self, target),
            (Uninitialized, Attached)
                | (Attached, Active)
                | (Attached, Backgrounded)
                | (Active, Backgrounded)
                | (Backgrounded, Active)
                | (Attached, Detached)
                | (Active, Detached)
                | (Backgrounded, Detached)
        )
    }

    /// Calls are served while attached and not yet detached
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            AdapterState::Attached | AdapterState::Active | AdapterState::Backgrounded
        )
    }
}

/// Lifecycle tracker driven by host callbacks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterLifecycle {
    pub state: AdapterState,
    pub history: Vec<StateTransition<AdapterState>>,
}

impl AdapterLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transition_to(&mut self, new_state: AdapterState) -> PushResult<()> {
        if self.state == new_state {
            return Ok(());
        }
        if !self.state.can_transition_to(&new_state) {
            return Err(PushError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", new_state),
            });
        }

        tracing::debug!(from = ?self.state, to = ?new_state, "Adapter lifecycle transition");
        self.history.push(StateTransition {
            from_state: Some(self.state),
            to_state: new_state,
            timestamp: Utc::now(),
        });
        self.state = new_state;
        Ok(())
    }
}
