//! Page-side push subscription controller.
//!
//! The flags it exposes are a view of the platform's own subscription store,
//! recomputed by [`SubscriptionController::refresh`] after every mutating
//! operation rather than toggled by hand.

pub mod key;

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::ControllerConfig;
use crate::ports::{Notice, NoticeKind, NoticeSink, PushPlatform, SubscriptionBackend};
use crate::types::push::{Permission, SubscribeOptions};

use key::{KeyError, application_server_key};

const NOT_SUPPORTED: Notice = Notice {
    kind: NoticeKind::Failure,
    title: "Not Supported",
    description: "Push notifications are not supported in this browser.",
};
const PERMISSION_DENIED: Notice = Notice {
    kind: NoticeKind::Failure,
    title: "Permission Denied",
    description: "Please allow notifications to receive alerts.",
};
const SUBSCRIBED: Notice = Notice {
    kind: NoticeKind::Success,
    title: "Subscribed!",
    description: "You'll now receive push notifications for sensor alerts.",
};
const SUBSCRIPTION_FAILED: Notice = Notice {
    kind: NoticeKind::Failure,
    title: "Subscription Failed",
    description: "Failed to subscribe to push notifications.",
};
const UNSUBSCRIBED: Notice = Notice {
    kind: NoticeKind::Success,
    title: "Unsubscribed",
    description: "You will no longer receive push notifications.",
};
const UNSUBSCRIBE_FAILED: Notice = Notice {
    kind: NoticeKind::Failure,
    title: "Error",
    description: "Failed to unsubscribe from notifications.",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unknown,
    Unsupported,
    Unsubscribed,
    Subscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionStatus {
    pub state: SubscriptionState,
    pub is_supported: bool,
    pub is_subscribed: bool,
    pub is_busy: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("push notifications are not supported on this platform")]
    Unsupported,
    #[error("another subscription operation is in progress")]
    Busy,
    #[error("already subscribed")]
    AlreadySubscribed,
    #[error("notification permission was not granted")]
    PermissionDenied,
    #[error("failed to request notification permission: {0}")]
    Permission(String),
    #[error("invalid application server key: {0}")]
    Key(#[from] KeyError),
    #[error("failed to register worker: {0}")]
    Register(String),
    #[error("worker registration did not become active: {0}")]
    Ready(String),
    #[error("failed to create push subscription: {0}")]
    Subscribe(String),
    #[error("failed to register subscription with backend: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum UnsubscribeError {
    #[error("another subscription operation is in progress")]
    Busy,
    #[error("failed to revoke push subscription: {0}")]
    Platform(String),
}

#[derive(Debug)]
struct ControllerState {
    state: SubscriptionState,
    busy: bool,
}

/// Clears the busy flag when an operation ends, including when its future is
/// dropped mid-flight.
struct BusyGuard<'a> {
    inner: &'a Mutex<ControllerState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .busy = false;
    }
}

pub struct SubscriptionController<P, B, N> {
    config: ControllerConfig,
    platform: P,
    backend: B,
    notices: N,
    inner: Mutex<ControllerState>,
}

impl<P, B, N> SubscriptionController<P, B, N>
where
    P: PushPlatform,
    B: SubscriptionBackend,
    N: NoticeSink,
{
    pub fn new(config: ControllerConfig, platform: P, backend: B, notices: N) -> Self {
        Self {
            config,
            platform,
            backend,
            notices,
            inner: Mutex::new(ControllerState {
                state: SubscriptionState::Unknown,
                busy: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Option<BusyGuard<'_>> {
        let mut inner = self.lock();
        if inner.busy {
            return None;
        }
        inner.busy = true;
        Some(BusyGuard { inner: &self.inner })
    }

    pub fn state(&self) -> SubscriptionState {
        self.lock().state
    }

    pub fn status(&self) -> SubscriptionStatus {
        let inner = self.lock();
        SubscriptionStatus {
            state: inner.state,
            is_supported: matches!(
                inner.state,
                SubscriptionState::Unsubscribed | SubscriptionState::Subscribed
            ),
            is_subscribed: inner.state == SubscriptionState::Subscribed,
            is_busy: inner.busy,
        }
    }

    /// Re-reads capability and subscription state from the platform.
    pub async fn refresh(&self) -> SubscriptionState {
        let state = self.read_state().await;
        self.lock().state = state;
        state
    }

    async fn read_state(&self) -> SubscriptionState {
        if !self.platform.capabilities().supported() {
            return SubscriptionState::Unsupported;
        }
        let registration = match self.platform.registration().await {
            Ok(Some(registration)) => registration,
            Ok(None) => return SubscriptionState::Unsubscribed,
            Err(err) => {
                tracing::warn!("failed to look up worker registration: {err}");
                return SubscriptionState::Unsubscribed;
            }
        };
        match self.platform.subscription(&registration).await {
            Ok(Some(_)) => SubscriptionState::Subscribed,
            Ok(None) => SubscriptionState::Unsubscribed,
            Err(err) => {
                tracing::warn!("failed to look up push subscription: {err}");
                SubscriptionState::Unsubscribed
            }
        }
    }

    pub async fn subscribe(&self) -> Result<(), SubscribeError> {
        let Some(_busy) = self.begin() else {
            return Err(SubscribeError::Busy);
        };

        let current = self.state();
        let current = match current {
            SubscriptionState::Unknown => self.refresh().await,
            known => known,
        };
        match current {
            SubscriptionState::Unsupported => {
                self.notices.notice(NOT_SUPPORTED);
                return Err(SubscribeError::Unsupported);
            }
            SubscriptionState::Subscribed => return Err(SubscribeError::AlreadySubscribed),
            SubscriptionState::Unknown | SubscriptionState::Unsubscribed => {}
        }

        let result = self.run_subscribe().await;
        match &result {
            Ok(()) => self.notices.notice(SUBSCRIBED),
            Err(SubscribeError::PermissionDenied) => self.notices.notice(PERMISSION_DENIED),
            Err(err) => {
                tracing::error!("failed to subscribe to push notifications: {err}");
                self.notices.notice(SUBSCRIPTION_FAILED);
            }
        }
        self.refresh().await;
        result
    }

    async fn run_subscribe(&self) -> Result<(), SubscribeError> {
        let permission = self
            .platform
            .request_permission()
            .await
            .map_err(|err| SubscribeError::Permission(err.to_string()))?;
        if permission != Permission::Granted {
            return Err(SubscribeError::PermissionDenied);
        }

        let registration = self
            .platform
            .register(&self.config.script_url)
            .await
            .map_err(|err| SubscribeError::Register(err.to_string()))?;
        self.platform
            .ready(&registration)
            .await
            .map_err(|err| SubscribeError::Ready(err.to_string()))?;

        let options = SubscribeOptions {
            user_visible_only: true,
            application_server_key: application_server_key(&self.config.application_server_key)?,
        };
        let record = self
            .platform
            .subscribe(&registration, &options)
            .await
            .map_err(|err| SubscribeError::Subscribe(err.to_string()))?;

        if let Err(err) = self.backend.register_subscription(&record).await {
            if let Err(revoke_err) = self.platform.unsubscribe(&registration).await {
                tracing::warn!(
                    endpoint = %record.endpoint,
                    "failed to revoke unregistered subscription: {revoke_err}"
                );
            }
            return Err(SubscribeError::Backend(err.to_string()));
        }

        tracing::info!(endpoint = %record.endpoint, "push subscription registered");
        Ok(())
    }

    /// Revokes the active subscription, if any. A missing registration or
    /// subscription counts as already unsubscribed. The backend is not told.
    pub async fn unsubscribe(&self) -> Result<(), UnsubscribeError> {
        let Some(_busy) = self.begin() else {
            return Err(UnsubscribeError::Busy);
        };

        if !self.platform.capabilities().supported() {
            self.refresh().await;
            return Ok(());
        }

        let result = self.run_unsubscribe().await;
        match &result {
            Ok(true) => self.notices.notice(UNSUBSCRIBED),
            Ok(false) => tracing::debug!("no active push subscription to revoke"),
            Err(err) => {
                tracing::error!("failed to unsubscribe from push notifications: {err}");
                self.notices.notice(UNSUBSCRIBE_FAILED);
            }
        }
        self.refresh().await;
        result.map(|_| ())
    }

    async fn run_unsubscribe(&self) -> Result<bool, UnsubscribeError> {
        let registration = match self.platform.registration().await {
            Ok(Some(registration)) => registration,
            Ok(None) => return Ok(false),
            Err(err) => return Err(UnsubscribeError::Platform(err.to_string())),
        };
        let subscription = self
            .platform
            .subscription(&registration)
            .await
            .map_err(|err| UnsubscribeError::Platform(err.to_string()))?;
        if subscription.is_none() {
            return Ok(false);
        }
        self.platform
            .unsubscribe(&registration)
            .await
            .map_err(|err| UnsubscribeError::Platform(err.to_string()))
    }
}
