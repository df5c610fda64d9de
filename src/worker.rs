//! The background worker: asset caching, request interception and push
//! notification handling.
//!
//! The host may start and stop the worker between any two events, so a
//! [`ServiceWorker`] holds nothing but configuration and port handles. Durable
//! state lives in the cache storage and in the platform's subscription store.
//! Each handler's future completes only once all work the event started has
//! settled; the host must drive it to completion before treating the event as
//! finished.

pub mod cache;
pub mod decode;
pub mod fetch;
pub mod present;

use crate::config::WorkerConfig;
use crate::ports::{CacheStorage, Network, NotificationSurface, TimeProvider, WindowClients};
use crate::types::http::Request;
use crate::types::notification::{
    NotificationClick, NotificationDescriptor, NotificationId, PushMessage,
};

use cache::{ActivateError, AssetCache, AssetManifest, InstallError};
use decode::NotificationDefaults;
use fetch::{FetchError, FetchInterceptor, Intercepted};
use present::{ClickOutcome, NotificationPresenter, PresentError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Push(PushMessage),
    NotificationClick(NotificationClick),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Installed {
        entries: usize,
    },
    Activated {
        deleted: Vec<String>,
    },
    Responded(Intercepted),
    Notified {
        id: NotificationId,
        descriptor: NotificationDescriptor,
    },
    Clicked(ClickOutcome),
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("install failed: {0}")]
    Install(#[from] InstallError),
    #[error("activation failed: {0}")]
    Activate(#[from] ActivateError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Present(#[from] PresentError),
}

#[derive(Debug, Clone)]
pub struct ServiceWorker<C, N, S, W, T> {
    cache: AssetCache<C, N>,
    interceptor: FetchInterceptor<C, N>,
    presenter: NotificationPresenter<S, W>,
    defaults: NotificationDefaults,
    time: T,
}

impl<C, N, S, W, T> ServiceWorker<C, N, S, W, T>
where
    C: CacheStorage,
    N: Network,
    S: NotificationSurface,
    W: WindowClients,
    T: TimeProvider,
{
    pub fn new(
        config: &WorkerConfig,
        storage: C,
        network: N,
        surface: S,
        windows: W,
        time: T,
    ) -> Self {
        let manifest = AssetManifest::new(config.origin.clone(), config.manifest.clone());
        Self {
            cache: AssetCache::new(
                storage.clone(),
                network.clone(),
                config.cache_name.clone(),
                manifest,
            ),
            interceptor: FetchInterceptor::new(storage, network, config.cache_name.clone()),
            presenter: NotificationPresenter::new(surface, windows, config.app_root.clone()),
            defaults: config.notifications.clone(),
            time,
        }
    }

    pub fn cache(&self) -> &AssetCache<C, N> {
        &self.cache
    }

    pub async fn handle(&self, event: WorkerEvent) -> Result<WorkerOutcome, WorkerError> {
        match event {
            WorkerEvent::Install => Ok(WorkerOutcome::Installed {
                entries: self.install().await?,
            }),
            WorkerEvent::Activate => Ok(WorkerOutcome::Activated {
                deleted: self.activate().await?,
            }),
            WorkerEvent::Fetch(request) => {
                Ok(WorkerOutcome::Responded(self.fetch(&request).await?))
            }
            WorkerEvent::Push(message) => {
                let (id, descriptor) = self.push(&message).await?;
                Ok(WorkerOutcome::Notified { id, descriptor })
            }
            WorkerEvent::NotificationClick(click) => Ok(WorkerOutcome::Clicked(
                self.notification_click(&click).await?,
            )),
        }
    }

    pub async fn install(&self) -> Result<usize, InstallError> {
        self.cache.install().await
    }

    pub async fn activate(&self) -> Result<Vec<String>, ActivateError> {
        self.cache.activate().await
    }

    pub async fn fetch(&self, request: &Request) -> Result<Intercepted, FetchError> {
        self.interceptor.respond(request).await
    }

    /// Decoding never fails; only presentation can.
    pub async fn push(
        &self,
        message: &PushMessage,
    ) -> Result<(NotificationId, NotificationDescriptor), PresentError> {
        let descriptor = decode::decode(message, &self.defaults, self.time.now());
        let id = self.presenter.present(&descriptor).await?;
        Ok((id, descriptor))
    }

    pub async fn notification_click(
        &self,
        click: &NotificationClick,
    ) -> Result<ClickOutcome, PresentError> {
        self.presenter.handle_click(click).await
    }
}
