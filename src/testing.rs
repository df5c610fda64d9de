//! In-memory port fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use futures::future::BoxFuture;
use time::OffsetDateTime;
use url::Url;

use crate::ports;
use crate::ports::Notice;
use crate::types::http::{Request, Response};
use crate::types::notification::{NotificationDescriptor, NotificationId};
use crate::types::push::{Capabilities, Permission, PushSubscriptionRecord, SubscribeOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TestError(pub(crate) &'static str);

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Clone)]
pub(crate) struct TestTime {
    now: OffsetDateTime,
}

impl TestTime {
    pub(crate) fn new(now: OffsetDateTime) -> Self {
        Self { now }
    }
}

impl ports::TimeProvider for TestTime {
    fn now(&self) -> OffsetDateTime {
        self.now
    }
}

#[derive(Debug, Clone)]
enum Route {
    Respond(Response),
    Fail,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TestNetwork {
    routes: HashMap<String, Route>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl TestNetwork {
    pub(crate) fn with_body(mut self, url: &str, body: &str) -> Self {
        self.routes.insert(
            url.to_string(),
            Route::Respond(Response {
                status: 200,
                headers: Vec::new(),
                body: body.as_bytes().to_vec(),
            }),
        );
        self
    }

    pub(crate) fn with_status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(
            url.to_string(),
            Route::Respond(Response {
                status,
                headers: Vec::new(),
                body: Vec::new(),
            }),
        );
        self
    }

    pub(crate) fn with_failure(mut self, url: &str) -> Self {
        self.routes.insert(url.to_string(), Route::Fail);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl ports::Network for TestNetwork {
    type Error = TestError;
    type Fut<'a>
        = std::future::Ready<Result<Response, Self::Error>>
    where
        Self: 'a;

    fn fetch<'a>(&'a self, request: &'a Request) -> Self::Fut<'a> {
        let url = request.url.to_string();
        self.calls.lock().expect("calls lock").push(url.clone());
        let result = match self.routes.get(&url) {
            Some(Route::Respond(response)) => Ok(response.clone()),
            Some(Route::Fail) => Err(TestError("connection refused")),
            None => Err(TestError("no route")),
        };
        std::future::ready(result)
    }
}

#[derive(Clone, Default)]
pub(crate) struct TestSurface {
    failing: bool,
    attempts: Arc<Mutex<usize>>,
    shown: Arc<Mutex<Vec<NotificationDescriptor>>>,
    dismissed: Arc<Mutex<Vec<NotificationId>>>,
}

impl TestSurface {
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(crate) fn shown(&self) -> Vec<NotificationDescriptor> {
        self.shown.lock().expect("shown lock").clone()
    }

    pub(crate) fn dismissed(&self) -> Vec<NotificationId> {
        self.dismissed.lock().expect("dismissed lock").clone()
    }

    pub(crate) fn show_attempts(&self) -> usize {
        *self.attempts.lock().expect("attempts lock")
    }
}

impl ports::NotificationSurface for TestSurface {
    type Error = TestError;
    type Fut<'a>
        = std::future::Ready<Result<NotificationId, Self::Error>>
    where
        Self: 'a;

    fn show<'a>(&'a self, descriptor: &'a NotificationDescriptor) -> Self::Fut<'a> {
        let mut attempts = self.attempts.lock().expect("attempts lock");
        *attempts += 1;
        if self.failing {
            return std::future::ready(Err(TestError("notifications blocked")));
        }
        self.shown
            .lock()
            .expect("shown lock")
            .push(descriptor.clone());
        std::future::ready(Ok(NotificationId(format!("notification-{}", *attempts))))
    }

    fn dismiss(&self, id: &NotificationId) {
        self.dismissed
            .lock()
            .expect("dismissed lock")
            .push(id.clone());
    }
}

#[derive(Clone, Default)]
pub(crate) struct TestWindows {
    failing: bool,
    opened: Arc<Mutex<Vec<String>>>,
}

impl TestWindows {
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("opened lock").clone()
    }
}

impl ports::WindowClients for TestWindows {
    type Error = TestError;
    type Fut<'a>
        = std::future::Ready<Result<(), Self::Error>>
    where
        Self: 'a;

    fn focus_or_open<'a>(&'a self, path: &'a str) -> Self::Fut<'a> {
        if self.failing {
            return std::future::ready(Err(TestError("no window")));
        }
        self.opened
            .lock()
            .expect("opened lock")
            .push(path.to_string());
        std::future::ready(Ok(()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlatformStep {
    Registration,
    Register,
    Ready,
    Subscribe,
    Unsubscribe,
}

#[derive(Debug, Default)]
struct PlatformState {
    registration: Option<String>,
    subscription: Option<PushSubscriptionRecord>,
    registered_scripts: Vec<String>,
    subscribe_options: Option<SubscribeOptions>,
    permission_requests: usize,
    unsubscribe_calls: usize,
}

#[derive(Clone)]
pub(crate) struct TestPlatform {
    capabilities: Capabilities,
    permission: Permission,
    fail_at: Option<PlatformStep>,
    state: Arc<Mutex<PlatformState>>,
    permission_gate: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
}

impl TestPlatform {
    pub(crate) fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            permission: Permission::Granted,
            fail_at: None,
            state: Arc::new(Mutex::new(PlatformState::default())),
            permission_gate: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn supported() -> Self {
        Self::with_capabilities(Capabilities {
            service_worker: true,
            push_manager: true,
        })
    }

    pub(crate) fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    pub(crate) fn failing_at(mut self, step: PlatformStep) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub(crate) fn with_existing_subscription(self) -> Self {
        {
            let mut state = self.state.lock().expect("platform lock");
            state.registration = Some("/sw.js".to_string());
            state.subscription = Some(Self::record());
        }
        self
    }

    /// Holds the permission prompt open until the returned sender fires.
    pub(crate) fn with_permission_gate(self) -> (Self, oneshot::Sender<()>) {
        let (sender, receiver) = oneshot::channel();
        *self.permission_gate.lock().expect("gate lock") = Some(receiver);
        (self, sender)
    }

    pub(crate) fn record() -> PushSubscriptionRecord {
        PushSubscriptionRecord {
            endpoint: Url::parse("https://push.example/send/abc123").expect("endpoint"),
            p256dh: "BPubKey".to_string(),
            auth: "authSecret".to_string(),
        }
    }

    pub(crate) fn registered_scripts(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("platform lock")
            .registered_scripts
            .clone()
    }

    pub(crate) fn subscribe_options(&self) -> Option<SubscribeOptions> {
        self.state
            .lock()
            .expect("platform lock")
            .subscribe_options
            .clone()
    }

    pub(crate) fn has_subscription(&self) -> bool {
        self.state
            .lock()
            .expect("platform lock")
            .subscription
            .is_some()
    }

    pub(crate) fn permission_requests(&self) -> usize {
        self.state.lock().expect("platform lock").permission_requests
    }

    pub(crate) fn unsubscribe_calls(&self) -> usize {
        self.state.lock().expect("platform lock").unsubscribe_calls
    }

    fn check(&self, step: PlatformStep) -> Result<(), TestError> {
        if self.fail_at == Some(step) {
            Err(TestError("platform failure"))
        } else {
            Ok(())
        }
    }
}

impl ports::PushPlatform for TestPlatform {
    type Registration = String;
    type Error = TestError;
    type PermissionFut<'a>
        = BoxFuture<'a, Result<Permission, Self::Error>>
    where
        Self: 'a;
    type RegistrationFut<'a>
        = std::future::Ready<Result<Option<String>, Self::Error>>
    where
        Self: 'a;
    type RegisterFut<'a>
        = std::future::Ready<Result<String, Self::Error>>
    where
        Self: 'a;
    type ReadyFut<'a>
        = std::future::Ready<Result<(), Self::Error>>
    where
        Self: 'a;
    type SubscriptionFut<'a>
        = std::future::Ready<Result<Option<PushSubscriptionRecord>, Self::Error>>
    where
        Self: 'a;
    type SubscribeFut<'a>
        = std::future::Ready<Result<PushSubscriptionRecord, Self::Error>>
    where
        Self: 'a;
    type UnsubscribeFut<'a>
        = std::future::Ready<Result<bool, Self::Error>>
    where
        Self: 'a;

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn request_permission<'a>(&'a self) -> Self::PermissionFut<'a> {
        self.state.lock().expect("platform lock").permission_requests += 1;
        let gate = self.permission_gate.lock().expect("gate lock").take();
        let permission = self.permission;
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(permission)
        })
    }

    fn registration<'a>(&'a self) -> Self::RegistrationFut<'a> {
        let result = self
            .check(PlatformStep::Registration)
            .map(|()| self.state.lock().expect("platform lock").registration.clone());
        std::future::ready(result)
    }

    fn register<'a>(&'a self, script_url: &'a str) -> Self::RegisterFut<'a> {
        let result = self.check(PlatformStep::Register).map(|()| {
            let mut state = self.state.lock().expect("platform lock");
            state.registered_scripts.push(script_url.to_string());
            state
                .registration
                .get_or_insert_with(|| script_url.to_string())
                .clone()
        });
        std::future::ready(result)
    }

    fn ready<'a>(&'a self, _registration: &'a String) -> Self::ReadyFut<'a> {
        std::future::ready(self.check(PlatformStep::Ready))
    }

    fn subscription<'a>(&'a self, _registration: &'a String) -> Self::SubscriptionFut<'a> {
        let subscription = self.state.lock().expect("platform lock").subscription.clone();
        std::future::ready(Ok(subscription))
    }

    fn subscribe<'a>(
        &'a self,
        _registration: &'a String,
        options: &'a SubscribeOptions,
    ) -> Self::SubscribeFut<'a> {
        let result = self.check(PlatformStep::Subscribe).map(|()| {
            let mut state = self.state.lock().expect("platform lock");
            state.subscribe_options = Some(options.clone());
            state.subscription = Some(Self::record());
            Self::record()
        });
        std::future::ready(result)
    }

    fn unsubscribe<'a>(&'a self, _registration: &'a String) -> Self::UnsubscribeFut<'a> {
        let mut state = self.state.lock().expect("platform lock");
        state.unsubscribe_calls += 1;
        let result = self
            .check(PlatformStep::Unsubscribe)
            .map(|()| state.subscription.take().is_some());
        std::future::ready(result)
    }
}

#[derive(Clone, Default)]
pub(crate) struct TestBackend {
    failing: bool,
    posted: Arc<Mutex<Vec<PushSubscriptionRecord>>>,
}

impl TestBackend {
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(crate) fn posted(&self) -> Vec<PushSubscriptionRecord> {
        self.posted.lock().expect("posted lock").clone()
    }
}

impl ports::SubscriptionBackend for TestBackend {
    type Error = TestError;
    type Fut<'a>
        = std::future::Ready<Result<(), Self::Error>>
    where
        Self: 'a;

    fn register_subscription<'a>(&'a self, record: &'a PushSubscriptionRecord) -> Self::Fut<'a> {
        if self.failing {
            return std::future::ready(Err(TestError("backend unavailable")));
        }
        self.posted
            .lock()
            .expect("posted lock")
            .push(record.clone());
        std::future::ready(Ok(()))
    }
}

#[derive(Clone, Default)]
pub(crate) struct TestNotices {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl TestNotices {
    pub(crate) fn titles(&self) -> Vec<&'static str> {
        self.notices
            .lock()
            .expect("notices lock")
            .iter()
            .map(|notice| notice.title)
            .collect()
    }
}

impl ports::NoticeSink for TestNotices {
    fn notice(&self, notice: Notice) {
        self.notices.lock().expect("notices lock").push(notice);
    }
}
