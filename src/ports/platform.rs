use crate::types::push::{Capabilities, Permission, PushSubscriptionRecord, SubscribeOptions};

/// Page-side view of the worker registration and push manager.
pub trait PushPlatform: Clone + Send + Sync + 'static {
    type Registration: Clone + Send + Sync + 'static;
    type Error: std::fmt::Display + Send + Sync + 'static;
    type PermissionFut<'a>: Future<Output = Result<Permission, Self::Error>> + Send + 'a
    where
        Self: 'a;
    type RegistrationFut<'a>: Future<Output = Result<Option<Self::Registration>, Self::Error>>
        + Send
        + 'a
    where
        Self: 'a;
    type RegisterFut<'a>: Future<Output = Result<Self::Registration, Self::Error>> + Send + 'a
    where
        Self: 'a;
    type ReadyFut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;
    type SubscriptionFut<'a>: Future<Output = Result<Option<PushSubscriptionRecord>, Self::Error>>
        + Send
        + 'a
    where
        Self: 'a;
    type SubscribeFut<'a>: Future<Output = Result<PushSubscriptionRecord, Self::Error>> + Send + 'a
    where
        Self: 'a;
    type UnsubscribeFut<'a>: Future<Output = Result<bool, Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn capabilities(&self) -> Capabilities;

    fn request_permission<'a>(&'a self) -> Self::PermissionFut<'a>;

    /// Existing registration for this scope, without registering anything.
    fn registration<'a>(&'a self) -> Self::RegistrationFut<'a>;

    /// Registers `script_url`; registering an already registered script returns
    /// the existing registration.
    fn register<'a>(&'a self, script_url: &'a str) -> Self::RegisterFut<'a>;

    /// Resolves once the registration has an active worker.
    fn ready<'a>(&'a self, registration: &'a Self::Registration) -> Self::ReadyFut<'a>;

    fn subscription<'a>(&'a self, registration: &'a Self::Registration)
    -> Self::SubscriptionFut<'a>;

    fn subscribe<'a>(
        &'a self,
        registration: &'a Self::Registration,
        options: &'a SubscribeOptions,
    ) -> Self::SubscribeFut<'a>;

    fn unsubscribe<'a>(&'a self, registration: &'a Self::Registration) -> Self::UnsubscribeFut<'a>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Failure,
}

/// A user-visible message (toast) raised by the subscription controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: &'static str,
    pub description: &'static str,
}

pub trait NoticeSink: Clone + Send + Sync + 'static {
    fn notice(&self, notice: Notice);
}
