use crate::types::notification::{NotificationDescriptor, NotificationId};

pub trait NotificationSurface: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<NotificationId, Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn show<'a>(&'a self, descriptor: &'a NotificationDescriptor) -> Self::Fut<'a>;

    /// Dismissing an already dismissed notification is a no-op.
    fn dismiss(&self, id: &NotificationId);
}

pub trait WindowClients: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    /// Focuses an app window already showing `path`, or opens a new one.
    fn focus_or_open<'a>(&'a self, path: &'a str) -> Self::Fut<'a>;
}
