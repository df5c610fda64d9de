use crate::types::push::PushSubscriptionRecord;

pub trait PushSender: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(&'a self, subscription: &'a PushSubscriptionRecord, payload: &'a [u8])
    -> Self::Fut<'a>;
}

/// Backend collaborator that stores subscriptions for later delivery.
pub trait SubscriptionBackend: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn register_subscription<'a>(&'a self, record: &'a PushSubscriptionRecord) -> Self::Fut<'a>;
}
