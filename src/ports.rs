//! Platform seams. Everything the worker and the subscription controller need from
//! the host is expressed here so the domain code stays generic and testable.

pub mod cache;
pub mod network;
pub mod notify;
pub mod platform;
pub mod push;
pub mod time;

pub use cache::CacheStorage;
pub use network::Network;
pub use notify::{NotificationSurface, WindowClients};
pub use platform::{Notice, NoticeKind, NoticeSink, PushPlatform};
pub use push::{PushSender, SubscriptionBackend};
pub use self::time::TimeProvider;
