pub mod adapters;
pub mod api;
pub mod config;
pub mod controller;
pub mod ports;
pub mod push;
pub mod types;
pub mod worker;

#[cfg(test)]
mod testing;

pub use controller::SubscriptionController;
pub use push::{generate_vapid_credentials, send_test_notification};
pub use worker::{ServiceWorker, WorkerEvent, WorkerOutcome};

/// Installs the fmt subscriber on stderr so command output on stdout stays
/// machine readable. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
