pub mod api;
pub mod clock;
pub mod config;
pub mod events;
pub mod maintainer;
pub mod registry;
pub mod repository;

use std::sync::Arc;

use simtani_core::VerificationPolicy;

pub use api::router;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, StorageBackend};
pub use registry::Registry;
pub use repository::{InMemoryStore, RegistryStore, SqliteStore};

pub struct AppState {
    pub registry: Registry,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        clock: Arc<dyn Clock>,
        policy: VerificationPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: Registry::new(store, clock, policy),
        })
    }
}
