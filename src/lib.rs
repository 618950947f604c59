//! Generation-I species list served through a read-through query cache that
//! survives restarts.
//!
//! [`QueryClient`] holds one observable entry per query key and refetches
//! only when an entry is missing, stale or invalidated.
//! [`SyncStoragePersister`] writes the whole cache to durable storage after
//! every change and seeds it again on the next start.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod presentation;
pub mod state;

pub use domain::error::{DexError, QueryError};
pub use domain::model::{QueryEntry, QueryKey, QueryStatus};
pub use infrastructure::storage::cache::{QueryClient, QueryClientOptions, QueryObserver};
pub use infrastructure::storage::persister::SyncStoragePersister;
