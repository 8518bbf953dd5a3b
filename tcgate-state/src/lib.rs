//! tcgate State Management
//!
//! Persists what `apply` created so later runs can plan updates and deletions.
//!
//! - **StateFile**: lineage, serial and the recorded resources
//! - **StateBackend**: storage plus locking (currently a local JSON file)
//! - **LockInfo**: who holds the state and until when
//!
//! # Example
//!
//! ```ignore
//! use tcgate_state::{create_backend, BackendConfig};
//!
//! let backend = create_backend(&BackendConfig::local()).await?;
//! let lock = backend.acquire_lock("apply").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//!
//! // ... apply effects, upsert resources ...
//!
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
