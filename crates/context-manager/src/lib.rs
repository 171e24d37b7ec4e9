//! Context manager: builds consistent snapshots of a device's capability states.
//!
//! A caller asks for a context; the manager asks every eligible state provider
//! of the target endpoint for fresh state, waits for all of them (or a
//! timeout), and answers the caller exactly once.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ContextManager (manager.rs)              │
//! │  thin public methods ──submit──▶ Executor (one worker,      │
//! │                                  strict FIFO)               │
//! └─────────────────────────────────────────────────────────────┘
//!          │                      │                     │
//!          ▼                      ▼                     ▼
//!   endpoint states        pending requests         observers
//!   (state_info.rs)        (request.rs)             (own lock)
//!   own lock               own lock, keyed by token
//!                                 ▲
//!                                 │ timeout
//!                           MultiTimer thread
//! ```
//!
//! Callbacks into providers, requesters and observers are always made with
//! every internal lock released.
//!
//! # Example
//!
//! ```ignore
//! use avs_context_manager::{ContextManager, ContextManagerConfig};
//!
//! let manager = ContextManager::new(ContextManagerConfig::new("client::product::serial"))?;
//! manager.add_state_provider(&volume_tag, speaker.clone());
//! let token = manager.get_context(requester, "", None);
//! ```

mod config;
mod error;
mod manager;
mod request;
mod state_info;

pub use config::{ContextManagerConfig, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ContextManagerError, Result};
pub use manager::{ContextManager, STATE_PROVIDER_TIMEOUT_METRIC};
