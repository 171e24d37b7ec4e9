//! Shared vocabulary for device context aggregation.
//!
//! This crate holds the value types that flow between capability owners and the
//! context manager, plus the traits at each collaborator seam:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Value types                           │
//! │  tag.rs      - CapabilityTag (what a state describes)        │
//! │  state.rs    - CapabilityState, StateRefreshPolicy           │
//! │  context.rs  - AvsContext snapshot + JSON projection         │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Collaborator seams                       │
//! │  interfaces.rs - state providers, requesters, observers,     │
//! │                  the context manager itself                  │
//! │  metrics.rs    - metric recorder trait + in-memory double    │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Configuration                          │
//! │  device_info.rs - DeviceInfo, default endpoint id            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod context;
mod device_info;
mod error;
mod interfaces;
mod metrics;
mod state;
mod tag;

pub use context::{AvsContext, EMPTY_CONTEXT_JSON};
pub use device_info::DeviceInfo;
pub use error::{ConfigError, ConfigResult};
pub use interfaces::{
    AlexaStateChangeCauseType, ContextManagerInterface, ContextManagerObserverInterface,
    ContextRequestError, ContextRequestToken, ContextRequesterInterface, SetStateResult,
    StateProviderInterface, NO_TOKEN,
};
pub use metrics::{
    DataPoint, InMemoryMetricRecorder, MetricEvent, MetricRecorder, MetricRecorderRef,
    NullMetricRecorder,
};
pub use state::{CapabilityState, StateRefreshPolicy};
pub use tag::{CapabilityTag, EndpointIdentifier};
