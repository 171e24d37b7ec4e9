//! Traits at the context manager's collaborator seams.
//!
//! Capability owners implement [`StateProviderInterface`], callers asking for a
//! context implement [`ContextRequesterInterface`], and anything interested in
//! proactive state changes implements [`ContextManagerObserverInterface`].
//! [`ContextManagerInterface`] is what all of them talk back to.

use crate::context::AvsContext;
use crate::state::{CapabilityState, StateRefreshPolicy};
use crate::tag::CapabilityTag;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Correlates a context request with its provider responses and timeout.
pub type ContextRequestToken = u64;

/// Reserved token meaning "not answering any request".
pub const NO_TOKEN: ContextRequestToken = 0;

/// Why a context request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ContextRequestError {
    #[error("failed to build context")]
    BuildContextError,
    #[error("state provider timed out")]
    StateProviderTimedOut,
    #[error("endpoint unreachable")]
    EndpointUnreachable,
}

/// Outcome of a legacy `set_state` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetStateResult {
    Success,
    /// The capability was not asked for state under the supplied token.
    StateProviderNotRegistered,
    /// The supplied token does not belong to any pending request.
    StateTokenOutdated,
}

/// What caused a proactively reported state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlexaStateChangeCauseType {
    AlexaInteraction,
    AppInteraction,
    PhysicalInteraction,
    PeriodicPoll,
    RuleTrigger,
    VoiceInteraction,
}

impl fmt::Display for AlexaStateChangeCauseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AlexaInteraction => "ALEXA_INTERACTION",
            Self::AppInteraction => "APP_INTERACTION",
            Self::PhysicalInteraction => "PHYSICAL_INTERACTION",
            Self::PeriodicPoll => "PERIODIC_POLL",
            Self::RuleTrigger => "RULE_TRIGGER",
            Self::VoiceInteraction => "VOICE_INTERACTION",
        };
        f.write_str(name)
    }
}

/// Owner of a capability's live value.
pub trait StateProviderInterface: Send + Sync {
    /// Asked for fresh state under `token`.
    ///
    /// Must eventually answer through
    /// [`ContextManagerInterface::provide_state_response`] or
    /// [`ContextManagerInterface::provide_state_unavailable_response`] (or the
    /// legacy [`ContextManagerInterface::set_state`]) with the same token.
    fn provide_state(&self, tag: &CapabilityTag, token: ContextRequestToken);

    /// Whether this provider can be asked for state at all.
    fn can_state_be_retrieved(&self) -> bool {
        false
    }

    /// Whether the state is left out of contexts requested without reportable
    /// state properties.
    fn has_reportable_state_properties(&self) -> bool {
        false
    }
}

/// Caller of `get_context`; receives exactly one of the two callbacks per token.
pub trait ContextRequesterInterface: Send + Sync {
    fn on_context_available(
        &self,
        endpoint_id: &str,
        context: AvsContext,
        token: ContextRequestToken,
    );

    fn on_context_failure(&self, error: ContextRequestError, token: ContextRequestToken);
}

/// Notified of proactive state reports.
pub trait ContextManagerObserverInterface: Send + Sync {
    fn on_state_changed(
        &self,
        tag: &CapabilityTag,
        state: &CapabilityState,
        cause: AlexaStateChangeCauseType,
    );
}

/// The context manager as seen by providers, requesters and observers.
pub trait ContextManagerInterface: Send + Sync {
    /// Legacy registration: `None` unregisters.
    fn set_state_provider(
        &self,
        tag: &CapabilityTag,
        provider: Option<Arc<dyn StateProviderInterface>>,
    ) {
        match provider {
            Some(provider) => self.add_state_provider(tag, provider),
            None => self.remove_state_provider(tag),
        }
    }

    fn add_state_provider(&self, tag: &CapabilityTag, provider: Arc<dyn StateProviderInterface>);

    fn remove_state_provider(&self, tag: &CapabilityTag);

    /// Legacy state update. `token == NO_TOKEN` is an out-of-band update.
    fn set_state(
        &self,
        tag: &CapabilityTag,
        json_state: &str,
        refresh_policy: StateRefreshPolicy,
        token: ContextRequestToken,
    ) -> SetStateResult;

    /// Requests a context for `endpoint_id` (empty means the default
    /// endpoint). `None` uses the configured default timeout.
    fn get_context(
        &self,
        requester: Arc<dyn ContextRequesterInterface>,
        endpoint_id: &str,
        timeout: Option<Duration>,
    ) -> ContextRequestToken;

    /// Like [`get_context`](Self::get_context), skipping capabilities with
    /// reportable state properties.
    fn get_context_without_reportable_state_properties(
        &self,
        requester: Arc<dyn ContextRequesterInterface>,
        endpoint_id: &str,
        timeout: Option<Duration>,
    ) -> ContextRequestToken;

    fn report_state_change(
        &self,
        tag: &CapabilityTag,
        state: CapabilityState,
        cause: AlexaStateChangeCauseType,
    );

    fn provide_state_response(
        &self,
        tag: &CapabilityTag,
        state: CapabilityState,
        token: ContextRequestToken,
    );

    fn provide_state_unavailable_response(
        &self,
        tag: &CapabilityTag,
        token: ContextRequestToken,
        is_endpoint_unreachable: bool,
    );

    fn add_context_manager_observer(&self, observer: Arc<dyn ContextManagerObserverInterface>);

    fn remove_context_manager_observer(&self, observer: &Arc<dyn ContextManagerObserverInterface>);
}
