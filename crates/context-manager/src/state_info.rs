//! Per-capability bookkeeping held for each endpoint.

use avs_common::{
    CapabilityState, CapabilityTag, EndpointIdentifier, StateProviderInterface, StateRefreshPolicy,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Capabilities of one endpoint and what is known about them.
pub(crate) type CapabilitiesState = HashMap<CapabilityTag, StateInfo>;

/// All endpoints' capabilities.
pub(crate) type EndpointsState = HashMap<EndpointIdentifier, CapabilitiesState>;

/// Everything the manager tracks for one capability.
#[derive(Clone, Default)]
pub(crate) struct StateInfo {
    /// Registered provider, if any.
    pub provider: Option<Arc<dyn StateProviderInterface>>,

    /// Last known state; absent until first report.
    pub state: Option<CapabilityState>,

    /// Updated through the legacy `set_state` path.
    pub legacy: bool,

    /// Only meaningful for legacy capabilities.
    pub refresh_policy: StateRefreshPolicy,
}

impl StateInfo {
    /// Provider to ask for fresh state on a request, if it should be asked.
    pub fn provider_to_solicit(
        &self,
        skip_reportable: bool,
    ) -> Option<&Arc<dyn StateProviderInterface>> {
        let provider = self.provider.as_ref()?;
        let solicit = if self.legacy {
            self.refresh_policy != StateRefreshPolicy::Never
        } else {
            provider.can_state_be_retrieved()
                && !(skip_reportable && provider.has_reportable_state_properties())
        };
        solicit.then_some(provider)
    }

    /// Cached state to put into an assembled context, if it belongs there.
    pub fn state_for_context(&self, skip_reportable: bool) -> Option<&CapabilityState> {
        let state = self.state.as_ref()?;
        let include = if self.legacy {
            self.refresh_policy != StateRefreshPolicy::Sometimes
                || !state.value_payload().is_empty()
        } else {
            self.provider.as_ref().is_some_and(|provider| {
                provider.can_state_be_retrieved()
                    && !(skip_reportable && provider.has_reportable_state_properties())
            })
        };
        include.then_some(state)
    }
}
