//! Context manager configuration.

use avs_common::{DeviceInfo, EndpointIdentifier};
use std::time::Duration;

/// How long providers get to answer when a request names no timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextManagerConfig {
    /// Substituted wherever an empty endpoint id is supplied.
    pub default_endpoint_id: EndpointIdentifier,

    /// Timeout for `get_context` calls that pass `None`.
    pub default_timeout: Duration,
}

impl ContextManagerConfig {
    pub fn new(default_endpoint_id: impl Into<EndpointIdentifier>) -> Self {
        Self {
            default_endpoint_id: default_endpoint_id.into(),
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_device_info(device_info: &DeviceInfo) -> Self {
        Self::new(device_info.default_endpoint_id())
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}
