//! Capability identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a device endpoint (e.g. `"clientId::productId::serial"`).
pub type EndpointIdentifier = String;

/// Identifies one capability property on one endpoint.
///
/// Ordering is lexicographic over `(namespace, name, endpoint_id, instance)`,
/// which is also the order the fields are declared in, so the derived
/// implementations give the ordering contexts rely on for stable output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityTag {
    namespace: String,
    name: String,
    endpoint_id: EndpointIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instance: Option<String>,
}

impl CapabilityTag {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        endpoint_id: impl Into<EndpointIdentifier>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            endpoint_id: endpoint_id.into(),
            instance: None,
        }
    }

    /// Same tag, scoped to a capability instance (e.g. `"Light.Brightness"`).
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint the capability belongs to. Empty means "the default endpoint".
    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }
}

impl fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}@{}", self.namespace, self.name, self.endpoint_id)?;
        if let Some(instance) = &self.instance {
            write!(f, "#{instance}")?;
        }
        Ok(())
    }
}
