//! Reported capability values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// A value reported for a capability property.
///
/// Immutable once built; updates replace the whole value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityState {
    /// JSON-serializable payload, kept verbatim.
    value_payload: String,

    /// When the value was sampled.
    time_of_sample: DateTime<Utc>,

    /// How stale the sample may be, in milliseconds.
    #[serde(default)]
    uncertainty_in_milliseconds: u32,
}

impl CapabilityState {
    /// A state sampled now, with no uncertainty.
    pub fn new(value_payload: impl Into<String>) -> Self {
        Self::sampled_at(value_payload, Utc::now(), 0)
    }

    pub fn sampled_at(
        value_payload: impl Into<String>,
        time_of_sample: DateTime<Utc>,
        uncertainty_in_milliseconds: u32,
    ) -> Self {
        Self {
            value_payload: value_payload.into(),
            time_of_sample,
            uncertainty_in_milliseconds,
        }
    }

    pub fn value_payload(&self) -> &str {
        &self.value_payload
    }

    pub fn time_of_sample(&self) -> DateTime<Utc> {
        self.time_of_sample
    }

    pub fn uncertainty_in_milliseconds(&self) -> u32 {
        self.uncertainty_in_milliseconds
    }

    /// Whether the payload parses as a single JSON value. Empty is not.
    pub fn is_valid_json(&self) -> bool {
        serde_json::from_str::<&RawValue>(&self.value_payload).is_ok()
    }
}

/// Sample times compare at whole-second (Unix time) resolution.
impl PartialEq for CapabilityState {
    fn eq(&self, other: &Self) -> bool {
        self.value_payload == other.value_payload
            && self.time_of_sample.timestamp() == other.time_of_sample.timestamp()
            && self.uncertainty_in_milliseconds == other.uncertainty_in_milliseconds
    }
}

impl Eq for CapabilityState {}

/// How often a legacy capability must be asked for fresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateRefreshPolicy {
    /// The state never changes once set; never solicited.
    Never,
    /// Solicited on every context request; an empty answer is an error.
    #[default]
    Always,
    /// Solicited on every context request; an empty answer means "omit me".
    Sometimes,
}
