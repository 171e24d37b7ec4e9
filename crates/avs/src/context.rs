//! Context snapshots and their JSON projection.

use crate::state::CapabilityState;
use crate::tag::CapabilityTag;
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::BTreeMap;

/// JSON produced by a context with no states.
pub const EMPTY_CONTEXT_JSON: &str = r#"{"properties":[]}"#;

/// Point-in-time aggregation of capability states, at most one per tag.
///
/// Not synchronized: build it on one thread, then hand it off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvsContext {
    states: BTreeMap<CapabilityTag, CapabilityState>,
}

#[derive(Serialize)]
struct ContextJson<'a> {
    properties: Vec<PropertyJson<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PropertyJson<'a> {
    namespace: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance: Option<&'a str>,
    value: &'a RawValue,
    time_of_sample: String,
    uncertainty_in_milliseconds: u32,
}

impl AvsContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the state for `tag`.
    pub fn add_state(&mut self, tag: CapabilityTag, state: CapabilityState) {
        self.states.insert(tag, state);
    }

    pub fn get_state(&self, tag: &CapabilityTag) -> Option<CapabilityState> {
        self.states.get(tag).cloned()
    }

    /// Copy of every state, ordered by tag.
    pub fn get_states(&self) -> BTreeMap<CapabilityTag, CapabilityState> {
        self.states.clone()
    }

    pub fn remove_state(&mut self, tag: &CapabilityTag) {
        self.states.remove(tag);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CapabilityTag, &CapabilityState)> {
        self.states.iter()
    }

    /// Serializes to `{"properties":[...]}` in tag order.
    ///
    /// Payloads are embedded as raw JSON. A state whose payload is not valid
    /// JSON is left out so the document as a whole stays parseable.
    pub fn to_json(&self) -> String {
        let properties = self
            .states
            .iter()
            .filter_map(|(tag, state)| {
                let value = match serde_json::from_str::<&RawValue>(state.value_payload()) {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::warn!(
                            namespace = tag.namespace(),
                            name = tag.name(),
                            error = %err,
                            "Skipping state with invalid JSON payload"
                        );
                        return None;
                    }
                };
                Some(PropertyJson {
                    namespace: tag.namespace(),
                    name: tag.name(),
                    instance: tag.instance(),
                    value,
                    time_of_sample: state
                        .time_of_sample()
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                    uncertainty_in_milliseconds: state.uncertainty_in_milliseconds(),
                })
            })
            .collect();

        match serde_json::to_string(&ContextJson { properties }) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize context");
                EMPTY_CONTEXT_JSON.to_string()
            }
        }
    }
}
