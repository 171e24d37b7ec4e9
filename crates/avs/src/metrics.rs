//! Metric recording abstraction.
//!
//! The context manager only emits counters; where they end up is the
//! recorder's business.

use std::sync::{Arc, Mutex, PoisonError};

/// A named counter value inside a [`MetricEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPoint {
    pub name: String,
    pub value: u64,
}

/// One metric emission: an activity with its data points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEvent {
    pub activity_name: String,
    pub data_points: Vec<DataPoint>,
}

impl MetricEvent {
    pub fn new(activity_name: impl Into<String>) -> Self {
        Self {
            activity_name: activity_name.into(),
            data_points: Vec::new(),
        }
    }

    pub fn with_counter(mut self, name: impl Into<String>, value: u64) -> Self {
        self.data_points.push(DataPoint {
            name: name.into(),
            value,
        });
        self
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        self.data_points
            .iter()
            .find(|point| point.name == name)
            .map(|point| point.value)
    }
}

/// Sink for metric events.
pub trait MetricRecorder: Send + Sync {
    fn record(&self, event: MetricEvent);
}

/// Type alias for shared recorder reference.
pub type MetricRecorderRef = Arc<dyn MetricRecorder>;

/// Discards everything.
pub struct NullMetricRecorder;

impl MetricRecorder for NullMetricRecorder {
    fn record(&self, _event: MetricEvent) {}
}

/// Captures events for later inspection.
#[derive(Default)]
pub struct InMemoryMetricRecorder {
    events: Mutex<Vec<MetricEvent>>,
}

impl InMemoryMetricRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events recorded under `activity_name`.
    pub fn events_for(&self, activity_name: &str) -> Vec<MetricEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.activity_name == activity_name)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricRecorder for InMemoryMetricRecorder {
    fn record(&self, event: MetricEvent) {
        tracing::trace!(activity = %event.activity_name, "metric recorded");
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
