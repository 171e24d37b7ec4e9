//! Simulated device capabilities.

use avs_common::{
    CapabilityState, CapabilityTag, ContextManagerInterface, ContextRequestToken,
    StateProviderInterface,
};
use avs_context_manager::ContextManager;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Weak;
use std::time::Duration;

/// Speaker volume, answered synchronously from inside the request.
pub struct VolumeProvider {
    manager: Weak<ContextManager>,
    volume: AtomicU8,
}

impl VolumeProvider {
    pub fn new(manager: Weak<ContextManager>, volume: u8) -> Self {
        Self {
            manager,
            volume: AtomicU8::new(volume),
        }
    }
}

impl StateProviderInterface for VolumeProvider {
    fn provide_state(&self, tag: &CapabilityTag, token: ContextRequestToken) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        let volume = self.volume.load(Ordering::Relaxed);
        tracing::debug!(capability = %tag, token, volume, "Providing volume");
        manager.provide_state_response(tag, CapabilityState::new(volume.to_string()), token);
    }

    fn can_state_be_retrieved(&self) -> bool {
        true
    }
}

/// Player activity, answered from a worker thread after a short delay.
pub struct PlaybackProvider {
    manager: Weak<ContextManager>,
    delay: Duration,
}

impl PlaybackProvider {
    pub fn new(manager: Weak<ContextManager>, delay: Duration) -> Self {
        Self { manager, delay }
    }
}

impl StateProviderInterface for PlaybackProvider {
    fn provide_state(&self, tag: &CapabilityTag, token: ContextRequestToken) {
        let manager = self.manager.clone();
        let tag = tag.clone();
        let delay = self.delay;
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            if let Some(manager) = manager.upgrade() {
                manager.provide_state_response(
                    &tag,
                    CapabilityState::new(r#"{"playerActivity":"PLAYING","offsetInMilliseconds":31000}"#),
                    token,
                );
            }
        });
    }

    fn can_state_be_retrieved(&self) -> bool {
        true
    }
}

/// Network connectivity. Reportable, so skipped by reduced requests.
pub struct ConnectivityProvider {
    manager: Weak<ContextManager>,
}

impl ConnectivityProvider {
    pub fn new(manager: Weak<ContextManager>) -> Self {
        Self { manager }
    }
}

impl StateProviderInterface for ConnectivityProvider {
    fn provide_state(&self, tag: &CapabilityTag, token: ContextRequestToken) {
        if let Some(manager) = self.manager.upgrade() {
            manager.provide_state_response(
                tag,
                CapabilityState::new(r#"{"type":"WIFI","signalStrength":-48}"#),
                token,
            );
        }
    }

    fn can_state_be_retrieved(&self) -> bool {
        true
    }

    fn has_reportable_state_properties(&self) -> bool {
        true
    }
}
