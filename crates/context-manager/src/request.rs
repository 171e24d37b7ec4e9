//! Bookkeeping for in-flight context requests.

use avs_common::{
    CapabilityTag, ContextRequestToken, ContextRequesterInterface, EndpointIdentifier, NO_TOKEN,
};
use avs_threading::TimerToken;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hands out request tokens, never [`NO_TOKEN`].
pub(crate) struct TokenGenerator {
    counter: AtomicU64,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self::starting_after(NO_TOKEN)
    }

    fn starting_after(last: ContextRequestToken) -> Self {
        Self {
            counter: AtomicU64::new(last),
        }
    }

    pub fn next(&self) -> ContextRequestToken {
        loop {
            let token = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if token != NO_TOKEN {
                return token;
            }
        }
    }
}

/// Who asked, and how to stop the clock.
pub(crate) struct RequestTracker {
    pub timer_token: TimerToken,
    pub requester: Arc<dyn ContextRequesterInterface>,
    /// Resolved (never empty) endpoint the context is for.
    pub endpoint_id: EndpointIdentifier,
    pub skip_reportable: bool,
}

/// A request together with the capabilities it still waits on.
///
/// Keeping both in one entry means they can only ever be removed together.
pub(crate) struct PendingRequest {
    pub tracker: RequestTracker,
    pub awaiting: HashSet<CapabilityTag>,
}

/// Why a provider callback could not be matched to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum StaleResponse {
    #[error("outdatedStateToken")]
    UnknownToken,
    #[error("capabilityNotPending")]
    NotPending,
}

#[derive(Default)]
pub(crate) struct PendingRequests {
    requests: HashMap<ContextRequestToken, PendingRequest>,
}

impl PendingRequests {
    pub fn insert(&mut self, token: ContextRequestToken, request: PendingRequest) {
        self.requests.insert(token, request);
    }

    /// Ok when `tag` is still awaited under `token`.
    pub fn check_awaiting(
        &self,
        token: ContextRequestToken,
        tag: &CapabilityTag,
    ) -> Result<(), StaleResponse> {
        let request = self
            .requests
            .get(&token)
            .ok_or(StaleResponse::UnknownToken)?;
        if request.awaiting.contains(tag) {
            Ok(())
        } else {
            Err(StaleResponse::NotPending)
        }
    }

    pub fn mark_received(&mut self, token: ContextRequestToken, tag: &CapabilityTag) {
        if let Some(request) = self.requests.get_mut(&token) {
            request.awaiting.remove(tag);
        }
    }

    /// Removes and returns the tracker once nothing is awaited any more.
    pub fn take_if_complete(&mut self, token: ContextRequestToken) -> Option<RequestTracker> {
        if !self.requests.get(&token)?.awaiting.is_empty() {
            return None;
        }
        self.requests.remove(&token).map(|request| request.tracker)
    }

    /// Removes the request regardless of what it still awaits.
    pub fn take(&mut self, token: ContextRequestToken) -> Option<PendingRequest> {
        self.requests.remove(&token)
    }

    pub fn drain(&mut self) -> Vec<PendingRequest> {
        self.requests.drain().map(|(_, request)| request).collect()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }
}
