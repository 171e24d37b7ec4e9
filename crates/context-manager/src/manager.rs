//! The context manager.
//!
//! Every public method is thin: it either takes one internal lock for a quick
//! synchronous update, or submits a job to the executor and returns. All
//! request bookkeeping is resolved under the requests lock, and the outcome is
//! delivered to the requester only after that lock is released.

use crate::config::ContextManagerConfig;
use crate::error::{ContextManagerError, Result};
use crate::request::{
    PendingRequest, PendingRequests, RequestTracker, StaleResponse, TokenGenerator,
};
use crate::state_info::{EndpointsState, StateInfo};
use avs_common::{
    AlexaStateChangeCauseType, AvsContext, CapabilityState, CapabilityTag, ContextManagerInterface,
    ContextManagerObserverInterface, ContextRequestError, ContextRequestToken,
    ContextRequesterInterface, EndpointIdentifier, MetricEvent, MetricRecorderRef, NullMetricRecorder,
    SetStateResult, StateProviderInterface, StateRefreshPolicy, NO_TOKEN,
};
use avs_threading::{Executor, MultiTimer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// Metric activity recorded once per capability still pending at a timeout.
pub const STATE_PROVIDER_TIMEOUT_METRIC: &str = "CONTEXT_MANAGER-stateProviderTimeout";

/// Terminal outcome of a request, computed under the requests lock and
/// delivered after it is released.
enum Resolution {
    Available {
        requester: Arc<dyn ContextRequesterInterface>,
        endpoint_id: EndpointIdentifier,
        token: ContextRequestToken,
        skip_reportable: bool,
    },
    Failed {
        requester: Arc<dyn ContextRequesterInterface>,
        error: ContextRequestError,
        token: ContextRequestToken,
    },
}

/// Aggregates capability states into contexts on demand.
pub struct ContextManager {
    inner: Arc<Inner>,
}

struct Inner {
    default_endpoint_id: EndpointIdentifier,
    default_timeout: Duration,
    endpoints_state: Mutex<EndpointsState>,
    requests: Mutex<PendingRequests>,
    observers: Mutex<Vec<Arc<dyn ContextManagerObserverInterface>>>,
    tokens: TokenGenerator,
    multi_timer: Arc<MultiTimer>,
    metric_recorder: MetricRecorderRef,
    executor: Executor,
}

impl ContextManager {
    /// Manager with its own timer and no metric sink.
    pub fn new(config: ContextManagerConfig) -> Result<Arc<Self>> {
        let multi_timer = Arc::new(MultiTimer::new()?);
        Self::with_collaborators(config, multi_timer, Arc::new(NullMetricRecorder))
    }

    pub fn with_collaborators(
        config: ContextManagerConfig,
        multi_timer: Arc<MultiTimer>,
        metric_recorder: MetricRecorderRef,
    ) -> Result<Arc<Self>> {
        if config.default_endpoint_id.is_empty() {
            return Err(ContextManagerError::EmptyDefaultEndpoint);
        }

        let inner = Inner {
            default_endpoint_id: config.default_endpoint_id,
            default_timeout: config.default_timeout,
            endpoints_state: Mutex::new(EndpointsState::new()),
            requests: Mutex::new(PendingRequests::default()),
            observers: Mutex::new(Vec::new()),
            tokens: TokenGenerator::new(),
            multi_timer,
            metric_recorder,
            executor: Executor::new("context-manager")?,
        };

        tracing::info!(
            default_endpoint = %inner.default_endpoint_id,
            default_timeout_ms = inner.default_timeout.as_millis() as u64,
            "ContextManager created"
        );

        Ok(Arc::new(Self {
            inner: Arc::new(inner),
        }))
    }

    pub fn default_endpoint_id(&self) -> &str {
        &self.inner.default_endpoint_id
    }

    /// Number of requests still waiting for providers.
    pub fn pending_request_count(&self) -> usize {
        lock(&self.inner.requests).len()
    }

    /// Drain already-submitted work, then drop all pending requests and
    /// observers without notifying anyone. Runs on drop as well.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    fn submit<F>(&self, operation: &'static str, job: F)
    where
        F: FnOnce(&Inner) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        if let Err(err) = self.inner.executor.submit(move || job(&inner)) {
            tracing::warn!(operation, error = %err, "Dropping operation");
        }
    }

    fn request_context(
        &self,
        requester: Arc<dyn ContextRequesterInterface>,
        endpoint_id: &str,
        timeout: Option<Duration>,
        skip_reportable: bool,
    ) -> ContextRequestToken {
        let token = self.inner.tokens.next();
        let endpoint_id = self.inner.resolve_endpoint(endpoint_id).to_string();
        let timeout = timeout.unwrap_or(self.inner.default_timeout);

        let weak = Arc::downgrade(&self.inner);
        self.submit("getContext", move |inner| {
            inner.start_request(weak, requester, endpoint_id, timeout, skip_reportable, token);
        });
        token
    }
}

impl Drop for ContextManager {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl ContextManagerInterface for ContextManager {
    fn add_state_provider(&self, tag: &CapabilityTag, provider: Arc<dyn StateProviderInterface>) {
        let endpoint_id = self.inner.resolve_endpoint(tag.endpoint_id()).to_string();
        tracing::debug!(capability = %tag, endpoint = %endpoint_id, "addStateProvider");

        // Any state reported before registration is kept.
        lock(&self.inner.endpoints_state)
            .entry(endpoint_id)
            .or_default()
            .entry(tag.clone())
            .or_default()
            .provider = Some(provider);
    }

    fn remove_state_provider(&self, tag: &CapabilityTag) {
        let endpoint_id = self.inner.resolve_endpoint(tag.endpoint_id());

        let mut endpoints = lock(&self.inner.endpoints_state);
        let Some(capabilities) = endpoints.get_mut(endpoint_id) else {
            tracing::debug!(capability = %tag, "removeStateProvider: unknown endpoint");
            return;
        };
        if capabilities.remove(tag).is_some() {
            tracing::debug!(capability = %tag, "removeStateProvider");
        }
        if capabilities.is_empty() {
            endpoints.remove(endpoint_id);
        }
    }

    fn set_state(
        &self,
        tag: &CapabilityTag,
        json_state: &str,
        refresh_policy: StateRefreshPolicy,
        token: ContextRequestToken,
    ) -> SetStateResult {
        if token == NO_TOKEN {
            let tag = tag.clone();
            let json_state = json_state.to_string();
            self.submit("setState", move |inner| {
                inner.update_legacy_state(&tag, &json_state, refresh_policy);
            });
            return SetStateResult::Success;
        }

        // The result is returned synchronously, so bookkeeping runs on the
        // caller's thread; only the callback is handed to the executor.
        let resolution = {
            let mut requests = lock(&self.inner.requests);
            if let Err(reason) = requests.check_awaiting(token, tag) {
                tracing::error!(capability = %tag, token, %reason, "setStateFailed");
                return match reason {
                    StaleResponse::UnknownToken => SetStateResult::StateTokenOutdated,
                    StaleResponse::NotPending => SetStateResult::StateProviderNotRegistered,
                };
            }

            self.inner.update_legacy_state(tag, json_state, refresh_policy);

            if json_state.is_empty() && refresh_policy == StateRefreshPolicy::Always {
                tracing::error!(capability = %tag, token, "setState: empty state with ALWAYS policy");
                self.inner
                    .fail_locked(&mut requests, token, ContextRequestError::BuildContextError)
            } else {
                requests.mark_received(token, tag);
                self.inner.complete_if_ready_locked(&mut requests, token)
            }
        };

        if let Some(resolution) = resolution {
            self.submit("setState", move |inner| inner.deliver(resolution));
        }
        SetStateResult::Success
    }

    fn get_context(
        &self,
        requester: Arc<dyn ContextRequesterInterface>,
        endpoint_id: &str,
        timeout: Option<Duration>,
    ) -> ContextRequestToken {
        self.request_context(requester, endpoint_id, timeout, false)
    }

    fn get_context_without_reportable_state_properties(
        &self,
        requester: Arc<dyn ContextRequesterInterface>,
        endpoint_id: &str,
        timeout: Option<Duration>,
    ) -> ContextRequestToken {
        self.request_context(requester, endpoint_id, timeout, true)
    }

    fn report_state_change(
        &self,
        tag: &CapabilityTag,
        state: CapabilityState,
        cause: AlexaStateChangeCauseType,
    ) {
        let tag = tag.clone();
        self.submit("reportStateChange", move |inner| {
            inner.update_capability_state(&tag, state.clone());

            let observers = lock(&inner.observers).clone();
            tracing::debug!(capability = %tag, %cause, observers = observers.len(), "reportStateChange");
            for observer in observers {
                observer.on_state_changed(&tag, &state, cause);
            }
        });
    }

    fn provide_state_response(
        &self,
        tag: &CapabilityTag,
        state: CapabilityState,
        token: ContextRequestToken,
    ) {
        let tag = tag.clone();
        self.submit("provideStateResponse", move |inner| {
            let resolution = {
                let mut requests = lock(&inner.requests);
                if let Err(reason) = requests.check_awaiting(token, &tag) {
                    // Stale answers never touch the cache.
                    tracing::error!(capability = %tag, token, %reason, "provideStateResponseFailed");
                    return;
                }
                inner.update_capability_state(&tag, state);
                requests.mark_received(token, &tag);
                inner.complete_if_ready_locked(&mut requests, token)
            };
            if let Some(resolution) = resolution {
                inner.deliver(resolution);
            }
        });
    }

    fn provide_state_unavailable_response(
        &self,
        tag: &CapabilityTag,
        token: ContextRequestToken,
        is_endpoint_unreachable: bool,
    ) {
        let tag = tag.clone();
        self.submit("provideStateUnavailableResponse", move |inner| {
            let resolution = {
                let mut requests = lock(&inner.requests);
                if let Err(reason) = requests.check_awaiting(token, &tag) {
                    tracing::error!(
                        capability = %tag,
                        token,
                        %reason,
                        "provideStateUnavailableResponseFailed"
                    );
                    return;
                }

                if is_endpoint_unreachable {
                    inner.fail_locked(&mut requests, token, ContextRequestError::EndpointUnreachable)
                } else if inner.has_cached_state(&tag) {
                    tracing::debug!(capability = %tag, token, "Using cached state");
                    requests.mark_received(token, &tag);
                    inner.complete_if_ready_locked(&mut requests, token)
                } else {
                    tracing::error!(capability = %tag, token, "No state available and nothing cached");
                    inner.fail_locked(&mut requests, token, ContextRequestError::BuildContextError)
                }
            };
            if let Some(resolution) = resolution {
                inner.deliver(resolution);
            }
        });
    }

    fn add_context_manager_observer(&self, observer: Arc<dyn ContextManagerObserverInterface>) {
        let mut observers = lock(&self.inner.observers);
        if observers.iter().any(|existing| same_observer(existing, &observer)) {
            return;
        }
        observers.push(observer);
    }

    fn remove_context_manager_observer(&self, observer: &Arc<dyn ContextManagerObserverInterface>) {
        lock(&self.inner.observers).retain(|existing| !same_observer(existing, observer));
    }
}

impl Inner {
    fn resolve_endpoint<'a>(&'a self, endpoint_id: &'a str) -> &'a str {
        if endpoint_id.is_empty() {
            &self.default_endpoint_id
        } else {
            endpoint_id
        }
    }

    /// Runs on the executor: arm the timeout, record what is awaited, then ask
    /// the providers.
    fn start_request(
        &self,
        weak: Weak<Inner>,
        requester: Arc<dyn ContextRequesterInterface>,
        endpoint_id: EndpointIdentifier,
        timeout: Duration,
        skip_reportable: bool,
        token: ContextRequestToken,
    ) {
        let timer_token = match self.multi_timer.submit_task(timeout, move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_timeout(token);
            }
        }) {
            Ok(timer_token) => timer_token,
            Err(err) => {
                tracing::error!(token, error = %err, "getContextFailed: cannot arm timeout");
                requester.on_context_failure(ContextRequestError::BuildContextError, token);
                return;
            }
        };

        // Providers are consulted outside the lock.
        let capabilities: Vec<(CapabilityTag, StateInfo)> = lock(&self.endpoints_state)
            .get(&endpoint_id)
            .map(|capabilities| {
                capabilities
                    .iter()
                    .map(|(tag, info)| (tag.clone(), info.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let solicited: Vec<(CapabilityTag, Arc<dyn StateProviderInterface>)> = capabilities
            .iter()
            .filter_map(|(tag, info)| {
                info.provider_to_solicit(skip_reportable)
                    .map(|provider| (tag.clone(), Arc::clone(provider)))
            })
            .collect();

        tracing::debug!(
            token,
            endpoint = %endpoint_id,
            capabilities = capabilities.len(),
            solicited = solicited.len(),
            skip_reportable,
            "getContext"
        );

        let resolution = {
            let mut requests = lock(&self.requests);
            requests.insert(
                token,
                PendingRequest {
                    tracker: RequestTracker {
                        timer_token,
                        requester,
                        endpoint_id,
                        skip_reportable,
                    },
                    awaiting: solicited.iter().map(|(tag, _)| tag.clone()).collect(),
                },
            );
            self.complete_if_ready_locked(&mut requests, token)
        };

        match resolution {
            Some(resolution) => self.deliver(resolution),
            None => {
                for (tag, provider) in &solicited {
                    provider.provide_state(tag, token);
                }
            }
        }
    }

    /// Timer thread: hand the timeout to the executor so it is ordered with
    /// everything else.
    fn on_timeout(self: Arc<Self>, token: ContextRequestToken) {
        let inner = Arc::clone(&self);
        let submitted = self.executor.submit(move || {
            let resolution = {
                let mut requests = lock(&inner.requests);
                inner.fail_locked(&mut requests, token, ContextRequestError::StateProviderTimedOut)
            };
            if let Some(resolution) = resolution {
                inner.deliver(resolution);
            }
        });
        if let Err(err) = submitted {
            tracing::debug!(token, error = %err, "Timeout after shutdown ignored");
        }
    }

    /// Success path: when `token` awaits nothing more, stop its timer and
    /// take it out of the pending set.
    fn complete_if_ready_locked(
        &self,
        requests: &mut PendingRequests,
        token: ContextRequestToken,
    ) -> Option<Resolution> {
        let tracker = requests.take_if_complete(token)?;
        self.multi_timer.cancel_task(tracker.timer_token);
        Some(Resolution::Available {
            requester: tracker.requester,
            endpoint_id: tracker.endpoint_id,
            token,
            skip_reportable: tracker.skip_reportable,
        })
    }

    /// Failure path. `None` when the request already resolved.
    fn fail_locked(
        &self,
        requests: &mut PendingRequests,
        token: ContextRequestToken,
        error: ContextRequestError,
    ) -> Option<Resolution> {
        let Some(request) = requests.take(token) else {
            tracing::debug!(token, %error, "Request already resolved");
            return None;
        };
        self.multi_timer.cancel_task(request.tracker.timer_token);

        if error == ContextRequestError::StateProviderTimedOut {
            for tag in &request.awaiting {
                tracing::warn!(token, capability = %tag, "State provider timed out");
                self.metric_recorder.record(
                    MetricEvent::new(STATE_PROVIDER_TIMEOUT_METRIC).with_counter(tag.namespace(), 1),
                );
            }
        }
        tracing::error!(token, %error, still_pending = request.awaiting.len(), "getContextFailed");

        Some(Resolution::Failed {
            requester: request.tracker.requester,
            error,
            token,
        })
    }

    /// Called with no internal lock held.
    fn deliver(&self, resolution: Resolution) {
        match resolution {
            Resolution::Available {
                requester,
                endpoint_id,
                token,
                skip_reportable,
            } => match self.build_context(&endpoint_id, skip_reportable) {
                Ok(context) => {
                    tracing::debug!(token, endpoint = %endpoint_id, states = context.len(), "Context available");
                    requester.on_context_available(&endpoint_id, context, token);
                }
                Err(malformed) => {
                    tracing::error!(token, capability = %malformed, "getContextFailed: state is not valid JSON");
                    requester.on_context_failure(ContextRequestError::BuildContextError, token);
                }
            },
            Resolution::Failed {
                requester,
                error,
                token,
            } => requester.on_context_failure(error, token),
        }
    }

    /// Fails with the first included capability whose payload is not JSON.
    fn build_context(
        &self,
        endpoint_id: &str,
        skip_reportable: bool,
    ) -> std::result::Result<AvsContext, CapabilityTag> {
        let capabilities: Vec<(CapabilityTag, StateInfo)> = lock(&self.endpoints_state)
            .get(endpoint_id)
            .map(|capabilities| {
                capabilities
                    .iter()
                    .filter(|(_, info)| info.state.is_some())
                    .map(|(tag, info)| (tag.clone(), info.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let mut context = AvsContext::new();
        for (tag, info) in capabilities {
            if let Some(state) = info.state_for_context(skip_reportable) {
                if !state.is_valid_json() {
                    return Err(tag);
                }
                context.add_state(tag, state.clone());
            }
        }
        Ok(context)
    }

    fn update_capability_state(&self, tag: &CapabilityTag, state: CapabilityState) {
        let endpoint_id = self.resolve_endpoint(tag.endpoint_id()).to_string();
        let mut endpoints = lock(&self.endpoints_state);
        let info = endpoints
            .entry(endpoint_id)
            .or_default()
            .entry(tag.clone())
            .or_default();
        info.state = Some(state);
        info.legacy = false;
    }

    fn update_legacy_state(
        &self,
        tag: &CapabilityTag,
        json_state: &str,
        refresh_policy: StateRefreshPolicy,
    ) {
        let endpoint_id = self.resolve_endpoint(tag.endpoint_id()).to_string();
        let mut endpoints = lock(&self.endpoints_state);
        let info = endpoints
            .entry(endpoint_id)
            .or_default()
            .entry(tag.clone())
            .or_default();
        info.state = Some(CapabilityState::new(json_state));
        info.legacy = true;
        info.refresh_policy = refresh_policy;
    }

    fn has_cached_state(&self, tag: &CapabilityTag) -> bool {
        let endpoint_id = self.resolve_endpoint(tag.endpoint_id());
        lock(&self.endpoints_state)
            .get(endpoint_id)
            .and_then(|capabilities| capabilities.get(tag))
            .is_some_and(|info| info.state.is_some())
    }

    fn shutdown(&self) {
        if self.executor.is_shutdown() {
            return;
        }
        tracing::info!("ContextManager shutting down");

        self.executor.shutdown();

        let discarded = lock(&self.requests).drain();
        for request in &discarded {
            self.multi_timer.cancel_task(request.tracker.timer_token);
        }
        if !discarded.is_empty() {
            tracing::warn!(discarded = discarded.len(), "Discarding pending context requests");
        }
        lock(&self.observers).clear();
    }
}

fn same_observer(
    a: &Arc<dyn ContextManagerObserverInterface>,
    b: &Arc<dyn ContextManagerObserverInterface>,
) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
