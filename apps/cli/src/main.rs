//! `context-demo`: drives a context manager with simulated providers.
//!
//! Registers a handful of capabilities (one answering synchronously, one from
//! a background thread, one reportable, one legacy), requests a context and
//! prints it as JSON.
//!
//! **Usage:**
//! ```text
//! context-demo [--timeout-ms <ms>] [--endpoint <id>] [--skip-reportable] [--config <path>]
//! ```

mod providers;

use anyhow::{bail, Context, Result};
use avs_common::{
    AlexaStateChangeCauseType, AvsContext, CapabilityState, CapabilityTag, ContextManagerInterface,
    ContextManagerObserverInterface, ContextRequestError, ContextRequestToken,
    ContextRequesterInterface, DeviceInfo, StateRefreshPolicy, NO_TOKEN,
};
use avs_context_manager::{ContextManager, ContextManagerConfig};
use clap::Parser;
use crossbeam_channel::Sender;
use providers::{ConnectivityProvider, PlaybackProvider, VolumeProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Assemble a device context from simulated state providers.
#[derive(Parser)]
#[command(name = "context-demo", about = "Assemble a device context from simulated state providers")]
struct Args {
    /// How long providers get to answer.
    #[arg(long, default_value_t = 500)]
    timeout_ms: u64,

    /// Endpoint to request (defaults to the device's own endpoint).
    #[arg(long)]
    endpoint: Option<String>,

    /// Leave out capabilities with reportable state properties.
    #[arg(long)]
    skip_reportable: bool,

    /// Device info JSON (`{"deviceInfo": {...}}`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Delay before the playback provider answers.
    #[arg(long, default_value_t = 100)]
    playback_delay_ms: u64,
}

enum Outcome {
    Available(String, AvsContext),
    Failure(ContextRequestError),
}

struct ChannelRequester {
    outcomes: Sender<(ContextRequestToken, Outcome)>,
}

impl ContextRequesterInterface for ChannelRequester {
    fn on_context_available(
        &self,
        endpoint_id: &str,
        context: AvsContext,
        token: ContextRequestToken,
    ) {
        let _ = self
            .outcomes
            .send((token, Outcome::Available(endpoint_id.to_string(), context)));
    }

    fn on_context_failure(&self, error: ContextRequestError, token: ContextRequestToken) {
        let _ = self.outcomes.send((token, Outcome::Failure(error)));
    }
}

struct PrintingObserver;

impl ContextManagerObserverInterface for PrintingObserver {
    fn on_state_changed(
        &self,
        tag: &CapabilityTag,
        state: &CapabilityState,
        cause: AlexaStateChangeCauseType,
    ) {
        println!("state changed: {tag} = {} ({cause})", state.value_payload());
    }
}

fn load_device_info(path: Option<&PathBuf>) -> Result<DeviceInfo> {
    match path {
        Some(path) => DeviceInfo::from_file(path)
            .with_context(|| format!("Failed to load device info from {}", path.display())),
        None => Ok(DeviceInfo::new("demo-client", "demo-product", "0001")?),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,avs=debug")),
        )
        .init();

    let args = Args::parse();
    let device_info = load_device_info(args.config.as_ref())?;
    let config = ContextManagerConfig::from_device_info(&device_info)
        .with_default_timeout(Duration::from_millis(args.timeout_ms));
    let manager = ContextManager::new(config)?;
    let endpoint = manager.default_endpoint_id().to_string();

    tracing::info!(endpoint = %endpoint, "Starting context demo");

    let volume = CapabilityTag::new("Speaker", "volume", &endpoint);
    let playback = CapabilityTag::new("PlaybackController", "playbackState", &endpoint);
    let connectivity = CapabilityTag::new("InternetDataPlan", "connectivity", &endpoint);
    let alerts = CapabilityTag::new("Alerts", "AlertsState", &endpoint);

    manager.add_state_provider(&volume, Arc::new(VolumeProvider::new(Arc::downgrade(&manager), 35)));
    manager.add_state_provider(
        &playback,
        Arc::new(PlaybackProvider::new(
            Arc::downgrade(&manager),
            Duration::from_millis(args.playback_delay_ms),
        )),
    );
    manager.add_state_provider(
        &connectivity,
        Arc::new(ConnectivityProvider::new(Arc::downgrade(&manager))),
    );
    manager.set_state(
        &alerts,
        r#"{"allAlerts":[],"activeAlerts":[]}"#,
        StateRefreshPolicy::Never,
        NO_TOKEN,
    );

    manager.add_context_manager_observer(Arc::new(PrintingObserver));
    manager.report_state_change(
        &volume,
        CapabilityState::new("35"),
        AlexaStateChangeCauseType::AppInteraction,
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    let requester = Arc::new(ChannelRequester { outcomes: tx });
    let target = args.endpoint.as_deref().unwrap_or("");
    let token = if args.skip_reportable {
        manager.get_context_without_reportable_state_properties(requester, target, None)
    } else {
        manager.get_context(requester, target, None)
    };

    let wait = Duration::from_millis(args.timeout_ms) + Duration::from_secs(1);
    let (delivered, outcome) = rx
        .recv_timeout(wait)
        .context("No context callback before the deadline")?;
    if delivered != token {
        bail!("Callback for unexpected token {delivered} (expected {token})");
    }

    let result = match outcome {
        Outcome::Available(endpoint_id, context) => {
            println!("context for {endpoint_id} ({} states):", context.len());
            println!("{}", context.to_json());
            Ok(())
        }
        Outcome::Failure(error) => Err(anyhow::anyhow!("Context request {token} failed: {error}")),
    };

    manager.shutdown();
    result
}
