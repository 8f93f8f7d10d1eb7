// ── Device registry ──
//
// One per bridge. Owns the active device set and the poll task that keeps
// it current: activate the transport, list devices on a fixed interval,
// diff against the previous listing, and deliver the events on the bus.
// Communication failures back off linearly; auth failures wait the fixed
// retry delay and re-activate.

mod backoff;
pub mod diff;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::ListenerBus;
use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::host::{StatusDetail, StatusUpdate, ThingStatus};
use crate::model::{BridgeId, Device, DeviceId, DeviceState};
use crate::transport::{DeviceTransport, transport_for};

pub use backoff::backoff_delay;
pub use diff::{ActiveDeviceSet, PollDiff};

// ── Bridge state ─────────────────────────────────────────────────────

/// Lifecycle of one bridge's poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeState {
    /// Not started, or the last activation attempt failed.
    Uninitialized { reason: Option<String> },
    /// Activation (login or pairing) in progress.
    Authenticating,
    /// The most recent poll succeeded.
    Polling,
    /// Consecutive communication failures; the next poll is delayed.
    Backoff { failures: u32, reason: String },
    Disposed,
}

impl BridgeState {
    /// Host-facing status. Only `Polling` is online.
    pub fn status(&self) -> StatusUpdate {
        match self {
            Self::Polling => StatusUpdate::online(),
            Self::Uninitialized { reason: None } | Self::Authenticating => StatusUpdate {
                status: ThingStatus::Unknown,
                detail: StatusDetail::None,
                reason: None,
            },
            Self::Uninitialized {
                reason: Some(reason),
            } => StatusUpdate::offline(StatusDetail::ConfigurationError, reason.clone()),
            Self::Backoff { reason, .. } => {
                StatusUpdate::offline(StatusDetail::CommunicationError, reason.clone())
            }
            Self::Disposed => StatusUpdate::offline(StatusDetail::None, "bridge disposed"),
        }
    }

    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Polling)
    }
}

// ── Registry ─────────────────────────────────────────────────────────

/// Poller and device index for one bridge.
///
/// Cheaply cloneable. Call [`start()`](Self::start) to begin polling and
/// [`dispose()`](Self::dispose) to stop; the poll task keeps the registry
/// alive until then.
#[derive(Clone)]
pub struct DeviceRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: BridgeConfig,
    transport: Arc<dyn DeviceTransport>,
    bus: Arc<ListenerBus>,
    active: ArcSwap<ActiveDeviceSet>,
    state: watch::Sender<BridgeState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Serializes poll cycles so two diffs never interleave.
    poll_lock: Mutex<()>,
    /// Held shared by every transport call; `dispose` takes it exclusively.
    calls: RwLock<()>,
}

impl DeviceRegistry {
    /// Build the registry and the transport its configuration describes.
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let transport = transport_for(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Build the registry around an existing transport.
    pub fn with_transport(config: BridgeConfig, transport: Arc<dyn DeviceTransport>) -> Self {
        let (state, _) = watch::channel(BridgeState::Uninitialized { reason: None });
        Self {
            inner: Arc::new(RegistryInner {
                bus: Arc::new(ListenerBus::new(config.id.clone())),
                config,
                transport,
                active: ArcSwap::from_pointee(ActiveDeviceSet::new()),
                state,
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
                poll_lock: Mutex::new(()),
                calls: RwLock::new(()),
            }),
        }
    }

    pub fn id(&self) -> &BridgeId {
        &self.inner.config.id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &Arc<dyn DeviceTransport> {
        &self.inner.transport
    }

    pub fn bus(&self) -> &Arc<ListenerBus> {
        &self.inner.bus
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the poll task. A second call while running is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::BridgeDisposed);
        }
        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            return Ok(());
        }
        info!(bridge = %self.id(), "starting poller");
        *task = Some(tokio::spawn(poll_task(
            self.clone(),
            self.inner.cancel.clone(),
        )));
        Ok(())
    }

    /// Stop polling, wait for the task and any in-flight transport call to
    /// finish, and release the session.
    ///
    /// Once this returns the transport is never called again and no further
    /// events are delivered. Safe to call more than once.
    pub async fn dispose(&self) {
        self.inner.cancel.cancel();

        let handle = self.inner.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(bridge = %self.id(), error = %e, "poll task ended abnormally");
            }
        }

        let _quiesced = self.inner.calls.write().await;
        self.inner.transport.dispose().await;
        self.set_state(BridgeState::Disposed);
        debug!(bridge = %self.id(), "disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Run one poll cycle now: list, diff, swap the active set, deliver.
    pub async fn poll_now(&self) -> Result<(), CoreError> {
        if self.is_disposed() {
            return Err(CoreError::BridgeDisposed);
        }
        let _guard = self.inner.poll_lock.lock().await;
        let _in_flight = self.inner.calls.read().await;
        if self.is_disposed() {
            return Err(CoreError::BridgeDisposed);
        }

        let fresh = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => return Err(CoreError::BridgeDisposed),
            result = self.inner.transport.list_devices() => result?,
        };
        let prior = self.inner.active.load_full();
        let PollDiff { next, events } = diff::compute(&prior, fresh, self.inner.config.emit_removals);

        debug!(
            bridge = %self.id(),
            devices = next.len(),
            events = events.len(),
            "poll cycle complete"
        );
        self.inner.active.store(Arc::new(next));
        self.inner.bus.deliver_all(&events);
        Ok(())
    }

    // ── Device operations ────────────────────────────────────────────

    /// Fetch one device's current state from the bridge.
    pub async fn fetch_device(&self, id: &DeviceId) -> Result<DeviceState, CoreError> {
        self.guarded(self.inner.transport.fetch_device(id)).await
    }

    /// Submit a state change for one device.
    pub async fn submit_change(
        &self,
        id: &DeviceId,
        previous: &DeviceState,
        desired: &DeviceState,
    ) -> Result<(), CoreError> {
        self.guarded(self.inner.transport.submit_change(id, previous, desired))
            .await
    }

    /// Run a transport call unless the bridge is disposed; abandon it if
    /// disposal starts meanwhile.
    async fn guarded<T>(
        &self,
        call: impl Future<Output = Result<T, CoreError>>,
    ) -> Result<T, CoreError> {
        let _in_flight = self.inner.calls.read().await;
        if self.is_disposed() {
            return Err(CoreError::BridgeDisposed);
        }
        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(CoreError::BridgeDisposed),
            result = call => result,
        }
    }

    // ── Active set ───────────────────────────────────────────────────

    /// Latest known snapshot of one device.
    pub fn lookup(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.inner.active.load().get(id).cloned()
    }

    /// The whole active set as of the last poll or submission.
    pub fn devices(&self) -> Arc<ActiveDeviceSet> {
        self.inner.active.load_full()
    }

    /// Replace one device's state after a successful submission.
    ///
    /// Ignored if the device has since left the active set.
    pub fn record_submitted(&self, id: &DeviceId, state: &DeviceState) {
        self.inner.active.rcu(|current| {
            let mut next = ActiveDeviceSet::clone(current);
            if let Some(slot) = next.get_mut(id) {
                *slot = Arc::new(slot.with_state(state.clone()));
            }
            next
        });
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn state(&self) -> BridgeState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<BridgeState> {
        self.inner.state.subscribe()
    }

    fn set_state(&self, next: BridgeState) {
        let bridge = self.id();
        self.inner.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!(bridge = %bridge, from = ?current, to = ?next, "bridge state changed");
            *current = next;
            true
        });
    }
}

// ── Poll task ────────────────────────────────────────────────────────

/// Sleep unless cancelled first. Returns `false` on cancellation.
async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

async fn poll_task(registry: DeviceRegistry, cancel: CancellationToken) {
    let interval = registry.inner.config.poll_interval;
    let retry_delay = registry.inner.config.retry_delay;

    'session: loop {
        registry.set_state(BridgeState::Authenticating);
        let activated = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = registry.inner.transport.activate() => result,
        };
        if let Err(e) = activated {
            warn!(bridge = %registry.id(), error = %e, "activation failed");
            registry.set_state(BridgeState::Uninitialized {
                reason: Some(e.to_string()),
            });
            if !sleep_or_cancel(&cancel, retry_delay).await {
                break;
            }
            continue;
        }
        registry.set_state(BridgeState::Polling);

        let mut failures: u32 = 0;
        loop {
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => break 'session,
                result = registry.poll_now() => result,
            };

            let delay = match polled {
                Ok(()) => {
                    failures = 0;
                    registry.set_state(BridgeState::Polling);
                    interval
                }
                Err(e) if e.is_auth() => {
                    warn!(bridge = %registry.id(), error = %e, "poll rejected, re-activating");
                    registry.set_state(BridgeState::Uninitialized {
                        reason: Some(e.to_string()),
                    });
                    if !sleep_or_cancel(&cancel, retry_delay).await {
                        break 'session;
                    }
                    continue 'session;
                }
                Err(CoreError::BridgeDisposed) => break 'session,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!(bridge = %registry.id(), failures, error = %e, "poll failed");
                    registry.set_state(BridgeState::Backoff {
                        failures,
                        reason: e.to_string(),
                    });
                    backoff_delay(interval, failures)
                }
            };

            if !sleep_or_cancel(&cancel, delay).await {
                break 'session;
            }
        }
    }
    debug!(bridge = %registry.id(), "poll task exiting");
}
