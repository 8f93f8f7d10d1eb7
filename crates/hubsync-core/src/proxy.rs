// ── Device proxy ──
//
// Host-side representative of one device. Listens on its bridge's bus
// for its own id, keeps the last-known snapshot, projects it onto host
// channels, and turns host commands into optimistic submissions.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::{DeviceEvent, Subscriber};
use crate::command::Command;
use crate::error::CoreError;
use crate::host::{HostSink, PropertyValue, StatusDetail, StatusUpdate, channel};
use crate::model::{BridgeId, Device, DeviceId, DeviceState};
use crate::registry::DeviceRegistry;

/// What became of a host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Submitted and adopted optimistically.
    Applied,
    /// State re-read from the bridge.
    Refreshed,
    /// Not valid for this device; nothing was sent.
    Rejected(String),
    /// The bridge refused or could not be reached; the old state stands.
    Failed(String),
    /// No snapshot yet, or the bridge is gone; nothing was sent.
    Unavailable,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Applied | Self::Refreshed)
    }
}

/// One device as the host sees it. Cheaply cloneable.
#[derive(Clone)]
pub struct DeviceProxy {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    id: DeviceId,
    registry: DeviceRegistry,
    sink: Arc<dyn HostSink>,
    snapshot: ArcSwapOption<Device>,
    watchdog: Mutex<Option<CancellationToken>>,
}

impl DeviceProxy {
    pub fn new(id: impl Into<DeviceId>, registry: DeviceRegistry, sink: Arc<dyn HostSink>) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                id: id.into(),
                registry,
                sink,
                snapshot: ArcSwapOption::empty(),
                watchdog: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.inner.id
    }

    /// Last-known snapshot, if the bridge has reported the device.
    pub fn snapshot(&self) -> Option<Arc<Device>> {
        self.inner.snapshot.load_full()
    }

    fn as_subscriber(&self) -> Arc<dyn Subscriber> {
        Arc::clone(&self.inner) as Arc<dyn Subscriber>
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start listening and publish what the registry already knows.
    ///
    /// With a presence interval configured this spawns a watchdog task, so
    /// it must run inside a tokio runtime.
    pub fn activate(&self) {
        if !self.inner.registry.bus().register(self.as_subscriber()) {
            debug!(device = %self.inner.id, "proxy already active");
            return;
        }

        match self.inner.registry.lookup(&self.inner.id) {
            Some(device) => self.inner.adopt(device),
            None => self.inner.report_gone(),
        }

        if let Some(every) = self.inner.registry.config().presence_interval {
            let cancel = CancellationToken::new();
            tokio::spawn(presence_watchdog(
                Arc::clone(&self.inner),
                every,
                cancel.clone(),
            ));
            let previous = self
                .inner
                .watchdog
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .replace(cancel);
            if let Some(previous) = previous {
                previous.cancel();
            }
        }
    }

    /// Stop listening. Idempotent.
    pub fn deactivate(&self) {
        self.inner.registry.bus().unregister(&self.as_subscriber());
        let watchdog = self
            .inner
            .watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watchdog) = watchdog {
            watchdog.cancel();
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Apply a host command.
    ///
    /// Success adopts the desired state immediately, without waiting for
    /// the next poll to confirm it.
    pub async fn handle_command(&self, command: Command) -> CommandOutcome {
        let inner = &self.inner;
        if inner.registry.is_disposed() {
            return CommandOutcome::Unavailable;
        }

        if matches!(command, Command::Refresh) {
            return match inner.registry.fetch_device(&inner.id).await {
                Ok(state) => {
                    let device = inner.device_with(state);
                    inner.registry.record_submitted(&inner.id, &device.state);
                    inner.adopt(device);
                    CommandOutcome::Refreshed
                }
                Err(CoreError::BridgeDisposed) => CommandOutcome::Unavailable,
                Err(e) => inner.report_failure(&e),
            };
        }

        let Some(current) = inner.snapshot.load_full() else {
            inner.report_gone();
            return CommandOutcome::Unavailable;
        };

        let desired = match current.state.apply(&command) {
            Ok(desired) => desired,
            Err(e) => {
                debug!(device = %inner.id, ?command, error = %e, "command rejected");
                return CommandOutcome::Rejected(e.to_string());
            }
        };

        let submitted = inner
            .registry
            .submit_change(&inner.id, &current.state, &desired)
            .await;
        match submitted {
            Ok(()) => {
                inner.registry.record_submitted(&inner.id, &desired);
                inner.adopt(Arc::new(current.with_state(desired)));
                CommandOutcome::Applied
            }
            Err(CoreError::BridgeDisposed) => CommandOutcome::Unavailable,
            Err(e) => inner.report_failure(&e),
        }
    }

    /// Report offline `Gone` if the bridge stopped listing the device.
    pub fn check_presence(&self) -> bool {
        self.inner.check_presence()
    }
}

impl ProxyInner {
    fn device_with(&self, state: DeviceState) -> Arc<Device> {
        let device = match self.snapshot.load_full().or_else(|| self.registry.lookup(&self.id)) {
            Some(known) => known.with_state(state),
            None => Device::new(self.id.clone(), self.id.to_string(), state),
        };
        Arc::new(device)
    }

    /// Take `device` as the current snapshot and republish everything.
    ///
    /// A device its bridge flags unreachable still publishes its last
    /// values but reports offline.
    fn adopt(&self, device: Arc<Device>) {
        self.snapshot.store(Some(Arc::clone(&device)));
        self.sink.publish_status(status_of(&device.state));
        self.republish(&device.state);
    }

    fn report_gone(&self) {
        self.sink.publish_status(StatusUpdate::offline(
            StatusDetail::Gone,
            format!("bridge {} does not report this device", self.registry.id()),
        ));
    }

    fn report_failure(&self, error: &CoreError) -> CommandOutcome {
        warn!(device = %self.id, error = %error, "command failed");
        self.sink.publish_status(StatusUpdate::offline(
            StatusDetail::CommunicationError,
            error.to_string(),
        ));
        CommandOutcome::Failed(error.to_string())
    }

    fn check_presence(&self) -> bool {
        match self.registry.lookup(&self.id) {
            Some(device) => {
                self.sink.publish_status(status_of(&device.state));
                true
            }
            None => {
                self.report_gone();
                false
            }
        }
    }

    /// Project a state onto the host channels.
    fn republish(&self, state: &DeviceState) {
        let sink = &self.sink;
        match state {
            DeviceState::Thermostat(t) => {
                sink.publish_property(channel::CURRENT_TEMPERATURE, PropertyValue::Number(t.temperature));
                sink.publish_property(channel::CURRENT_HUMIDITY, PropertyValue::Number(t.humidity));
                sink.publish_property(channel::SYSTEM_MODE, PropertyValue::Text(t.system_mode.as_str().into()));
                sink.publish_property(channel::HEAT_SETPOINT, PropertyValue::Number(t.heat_setpoint));
                sink.publish_property(channel::COOL_SETPOINT, PropertyValue::Number(t.cool_setpoint));
                sink.publish_property(channel::FAN_MODE, PropertyValue::Text(t.fan_mode.as_str().into()));
                sink.publish_property(channel::SCHEDULE_MODE, PropertyValue::Text(t.schedule.as_str().into()));
                match t.hold_expiry_on(Local::now().date_naive()) {
                    Some(until) => sink.publish_property(channel::HOLD_UNTIL, PropertyValue::DateTime(until)),
                    None => warn!(device = %self.id, period = t.hold_period, "hold period out of range"),
                }
                sink.publish_property(channel::DISPLAY_UNITS, PropertyValue::Text(t.display_units.clone()));
            }
            DeviceState::Light(l) => {
                sink.publish_property(channel::POWER, PropertyValue::Switch(l.on));
                sink.publish_property(channel::LEVEL, PropertyValue::Percent(l.percent()));
            }
        }
    }
}

impl Subscriber for ProxyInner {
    fn on_event(&self, _bridge: &BridgeId, event: &DeviceEvent) -> Result<(), CoreError> {
        if event.device_id() != &self.id {
            return Ok(());
        }
        match event {
            // A Changed for the same device follows in the same cycle.
            DeviceEvent::Added(_) => {}
            DeviceEvent::Changed(device) => self.adopt(Arc::clone(device)),
            DeviceEvent::Removed(_) => self.report_gone(),
        }
        Ok(())
    }
}

fn status_of(state: &DeviceState) -> StatusUpdate {
    match state.unreachable_reason() {
        Some(reason) => StatusUpdate::offline(StatusDetail::CommunicationError, reason),
        None => StatusUpdate::online(),
    }
}

async fn presence_watchdog(inner: Arc<ProxyInner>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                inner.check_presence();
            }
        }
    }
}
