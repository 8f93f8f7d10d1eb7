// Shared doubles for the hubsync-core integration tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use hubsync_core::{
    CoreError, Device, DeviceId, DeviceKind, DeviceState, DeviceTransport, HostSink, LightState,
    PropertyValue, StatusUpdate, ThermostatState,
};

// ── Scripted transport ──────────────────────────────────────────────

/// A failure a scripted call should produce.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Auth,
    Communication,
}

impl Failure {
    fn error(self) -> CoreError {
        match self {
            Self::Auth => CoreError::AuthenticationFailed {
                message: "bad credentials".into(),
            },
            Self::Communication => CoreError::Communication {
                message: "connection refused".into(),
            },
        }
    }
}

/// Transport whose answers are queued up front. Once the listing queue is
/// drained, the last successful listing repeats.
pub struct ScriptedTransport {
    kind: DeviceKind,
    activations: Mutex<VecDeque<Option<Failure>>>,
    listings: Mutex<VecDeque<Result<Vec<Device>, Failure>>>,
    last_listing: Mutex<Vec<Device>>,
    submit_failure: Mutex<Option<Failure>>,
    fetched: Mutex<Option<DeviceState>>,
    gate: Mutex<Option<Arc<Notify>>>,

    pub activation_times: Mutex<Vec<Instant>>,
    pub list_times: Mutex<Vec<Instant>>,
    pub submissions: Mutex<Vec<(DeviceId, DeviceState, DeviceState)>>,
    pub disposed: AtomicBool,
}

impl ScriptedTransport {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            activations: Mutex::new(VecDeque::new()),
            listings: Mutex::new(VecDeque::new()),
            last_listing: Mutex::new(Vec::new()),
            submit_failure: Mutex::new(None),
            fetched: Mutex::new(None),
            gate: Mutex::new(None),
            activation_times: Mutex::new(Vec::new()),
            list_times: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn fail_activation(self, failure: Failure) -> Self {
        self.activations.lock().unwrap().push_back(Some(failure));
        self
    }

    pub fn listing(self, devices: Vec<Device>) -> Self {
        self.push_listing(devices);
        self
    }

    pub fn failed_listing(self, failure: Failure) -> Self {
        self.listings.lock().unwrap().push_back(Err(failure));
        self
    }

    pub fn push_listing(&self, devices: Vec<Device>) {
        self.listings.lock().unwrap().push_back(Ok(devices));
    }

    pub fn fail_submissions(&self, failure: Option<Failure>) {
        *self.submit_failure.lock().unwrap() = failure;
    }

    pub fn answer_fetch(&self, state: DeviceState) {
        *self.fetched.lock().unwrap() = Some(state);
    }

    /// Park every later listing and submission until the returned `Notify`
    /// releases it (one permit per call).
    pub fn hold_calls(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    pub fn list_count(&self) -> usize {
        self.list_times.lock().unwrap().len()
    }

    pub fn activation_count(&self) -> usize {
        self.activation_times.lock().unwrap().len()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl DeviceTransport for ScriptedTransport {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    async fn activate(&self) -> Result<(), CoreError> {
        self.activation_times.lock().unwrap().push(Instant::now());
        match self.activations.lock().unwrap().pop_front().flatten() {
            Some(failure) => Err(failure.error()),
            None => Ok(()),
        }
    }

    async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        self.list_times.lock().unwrap().push(Instant::now());
        self.pass_gate().await;
        match self.listings.lock().unwrap().pop_front() {
            Some(Ok(devices)) => {
                self.last_listing.lock().unwrap().clone_from(&devices);
                Ok(devices)
            }
            Some(Err(failure)) => Err(failure.error()),
            None => Ok(self.last_listing.lock().unwrap().clone()),
        }
    }

    async fn fetch_device(&self, id: &DeviceId) -> Result<DeviceState, CoreError> {
        self.fetched
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CoreError::DeviceNotFound { id: id.to_string() })
    }

    async fn submit_change(
        &self,
        id: &DeviceId,
        previous: &DeviceState,
        desired: &DeviceState,
    ) -> Result<(), CoreError> {
        self.pass_gate().await;
        if let Some(failure) = *self.submit_failure.lock().unwrap() {
            return Err(failure.error());
        }
        self.submissions
            .lock()
            .unwrap()
            .push((id.clone(), previous.clone(), desired.clone()));
        Ok(())
    }

    async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

// ── Recording sink ──────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub properties: Mutex<Vec<(String, PropertyValue)>>,
    pub statuses: Mutex<Vec<StatusUpdate>>,
}

impl RecordingSink {
    pub fn last_property(&self, name: &str) -> Option<PropertyValue> {
        self.properties
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn values_of(&self, name: &str) -> Vec<PropertyValue> {
        self.properties
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn property_count(&self) -> usize {
        self.properties.lock().unwrap().len()
    }

    pub fn last_status(&self) -> Option<StatusUpdate> {
        self.statuses.lock().unwrap().last().cloned()
    }
}

impl HostSink for RecordingSink {
    fn publish_property(&self, name: &str, value: PropertyValue) {
        self.properties.lock().unwrap().push((name.to_owned(), value));
    }

    fn publish_status(&self, status: StatusUpdate) {
        self.statuses.lock().unwrap().push(status);
    }
}

// ── Logging ─────────────────────────────────────────────────────────

/// Route `tracing` output through the test harness; `RUST_LOG` filters it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn light(id: &str, on: bool, level: u8) -> Device {
    Device::new(
        id,
        format!("Lamp {id}"),
        DeviceState::Light(LightState {
            on,
            level,
            offline: false,
        }),
    )
}

pub fn thermostat(id: &str, heat_setpoint: i64) -> Device {
    Device::new(
        id,
        format!("Thermostat {id}"),
        DeviceState::Thermostat(ThermostatState {
            temperature: 71,
            heat_setpoint,
            ..ThermostatState::default()
        }),
    )
}
