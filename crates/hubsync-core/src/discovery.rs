// ── Discovery ──
//
// Announces newly reported devices so the host can offer them to the
// user. Only `Added` events produce results; everything else is ignored.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bus::{DeviceEvent, Subscriber};
use crate::error::CoreError;
use crate::model::{BridgeId, DeviceId, DeviceKind};
use crate::registry::DeviceRegistry;

/// A device the host has not necessarily seen before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryResult {
    pub id: DeviceId,
    pub label: String,
    pub bridge: BridgeId,
    pub kind: DeviceKind,
}

pub struct DiscoveryService {
    registry: DeviceRegistry,
    listener: Arc<dyn Subscriber>,
}

struct Announcer {
    tx: mpsc::UnboundedSender<DiscoveryResult>,
}

impl Subscriber for Announcer {
    fn on_event(&self, bridge: &BridgeId, event: &DeviceEvent) -> Result<(), CoreError> {
        let DeviceEvent::Added(device) = event else {
            return Ok(());
        };
        debug!(bridge = %bridge, device = %device.id, "discovered device");
        self.tx
            .send(DiscoveryResult {
                id: device.id.clone(),
                label: device.label.clone(),
                bridge: bridge.clone(),
                kind: device.state.kind(),
            })
            .map_err(|_| CoreError::Internal("discovery receiver dropped".into()))
    }
}

impl DiscoveryService {
    pub fn new(registry: DeviceRegistry) -> (Self, mpsc::UnboundedReceiver<DiscoveryResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            registry,
            listener: Arc::new(Announcer { tx }),
        };
        (service, rx)
    }

    /// Start listening. Returns `false` if already active.
    pub fn activate(&self) -> bool {
        self.registry.bus().register(Arc::clone(&self.listener))
    }

    /// Stop listening. Returns `false` if not active.
    pub fn deactivate(&self) -> bool {
        self.registry.bus().unregister(&self.listener)
    }
}
