// ── Listener bus ──
//
// Copy-on-write subscriber list for one bridge. Registration swaps in a
// new `Vec`; delivery iterates whatever snapshot was current when it
// started, so it never observes a half-applied register or unregister.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::CoreError;
use crate::model::{BridgeId, Device, DeviceId};

/// Something that happened to a device during a poll or a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// First time this bridge reports the device.
    Added(Arc<Device>),
    /// Fresh state for a device; sent every poll, changed or not.
    Changed(Arc<Device>),
    /// The bridge stopped reporting the device.
    Removed(DeviceId),
}

impl DeviceEvent {
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Added(d) | Self::Changed(d) => &d.id,
            Self::Removed(id) => id,
        }
    }
}

/// A registered recipient of device events.
///
/// An `Err` is logged by the bus and does not stop delivery to anyone else.
pub trait Subscriber: Send + Sync {
    fn on_event(&self, bridge: &BridgeId, event: &DeviceEvent) -> Result<(), CoreError>;
}

/// Subscriber list of one bridge.
pub struct ListenerBus {
    bridge: BridgeId,
    subscribers: ArcSwap<Vec<Arc<dyn Subscriber>>>,
}

impl ListenerBus {
    pub fn new(bridge: BridgeId) -> Self {
        Self {
            bridge,
            subscribers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn bridge(&self) -> &BridgeId {
        &self.bridge
    }

    /// Add a subscriber. Returns `false` if this exact subscriber is already registered.
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        let mut added = false;
        self.subscribers.rcu(|current| {
            if current.iter().any(|s| Arc::ptr_eq(s, &subscriber)) {
                added = false;
                Arc::clone(current)
            } else {
                added = true;
                let mut next = Vec::with_capacity(current.len() + 1);
                next.extend(current.iter().cloned());
                next.push(Arc::clone(&subscriber));
                Arc::new(next)
            }
        });
        added
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unregister(&self, subscriber: &Arc<dyn Subscriber>) -> bool {
        let mut removed = false;
        self.subscribers.rcu(|current| {
            let next: Vec<_> = current
                .iter()
                .filter(|s| !Arc::ptr_eq(*s, subscriber))
                .cloned()
                .collect();
            removed = next.len() != current.len();
            Arc::new(next)
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver one event to every subscriber in the current snapshot.
    pub fn deliver(&self, event: &DeviceEvent) {
        let snapshot = self.subscribers.load_full();
        for subscriber in snapshot.iter() {
            if let Err(e) = subscriber.on_event(&self.bridge, event) {
                warn!(
                    bridge = %self.bridge,
                    device = %event.device_id(),
                    error = %e,
                    "subscriber failed to handle event"
                );
            }
        }
    }

    /// Deliver a batch in order.
    pub fn deliver_all(&self, events: &[DeviceEvent]) {
        for event in events {
            self.deliver(event);
        }
    }
}

// ── Queue adapter ────────────────────────────────────────────────────

/// Forwards events into an unbounded queue for async consumers.
pub struct QueueSubscriber {
    tx: mpsc::UnboundedSender<(BridgeId, DeviceEvent)>,
}

impl QueueSubscriber {
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<(BridgeId, DeviceEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl Subscriber for QueueSubscriber {
    fn on_event(&self, bridge: &BridgeId, event: &DeviceEvent) -> Result<(), CoreError> {
        self.tx
            .send((bridge.clone(), event.clone()))
            .map_err(|_| CoreError::Internal("event queue receiver dropped".into()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::{DeviceState, LightState};

    struct Recorder(Mutex<Vec<DeviceEvent>>);

    impl Subscriber for Recorder {
        fn on_event(&self, _bridge: &BridgeId, event: &DeviceEvent) -> Result<(), CoreError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Failing;

    impl Subscriber for Failing {
        fn on_event(&self, _bridge: &BridgeId, _event: &DeviceEvent) -> Result<(), CoreError> {
            Err(CoreError::Internal("boom".into()))
        }
    }

    fn changed(id: &str) -> DeviceEvent {
        DeviceEvent::Changed(Arc::new(Device::new(
            id,
            id,
            DeviceState::Light(LightState::default()),
        )))
    }

    #[test]
    fn register_is_idempotent_per_subscriber() {
        let bus = ListenerBus::new(BridgeId::from("gw"));
        let sub: Arc<dyn Subscriber> = Arc::new(Recorder(Mutex::new(Vec::new())));

        assert!(bus.register(Arc::clone(&sub)));
        assert!(!bus.register(Arc::clone(&sub)));
        assert_eq!(bus.len(), 1);

        assert!(bus.unregister(&sub));
        assert!(!bus.unregister(&sub));
        assert!(bus.is_empty());
    }

    #[test]
    fn failing_subscriber_does_not_block_others() {
        let bus = ListenerBus::new(BridgeId::from("gw"));
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        bus.register(Arc::new(Failing));
        bus.register(Arc::clone(&recorder) as Arc<dyn Subscriber>);

        bus.deliver_all(&[changed("A1"), changed("B2")]);

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].device_id().as_str(), "B2");
    }

    #[tokio::test]
    async fn queue_subscriber_forwards_events() {
        let bus = ListenerBus::new(BridgeId::from("gw"));
        let (sub, mut rx) = QueueSubscriber::channel();
        bus.register(sub);

        bus.deliver(&changed("A1"));

        let (bridge, event) = rx.recv().await.unwrap();
        assert_eq!(bridge.as_str(), "gw");
        assert_eq!(event.device_id().as_str(), "A1");
    }
}
