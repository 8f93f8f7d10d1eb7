// ── Poll diff ──
//
// Pure: given the previous active set and a fresh listing, produce the
// next active set and the events to deliver, in delivery order.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::bus::DeviceEvent;
use crate::model::{Device, DeviceId};

/// Last successful listing, keyed by id, in listing order.
pub type ActiveDeviceSet = IndexMap<DeviceId, Arc<Device>>;

/// Outcome of one poll cycle's diff.
#[derive(Debug, Default)]
pub struct PollDiff {
    pub next: ActiveDeviceSet,
    pub events: Vec<DeviceEvent>,
}

/// Diff `fresh` against `prior`.
///
/// New ids yield `Added` then `Changed`; known ids yield `Changed` even
/// when nothing changed. Ids missing from `fresh` are dropped from the
/// next set and only reported as `Removed` when `emit_removals` is set.
pub fn compute(prior: &ActiveDeviceSet, fresh: Vec<Device>, emit_removals: bool) -> PollDiff {
    let mut next = ActiveDeviceSet::with_capacity(fresh.len());
    let mut events = Vec::with_capacity(fresh.len() * 2);

    for device in fresh {
        let device = Arc::new(device);
        let known = prior.contains_key(&device.id) || next.contains_key(&device.id);
        if !known {
            events.push(DeviceEvent::Added(Arc::clone(&device)));
        }
        events.push(DeviceEvent::Changed(Arc::clone(&device)));
        next.insert(device.id.clone(), device);
    }

    if emit_removals {
        events.extend(
            prior
                .keys()
                .filter(|id| !next.contains_key(*id))
                .cloned()
                .map(DeviceEvent::Removed),
        );
    }

    PollDiff { next, events }
}
