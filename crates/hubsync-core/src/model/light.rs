// ── Light domain types ──

use serde::{Deserialize, Serialize};

/// Percent added or removed by one level step.
pub const LEVEL_STEP: u8 = 5;

/// A dimmable light behind the gateway.
///
/// `level` is 0 whenever the gateway reports the light off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LightState {
    pub on: bool,
    pub level: u8,
    pub offline: bool,
}

impl LightState {
    /// Brightness as the host shows it: 0 while off.
    pub fn percent(&self) -> u8 {
        if self.on { self.level.min(100) } else { 0 }
    }
}
