use std::time::Duration;

/// Delay before the next poll after `failures` consecutive communication
/// failures: the poll interval times the failure count.
pub fn backoff_delay(interval: Duration, failures: u32) -> Duration {
    interval.saturating_mul(failures.max(1))
}
