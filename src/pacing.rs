//! Randomized pause between consecutive sends.
use crate::config::Settings;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Upper bound on any pause, whatever the configuration says.
pub const MAX_DELAY_CAP_SECONDS: u64 = 15;

/// Inclusive bounds in whole seconds: the upper bound is capped, the lower
/// bound never exceeds the upper one.
pub fn delay_bounds(min_seconds: u64, max_seconds: u64) -> (u64, u64) {
    let hi = max_seconds.min(MAX_DELAY_CAP_SECONDS);
    let lo = min_seconds.min(hi);
    (lo, hi)
}

pub fn pick_delay<R: Rng + ?Sized>(settings: &Settings, rng: &mut R) -> Duration {
    let (lo, hi) = delay_bounds(settings.min_delay_seconds, settings.max_delay_seconds);
    Duration::from_secs(rng.gen_range(lo..=hi))
}

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}

/// Blocks the run for the full delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
