use crate::types::{AutoThrottleConfig, MAX_DELAY};
use std::time::Duration;
use tracing::debug;

/// Dispatch delay that follows observed server latency.
///
/// The delay drifts towards `latency / target_concurrency`, never drops below the
/// configured download delay and never exceeds `max_delay`.
#[derive(Debug, Clone)]
pub struct AutoThrottle {
    enabled: bool,
    min_delay: Duration,
    max_delay: Duration,
    target_concurrency: f64,
    delay: Duration,
}

impl AutoThrottle {
    pub fn new(config: &AutoThrottleConfig, download_delay: Duration) -> Self {
        let max_delay = seconds(config.max_delay_secs).max(download_delay);
        let delay = if config.enabled {
            seconds(config.start_delay_secs)
                .max(download_delay)
                .min(max_delay)
        } else {
            download_delay
        };

        Self {
            enabled: config.enabled,
            min_delay: download_delay,
            max_delay,
            target_concurrency: config.target_concurrency,
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn record_response(&mut self, status: u16, latency: Duration) {
        if !self.enabled {
            return;
        }

        let target = Duration::try_from_secs_f64(latency.as_secs_f64() / self.target_concurrency)
            .unwrap_or(self.max_delay);
        let averaged = self.delay.saturating_add(target) / 2;
        let next = averaged.max(target).clamp(self.min_delay, self.max_delay);

        // Error responses are usually fast; they must not speed the crawl up.
        if status != 200 && next <= self.delay {
            return;
        }

        debug!(
            "AutoThrottle: status {} latency {:?}, delay {:?} -> {:?}",
            status, latency, self.delay, next
        );
        self.delay = next;
    }

    pub fn record_failure(&mut self) {
        if !self.enabled {
            return;
        }

        let next = self.delay.saturating_mul(2).max(self.min_delay).min(self.max_delay);
        debug!("AutoThrottle: request failed, delay {:?} -> {:?}", self.delay, next);
        self.delay = next;
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default().min(MAX_DELAY)
}
