//! Stream health classification and rate-limited health logging

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Liveness classification of one trade-event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    /// Worker is not running
    Stopped,
    /// Nothing received since start, past the startup grace period
    NoMessages,
    /// Last message is older than the staleness threshold
    Stale,
    Healthy,
}

impl HealthStatus {
    pub fn is_issue(&self) -> bool {
        !matches!(self, HealthStatus::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Stopped => "STOPPED",
            HealthStatus::NoMessages => "NO_MESSAGES",
            HealthStatus::Stale => "STALE",
            HealthStatus::Healthy => "HEALTHY",
        };
        write!(f, "{}", s)
    }
}

/// Timestamps shared between a worker's ingress and the health tick
///
/// Instants are stored as milliseconds since `base` so reads never lock.
/// Zero means "never" for both timestamps.
#[derive(Debug)]
pub struct WorkerActivity {
    base: Instant,
    running: AtomicBool,
    started_ms: AtomicU64,
    last_message_ms: AtomicU64,
    messages: AtomicU64,
}

impl WorkerActivity {
    pub fn new() -> Self {
        Self::with_base(Instant::now())
    }

    pub fn with_base(base: Instant) -> Self {
        Self {
            base,
            running: AtomicBool::new(false),
            started_ms: AtomicU64::new(0),
            last_message_ms: AtomicU64::new(0),
            messages: AtomicU64::new(0),
        }
    }

    fn offset(&self, at: Instant) -> u64 {
        // +1 keeps an event at `base` distinguishable from "never"
        at.saturating_duration_since(self.base).as_millis() as u64 + 1
    }

    fn instant(&self, offset: u64) -> Option<Instant> {
        (offset > 0).then(|| self.base + Duration::from_millis(offset - 1))
    }

    pub fn mark_started(&self, at: Instant) {
        self.started_ms.store(self.offset(at), Ordering::SeqCst);
        self.last_message_ms.store(0, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn record_message(&self, at: Instant) {
        self.last_message_ms.store(self.offset(at), Ordering::SeqCst);
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn last_message_at(&self) -> Option<Instant> {
        self.instant(self.last_message_ms.load(Ordering::SeqCst))
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.instant(self.started_ms.load(Ordering::SeqCst))
    }

    /// Classify the stream as of `now`
    pub fn classify(&self, now: Instant, startup_grace: Duration, stale_after: Duration) -> HealthStatus {
        if !self.is_running() {
            return HealthStatus::Stopped;
        }

        match self.last_message_at() {
            None => {
                let since_start = self
                    .started_at()
                    .map(|s| now.saturating_duration_since(s))
                    .unwrap_or_default();
                if since_start > startup_grace {
                    HealthStatus::NoMessages
                } else {
                    HealthStatus::Healthy
                }
            }
            Some(last) if now.saturating_duration_since(last) > stale_after => HealthStatus::Stale,
            Some(_) => HealthStatus::Healthy,
        }
    }
}

impl Default for WorkerActivity {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate limiter for repeated log lines
#[derive(Debug)]
pub struct LogThrottle {
    last_log_time: Option<Instant>,
    suppressed_count: u64,
    interval: Duration,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_log_time: None,
            suppressed_count: 0,
            interval,
        }
    }

    /// True if the interval has passed since the last emitted log
    pub fn should_log(&mut self, now: Instant) -> bool {
        match self.last_log_time {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                self.suppressed_count += 1;
                false
            }
            _ => {
                self.last_log_time = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_log_time = None;
        self.suppressed_count = 0;
    }

    /// Suppressed logs since the last emitted one; resets the counter
    pub fn get_and_reset_suppressed_count(&mut self) -> u64 {
        std::mem::take(&mut self.suppressed_count)
    }
}

/// Issue memory for one worker
///
/// A change of classification logs at once. A repeated issue logs at most once
/// per throttle interval.
#[derive(Debug)]
pub struct HealthMonitor {
    gateway: String,
    last_status: Option<HealthStatus>,
    throttle: LogThrottle,
}

impl HealthMonitor {
    pub fn new(gateway: impl Into<String>, log_interval: Duration) -> Self {
        Self {
            gateway: gateway.into(),
            last_status: None,
            throttle: LogThrottle::new(log_interval),
        }
    }

    pub fn last_status(&self) -> Option<HealthStatus> {
        self.last_status
    }

    /// Record a classification; returns whether a log line was written
    pub fn observe(&mut self, status: HealthStatus, now: Instant) -> bool {
        if !status.is_issue() {
            let previous = self.last_status.take();
            self.throttle.reset();
            return match previous {
                Some(issue) if issue.is_issue() => {
                    info!("Trade events {} recovered from {}", self.gateway, issue);
                    true
                }
                _ => false,
            };
        }

        if self.last_status != Some(status) {
            self.last_status = Some(status);
            self.throttle.reset();
            self.throttle.should_log(now);
            warn!("Trade events {} health: {}", self.gateway, status);
            return true;
        }

        if self.throttle.should_log(now) {
            let suppressed = self.throttle.get_and_reset_suppressed_count();
            warn!(
                "Trade events {} health: {} (repeated {} times)",
                self.gateway, status, suppressed + 1
            );
            return true;
        }

        false
    }
}
