//! Trade-event engine: owns one worker per streaming gateway

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::health::{HealthMonitor, HealthStatus};
use super::worker::{EventProcessor, TradeEventWorker};
use crate::common::channels::OrderStateSender;
use crate::common::traits::{BrokerAdapter, Resync};
use crate::config::types::TradeEventSettings;
use crate::router::cache::OrderBook;
use crate::router::OrderRouter;

/// Result of one health evaluation for one gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub gateway: String,
    pub status: HealthStatus,
    /// Whether this evaluation wrote a log line
    pub logged: bool,
}

struct WorkerEntry {
    worker: TradeEventWorker,
    monitor: HealthMonitor,
    settings: TradeEventSettings,
}

/// Manages trade-event workers and their health
pub struct TradeEventEngine {
    defaults: TradeEventSettings,
    book: Arc<OrderBook>,
    notifier: OrderStateSender,
    resync: Arc<dyn Resync>,
    workers: Mutex<HashMap<String, WorkerEntry>>,
}

impl TradeEventEngine {
    pub fn new(
        defaults: TradeEventSettings,
        book: Arc<OrderBook>,
        notifier: OrderStateSender,
        resync: Arc<dyn Resync>,
    ) -> Self {
        Self {
            defaults,
            book,
            notifier,
            resync,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Engine sharing the router's order cache, sink and resync
    pub fn for_router(router: Arc<OrderRouter>, defaults: TradeEventSettings) -> Self {
        let book = router.order_book();
        let notifier = router.notifier();
        Self::new(defaults, book, notifier, router)
    }

    pub fn defaults(&self) -> &TradeEventSettings {
        &self.defaults
    }

    /// Start a worker for `gateway` unless disabled, unbound or already running
    ///
    /// Returns whether a new worker was started.
    pub async fn register_gateway(
        &self,
        gateway: &str,
        account_id: Option<&str>,
        adapter: Arc<dyn BrokerAdapter>,
        settings: TradeEventSettings,
    ) -> bool {
        let mut workers = self.workers.lock().await;
        if workers.contains_key(gateway) {
            return false;
        }
        if !settings.enabled {
            info!("Trade events disabled by config for {}", gateway);
            return false;
        }
        let Some(account_id) = account_id.filter(|a| !a.trim().is_empty()) else {
            warn!("Trade events skipped for {}: missing account_id", gateway);
            return false;
        };

        let processor = EventProcessor::new(
            gateway,
            Some(account_id.to_string()),
            self.book.clone(),
            self.notifier.clone(),
            self.resync.clone(),
            settings.debounce(),
        );
        let worker = TradeEventWorker::start(account_id.to_string(), adapter, processor);
        let monitor = HealthMonitor::new(gateway, settings.health_log_interval());

        workers.insert(
            gateway.to_string(),
            WorkerEntry {
                worker,
                monitor,
                settings,
            },
        );
        info!("Trade events worker started for {}", gateway);
        true
    }

    pub async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }

    pub async fn is_running(&self, gateway: &str) -> bool {
        self.workers
            .lock()
            .await
            .get(gateway)
            .is_some_and(|entry| entry.worker.is_running())
    }

    /// Evaluate every worker now
    pub async fn health_tick(&self) -> Vec<HealthReport> {
        self.health_tick_at(Instant::now()).await
    }

    /// Evaluate every worker as of `now`
    pub async fn health_tick_at(&self, now: Instant) -> Vec<HealthReport> {
        let mut workers = self.workers.lock().await;
        let mut reports: Vec<HealthReport> = workers
            .iter_mut()
            .map(|(gateway, entry)| {
                let status = entry.worker.activity().classify(
                    now,
                    entry.settings.startup_grace(),
                    entry.settings.stale_after(),
                );
                let logged = entry.monitor.observe(status, now);
                HealthReport {
                    gateway: gateway.clone(),
                    status,
                    logged,
                }
            })
            .collect();
        reports.sort_by(|a, b| a.gateway.cmp(&b.gateway));
        reports
    }

    /// Run [`Self::health_tick`] on a fixed period until the task is aborted
    pub fn run_health_ticks(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.defaults.health_tick();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.health_tick().await;
            }
        })
    }

    /// Stop one worker
    pub async fn stop_gateway(&self, gateway: &str) -> bool {
        let entry = self.workers.lock().await.remove(gateway);
        match entry {
            Some(mut entry) => entry.worker.stop(entry.settings.shutdown_timeout()).await,
            None => false,
        }
    }

    /// Stop every worker, each within its bounded wait
    pub async fn shutdown(&self) {
        let entries: Vec<WorkerEntry> = self.workers.lock().await.drain().map(|(_, e)| e).collect();
        let count = entries.len();

        let stops = entries.into_iter().map(|mut entry| async move {
            let timeout = entry.settings.shutdown_timeout();
            entry.worker.stop(timeout).await
        });
        let stopped = futures_util::future::join_all(stops).await;

        let late = stopped.iter().filter(|ok| !**ok).count();
        if late > 0 {
            warn!("{} of {} trade-event workers had to be aborted", late, count);
        } else {
            info!("Stopped {} trade-event workers", count);
        }
    }
}

impl std::fmt::Debug for TradeEventEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeEventEngine")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
