use crate::config::ScanOptions;
use crate::enumerate::Enumerator;
use crate::probe::Prober;
use crate::types::{now_timestamp, DomainResult, ScanResults};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Error executing the subdomain enumeration: {0}")]
    Enumeration(anyhow::Error),
    #[error("scan cancelled")]
    Cancelled,
}

/// Live counters shared between a running scan and status readers.
#[derive(Clone, Debug, Default)]
pub struct SharedProgress {
    pub total: Arc<AtomicU64>,
    pub active: Arc<AtomicU64>,
    pub inactive: Arc<AtomicU64>,
    entries: Arc<Mutex<Vec<(usize, DomainResult)>>>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    pub fn inactive(&self) -> u64 {
        self.inactive.load(Ordering::Relaxed)
    }

    async fn record(&self, index: usize, result: DomainResult) {
        if result.is_active {
            self.active.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inactive.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().await.push((index, result));
    }

    async fn take_ordered(&self) -> Vec<DomainResult> {
        let mut guard = self.entries.lock().await;
        let mut entries = std::mem::take(&mut *guard);
        entries.sort_by_key(|(i, _)| *i);
        entries.into_iter().map(|(_, e)| e).collect()
    }
}

/// Enumerate subdomains of `domain` and probe each one.
///
/// - Limits concurrent probes using a `Semaphore`.
/// - Counters in `progress` move as each probe finishes, so `/status` can
///   report partial totals while the scan runs.
/// - Entries come back in enumeration order regardless of completion order.
#[instrument(name = "scan", level = "info", skip_all, fields(domain = %domain))]
pub async fn scan_domain(
    domain: &str,
    enumerator: &Enumerator,
    prober: Arc<dyn Prober>,
    options: &ScanOptions,
    cancel: CancellationToken,
    progress: SharedProgress,
) -> Result<ScanResults, ScanError> {
    let started_at = now_timestamp();
    let candidates = tokio::select! {
        res = enumerator.enumerate(domain) => res.map_err(ScanError::Enumeration)?,
        _ = cancel.cancelled() => return Err(ScanError::Cancelled),
    };

    let sem = Arc::new(Semaphore::new(options.concurrency.clamp(1, 1_000)));
    let mut set = JoinSet::new();
    let timeout = options.probe_timeout;

    for (index, candidate) in candidates.into_iter().enumerate() {
        let permit = tokio::select! {
            p = sem.clone().acquire_owned() => match p {
                Ok(p) => p,
                Err(_) => break,
            },
            _ = cancel.cancelled() => break,
        };
        let prober = prober.clone();
        let progress = progress.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            let _permit = permit;
            if cancel.is_cancelled() {
                return;
            }
            let outcome = prober.probe(&candidate, timeout).await;
            debug!(domain = %candidate, active = outcome.is_active, "probed");
            let result = DomainResult {
                domain: candidate,
                is_active: outcome.is_active,
                response_info: outcome.response_info,
                timestamp: now_timestamp(),
            };
            progress.record(index, result).await;
        });
    }

    while set.join_next().await.is_some() {}

    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }

    let results = ScanResults {
        domain: domain.to_string(),
        entries: progress.take_ordered().await,
        started_at,
        finished_at: now_timestamp(),
    };
    info!(
        active = results.active_count(),
        inactive = results.inactive_count(),
        "scan completed"
    );
    Ok(results)
}
