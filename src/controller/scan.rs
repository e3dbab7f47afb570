use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use super::api::ScanApi;
use super::view::{MessageTone, ScanView};
use crate::types::StatusResponse;

/// Delay between submitting and the first status poll.
pub const INITIAL_POLL_DELAY: Duration = Duration::from_secs(1);
/// Delay between consecutive polls while a scan runs.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// How long the progress panel stays up after a transport failure.
pub const ERROR_HIDE_DELAY: Duration = Duration::from_secs(3);

pub const STATUS_FETCH_FAILED: &str = "Error checking scan status. Please try again.";

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The scan finished and the view was reloaded.
    Completed,
    /// The server reported an error message.
    Failed(String),
    /// Nothing running and nothing finished.
    Idle,
    /// `/status` could not be fetched or decoded.
    TransportError,
}

/// Drives the scan trigger and the status poll loop.
///
/// Polls never overlap: the next one is only scheduled after the previous
/// answer was handled, and at most one poll loop runs per controller.
/// There is no backoff and no retry after a failure.
pub struct ScanController {
    api: Arc<dyn ScanApi>,
    view: Arc<dyn ScanView>,
    polling: Arc<AtomicBool>,
}

impl ScanController {
    pub fn new(api: Arc<dyn ScanApi>, view: Arc<dyn ScanView>) -> Self {
        Self {
            api,
            view,
            polling: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The scan form was submitted.
    ///
    /// Returns `None` while the trigger is disabled or a poll loop is already
    /// running.
    pub fn submit(&self) -> Option<JoinHandle<PollOutcome>> {
        if !self.view.scan_enabled() {
            debug!("scan trigger disabled; ignoring submit");
            return None;
        }
        let guard = PollGuard::acquire(&self.polling)?;
        self.view.set_scan_enabled(false);
        self.view.show_progress();
        Some(tokio::spawn(poll_until_done(
            self.api.clone(),
            self.view.clone(),
            INITIAL_POLL_DELAY,
            guard,
        )))
    }

    /// Page load: if a scan is already showing progress, poll right away.
    pub fn resume(&self) -> Option<JoinHandle<PollOutcome>> {
        if !self.view.progress_visible() {
            return None;
        }
        let guard = PollGuard::acquire(&self.polling)?;
        debug!("progress visible on load; polling immediately");
        self.view.set_scan_enabled(false);
        Some(tokio::spawn(poll_until_done(
            self.api.clone(),
            self.view.clone(),
            Duration::ZERO,
            guard,
        )))
    }
}

/// Held by the running poll loop; released when the loop ends or is aborted.
struct PollGuard(Arc<AtomicBool>);

impl PollGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub fn progress_message(s: &StatusResponse) -> String {
    format!(
        "Scanning subdomains. Found {} so far ({} active, {} inactive)...",
        s.total_count, s.active_count, s.inactive_count
    )
}

async fn poll_until_done(
    api: Arc<dyn ScanApi>,
    view: Arc<dyn ScanView>,
    first_delay: Duration,
    guard: PollGuard,
) -> PollOutcome {
    if !first_delay.is_zero() {
        time::sleep(first_delay).await;
    }

    loop {
        let status = match api.status().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "error checking scan status");
                view.set_status_message(STATUS_FETCH_FAILED, MessageTone::Error);
                view.set_scan_enabled(true);
                drop(guard);
                time::sleep(ERROR_HIDE_DELAY).await;
                view.hide_progress();
                return PollOutcome::TransportError;
            }
        };

        if status.scan_in_progress {
            view.set_status_message(&progress_message(&status), MessageTone::Info);
            time::sleep(POLL_INTERVAL).await;
            continue;
        }

        let outcome = if let Some(msg) = status.error_message {
            view.set_status_message(&format!("Error: {msg}"), MessageTone::Error);
            PollOutcome::Failed(msg)
        } else if status.scan_completed {
            info!(
                total = status.total_count,
                active = status.active_count,
                "scan completed"
            );
            view.reload();
            PollOutcome::Completed
        } else {
            PollOutcome::Idle
        };
        view.set_scan_enabled(true);
        drop(guard);
        return outcome;
    }
}
