use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use super::api::ScanApi;
use super::view::RecheckView;
use crate::types::NO_RESPONSE;

/// How long a patched cell stays highlighted.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_secs(2);

pub const RECHECK_FAILED: &str = "Error rechecking domain. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecheckOutcome {
    /// The domain answered; cells show the new text and the trigger is hidden.
    Updated(String),
    /// Still no answer; the trigger stays available.
    Unanswered,
    /// The server reported a failure.
    Rejected(String),
    /// The request itself failed.
    TransportError,
}

/// Per-row recheck triggers.
///
/// Only triggers present when the controller is attached are handled. Rows may
/// be rechecked concurrently; each touches only its own cells.
pub struct RecheckController {
    api: Arc<dyn ScanApi>,
    view: Arc<dyn RecheckView>,
    domains: BTreeSet<String>,
}

impl RecheckController {
    pub fn attach(api: Arc<dyn ScanApi>, view: Arc<dyn RecheckView>) -> Self {
        let domains: BTreeSet<String> = view.recheck_domains().into_iter().collect();
        debug!(count = domains.len(), "recheck triggers attached");
        Self { api, view, domains }
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    /// A trigger was clicked. Returns `None` when there is no live trigger for `domain`.
    pub fn click(&self, domain: &str) -> Option<JoinHandle<RecheckOutcome>> {
        if !self.domains.contains(domain) || !self.view.recheck_clickable(domain) {
            return None;
        }
        self.view.set_recheck_enabled(domain, false);
        self.view.set_recheck_busy(domain, true);
        Some(tokio::spawn(run_recheck(
            self.api.clone(),
            self.view.clone(),
            domain.to_string(),
        )))
    }
}

async fn run_recheck(
    api: Arc<dyn ScanApi>,
    view: Arc<dyn RecheckView>,
    domain: String,
) -> RecheckOutcome {
    let outcome = match api.recheck(&domain).await {
        Ok(resp) if resp.success => match resp.response_info {
            Some(info) => apply_answer(&view, &domain, info),
            None => {
                view.alert("Error: Unknown error");
                RecheckOutcome::Rejected("missing response_info".into())
            }
        },
        Ok(resp) => {
            let msg = resp.error.unwrap_or_else(|| "Unknown error".into());
            warn!(%domain, error = %msg, "server rejected recheck");
            view.alert(&format!("Error: {msg}"));
            RecheckOutcome::Rejected(msg)
        }
        Err(e) => {
            warn!(%domain, error = %e, "error rechecking domain");
            view.alert(RECHECK_FAILED);
            RecheckOutcome::TransportError
        }
    };

    view.set_recheck_enabled(&domain, true);
    view.set_recheck_busy(&domain, false);
    outcome
}

fn apply_answer(view: &Arc<dyn RecheckView>, domain: &str, info: String) -> RecheckOutcome {
    view.set_response_text(domain, &info);
    view.set_highlight(domain, true);

    let fade_view = view.clone();
    let fade_domain = domain.to_string();
    tokio::spawn(async move {
        time::sleep(HIGHLIGHT_DURATION).await;
        fade_view.set_highlight(&fade_domain, false);
    });

    if info == NO_RESPONSE {
        RecheckOutcome::Unanswered
    } else {
        view.hide_recheck(domain);
        RecheckOutcome::Updated(info)
    }
}
