use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::view::{MessageTone, RecheckView, ScanView};
use crate::types::{ScanResults, NO_RESPONSE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalRow {
    pub domain: String,
    pub is_active: bool,
    pub response_info: String,
    pub recheck_visible: bool,
    pub recheck_enabled: bool,
    pub busy: bool,
}

#[derive(Debug, Default)]
struct TerminalState {
    scan_enabled: bool,
    progress_visible: bool,
    reloaded: bool,
    rows: BTreeMap<String, TerminalRow>,
    alerts: Vec<String>,
}

/// Prints view changes to stdout instead of patching a page.
#[derive(Debug)]
pub struct TerminalView {
    state: Mutex<TerminalState>,
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalView {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TerminalState {
                scan_enabled: true,
                ..TerminalState::default()
            }),
        }
    }

    /// One row per result; unanswered rows get a recheck trigger.
    pub fn with_results(results: &ScanResults) -> Self {
        let view = Self::new();
        {
            let mut st = view.lock();
            for e in &results.entries {
                let unanswered = e.response_info == NO_RESPONSE;
                st.rows.insert(
                    e.domain.clone(),
                    TerminalRow {
                        domain: e.domain.clone(),
                        is_active: e.is_active,
                        response_info: e.response_info.clone(),
                        recheck_visible: unanswered,
                        recheck_enabled: unanswered,
                        busy: false,
                    },
                );
            }
        }
        view
    }

    fn lock(&self) -> MutexGuard<'_, TerminalState> {
        // A poisoned lock only means a printing thread panicked; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn reloaded(&self) -> bool {
        self.lock().reloaded
    }

    pub fn rows(&self) -> Vec<TerminalRow> {
        self.lock().rows.values().cloned().collect()
    }

    /// Copy row state back onto `results`, keeping its order and timestamps.
    pub fn patch_results(&self, results: &mut ScanResults) {
        let st = self.lock();
        for entry in &mut results.entries {
            if let Some(row) = st.rows.get(&entry.domain) {
                entry.is_active = row.is_active;
                entry.response_info = row.response_info.clone();
            }
        }
    }

    /// Alerts raised so far, oldest first.
    pub fn alerts(&self) -> Vec<String> {
        self.lock().alerts.clone()
    }

    fn with_row(&self, domain: &str, f: impl FnOnce(&mut TerminalRow)) {
        if let Some(row) = self.lock().rows.get_mut(domain) {
            f(row);
        }
    }
}

impl ScanView for TerminalView {
    fn set_scan_enabled(&self, enabled: bool) {
        self.lock().scan_enabled = enabled;
    }

    fn scan_enabled(&self) -> bool {
        self.lock().scan_enabled
    }

    fn show_progress(&self) {
        self.lock().progress_visible = true;
        println!("Scanning...");
    }

    fn hide_progress(&self) {
        self.lock().progress_visible = false;
    }

    fn progress_visible(&self) -> bool {
        self.lock().progress_visible
    }

    fn set_status_message(&self, text: &str, tone: MessageTone) {
        match tone {
            MessageTone::Info => println!("  {text}"),
            MessageTone::Error => eprintln!("  {text}"),
        }
    }

    fn reload(&self) {
        self.lock().reloaded = true;
        println!("Scan finished.");
    }
}

impl RecheckView for TerminalView {
    fn recheck_domains(&self) -> Vec<String> {
        self.lock()
            .rows
            .values()
            .filter(|r| r.recheck_visible)
            .map(|r| r.domain.clone())
            .collect()
    }

    fn recheck_clickable(&self, domain: &str) -> bool {
        self.lock()
            .rows
            .get(domain)
            .map(|r| r.recheck_visible && r.recheck_enabled)
            .unwrap_or(false)
    }

    fn set_recheck_enabled(&self, domain: &str, enabled: bool) {
        self.with_row(domain, |r| r.recheck_enabled = enabled);
    }

    fn set_recheck_busy(&self, domain: &str, busy: bool) {
        self.with_row(domain, |r| r.busy = busy);
        if busy {
            println!("  rechecking {domain}...");
        }
    }

    fn hide_recheck(&self, domain: &str) {
        self.with_row(domain, |r| r.recheck_visible = false);
    }

    fn set_response_text(&self, domain: &str, text: &str) {
        self.with_row(domain, |r| {
            r.response_info = text.to_string();
            if text != NO_RESPONSE {
                r.is_active = true;
            }
        });
        println!("  {domain}: {text}");
    }

    fn set_highlight(&self, domain: &str, on: bool) {
        debug!(domain, on, "highlight");
    }

    fn alert(&self, message: &str) {
        eprintln!("! {message}");
        self.lock().alerts.push(message.to_string());
    }
}
