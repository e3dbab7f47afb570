/// How a status message should be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTone {
    Info,
    Error,
}

/// The scan form, its trigger, and the progress panel.
pub trait ScanView: Send + Sync {
    fn set_scan_enabled(&self, enabled: bool);
    fn scan_enabled(&self) -> bool;
    fn show_progress(&self);
    fn hide_progress(&self);
    fn progress_visible(&self) -> bool;
    fn set_status_message(&self, text: &str, tone: MessageTone);
    /// Re-render from server state once a scan has finished.
    fn reload(&self);
}

/// Result rows and their per-row recheck triggers.
///
/// A domain may appear in several cells (e.g. an "all" table and an "inactive"
/// table); every method addresses all cells for that domain.
pub trait RecheckView: Send + Sync {
    /// Domains that had a recheck trigger when the page was loaded.
    fn recheck_domains(&self) -> Vec<String>;
    /// Whether the trigger for `domain` is visible and enabled.
    fn recheck_clickable(&self, domain: &str) -> bool;
    fn set_recheck_enabled(&self, domain: &str, enabled: bool);
    /// Swap the static icon for a busy indicator, or back.
    fn set_recheck_busy(&self, domain: &str, busy: bool);
    fn hide_recheck(&self, domain: &str);
    fn set_response_text(&self, domain: &str, text: &str);
    fn set_highlight(&self, domain: &str, on: bool);
    /// Blocking notice to the user.
    fn alert(&self, message: &str);
}
