use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};

/// Response text recorded when a probe got no HTTP answer.
pub const NO_RESPONSE: &str = "No response";

/// One probed subdomain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DomainResult {
    pub domain: String,
    pub is_active: bool,
    pub response_info: String,
    pub timestamp: String,
}

/// Results of a finished scan of one base domain.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResults {
    pub domain: String,
    pub entries: Vec<DomainResult>,
    pub started_at: String,
    pub finished_at: String,
}

impl ScanResults {
    pub fn active(&self) -> impl Iterator<Item = &DomainResult> {
        self.entries.iter().filter(|e| e.is_active)
    }

    pub fn inactive(&self) -> impl Iterator<Item = &DomainResult> {
        self.entries.iter().filter(|e| !e.is_active)
    }

    pub fn active_count(&self) -> u64 {
        self.active().count() as u64
    }

    pub fn inactive_count(&self) -> u64 {
        self.inactive().count() as u64
    }

    pub fn total_count(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Record a fresh probe answer for `domain`.
    ///
    /// An answer other than [`NO_RESPONSE`] promotes the entry to active; a
    /// silent recheck never demotes an active entry. Returns `false` when the
    /// domain is not part of these results.
    pub fn apply_recheck(&mut self, domain: &str, response_info: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.domain == domain) {
            Some(entry) => {
                entry.response_info = response_info.to_string();
                if response_info != NO_RESPONSE {
                    entry.is_active = true;
                }
                true
            }
            None => false,
        }
    }
}

/// Body of `GET /status`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusResponse {
    pub scan_in_progress: bool,
    pub scan_completed: bool,
    pub total_count: u64,
    pub active_count: u64,
    pub inactive_count: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Body of `POST /recheck/{domain}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecheckResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecheckResponse {
    pub fn answered(domain: impl Into<String>, response_info: impl Into<String>) -> Self {
        Self {
            success: true,
            domain: Some(domain.into()),
            response_info: Some(response_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            domain: None,
            response_info: None,
            error: Some(error.into()),
        }
    }
}

/// Current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub fn now_timestamp() -> String {
    format_timestamp(OffsetDateTime::now_utc())
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    at.format(&fmt)
        .unwrap_or_else(|_| String::from("1970-01-01 00:00:00"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(domain: &str, is_active: bool, info: &str) -> DomainResult {
        DomainResult {
            domain: domain.into(),
            is_active,
            response_info: info.into(),
            timestamp: "2024-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn recheck_promotes_answered_domain() {
        let mut res = ScanResults {
            domain: "example.com".into(),
            entries: vec![
                entry("www.example.com", true, "HTTP/1.1 200 OK"),
                entry("dev.example.com", false, NO_RESPONSE),
            ],
            ..Default::default()
        };
        assert_eq!(res.inactive_count(), 1);

        assert!(res.apply_recheck("dev.example.com", "HTTP/2 301 Moved Permanently"));
        assert_eq!(res.active_count(), 2);
        assert_eq!(res.inactive_count(), 0);
        assert_eq!(res.entries[1].response_info, "HTTP/2 301 Moved Permanently");
    }

    #[test]
    fn silent_recheck_keeps_activity() {
        let mut res = ScanResults {
            entries: vec![entry("www.example.com", true, "HTTP/1.1 200 OK")],
            ..Default::default()
        };
        assert!(res.apply_recheck("www.example.com", NO_RESPONSE));
        assert!(res.entries[0].is_active);
        assert_eq!(res.entries[0].response_info, NO_RESPONSE);
    }

    #[test]
    fn unknown_domain_is_not_applied() {
        let mut res = ScanResults::default();
        assert!(!res.apply_recheck("nope.example.com", "HTTP/1.1 200 OK"));
    }

    #[test]
    fn status_error_message_serializes_as_null() {
        let json = serde_json::to_value(StatusResponse::default()).unwrap();
        assert!(json["error_message"].is_null());
        assert_eq!(json["scan_in_progress"], false);
    }

    #[test]
    fn recheck_failure_omits_response_info() {
        let json = serde_json::to_value(RecheckResponse::failed("timeout")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "timeout");
        assert!(json.get("response_info").is_none());
    }

    #[test]
    fn timestamp_layout() {
        let at = time::macros::datetime!(2024-03-05 07:08:09 UTC);
        assert_eq!(format_timestamp(at), "2024-03-05 07:08:09");
    }
}
