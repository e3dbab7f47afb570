use std::fmt::Write as _;

use time::{macros::format_description, OffsetDateTime};

use crate::types::ScanResults;

/// Render results as CSV with a `Domain,Status,Response Info,Timestamp` header.
pub fn to_csv(results: &ScanResults) -> String {
    let mut out = String::from("Domain,Status,Response Info,Timestamp\r\n");
    for e in &results.entries {
        let info = if e.response_info.is_empty() {
            "N/A"
        } else {
            e.response_info.as_str()
        };
        let _ = write!(
            out,
            "{},{},{},{}\r\n",
            csv_escape(&e.domain),
            if e.is_active { "Active" } else { "Inactive" },
            csv_escape(info),
            csv_escape(&e.timestamp),
        );
    }
    out
}

/// `subdomain_scan_<domain>_<YYYYmmdd_HHMMSS>.csv`
pub fn export_filename(domain: &str, now: OffsetDateTime) -> String {
    let fmt = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = now.format(&fmt).unwrap_or_else(|_| "00000000_000000".into());
    format!("subdomain_scan_{domain}_{stamp}.csv")
}

fn csv_escape(s: &str) -> String {
    let needs_quoting = s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r');
    let has_formula_prefix = matches!(s.as_bytes().first(), Some(b'=' | b'+' | b'-' | b'@' | b'\t'));

    if has_formula_prefix {
        format!("\"'{}\"", s.replace('"', "\"\""))
    } else if needs_quoting {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DomainResult;

    fn results() -> ScanResults {
        ScanResults {
            domain: "example.com".into(),
            entries: vec![
                DomainResult {
                    domain: "www.example.com".into(),
                    is_active: true,
                    response_info: "HTTP/1.1 200 OK".into(),
                    timestamp: "2024-01-01 10:00:00".into(),
                },
                DomainResult {
                    domain: "dev.example.com".into(),
                    is_active: false,
                    response_info: String::new(),
                    timestamp: "2024-01-01 10:00:01".into(),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn csv_has_header_and_rows() {
        let csv = to_csv(&results());
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "Domain,Status,Response Info,Timestamp");
        assert_eq!(lines[1], "www.example.com,Active,HTTP/1.1 200 OK,2024-01-01 10:00:00");
        assert_eq!(lines[2], "dev.example.com,Inactive,N/A,2024-01-01 10:00:01");
    }

    #[test]
    fn escapes_quotes_commas_and_formulas() {
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("=cmd()"), "\"'=cmd()\"");
        assert_eq!(csv_escape("plain"), "plain");
    }

    #[test]
    fn filename_embeds_domain_and_stamp() {
        let at = time::macros::datetime!(2024-03-05 07:08:09 UTC);
        assert_eq!(
            export_filename("example.com", at),
            "subdomain_scan_example.com_20240305_070809.csv"
        );
    }
}
