use anyhow::{bail, Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

fn domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$")
            .expect("static domain pattern")
    })
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?)*$")
            .expect("static label pattern")
    })
}

/// Whether `s` looks like a registrable host name (`example.com`, `a.b.co`).
pub fn validate_domain(s: &str) -> bool {
    domain_re().is_match(s)
}

/// Clean up a candidate reported by an enumeration source.
///
/// Returns `None` for wildcards, empty lines and names outside `base`.
pub fn normalize_subdomain(candidate: &str, base: &str) -> Option<String> {
    let name = candidate.trim().trim_end_matches('.').to_ascii_lowercase();
    if name.is_empty() || name.contains('*') {
        return None;
    }
    let base = base.to_ascii_lowercase();
    if name == base || name.ends_with(&format!(".{base}")) {
        Some(name)
    } else {
        None
    }
}

/// Parse wordlist content into deduplicated subdomain prefixes.
///
/// Supported formats per line:
/// - single prefix: `www`
/// - dotted prefix: `api.internal`
/// - comments: everything after `#` is ignored
/// - whitespace and blank lines are ignored
pub fn parse_wordlist_str(s: &str) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }
        if !label_re().is_match(line) {
            bail!("line {line_no}: invalid subdomain prefix: {line}");
        }
        let prefix = line.to_ascii_lowercase();
        if seen.insert(prefix.clone()) {
            out.push(prefix);
        }
    }

    Ok(out)
}

/// Load prefixes from a wordlist file. Errors if the file cannot be read or parsed.
pub fn load_wordlist_from_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read wordlist: {}", path.as_ref().display()))?;
    parse_wordlist_str(&content)
}

/// Load prefixes from a file, or fall back to [`default_prefixes`] if missing or empty.
pub fn load_wordlist_or_default(path: impl AsRef<Path>) -> Vec<String> {
    match load_wordlist_from_path(&path) {
        Ok(v) if !v.is_empty() => v,
        _ => default_prefixes(),
    }
}

/// Prefixes tried when no enumeration tool is installed.
pub fn default_prefixes() -> Vec<String> {
    const DEFAULT: &[&str] = &[
        "www", "api", "mail", "blog", "shop", "store", "admin", "dev", "test", "app", "m",
    ];
    DEFAULT.iter().map(|s| s.to_string()).collect()
}
