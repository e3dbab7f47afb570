use std::collections::HashSet;
use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::domain::{default_prefixes, normalize_subdomain};

/// A way of discovering candidate subdomains for a base domain.
#[async_trait]
pub trait SubdomainSource: Send + Sync {
    fn name(&self) -> &str;
    async fn enumerate(&self, domain: &str) -> Result<Vec<String>>;
}

/// Runs the external `subfinder` tool.
#[derive(Debug, Clone)]
pub struct Subfinder {
    binary: PathBuf,
}

impl Subfinder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locate an executable `subfinder` on `PATH`.
    pub fn locate() -> Option<Self> {
        which::which("subfinder").ok().map(Self::new)
    }

    /// Locate an executable `subfinder` in the given search path.
    pub fn locate_in(paths: impl AsRef<OsStr>) -> Option<Self> {
        let cwd = env::current_dir().ok()?;
        which::which_in("subfinder", Some(paths), cwd)
            .ok()
            .map(Self::new)
    }
}

#[async_trait]
impl SubdomainSource for Subfinder {
    fn name(&self) -> &str {
        "subfinder"
    }

    async fn enumerate(&self, domain: &str) -> Result<Vec<String>> {
        debug!(domain, binary = %self.binary.display(), "running subfinder");
        let output = Command::new(&self.binary)
            .args(["-silent", "-d", domain])
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.binary.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{}", stderr.trim());
        }

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

/// Expands a fixed prefix list into `<prefix>.<domain>`.
#[derive(Debug, Clone)]
pub struct Wordlist {
    prefixes: Vec<String>,
}

impl Wordlist {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }
}

impl Default for Wordlist {
    fn default() -> Self {
        Self::new(default_prefixes())
    }
}

#[async_trait]
impl SubdomainSource for Wordlist {
    fn name(&self) -> &str {
        "wordlist"
    }

    async fn enumerate(&self, domain: &str) -> Result<Vec<String>> {
        Ok(self
            .prefixes
            .iter()
            .map(|p| format!("{p}.{domain}"))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct CrtShEntry {
    name_value: String,
}

/// Certificate transparency lookup through crt.sh.
#[derive(Debug, Clone)]
pub struct CrtSh {
    client: Client,
    base_url: String,
}

impl CrtSh {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, "https://crt.sh")
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SubdomainSource for CrtSh {
    fn name(&self) -> &str {
        "crtsh"
    }

    async fn enumerate(&self, domain: &str) -> Result<Vec<String>> {
        let url = format!("{}/?q=%25.{}&output=json", self.base_url, domain);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            return Err(anyhow!("crt.sh answered {}", res.status()));
        }
        let entries: Vec<CrtShEntry> = res.json().await.context("invalid crt.sh payload")?;
        Ok(entries
            .into_iter()
            .flat_map(|e| {
                e.name_value
                    .split('\n')
                    .map(|s| s.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .collect())
    }
}

/// Combines a primary source with optional best-effort extras.
pub struct Enumerator {
    primary: Box<dyn SubdomainSource>,
    supplemental: Vec<Box<dyn SubdomainSource>>,
}

impl std::fmt::Debug for Enumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enumerator")
            .field("primary", &self.primary.name())
            .field(
                "supplemental",
                &self.supplemental.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Enumerator {
    pub fn new(primary: Box<dyn SubdomainSource>) -> Self {
        Self {
            primary,
            supplemental: Vec::new(),
        }
    }

    pub fn with_supplemental(mut self, source: Box<dyn SubdomainSource>) -> Self {
        self.supplemental.push(source);
        self
    }

    /// Prefer `subfinder` when installed, otherwise fall back to the prefix list.
    pub fn detect(prefixes: Vec<String>) -> Self {
        Self::subfinder_or_wordlist(Subfinder::locate(), prefixes)
    }

    /// Like [`Enumerator::detect`], searching `paths` instead of `PATH`.
    pub fn detect_in(prefixes: Vec<String>, paths: impl AsRef<OsStr>) -> Self {
        Self::subfinder_or_wordlist(Subfinder::locate_in(paths), prefixes)
    }

    fn subfinder_or_wordlist(located: Option<Subfinder>, prefixes: Vec<String>) -> Self {
        match located {
            Some(sf) => {
                info!(binary = %sf.binary.display(), "using subfinder for enumeration");
                Self::new(Box::new(sf))
            }
            None => {
                warn!("subfinder not installed; using built-in subdomain list");
                Self::new(Box::new(Wordlist::new(prefixes)))
            }
        }
    }

    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    /// Candidates for `domain`, normalized and deduplicated in first-seen order.
    #[instrument(name = "enumerate", level = "info", skip(self))]
    pub async fn enumerate(&self, domain: &str) -> Result<Vec<String>> {
        let mut raw = self.primary.enumerate(domain).await?;
        for source in &self.supplemental {
            match source.enumerate(domain).await {
                Ok(found) => {
                    debug!(source = source.name(), count = found.len(), "supplemental source");
                    raw.extend(found);
                }
                Err(e) => warn!(source = source.name(), error = %e, "source failed; skipping"),
            }
        }

        let mut seen = HashSet::new();
        let out: Vec<String> = raw
            .iter()
            .filter_map(|c| normalize_subdomain(c, domain))
            .filter(|c| seen.insert(c.clone()))
            .collect();
        info!(count = out.len(), "subdomains found");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<&'static str>);

    #[async_trait]
    impl SubdomainSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn enumerate(&self, _domain: &str) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl SubdomainSource for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        async fn enumerate(&self, _domain: &str) -> Result<Vec<String>> {
            bail!("boom")
        }
    }

    #[tokio::test]
    async fn wordlist_expands_prefixes() {
        let wl = Wordlist::new(vec!["www".into(), "api".into()]);
        let out = wl.enumerate("example.com").await.unwrap();
        assert_eq!(out, vec!["www.example.com", "api.example.com"]);
    }

    #[tokio::test]
    async fn enumerator_dedups_and_filters() {
        let e = Enumerator::new(Box::new(Fixed(vec![
            "www.example.com",
            "WWW.example.com.",
            "*.example.com",
            "other.org",
        ])))
        .with_supplemental(Box::new(Fixed(vec!["api.example.com", "www.example.com"])));
        let out = e.enumerate("example.com").await.unwrap();
        assert_eq!(out, vec!["www.example.com", "api.example.com"]);
    }

    #[tokio::test]
    async fn supplemental_failure_is_skipped() {
        let e = Enumerator::new(Box::new(Fixed(vec!["www.example.com"])))
            .with_supplemental(Box::new(Broken));
        let out = e.enumerate("example.com").await.unwrap();
        assert_eq!(out, vec!["www.example.com"]);
    }

    #[tokio::test]
    async fn primary_failure_propagates() {
        let e = Enumerator::new(Box::new(Broken));
        assert!(e.enumerate("example.com").await.is_err());
    }

    #[tokio::test]
    async fn subfinder_failure_carries_stderr() {
        // `false` exits non-zero without output, like a broken subfinder run.
        let Ok(bin) = which::which("false") else {
            return;
        };
        let sf = Subfinder::new(bin);
        assert!(sf.enumerate("example.com").await.is_err());
    }

    #[cfg(unix)]
    fn path_dir_with_subfinder(tag: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dir = env::temp_dir().join(format!("subscan-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let bin = dir.join("subfinder");
        std::fs::write(&bin, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(mode)).unwrap();
        dir
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_subfinder_falls_back_to_wordlist() {
        let dir = path_dir_with_subfinder("noexec", 0o644);
        assert!(Subfinder::locate_in(&dir).is_none());
        let e = Enumerator::detect_in(vec!["www".into()], &dir);
        assert_eq!(e.primary_name(), "wordlist");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn executable_subfinder_is_preferred() {
        let dir = path_dir_with_subfinder("exec", 0o755);
        let e = Enumerator::detect_in(vec!["www".into()], &dir);
        assert_eq!(e.primary_name(), "subfinder");
        std::fs::remove_dir_all(&dir).ok();
    }
}
