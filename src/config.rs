use std::path::PathBuf;
use std::time::Duration;

/// Knobs for a single scan run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Max probes in flight at once.
    pub concurrency: usize,
    /// Per-probe timeout during a scan.
    pub probe_timeout: Duration,
    /// Per-probe timeout for an on-demand recheck.
    pub recheck_timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: 20,
            probe_timeout: Duration::from_secs(3),
            recheck_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything the HTTP server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub database: PathBuf,
    pub ui_dir: PathBuf,
    pub wordlist: Option<PathBuf>,
    pub crtsh: bool,
    pub scan: ScanOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".into(),
            database: PathBuf::from("subscan.db"),
            ui_dir: PathBuf::from("ui"),
            wordlist: None,
            crtsh: false,
            scan: ScanOptions::default(),
        }
    }
}
