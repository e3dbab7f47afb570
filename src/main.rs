use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use subscan_rs::config::{ScanOptions, ServerConfig};
use subscan_rs::controller::{
    HttpScanApi, PollOutcome, RecheckController, ScanApi, ScanController, TerminalView,
};
use subscan_rs::domain::{default_prefixes, load_wordlist_or_default, validate_domain};
use subscan_rs::enumerate::{CrtSh, Enumerator};
use subscan_rs::probe::{HttpProber, Prober};
use subscan_rs::types::ScanResults;
use subscan_rs::{export, scanner, server};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// subscan-rs: async subdomain scanner with HTTP liveness probing and a tiny embedded web UI.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "subscan-rs",
    version,
    about = "Async subdomain scanner with HTTP liveness probing and a tiny embedded web UI.",
    long_about = None
)]
struct Cli {
    /// Base domain to scan (e.g., example.com).
    #[arg(long)]
    domain: Option<String>,

    /// Path to a wordlist of subdomain prefixes, used when subfinder is not installed.
    #[arg(long, env = "SUBSCAN_WORDLIST")]
    wordlist: Option<PathBuf>,

    /// Also query crt.sh certificate transparency logs.
    #[arg(long, default_value_t = false)]
    crtsh: bool,

    /// Max concurrent HTTP probes.
    #[arg(long, env = "SUBSCAN_CONCURRENCY", default_value_t = 20)]
    concurrency: usize,

    /// Probe timeout in milliseconds during a scan.
    #[arg(long = "timeout-ms", env = "SUBSCAN_TIMEOUT_MS", default_value_t = 3000)]
    timeout_ms: u64,

    /// Probe timeout in milliseconds for a recheck.
    #[arg(long = "recheck-timeout-ms", env = "SUBSCAN_RECHECK_TIMEOUT_MS", default_value_t = 5000)]
    recheck_timeout_ms: u64,

    /// Write results to this path: `.csv` for CSV, anything else for pretty JSON.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Start the embedded HTTP UI server.
    #[arg(long = "serve-ui", default_value_t = false)]
    serve_ui: bool,

    /// Address the UI server binds to.
    #[arg(long, env = "SUBSCAN_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// SQLite database for scan history.
    #[arg(long, env = "SUBSCAN_DATABASE", default_value = "subscan.db")]
    database: PathBuf,

    /// Directory with the static UI.
    #[arg(long = "ui-dir", env = "SUBSCAN_UI_DIR", default_value = "ui")]
    ui_dir: PathBuf,

    /// Submit `--domain` to a running server at this URL and follow it.
    #[arg(long)]
    remote: Option<String>,

    /// With `--remote`: recheck every row that had no response.
    #[arg(long = "recheck-unanswered", default_value_t = false)]
    recheck_unanswered: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            concurrency: self.concurrency,
            probe_timeout: Duration::from_millis(self.timeout_ms),
            recheck_timeout: Duration::from_millis(self.recheck_timeout_ms),
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind.clone(),
            database: self.database.clone(),
            ui_dir: self.ui_dir.clone(),
            wordlist: self.wordlist.clone(),
            crtsh: self.crtsh,
            scan: self.scan_options(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    info!(
        domain = cli.domain.as_deref().unwrap_or("<none>"),
        concurrency = cli.concurrency,
        timeout_ms = cli.timeout_ms,
        serve_ui = cli.serve_ui,
        remote = cli.remote.as_deref().unwrap_or("<none>"),
        "subscan-rs configuration"
    );

    if let Some(base) = cli.remote.as_deref() {
        let Some(domain) = cli.domain.as_deref() else {
            bail!("--remote needs --domain");
        };
        return follow_remote(base, domain, cli.recheck_unanswered).await;
    }

    if cli.serve_ui {
        let config = cli.server_config();
        let bind = config.bind.clone();
        tokio::spawn(async move {
            if let Err(e) = server::spawn_server(config).await {
                eprintln!("HTTP UI server error: {e:#}");
            }
        });
        println!("UI server starting at http://{} (Ctrl+C to stop)", bind);
    }

    if let Some(domain) = cli.domain.as_deref() {
        let results = scan_locally(&cli, domain).await?;
        print_results_table(&results);
        if let Some(path) = cli.output.as_deref() {
            if let Err(e) = write_results(path, &results) {
                eprintln!("Failed to write results to {}: {}", path.display(), e);
            } else {
                println!("Wrote results to {}", path.display());
            }
        }
    }

    if cli.serve_ui {
        println!("Press Ctrl+C to stop the server...");
        let _ = tokio::signal::ctrl_c().await;
    } else if cli.domain.is_none() {
        println!("Nothing to do: pass --domain, --serve-ui or --remote (see --help).");
    }

    Ok(())
}

async fn scan_locally(cli: &Cli, domain: &str) -> Result<ScanResults> {
    let domain = domain.trim().to_ascii_lowercase();
    if !validate_domain(&domain) {
        bail!("invalid domain name: {domain}");
    }

    let prefixes = match cli.wordlist.as_deref() {
        Some(path) => load_wordlist_or_default(path),
        None => default_prefixes(),
    };
    let mut enumerator = Enumerator::detect(prefixes);
    if cli.crtsh {
        enumerator = enumerator.with_supplemental(Box::new(CrtSh::new(reqwest::Client::new())));
    }
    let prober: Arc<dyn Prober> = Arc::new(HttpProber::new()?);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        on_ctrl_c.cancel();
    });

    println!("Scanning {domain} using {}...", enumerator.primary_name());
    let results = scanner::scan_domain(
        &domain,
        &enumerator,
        prober,
        &cli.scan_options(),
        cancel,
        scanner::SharedProgress::new(),
    )
    .await?;
    Ok(results)
}

/// Submit to a running server and follow it the way the browser UI does.
async fn follow_remote(base: &str, domain: &str, recheck_unanswered: bool) -> Result<()> {
    let api = Arc::new(HttpScanApi::new(base)?);
    api.submit_scan(domain)
        .await
        .with_context(|| format!("failed to submit scan to {base}"))?;

    let view = Arc::new(TerminalView::new());
    let scan = ScanController::new(api.clone(), view.clone());
    let Some(polling) = scan.submit() else {
        bail!("scan trigger is busy");
    };
    match polling.await? {
        PollOutcome::Completed => {}
        PollOutcome::Failed(msg) => bail!("scan failed: {msg}"),
        PollOutcome::Idle => bail!("server reports no running or finished scan"),
        PollOutcome::TransportError => bail!("lost contact with {base}"),
    }

    let Some(results) = api.results().await? else {
        bail!("server finished the scan but returned no results");
    };
    print_results_table(&results);

    if recheck_unanswered {
        let rows = Arc::new(TerminalView::with_results(&results));
        let api: Arc<dyn ScanApi> = api;
        let rechecks = RecheckController::attach(api, rows.clone());
        let handles: Vec<_> = rechecks
            .domains()
            .filter_map(|d| rechecks.click(d))
            .collect();
        for h in handles {
            h.await?;
        }
        let mut results = results;
        rows.patch_results(&mut results);
        print_results_table(&results);
    }
    Ok(())
}

fn print_results_table(results: &ScanResults) {
    let mut domain_w = "domain".len();
    let mut info_w = "response".len();
    for e in &results.entries {
        domain_w = domain_w.max(e.domain.len());
        info_w = info_w.max(e.response_info.chars().count().min(60));
    }
    let status_w = "inactive".len();

    println!(
        "\nActive: {}  Inactive: {}  Total: {}",
        results.active_count(),
        results.inactive_count(),
        results.total_count()
    );
    println!(
        "{:<domain_w$}  {:<status_w$}  {:<info_w$}",
        "domain",
        "status",
        "response",
        domain_w = domain_w,
        status_w = status_w,
        info_w = info_w
    );
    println!(
        "{:-<domain_w$}  {:-<status_w$}  {:-<info_w$}",
        "",
        "",
        "",
        domain_w = domain_w,
        status_w = status_w,
        info_w = info_w
    );
    for e in &results.entries {
        let info: String = e.response_info.chars().take(60).collect();
        println!(
            "{:<domain_w$}  {:<status_w$}  {:<info_w$}",
            e.domain,
            if e.is_active { "active" } else { "inactive" },
            info,
            domain_w = domain_w,
            status_w = status_w,
            info_w = info_w
        );
    }
}

fn write_results(path: &std::path::Path, results: &ScanResults) -> anyhow::Result<()> {
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        std::fs::write(path, export::to_csv(results))?;
    } else {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, results)?;
    }
    Ok(())
}
