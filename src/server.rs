use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    config::{ScanOptions, ServerConfig},
    domain::{default_prefixes, load_wordlist_or_default, validate_domain},
    enumerate::{CrtSh, Enumerator},
    error::ApiError,
    export,
    probe::{HttpProber, Prober},
    scanner::{self, ScanError, SharedProgress},
    store::ScanStore,
    types::{RecheckResponse, ScanResults, StatusResponse},
};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<RwLock<ServerState>>, // shared mutable state for progress/results
    store: Arc<Mutex<ScanStore>>,
    enumerator: Arc<Enumerator>,
    prober: Arc<dyn Prober>,
    options: ScanOptions,
}

#[derive(Debug, Default)]
struct ServerState {
    domain: Option<String>,
    in_progress: bool,
    completed: bool,
    error_message: Option<String>,
    results: Option<ScanResults>,
    progress: Option<SharedProgress>,
    cancel: Option<CancellationToken>,
}

impl ServerState {
    fn status(&self) -> StatusResponse {
        let (total, active, inactive) = match (&self.progress, &self.results) {
            (Some(p), _) => (p.total(), p.active(), p.inactive()),
            (None, Some(r)) => (r.total_count(), r.active_count(), r.inactive_count()),
            (None, None) => (0, 0, 0),
        };
        StatusResponse {
            scan_in_progress: self.in_progress,
            scan_completed: self.completed,
            total_count: total,
            active_count: active,
            inactive_count: inactive,
            error_message: self.error_message.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    deleted: bool,
    message: String,
}

impl AppState {
    pub fn new(
        store: ScanStore,
        enumerator: Enumerator,
        prober: Arc<dyn Prober>,
        options: ScanOptions,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ServerState::default())),
            store: Arc::new(Mutex::new(store)),
            enumerator: Arc::new(enumerator),
            prober,
            options,
        }
    }

    /// Cancel a running scan, if any.
    pub async fn shutdown(&self) {
        if let Some(c) = self.inner.write().await.cancel.take() {
            c.cancel();
        }
    }
}

/// Build the application router. Anything outside the API is served from `ui_dir`.
pub fn router(state: AppState, ui_dir: impl Into<PathBuf>) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(post_scan))
        .route("/recheck/{*domain}", post(post_recheck))
        .route("/results", get(get_results))
        .route("/export", get(get_export))
        .route("/history", get(get_history))
        .route("/history/{id}", get(get_history_detail).delete(delete_history))
        .route("/history/delete/{id}", post(delete_history))
        .with_state(state);

    let static_svc = ServeDir::new(ui_dir.into()).append_index_html_on_directories(true);

    api.fallback_service(static_svc)
        .layer(TraceLayer::new_for_http())
}

/// Wire up store, enumerator and prober from `config` and serve until the listener fails.
pub async fn spawn_server(config: ServerConfig) -> Result<()> {
    let store = ScanStore::open(&config.database)
        .with_context(|| format!("failed to open database {}", config.database.display()))?;

    let prefixes = match config.wordlist.as_deref() {
        Some(path) => load_wordlist_or_default(path),
        None => default_prefixes(),
    };
    let mut enumerator = Enumerator::detect(prefixes);
    if config.crtsh {
        enumerator = enumerator.with_supplemental(Box::new(CrtSh::new(reqwest::Client::new())));
    }

    let prober: Arc<dyn Prober> = Arc::new(HttpProber::new()?);
    let state = AppState::new(store, enumerator, prober, config.scan.clone());
    let app = router(state.clone(), config.ui_dir.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(bind = %config.bind, ui = %config.ui_dir.display(), "serving UI");
    let res = axum::serve(listener, app).await;
    state.shutdown().await;
    res?;
    Ok(())
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    (StatusCode::OK, Json(s.status()))
}

async fn get_results(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    if let Some(res) = s.results.as_ref() {
        (StatusCode::OK, Json(res.clone())).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn post_scan(
    State(app): State<AppState>,
    Form(req): Form<ScanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let domain = req.domain.trim().to_ascii_lowercase();
    if domain.is_empty() {
        return Err(ApiError::BadRequest("Please enter a domain".into()));
    }
    if !validate_domain(&domain) {
        return Err(ApiError::BadRequest("Please enter a valid domain name".into()));
    }

    let progress = SharedProgress::new();
    let cancel = CancellationToken::new();

    let status = {
        let mut s = app.inner.write().await;
        if s.in_progress {
            return Err(ApiError::Conflict("A scan is already in progress".into()));
        }
        *s = ServerState {
            domain: Some(domain.clone()),
            in_progress: true,
            progress: Some(progress.clone()),
            cancel: Some(cancel.clone()),
            ..ServerState::default()
        };
        s.status()
    };

    info!(%domain, "scan requested");
    tokio::spawn(run_scan(app, domain, cancel, progress));

    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn run_scan(
    app: AppState,
    domain: String,
    cancel: CancellationToken,
    progress: SharedProgress,
) {
    let res = scanner::scan_domain(
        &domain,
        &app.enumerator,
        app.prober.clone(),
        &app.options,
        cancel,
        progress,
    )
    .await;

    if let Ok(results) = &res {
        let store = app.store.lock().await;
        match store.save_scan(results) {
            Ok(id) => info!(scan_id = id, %domain, "saved scan results"),
            Err(e) => error!(%domain, error = %e, "failed to save scan results"),
        }
    }

    let mut s = app.inner.write().await;
    s.in_progress = false;
    s.progress = None;
    s.cancel = None;
    match res {
        Ok(results) => {
            s.completed = true;
            s.results = Some(results);
        }
        Err(ScanError::Cancelled) => warn!(%domain, "scan cancelled"),
        Err(e) => {
            error!(%domain, error = %e, "scan failed");
            s.error_message = Some(e.to_string());
        }
    }
}

async fn post_recheck(
    State(app): State<AppState>,
    Path(domain): Path<String>,
) -> impl IntoResponse {
    let host = domain
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    if !validate_domain(host) {
        return (
            StatusCode::BAD_REQUEST,
            Json(RecheckResponse::failed(format!("invalid domain: {domain}"))),
        );
    }

    let prober = app.prober.clone();
    let timeout = app.options.recheck_timeout;
    let target = domain.clone();
    let outcome = match tokio::spawn(async move { prober.probe(&target, timeout).await }).await {
        Ok(o) => o,
        Err(e) => {
            error!(%domain, error = %e, "recheck failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RecheckResponse::failed(e.to_string())),
            );
        }
    };

    let mut s = app.inner.write().await;
    let updated = s
        .results
        .as_mut()
        .map(|r| r.apply_recheck(&domain, &outcome.response_info))
        .unwrap_or(false);
    info!(%domain, response = %outcome.response_info, updated, "rechecked domain");

    (
        StatusCode::OK,
        Json(RecheckResponse::answered(domain, outcome.response_info)),
    )
}

async fn get_export(State(app): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let s = app.inner.read().await;
    let results = match s.results.as_ref() {
        Some(r) if s.completed && !r.entries.is_empty() => r,
        _ => {
            return Err(ApiError::NotFound(
                "No scan results available to export".into(),
            ))
        }
    };

    let csv = export::to_csv(results);
    let domain = s.domain.as_deref().unwrap_or(&results.domain);
    let filename = export::export_filename(domain, OffsetDateTime::now_utc());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        csv,
    ))
}

async fn get_history(State(app): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let history = app.store.lock().await.list_history()?;
    Ok(Json(history))
}

async fn get_history_detail(
    State(app): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match app.store.lock().await.load_scan(id)? {
        Some(detail) => Ok(Json(detail)),
        None => Err(ApiError::NotFound(format!("scan {id} not found"))),
    }
}

async fn delete_history(
    State(app): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let store = app.store.lock().await;
    let Some(detail) = store.load_scan(id)? else {
        return Err(ApiError::NotFound(format!("scan {id} not found")));
    };
    store.delete_scan(id)?;
    info!(scan_id = id, domain = %detail.scan.domain, "scan history deleted");
    Ok(Json(DeleteResponse {
        deleted: true,
        message: format!("Scan history for {} has been deleted", detail.scan.domain),
    }))
}
