use crate::aggregate::{DailyAggregator, DailyWindow, MonthlyAggregator, RunSummary};
use crate::api::middleware::AuthenticatedUser;
use crate::api::models::{BackfillJobRequest, DailyJobRequest};
use crate::api::AppState;
use axum::{body::Bytes, extract::State, http::StatusCode, response::Json, Extension};
use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

type JobResponse = (StatusCode, Json<RunSummary>);

// Empty body means "all defaults"
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, StatusCode> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| StatusCode::BAD_REQUEST)
}

fn respond(summary: RunSummary) -> JobResponse {
    let status = if summary.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(summary))
}

pub fn daily_window(req: &DailyJobRequest, max_days: u32) -> Result<DailyWindow, StatusCode> {
    let window = match (req.from, req.to) {
        (Some(from), Some(to)) => DailyWindow::Range { from, to },
        (None, None) => DailyWindow::Yesterday {
            include_today: req.include_today,
        },
        _ => return Err(StatusCode::BAD_REQUEST),
    };
    checked(window, max_days)
}

fn checked(window: DailyWindow, max_days: u32) -> Result<DailyWindow, StatusCode> {
    window.check(max_days).map_err(|e| {
        debug!(error = %e, "rejected job window");
        StatusCode::BAD_REQUEST
    })?;
    Ok(window)
}

async fn run_daily_window(state: &AppState, window: DailyWindow) -> JobResponse {
    let aggregator = DailyAggregator::new(state.store.clone(), state.settings.clone());
    match aggregator.run(&window, Utc::now()).await {
        Ok(report) => {
            info!(report = ?report, "daily job finished");
            respond(report.summary())
        }
        Err(e) => {
            error!(error = %e, "daily job could not run");
            respond(RunSummary::fatal(e.to_string()))
        }
    }
}

pub async fn run_daily(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    body: Bytes,
) -> Result<JobResponse, StatusCode> {
    let req: DailyJobRequest = parse_body(&body)?;
    let window = daily_window(&req, state.settings.max_window_days)?;
    info!(user = %user.id, window = ?window, "daily job triggered");
    Ok(run_daily_window(&state, window).await)
}

pub async fn run_backfill(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    body: Bytes,
) -> Result<JobResponse, StatusCode> {
    let req: BackfillJobRequest = parse_body(&body)?;
    let days = req.days.unwrap_or(state.settings.backfill_days);
    let window = checked(DailyWindow::Trailing { days }, state.settings.max_window_days)?;
    info!(user = %user.id, days, "backfill job triggered");
    Ok(run_daily_window(&state, window).await)
}

pub async fn run_monthly(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> JobResponse {
    info!(user = %user.id, "monthly job triggered");
    let aggregator = MonthlyAggregator::new(state.store.clone(), state.settings.clone());
    match aggregator.run().await {
        Ok(report) => {
            info!(report = ?report, "monthly job finished");
            respond(report.summary())
        }
        Err(e) => {
            error!(error = %e, "monthly job could not run");
            respond(RunSummary::fatal(e.to_string()))
        }
    }
}
