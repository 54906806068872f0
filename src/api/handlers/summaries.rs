use crate::api::models::{
    DailySummaryQuery, DailySummaryResponse, MonthlySummaryQuery, MonthlySummaryResponse,
};
use crate::api::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use tracing::error;

pub async fn get_daily(
    State(state): State<AppState>,
    Query(params): Query<DailySummaryQuery>,
) -> Result<Json<Vec<DailySummaryResponse>>, StatusCode> {
    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let rows = state
        .store
        .daily_summaries(&params.device, params.from, params.to)
        .await
        .map_err(|e| {
            error!(device = %params.device, error = %e, "failed to read daily summaries");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn get_monthly(
    State(state): State<AppState>,
    Query(params): Query<MonthlySummaryQuery>,
) -> Result<Json<Vec<MonthlySummaryResponse>>, StatusCode> {
    let rows = state
        .store
        .monthly_summaries(&params.device)
        .await
        .map_err(|e| {
            error!(device = %params.device, error = %e, "failed to read monthly summaries");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
