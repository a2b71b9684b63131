use axum::extract::State;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ReportSummary;

/// GET /api/reports/summary - Open, recently resolved and urgent counts
pub async fn summary(State(state): State<AppState>) -> ApiResult<ReportSummary> {
    let summary = state.tickets.summary().await?;
    Ok(ApiResponse::success(summary))
}
