use axum::extract::{Extension, Query, State};

use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::statistics::{self, FormStatistics, StatisticsQuery};

/// GET /api/statistics/forms?schoolId=|sectorId=|regionId=
pub async fn form_statistics(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<StatisticsQuery>,
) -> ApiResult<FormStatistics> {
    let stats = statistics::form_statistics(state.store.as_ref(), auth_user.profile(), &query).await?;
    Ok(ApiResponse::success(stats))
}
