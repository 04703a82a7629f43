//! Statistics endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    circulation::format_currency,
    error::AppResult,
    models::stats::{LibrarySummary, PopularBook, TopBorrower},
};

use super::AuthenticatedLibrarian;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RankingQuery {
    /// Number of rows (default 10, max 100)
    pub limit: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: LibrarySummary,
    /// Outstanding fines formatted for display
    pub total_fines_display: String,
}

/// Library dashboard counters
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library summary", body = SummaryResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_summary(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
) -> AppResult<Json<SummaryResponse>> {
    let summary = state.services.stats.summary().await?;
    let total_fines_display = format_currency(summary.total_fines);
    Ok(Json(SummaryResponse {
        summary,
        total_fines_display,
    }))
}

/// Members with the most loans
#[utoipa::path(
    get,
    path = "/stats/top-borrowers",
    tag = "stats",
    security(("bearer_auth" = [])),
    params(RankingQuery),
    responses(
        (status = 200, description = "Top borrowers", body = Vec<TopBorrower>),
        (status = 400, description = "Invalid limit")
    )
)]
pub async fn top_borrowers(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Query(query): Query<RankingQuery>,
) -> AppResult<Json<Vec<TopBorrower>>> {
    let rows = state.services.stats.top_borrowers(query.limit).await?;
    Ok(Json(rows))
}

/// Most borrowed books
#[utoipa::path(
    get,
    path = "/stats/popular-books",
    tag = "stats",
    security(("bearer_auth" = [])),
    params(RankingQuery),
    responses(
        (status = 200, description = "Popular books", body = Vec<PopularBook>),
        (status = 400, description = "Invalid limit")
    )
)]
pub async fn popular_books(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Query(query): Query<RankingQuery>,
) -> AppResult<Json<Vec<PopularBook>>> {
    let rows = state.services.stats.popular_books(query.limit).await?;
    Ok(Json(rows))
}
