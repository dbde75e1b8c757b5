use crate::{
    leaderboard::{models::LeaderboardEntry, IndexError},
    services::leaderboard::{LeaderboardError, LeaderboardService},
    utils::types::UserId,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The number of entries in a leaderboard page when none is requested
const DEFAULT_PAGE_SIZE: u64 = 10;
/// Upper bound on requested page sizes to prevent queries ranking the
/// entire leaderboard in one request
const MAX_PAGE_SIZE: u64 = 100;
/// The number of search results returned when no limit is requested
const DEFAULT_SEARCH_LIMIT: u64 = 20;
/// Upper bound on requested search limits
const MAX_SEARCH_LIMIT: u64 = 100;

/// Structure of a query requesting a leaderboard page
#[derive(Deserialize)]
pub struct LeaderboardQuery {
    /// 1-indexed page to load
    page: Option<u64>,
    /// Number of entries per page
    page_size: Option<u64>,
}

/// Response for a leaderboard page request
#[derive(Serialize)]
pub struct LeaderboardResponse {
    /// The entries on the requested page
    entries: Vec<LeaderboardEntry>,
    /// The total number of ranked users
    total: i64,
    /// The page that was loaded
    page: u64,
    /// The effective page size
    page_size: u64,
}

/// GET /api/v1/leaderboard
///
/// Retrieves one page of the leaderboard in descending rating order
///
/// `query` The leaderboard query
pub async fn get_leaderboard(
    Extension(service): Extension<Arc<LeaderboardService>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, LeaderboardError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let (entries, total) = service.get_page(page, page_size).await?;

    Ok(Json(LeaderboardResponse {
        entries,
        total,
        page,
        page_size,
    }))
}

/// Structure of a query searching the leaderboard by username
#[derive(Deserialize)]
pub struct SearchQuery {
    /// Substring to match against usernames
    #[serde(default)]
    q: String,
    /// Maximum number of results to return
    limit: Option<u64>,
}

/// Response for a leaderboard search request
#[derive(Serialize)]
pub struct SearchResponse {
    /// The matching entries sorted by rank ascending
    results: Vec<LeaderboardEntry>,
}

/// GET /api/v1/leaderboard/search
///
/// Finds users by username substring along with their current rating
/// and rank
///
/// `query` The search query
pub async fn search(
    Extension(service): Extension<Arc<LeaderboardService>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, LeaderboardError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let results = service.search(&query.q, limit).await?;
    Ok(Json(SearchResponse { results }))
}

/// GET /api/v1/leaderboard/user/:id
///
/// Retrieves the leaderboard entry for the user with the provided user ID
///
/// `user_id` The ID of the user to find the ranking of
pub async fn get_user_rank(
    Extension(service): Extension<Arc<LeaderboardService>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<LeaderboardEntry>, LeaderboardError> {
    let entry = service.get_user_rank(user_id).await?;
    Ok(Json(entry))
}

/// Request structure for a score update
#[derive(Deserialize)]
pub struct UpdateScoreRequest {
    /// The new rating, clamped into the rating domain
    rating: i32,
}

/// Response for a score update containing the rating actually stored
#[derive(Serialize)]
pub struct UpdateScoreResponse {
    user_id: UserId,
    rating: i32,
}

/// PUT /api/v1/leaderboard/user/:id/score
///
/// Updates the rating of the provided user in the authoritative store
/// and the index
///
/// `user_id` The ID of the user to update
/// `req`     The score update request
pub async fn update_score(
    Extension(service): Extension<Arc<LeaderboardService>>,
    Path(user_id): Path<UserId>,
    Json(req): Json<UpdateScoreRequest>,
) -> Result<Json<UpdateScoreResponse>, LeaderboardError> {
    let rating = service.update_score(user_id, req.rating).await?;
    Ok(Json(UpdateScoreResponse { user_id, rating }))
}

/// Response for an index rebuild
#[derive(Serialize)]
pub struct RebuildResponse {
    /// Number of users loaded into the fresh index
    users: u64,
}

/// POST /api/v1/leaderboard/rebuild
///
/// Atomically rebuilds the entire index from the authoritative store
pub async fn rebuild(
    Extension(service): Extension<Arc<LeaderboardService>>,
) -> Result<Json<RebuildResponse>, LeaderboardError> {
    let users = service.rebuild().await?;
    Ok(Json(RebuildResponse { users }))
}

/// IntoResponse implementation for LeaderboardError to allow it to be
/// used within the result type as a error response
impl IntoResponse for LeaderboardError {
    #[inline]
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Index(IndexError::Backend(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Index(IndexError::Corrupt) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
