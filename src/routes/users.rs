use crate::{
    database::entities::User,
    leaderboard::IndexError,
    services::users::{UserService, UsersError},
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

/// Initial rating applied when a create request doesn't provide one
const DEFAULT_INITIAL_RATING: i32 = 1000;

/// Type alias for users result responses which wraps the provided type in
/// a result where the success is wrapped in Json and the error type is
/// UsersError
type UsersRes<T> = Result<Json<T>, UsersError>;

/// Request structure for creating a new user
#[derive(Deserialize)]
pub struct CreateUserRequest {
    /// Display name for the new user
    username: String,
    /// Starting rating, clamped into the rating domain. Defaults when
    /// missing.
    initial_rating: Option<i32>,
}

/// POST /api/v1/users
///
/// Creates a new user with the provided username and initial rating,
/// responding with the created profile
pub async fn create_user(
    Extension(service): Extension<Arc<UserService>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), UsersError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(UsersError::InvalidUsername);
    }

    let rating = req.initial_rating.unwrap_or(DEFAULT_INITIAL_RATING);
    let user = service.create_user(username.to_string(), rating).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// The query structure for a users list query
#[derive(Deserialize)]
pub struct UsersQuery {
    /// The page offset (offset = offset * count)
    #[serde(default)]
    offset: u64,
    /// The number of users to return. This is restricted to 255 to
    /// prevent the database having to do any larger queries
    count: Option<u8>,
}

/// Response from the users endpoint which contains a list of users and
/// whether there are more users after
#[derive(Serialize)]
pub struct UsersResponse {
    /// The list of users retrieved
    users: Vec<User>,
    /// Whether there are more users left in the database
    more: bool,
}

/// GET /api/v1/users
///
/// Retrieves a paginated list of user profiles, newest first
///
/// `query` The query containing the offset and count values
pub async fn get_users(
    Extension(service): Extension<Arc<UserService>>,
    Query(query): Query<UsersQuery>,
) -> UsersRes<UsersResponse> {
    const DEFAULT_COUNT: u8 = 20;

    let count = query.count.unwrap_or(DEFAULT_COUNT);
    let (users, more) = service.list_users(query.offset, count as u64).await?;

    Ok(Json(UsersResponse { users, more }))
}

/// GET /api/v1/users/:id
///
/// Retrieves the profile of the user with an ID matching the provided {id}
///
/// `user_id` The ID of the user to get
pub async fn get_user(
    Extension(service): Extension<Arc<UserService>>,
    Path(user_id): Path<UserId>,
) -> UsersRes<User> {
    let user = service.get_user(user_id).await?;
    Ok(Json(user))
}

/// DELETE /api/v1/users/:id
///
/// Deletes the user with the provided {id} from the profile store, the
/// score store and the leaderboard index
///
/// `user_id` The ID of the user to delete
pub async fn delete_user(
    Extension(service): Extension<Arc<UserService>>,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode, UsersError> {
    service.delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// IntoResponse implementation for UsersError to allow it to be used
/// within the result type as a error response
impl IntoResponse for UsersError {
    #[inline]
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidUsername => StatusCode::BAD_REQUEST,
            Self::UsernameTaken => StatusCode::CONFLICT,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Index(IndexError::Backend(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Index(IndexError::Corrupt) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
