//! Service handling user creation and keeping the authoritative store and
//! the leaderboard index in sync for new users

use crate::{
    database::entities::{user_scores, users, User, UserScore},
    leaderboard::{models::clamp_rating, IndexError, LeaderboardIndex},
    utils::types::UserId,
};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryOrder};
use thiserror::Error;

/// Errors that can occur when managing users
#[derive(Debug, Error)]
pub enum UsersError {
    /// The provided username was empty or otherwise unusable
    #[error("Invalid username")]
    InvalidUsername,

    /// The provided username is already taken
    #[error("Username already in use")]
    UsernameTaken,

    /// The user with the requested ID was not found
    #[error("Unable to find requested user")]
    UserNotFound,

    /// Authoritative store error occurred
    #[error("Internal server error")]
    Database(#[from] DbErr),

    /// Index store error occurred
    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type UsersResult<T> = Result<T, UsersError>;

pub struct UserService {
    db: DatabaseConnection,
    index: LeaderboardIndex,
}

impl UserService {
    pub fn new(db: DatabaseConnection, index: LeaderboardIndex) -> UserService {
        UserService { db, index }
    }

    /// Creates a new user: profile first, then the clamped score row, then
    /// the index entry. A failure after the profile insert leaves the user
    /// without an indexed score; the caller retries or a rebuild reconciles.
    pub async fn create_user(&self, username: String, initial_rating: i32) -> UsersResult<User> {
        if User::by_username(&self.db, &username).await?.is_some() {
            return Err(UsersError::UsernameTaken);
        }

        let user = User::create(&self.db, username).await?;

        let rating = clamp_rating(initial_rating);
        UserScore::upsert(&self.db, user.id, rating).await?;
        self.index.update_score(user.id, rating).await?;

        Ok(user)
    }

    /// Gets the profile of the user with the provided ID
    pub async fn get_user(&self, user_id: UserId) -> UsersResult<User> {
        User::by_id(&self.db, user_id)
            .await?
            .ok_or(UsersError::UserNotFound)
    }

    /// Deletes a user entirely: the score row, the profile, then the index
    /// entry. Mirrors the creation order so a partial failure always leaves
    /// the index as the stale side, which a rebuild reconciles.
    pub async fn delete_user(&self, user_id: UserId) -> UsersResult<()> {
        User::by_id(&self.db, user_id)
            .await?
            .ok_or(UsersError::UserNotFound)?;

        user_scores::Entity::delete_by_id(user_id)
            .exec(&self.db)
            .await?;
        users::Entity::delete_by_id(user_id).exec(&self.db).await?;
        self.index.remove_user(user_id).await?;

        Ok(())
    }

    /// Loads one zero-indexed page of user profiles, newest first, along
    /// with whether more pages follow
    pub async fn list_users(&self, page: u64, count: u64) -> UsersResult<(Vec<User>, bool)> {
        let paginator = users::Entity::find()
            .order_by_desc(users::Column::CreatedAt)
            .paginate(&self.db, count.max(1));

        let total_pages = paginator.num_pages().await?;
        let more = page + 1 < total_pages;
        let users = paginator.fetch_page(page).await?;

        Ok((users, more))
    }
}
