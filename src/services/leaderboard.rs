//! Service translating leaderboard queries into index operations and
//! joining the results with user profiles

use crate::{
    database::entities::{user_scores, User, UserScore},
    leaderboard::{
        models::{clamp_rating, LeaderboardEntry},
        IndexError, LeaderboardIndex,
    },
    utils::types::UserId,
};
use futures_util::TryStreamExt;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while serving leaderboard queries
#[derive(Debug, Error)]
pub enum LeaderboardError {
    /// The requested user doesn't exist
    #[error("Unknown user")]
    UserNotFound,

    /// Authoritative store error occurred
    #[error("Internal server error")]
    Database(#[from] DbErr),

    /// Index store error occurred
    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type LeaderboardResult<T> = Result<T, LeaderboardError>;

pub struct LeaderboardService {
    db: DatabaseConnection,
    index: LeaderboardIndex,
}

impl LeaderboardService {
    pub fn new(db: DatabaseConnection, index: LeaderboardIndex) -> LeaderboardService {
        LeaderboardService { db, index }
    }

    /// Loads one page of the leaderboard along with the total user count.
    /// Pages are 1-indexed.
    ///
    /// Between reading the page slice and ranking it the index may shift
    /// under concurrent writers; what must not happen is two entries with
    /// the same rating showing different ranks, so rank lookups are cached
    /// by rating for the duration of the page.
    pub async fn get_page(
        &self,
        page: u64,
        page_size: u64,
    ) -> LeaderboardResult<(Vec<LeaderboardEntry>, i64)> {
        let page = page.max(1);
        let start = ((page - 1) * page_size) as i64;
        let stop = start + page_size as i64 - 1;

        let members = self.index.get_top_users(start, stop).await?;
        let total = self.index.get_total_count().await?;

        if members.is_empty() {
            return Ok((Vec::new(), total));
        }

        let ids: Vec<UserId> = members.iter().map(|member| member.user_id).collect();
        let profiles: HashMap<UserId, User> = User::by_ids(&self.db, ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut rating_ranks: HashMap<i32, i64> = HashMap::new();
        let mut entries = Vec::with_capacity(members.len());

        for member in members {
            let rank = match rating_ranks.get(&member.rating) {
                Some(&rank) => rank,
                None => {
                    let rank = self.index.get_rank(member.rating).await?;
                    rating_ranks.insert(member.rating, rank);
                    rank
                }
            };

            // Index members without a stored profile are skipped
            let Some(profile) = profiles.get(&member.user_id) else {
                continue;
            };

            entries.push(LeaderboardEntry {
                rank,
                username: profile.username.clone(),
                rating: member.rating,
                user_id: member.user_id,
            });
        }

        Ok((entries, total))
    }

    /// Finds users whose name contains the query string and enriches each
    /// hit with its current rating and rank, sorted by rank ascending
    pub async fn search(
        &self,
        query: &str,
        limit: u64,
    ) -> LeaderboardResult<Vec<LeaderboardEntry>> {
        let users = User::search(&self.db, query, limit).await?;

        let mut results = Vec::with_capacity(users.len());
        for user in users {
            let rating = self.index.get_user_score(user.id).await?;
            let rank = self.index.get_rank(rating).await?;

            results.push(LeaderboardEntry {
                rank,
                username: user.username,
                rating,
                user_id: user.id,
            });
        }

        results.sort_by_key(|entry| entry.rank);
        Ok(results)
    }

    /// The leaderboard entry of a single user, or UserNotFound when no
    /// such profile exists
    pub async fn get_user_rank(&self, user_id: UserId) -> LeaderboardResult<LeaderboardEntry> {
        let user = User::by_id(&self.db, user_id)
            .await?
            .ok_or(LeaderboardError::UserNotFound)?;

        let rating = self.index.get_user_score(user_id).await?;
        let rank = self.index.get_rank(rating).await?;

        Ok(LeaderboardEntry {
            rank,
            username: user.username,
            rating,
            user_id,
        })
    }

    /// Sets a user's rating, clamped into the rating domain. The
    /// authoritative store is written first; a crash between the two
    /// writes leaves the index stale but recoverable through a rebuild.
    /// Returns the rating actually stored.
    pub async fn update_score(&self, user_id: UserId, rating: i32) -> LeaderboardResult<i32> {
        User::by_id(&self.db, user_id)
            .await?
            .ok_or(LeaderboardError::UserNotFound)?;

        let rating = clamp_rating(rating);

        UserScore::upsert(&self.db, user_id, rating).await?;
        self.index.update_score(user_id, rating).await?;

        Ok(rating)
    }

    /// Rebuilds the entire index from the authoritative score rows,
    /// returning the number of users loaded. Recovery path for any index
    /// inconsistency.
    pub async fn rebuild(&self) -> LeaderboardResult<u64> {
        let mut scores: HashMap<UserId, i32> = HashMap::new();

        let mut rows = user_scores::Entity::find().stream(&self.db).await?;
        while let Some(score) = rows.try_next().await? {
            scores.insert(score.user_id, score.rating);
        }
        drop(rows);

        let total = scores.len() as u64;
        self.index.bulk_load(&scores).await?;
        Ok(total)
    }
}
