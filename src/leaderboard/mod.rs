//! Rank-dense leaderboard index backed by Redis.
//!
//! The index couples two sorted sets and a hash that must stay consistent
//! with each other on every mutation:
//!
//! * `leaderboard:users` maps each user to their current rating
//! * `leaderboard:ratings` holds the distinct rating values currently in use
//! * `leaderboard:rating_counts` maps each rating to its user count
//!
//! A rating belongs to the distinct set iff its count is above zero, which
//! makes the competition rank of any rating a single range count over the
//! distinct set: `1 + |ratings above it|`. That count is logarithmic in the
//! number of distinct ratings rather than the number of users.
//!
//! Mutations run as server-side scripts so concurrent readers observe either
//! all of a mutation or none of it. Client-side locking cannot provide that:
//! the critical section would span a network round trip and would not
//! protect readers at all.

use crate::utils::types::UserId;
use redis::{aio::MultiplexedConnection, AsyncCommands, RedisError, Script};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

pub mod models;
#[cfg(test)]
mod test;

use models::LeaderboardMember;

/// Sorted set of user ID scored by current rating
const USERS_KEY: &str = "leaderboard:users";
/// Sorted set of the distinct rating values currently held (member = score)
const RATINGS_KEY: &str = "leaderboard:ratings";
/// Hash of rating to the number of users currently at that rating
const RATING_COUNTS_KEY: &str = "leaderboard:rating_counts";

/// Moves a user to a new rating. Retires the old rating from the distinct
/// set when its count reaches zero and registers the new rating when its
/// count becomes one.
const UPDATE_SCORE_SCRIPT: &str = r#"
local users_key = KEYS[1]
local ratings_key = KEYS[2]
local counts_key = KEYS[3]
local user_id = ARGV[1]
local new_rating = tonumber(ARGV[2])

local old_rating = redis.call('ZSCORE', users_key, user_id)
if old_rating then
    old_rating = math.floor(tonumber(old_rating))
    local old_count = redis.call('HINCRBY', counts_key, old_rating, -1)
    if old_count <= 0 then
        redis.call('HDEL', counts_key, old_rating)
        redis.call('ZREM', ratings_key, old_rating)
    end
end

redis.call('ZADD', users_key, new_rating, user_id)

local new_count = redis.call('HINCRBY', counts_key, new_rating, 1)
if new_count == 1 then
    redis.call('ZADD', ratings_key, new_rating, new_rating)
end

return 1
"#;

/// Removes a user and retires their rating when they were the last user
/// holding it. Absent users are a no-op returning 0.
const REMOVE_USER_SCRIPT: &str = r#"
local users_key = KEYS[1]
local ratings_key = KEYS[2]
local counts_key = KEYS[3]
local user_id = ARGV[1]

local rating = redis.call('ZSCORE', users_key, user_id)
if not rating then
    return 0
end
rating = math.floor(tonumber(rating))

redis.call('ZREM', users_key, user_id)

local count = redis.call('HINCRBY', counts_key, rating, -1)
if count <= 0 then
    redis.call('HDEL', counts_key, rating)
    redis.call('ZREM', ratings_key, rating)
end

return 1
"#;

/// Errors surfaced by the leaderboard index
#[derive(Debug, Error)]
pub enum IndexError {
    /// The backing store was unreachable or a command/script failed
    #[error("Leaderboard backend unavailable")]
    Backend(#[from] RedisError),

    /// An operation observed a state that violates the index invariants.
    /// The index is a derived cache, rebuilding it from the authoritative
    /// store is the recovery path.
    #[error("Leaderboard index corrupted, rebuild required")]
    Corrupt,
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Scripts loaded once and shared by all clones of the index handle
struct IndexScripts {
    update_score: Script,
    remove_user: Script,
}

/// Handle to the rank-dense leaderboard index. Cheap to clone, all clones
/// share one multiplexed connection to the backing store.
#[derive(Clone)]
pub struct LeaderboardIndex {
    connection: MultiplexedConnection,
    scripts: Arc<IndexScripts>,
}

impl LeaderboardIndex {
    /// Connects to the backing store at the provided URL, pinging it to
    /// fail fast when its unreachable
    pub async fn connect(url: &str) -> Result<LeaderboardIndex, RedisError> {
        let client = redis::Client::open(url)?;
        let mut connection = client.get_multiplexed_async_connection().await?;

        let _: () = redis::cmd("PING").query_async(&mut connection).await?;

        Ok(LeaderboardIndex {
            connection,
            scripts: Arc::new(IndexScripts {
                update_score: Script::new(UPDATE_SCORE_SCRIPT),
                remove_user: Script::new(REMOVE_USER_SCRIPT),
            }),
        })
    }

    /// Sets the rating for the provided user, inserting them if they are
    /// not indexed yet. All four underlying mutations are applied as a
    /// single atomic unit.
    pub async fn update_score(&self, user_id: UserId, rating: i32) -> IndexResult<()> {
        let mut connection = self.connection.clone();
        let applied: i64 = self
            .scripts
            .update_score
            .key(USERS_KEY)
            .key(RATINGS_KEY)
            .key(RATING_COUNTS_KEY)
            .arg(user_id.to_string())
            .arg(rating)
            .invoke_async(&mut connection)
            .await?;

        if applied != 1 {
            return Err(IndexError::Corrupt);
        }
        Ok(())
    }

    /// Computes the competition rank of the provided rating: one more than
    /// the number of distinct ratings strictly above it. Ratings nobody
    /// holds still rank where they would land if inserted.
    pub async fn get_rank(&self, rating: i32) -> IndexResult<i64> {
        let mut connection = self.connection.clone();
        let above: i64 = connection
            .zcount(RATINGS_KEY, format!("({rating}"), "+inf")
            .await?;
        Ok(above + 1)
    }

    /// Reads the slice of users between the zero-indexed inclusive `start`
    /// and `stop` positions, descending by rating. Order among users tied
    /// on a rating is unspecified.
    pub async fn get_top_users(&self, start: i64, stop: i64) -> IndexResult<Vec<LeaderboardMember>> {
        let mut connection = self.connection.clone();
        let entries: Vec<(String, i64)> = connection
            .zrevrange_withscores(USERS_KEY, start as isize, stop as isize)
            .await?;

        // Members that don't parse as user IDs are skipped rather than
        // failing the whole page
        Ok(entries
            .into_iter()
            .filter_map(|(member, rating)| {
                let user_id = member.parse().ok()?;
                Some(LeaderboardMember {
                    user_id,
                    rating: rating as i32,
                })
            })
            .collect())
    }

    /// The current rating of the provided user, 0 when the user is not
    /// indexed (the rating domain starts at 100 so 0 is unambiguous)
    pub async fn get_user_score(&self, user_id: UserId) -> IndexResult<i32> {
        let mut connection = self.connection.clone();
        let score: Option<i64> = connection.zscore(USERS_KEY, user_id.to_string()).await?;
        Ok(score.unwrap_or(0) as i32)
    }

    /// Number of users currently indexed
    pub async fn get_total_count(&self) -> IndexResult<i64> {
        let mut connection = self.connection.clone();
        let count: i64 = connection.zcard(USERS_KEY).await?;
        Ok(count)
    }

    /// Removes the provided user from the index. Removing an absent user
    /// is a successful no-op.
    pub async fn remove_user(&self, user_id: UserId) -> IndexResult<()> {
        let mut connection = self.connection.clone();
        let removed: i64 = self
            .scripts
            .remove_user
            .key(USERS_KEY)
            .key(RATINGS_KEY)
            .key(RATING_COUNTS_KEY)
            .arg(user_id.to_string())
            .invoke_async(&mut connection)
            .await?;

        if removed != 0 && removed != 1 {
            return Err(IndexError::Corrupt);
        }
        Ok(())
    }

    /// Replaces the entire index with the provided scores. The delete and
    /// repopulation run as one transaction, readers observe either the old
    /// state or the new state but never a partial one.
    pub async fn bulk_load(&self, scores: &HashMap<UserId, i32>) -> IndexResult<()> {
        let mut connection = self.connection.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(USERS_KEY).ignore();
        pipe.del(RATINGS_KEY).ignore();
        pipe.del(RATING_COUNTS_KEY).ignore();

        if !scores.is_empty() {
            let members: Vec<(i32, String)> = scores
                .iter()
                .map(|(user_id, &rating)| (rating, user_id.to_string()))
                .collect();
            pipe.zadd_multiple(USERS_KEY, &members).ignore();

            // Per-rating populations are computed offline so the distinct
            // set and counts land in the same transaction as the members
            let counts = rating_counts(scores);
            let ratings: Vec<(i32, i32)> = counts.keys().map(|&rating| (rating, rating)).collect();
            for (&rating, &count) in &counts {
                pipe.hset(RATING_COUNTS_KEY, rating, count).ignore();
            }
            pipe.zadd_multiple(RATINGS_KEY, &ratings).ignore();
        }

        let _: () = pipe.query_async(&mut connection).await?;
        Ok(())
    }
}

/// Folds a user to rating mapping down to the population count of
/// each distinct rating
fn rating_counts(scores: &HashMap<UserId, i32>) -> HashMap<i32, i64> {
    let mut counts: HashMap<i32, i64> = HashMap::new();
    for &rating in scores.values() {
        *counts.entry(rating).or_insert(0) += 1;
    }
    counts
}
