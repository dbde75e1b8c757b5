use crate::utils::types::UserId;
use serde::Serialize;

/// Lowest rating a user can hold
pub const MIN_RATING: i32 = 100;
/// Highest rating a user can hold
pub const MAX_RATING: i32 = 5000;

/// Clamps a rating value into the accepted rating domain. Applied at
/// every entry point that accepts a rating, out of range input is
/// never an error
pub fn clamp_rating(value: i32) -> i32 {
    value.clamp(MIN_RATING, MAX_RATING)
}

/// Member stored in the user ratings index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardMember {
    /// The ID of the user this member is for
    pub user_id: UserId,
    /// The rating the user currently holds
    pub rating: i32,
}

/// Entry in a leaderboard response, index data joined with the
/// user profile details
#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    /// Competition rank of the entry (1 = highest, ties share a rank)
    pub rank: i64,
    /// Display name of the user
    pub username: String,
    /// The rating this entry is ranked by
    pub rating: i32,
    /// The ID of the user this entry is for
    pub user_id: UserId,
}
