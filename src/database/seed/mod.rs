use crate::{
    config::load_config,
    database::entities::{User, UserScore},
    leaderboard::{
        models::{MAX_RATING, MIN_RATING},
        LeaderboardIndex,
    },
    utils::types::UserId,
};
use rand::Rng;
use std::collections::HashMap;

/// The number of users to seed
const SEED_USERS_COUNT: usize = 10_000;

/// Seeds the database with a collection of users holding random ratings
/// then installs the matching index state in one bulk load. Ensure the
/// database is empty before seeding as to not cause username conflicts.
#[tokio::test]
#[ignore]
pub async fn seed() {
    let config = load_config().unwrap_or_default();

    let db = super::connect(&config.database)
        .await
        .expect("Unable to connect to database");
    let index = LeaderboardIndex::connect(&config.redis.url)
        .await
        .expect("Unable to connect to leaderboard index");

    // Ratings are sampled before any awaits so the rng stays on this stack
    let ratings: Vec<i32> = {
        let mut rng = rand::thread_rng();
        (0..SEED_USERS_COUNT)
            .map(|_| rng.gen_range(MIN_RATING..=MAX_RATING))
            .collect()
    };

    let mut scores: HashMap<UserId, i32> = HashMap::with_capacity(SEED_USERS_COUNT);

    for (i, rating) in ratings.into_iter().enumerate() {
        println!("Seeding user {i}");

        let user = User::create(&db, format!("player_{i}")).await.unwrap();
        UserScore::upsert(&db, user.id, rating).await.unwrap();
        scores.insert(user.id, rating);
    }

    index.bulk_load(&scores).await.unwrap();
}
