//! Integration tests for the leaderboard index. These run against a live
//! Redis server and are ignored by default; each test claims its own
//! database number so the suite can run in parallel against one server.
//!
//! Run with a server on REDIS_TEST_URL (default redis://127.0.0.1:6379):
//!
//! ```text
//! cargo test -- --ignored
//! ```

use super::{rating_counts, LeaderboardIndex, RATINGS_KEY, RATING_COUNTS_KEY, USERS_KEY};
use crate::utils::types::UserId;
use rand::{rngs::StdRng, Rng, SeedableRng};
use redis::{aio::MultiplexedConnection, AsyncCommands};
use std::collections::HashMap;

#[test]
fn counts_group_distinct_ratings() {
    let mut scores = HashMap::new();
    scores.insert(UserId::new_v4(), 1500);
    scores.insert(UserId::new_v4(), 1500);
    scores.insert(UserId::new_v4(), 2000);

    let counts = rating_counts(&scores);
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[&1500], 2);
    assert_eq!(counts[&2000], 1);
}

#[test]
fn counts_of_empty_scores_empty() {
    assert!(rating_counts(&HashMap::new()).is_empty());
}

/// Connects an index handle plus a raw connection for state inspection,
/// wiping the chosen test database first
async fn test_index(db: u8) -> (LeaderboardIndex, MultiplexedConnection) {
    let base =
        std::env::var("REDIS_TEST_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let url = format!("{base}/{db}");

    let index = LeaderboardIndex::connect(&url)
        .await
        .expect("Unable to connect to redis");

    let client = redis::Client::open(url.as_str()).unwrap();
    let mut connection = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("FLUSHDB").query_async(&mut connection).await.unwrap();

    (index, connection)
}

/// Asserts the structural invariants of the index: counts match the user
/// population per rating, the distinct set matches the occupied ratings,
/// and every distinct rating ranks one above the count of ratings over it
async fn assert_invariants(index: &LeaderboardIndex, connection: &mut MultiplexedConnection) {
    let users: Vec<(String, i64)> = connection
        .zrange_withscores(USERS_KEY, 0, -1)
        .await
        .unwrap();

    let mut expected_counts: HashMap<i64, i64> = HashMap::new();
    for (_, rating) in &users {
        *expected_counts.entry(*rating).or_insert(0) += 1;
    }

    let counts: HashMap<i64, i64> = connection.hgetall(RATING_COUNTS_KEY).await.unwrap();
    assert_eq!(counts, expected_counts);

    let distinct: Vec<i64> = connection.zrange(RATINGS_KEY, 0, -1).await.unwrap();
    let mut expected_distinct: Vec<i64> = expected_counts.keys().copied().collect();
    expected_distinct.sort_unstable();
    assert_eq!(distinct, expected_distinct);

    for (i, &rating) in distinct.iter().enumerate() {
        let rank = index.get_rank(rating as i32).await.unwrap();
        assert_eq!(rank, (distinct.len() - i) as i64);
    }

    let total = index.get_total_count().await.unwrap();
    assert_eq!(total, users.len() as i64);
    assert_eq!(counts.values().sum::<i64>(), total);
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn ranks_are_counted_over_distinct_ratings() {
    let (index, mut connection) = test_index(3).await;

    let a = UserId::new_v4();
    let b = UserId::new_v4();
    let c = UserId::new_v4();

    index.update_score(a, 1500).await.unwrap();
    index.update_score(b, 1500).await.unwrap();
    index.update_score(c, 2000).await.unwrap();

    assert_eq!(index.get_rank(2000).await.unwrap(), 1);
    // Tied users share the rank below the single rating above them
    assert_eq!(index.get_rank(1500).await.unwrap(), 2);
    assert_eq!(index.get_top_users(0, 2).await.unwrap().len(), 3);
    assert_eq!(index.get_total_count().await.unwrap(), 3);

    assert_invariants(&index, &mut connection).await;
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn moving_users_retires_empty_ratings() {
    let (index, mut connection) = test_index(4).await;

    let a = UserId::new_v4();
    let b = UserId::new_v4();
    let c = UserId::new_v4();

    index.update_score(a, 1500).await.unwrap();
    index.update_score(b, 1500).await.unwrap();
    index.update_score(c, 2000).await.unwrap();

    // Moving one of the tied users keeps 1500 occupied
    index.update_score(a, 2000).await.unwrap();
    assert_eq!(index.get_rank(2000).await.unwrap(), 1);
    assert_eq!(index.get_rank(1500).await.unwrap(), 2);
    let distinct: Vec<i64> = connection.zrange(RATINGS_KEY, 0, -1).await.unwrap();
    assert_eq!(distinct, vec![1500, 2000]);
    assert_invariants(&index, &mut connection).await;

    // Moving the last user off 1500 retires it everywhere
    index.update_score(b, 2000).await.unwrap();
    let distinct: Vec<i64> = connection.zrange(RATINGS_KEY, 0, -1).await.unwrap();
    assert_eq!(distinct, vec![2000]);
    assert_eq!(index.get_rank(2000).await.unwrap(), 1);
    let counts: HashMap<i64, i64> = connection.hgetall(RATING_COUNTS_KEY).await.unwrap();
    assert_eq!(counts, HashMap::from([(2000, 3)]));
    assert_invariants(&index, &mut connection).await;

    // Removing a user decrements the population but keeps the rating
    index.remove_user(a).await.unwrap();
    assert_eq!(index.get_total_count().await.unwrap(), 2);
    let counts: HashMap<i64, i64> = connection.hgetall(RATING_COUNTS_KEY).await.unwrap();
    assert_eq!(counts, HashMap::from([(2000, 2)]));
    assert_invariants(&index, &mut connection).await;
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn updates_are_read_back() {
    let (index, mut connection) = test_index(5).await;

    let user = UserId::new_v4();
    index.update_score(user, 3200).await.unwrap();
    assert_eq!(index.get_user_score(user).await.unwrap(), 3200);

    // Re-scoring a user to their current rating changes nothing
    index.update_score(user, 3200).await.unwrap();
    assert_eq!(index.get_user_score(user).await.unwrap(), 3200);
    assert_invariants(&index, &mut connection).await;
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn removal_restores_prior_state() {
    let (index, mut connection) = test_index(6).await;

    let user = UserId::new_v4();
    index.update_score(user, 2500).await.unwrap();
    index.remove_user(user).await.unwrap();

    assert_eq!(index.get_total_count().await.unwrap(), 0);
    assert_eq!(index.get_user_score(user).await.unwrap(), 0);
    let counts: HashMap<i64, i64> = connection.hgetall(RATING_COUNTS_KEY).await.unwrap();
    assert!(counts.is_empty());
    let distinct: Vec<i64> = connection.zrange(RATINGS_KEY, 0, -1).await.unwrap();
    assert!(distinct.is_empty());
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn absent_users_are_benign() {
    let (index, _connection) = test_index(7).await;

    let ghost = UserId::new_v4();
    // Removing an absent user is a successful no-op
    index.remove_user(ghost).await.unwrap();
    // Absent users score the 0 sentinel
    assert_eq!(index.get_user_score(ghost).await.unwrap(), 0);
    // An empty index ranks everything first
    assert_eq!(index.get_rank(1234).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn bulk_load_replaces_state() {
    let (index, mut connection) = test_index(8).await;

    // Pre-existing state that the load must fully replace
    index.update_score(UserId::new_v4(), 4444).await.unwrap();

    let scores = HashMap::from([
        (UserId::new_v4(), 3000),
        (UserId::new_v4(), 3000),
        (UserId::new_v4(), 1000),
    ]);
    index.bulk_load(&scores).await.unwrap();

    assert_eq!(index.get_total_count().await.unwrap(), 3);
    assert_eq!(index.get_rank(3000).await.unwrap(), 1);
    assert_eq!(index.get_rank(1000).await.unwrap(), 2);
    for (&user_id, &rating) in &scores {
        assert_eq!(index.get_user_score(user_id).await.unwrap(), rating);
    }
    assert_invariants(&index, &mut connection).await;
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn bulk_load_is_idempotent() {
    let (index, mut connection) = test_index(9).await;

    let scores = HashMap::from([
        (UserId::new_v4(), 1200),
        (UserId::new_v4(), 1800),
        (UserId::new_v4(), 1800),
    ]);

    index.bulk_load(&scores).await.unwrap();
    let first: Vec<(String, i64)> = connection
        .zrange_withscores(USERS_KEY, 0, -1)
        .await
        .unwrap();

    index.bulk_load(&scores).await.unwrap();
    let second: Vec<(String, i64)> = connection
        .zrange_withscores(USERS_KEY, 0, -1)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_invariants(&index, &mut connection).await;
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn bulk_load_of_nothing_empties_the_index() {
    let (index, mut connection) = test_index(10).await;

    index.update_score(UserId::new_v4(), 2000).await.unwrap();
    index.bulk_load(&HashMap::new()).await.unwrap();

    assert_eq!(index.get_total_count().await.unwrap(), 0);
    assert_invariants(&index, &mut connection).await;
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn concurrent_updates_preserve_invariants() {
    let (index, mut connection) = test_index(11).await;

    const TASKS: u64 = 8;
    const UPDATES_PER_TASK: usize = 50;

    let users: Vec<UserId> = (0..20).map(|_| UserId::new_v4()).collect();

    let mut handles = Vec::new();
    for task in 0..TASKS {
        let index = index.clone();
        let users = users.clone();
        handles.push(tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(task);
            for _ in 0..UPDATES_PER_TASK {
                let user = users[rng.gen_range(0..users.len())];
                let rating = rng.gen_range(100..=5000);
                index.update_score(user, rating).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(index.get_total_count().await.unwrap(), users.len() as i64);
    assert_invariants(&index, &mut connection).await;
}
