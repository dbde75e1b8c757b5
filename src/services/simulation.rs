//! Background engine that periodically perturbs a number of user scores,
//! writing the authoritative store and the leaderboard index on each change.
//! Used to keep a demo deployment lively and to exercise the index under
//! sustained concurrent writes.

use crate::{
    database::entities::UserScore,
    leaderboard::{models::clamp_rating, LeaderboardIndex},
};
use log::{debug, error, info};
use parking_lot::Mutex;
use rand::Rng;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Shortest tick interval the engine will run at
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);
/// Tick interval used when none is provided
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);
/// Number of score updates per tick used when none is provided
pub const DEFAULT_UPDATES_PER_TICK: usize = 5;
/// Largest number of score updates a single tick may apply
pub const MAX_UPDATES_PER_TICK: usize = 100;

/// Score perturbation engine. Either idle or running; starting while
/// running and stopping while idle are both silent no-ops.
pub struct Simulation {
    db: DatabaseConnection,
    index: LeaderboardIndex,
    /// Stop sender for the running perturbation task, None while idle.
    /// The lock is only ever held to test and flip this state.
    state: Mutex<Option<watch::Sender<bool>>>,
}

impl Simulation {
    pub fn new(db: DatabaseConnection, index: LeaderboardIndex) -> Simulation {
        Simulation {
            db,
            index,
            state: Mutex::new(None),
        }
    }

    /// Moves the engine to running, spawning the perturbation task. Does
    /// nothing when already running.
    pub fn start(&self, interval: Duration, updates_per_tick: usize) {
        let rx = {
            let mut state = self.state.lock();
            if state.is_some() {
                return;
            }
            let (tx, rx) = watch::channel(false);
            *state = Some(tx);
            rx
        };

        info!(
            "Simulation starting (interval: {}ms, updates per tick: {})",
            interval.as_millis(),
            updates_per_tick
        );

        tokio::spawn(run(
            self.db.clone(),
            self.index.clone(),
            interval,
            updates_per_tick,
            rx,
        ));
    }

    /// Moves the engine to idle. A tick already in progress completes, no
    /// new tick starts after this returns. Does nothing when already idle.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(stop) = state.take() {
            info!("Simulation stopping");
            _ = stop.send(true);
        }
    }

    /// Whether the engine is currently running
    pub fn is_running(&self) -> bool {
        self.state.lock().is_some()
    }
}

/// Perturbation task driving one tick per interval until stopped
async fn run(
    db: DatabaseConnection,
    index: LeaderboardIndex,
    interval: Duration,
    updates_per_tick: usize,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First updates land one full interval after start
    ticker.reset();

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }
        // The stop signal may have raced the tick
        if *stop_rx.borrow() {
            break;
        }

        perform_updates(&db, &index, updates_per_tick).await;
    }

    debug!("Simulation task exited");
}

/// Applies up to `count` random score perturbations. Users are sampled
/// with replacement. Failed writes are logged and skipped, the tick
/// carries on.
async fn perform_updates(db: &DatabaseConnection, index: &LeaderboardIndex, count: usize) {
    let scores = match UserScore::all(db).await {
        Ok(value) => value,
        Err(err) => {
            error!("Simulation failed to load scores: {err:?}");
            return;
        }
    };

    if scores.is_empty() {
        return;
    }

    for _ in 0..count.min(scores.len()) {
        // Rng is scoped so it never lives across an await
        let (score, new_rating) = {
            let mut rng = rand::thread_rng();
            let score = &scores[rng.gen_range(0..scores.len())];
            (score, perturb(score.rating, &mut rng))
        };

        // Authoritative store first, the index is recoverable by rebuild
        if let Err(err) = UserScore::upsert(db, score.user_id, new_rating).await {
            error!("Simulation failed to update score store: {err:?}");
            continue;
        }
        if let Err(err) = index.update_score(score.user_id, new_rating).await {
            error!("Simulation failed to update index: {err:?}");
        }
    }
}

/// Applies a random delta in [-100, 100] to the rating, biased back toward
/// the center of the domain at both extremes, clamping the result
fn perturb(rating: i32, rng: &mut impl Rng) -> i32 {
    let mut delta = rng.gen_range(-100..=100);
    if rating > 4000 {
        delta -= 50;
    } else if rating < 500 {
        delta += 50;
    }
    clamp_rating(rating + delta)
}

#[cfg(test)]
mod test {
    use super::{perturb, Simulation};
    use crate::leaderboard::models::{MAX_RATING, MIN_RATING};
    use crate::leaderboard::LeaderboardIndex;
    use rand::{rngs::StdRng, SeedableRng};
    use sea_orm::DatabaseConnection;
    use std::time::Duration;

    /// Start and stop are both idempotent; the engine only ever holds one
    /// perturbation task
    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn lifecycle_transitions_are_idempotent() {
        let base = std::env::var("REDIS_TEST_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let index = LeaderboardIndex::connect(&format!("{base}/13"))
            .await
            .expect("Unable to connect to redis");

        let simulation = Simulation::new(DatabaseConnection::Disconnected, index);

        assert!(!simulation.is_running());
        // Stopping while idle does nothing
        simulation.stop();
        assert!(!simulation.is_running());

        simulation.start(Duration::from_millis(100), 1);
        assert!(simulation.is_running());
        // Starting while running does nothing
        simulation.start(Duration::from_millis(100), 1);
        assert!(simulation.is_running());

        simulation.stop();
        assert!(!simulation.is_running());
        simulation.stop();
        assert!(!simulation.is_running());
    }

    #[test]
    fn perturbed_ratings_stay_in_domain() {
        let mut rng = StdRng::seed_from_u64(42);
        for rating in [MIN_RATING, 500, 1500, 4000, MAX_RATING] {
            for _ in 0..500 {
                let next = perturb(rating, &mut rng);
                assert!((MIN_RATING..=MAX_RATING).contains(&next));
            }
        }
    }

    #[test]
    fn high_ratings_drift_downward() {
        let mut rng = StdRng::seed_from_u64(7);
        // With the -50 bias a rating above 4000 moves by at most +50
        for _ in 0..500 {
            assert!(perturb(4500, &mut rng) <= 4550);
        }
    }

    #[test]
    fn low_ratings_drift_upward() {
        let mut rng = StdRng::seed_from_u64(7);
        // With the +50 bias a rating below 500 moves by at most -50
        for _ in 0..500 {
            assert!(perturb(400, &mut rng) >= 350);
        }
    }
}
