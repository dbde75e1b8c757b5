pub mod leaderboard;
pub mod simulation;
pub mod users;
