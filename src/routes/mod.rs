use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::middleware::cors::cors_layer;

mod leaderboard;
mod server;
mod simulation;
mod users;

/// Function for configuring the provided service config with all the
/// application routes.
pub fn router() -> Router {
    Router::new().nest(
        "/api/v1",
        Router::new()
            // Liveness
            .route("/health", get(server::health))
            // Users routing
            .nest(
                "/users",
                Router::new()
                    .route("/", post(users::create_user).get(users::get_users))
                    .route("/:id", get(users::get_user).delete(users::delete_user)),
            )
            // Leaderboard routing
            .nest(
                "/leaderboard",
                Router::new()
                    .route("/", get(leaderboard::get_leaderboard))
                    .route("/search", get(leaderboard::search))
                    .route("/user/:id", get(leaderboard::get_user_rank))
                    .route("/user/:id/score", put(leaderboard::update_score))
                    .route("/rebuild", post(leaderboard::rebuild)),
            )
            // Simulation engine routing
            .nest(
                "/simulation",
                Router::new()
                    .route("/start", post(simulation::start))
                    .route("/stop", post(simulation::stop))
                    .route("/status", get(simulation::status)),
            )
            .layer(middleware::from_fn(cors_layer)),
    )
}
