use crate::services::simulation::{
    Simulation, DEFAULT_INTERVAL, DEFAULT_UPDATES_PER_TICK, MAX_UPDATES_PER_TICK, MIN_INTERVAL,
};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

/// Request structure for starting the simulation. Missing fields and a
/// missing or malformed body fall back to the defaults.
#[derive(Deserialize)]
#[serde(default)]
pub struct StartSimulationRequest {
    /// Milliseconds between ticks
    interval_ms: u64,
    /// Number of score updates applied per tick
    updates_per_tick: usize,
}

impl Default for StartSimulationRequest {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            updates_per_tick: DEFAULT_UPDATES_PER_TICK,
        }
    }
}

impl StartSimulationRequest {
    /// Clamps the requested parameters into their allowed ranges
    fn normalized(self) -> (Duration, usize) {
        let interval = Duration::from_millis(self.interval_ms).max(MIN_INTERVAL);
        let updates = self.updates_per_tick.clamp(1, MAX_UPDATES_PER_TICK);
        (interval, updates)
    }
}

/// Response describing the effective simulation parameters
#[derive(Serialize)]
pub struct StartSimulationResponse {
    message: &'static str,
    interval_ms: u64,
    updates_per_tick: usize,
}

/// POST /api/v1/simulation/start
///
/// Starts the simulation engine with the provided parameters. Starting
/// while already running is a no-op.
///
/// `req` The optional start parameters
pub async fn start(
    Extension(simulation): Extension<Arc<Simulation>>,
    req: Option<Json<StartSimulationRequest>>,
) -> Json<StartSimulationResponse> {
    let req = req.map(|Json(value)| value).unwrap_or_default();
    let (interval, updates_per_tick) = req.normalized();

    simulation.start(interval, updates_per_tick);

    Json(StartSimulationResponse {
        message: "simulation started",
        interval_ms: interval.as_millis() as u64,
        updates_per_tick,
    })
}

/// Response for a simulation stop request
#[derive(Serialize)]
pub struct StopSimulationResponse {
    message: &'static str,
}

/// POST /api/v1/simulation/stop
///
/// Stops the simulation engine. Stopping while idle is a no-op.
pub async fn stop(Extension(simulation): Extension<Arc<Simulation>>) -> Json<StopSimulationResponse> {
    simulation.stop();
    Json(StopSimulationResponse {
        message: "simulation stopped",
    })
}

/// Response describing whether the simulation engine is running
#[derive(Serialize)]
pub struct SimulationStatusResponse {
    running: bool,
}

/// GET /api/v1/simulation/status
///
/// Reports whether the simulation engine is currently running
pub async fn status(
    Extension(simulation): Extension<Arc<Simulation>>,
) -> Json<SimulationStatusResponse> {
    Json(SimulationStatusResponse {
        running: simulation.is_running(),
    })
}

#[cfg(test)]
mod test {
    use super::StartSimulationRequest;
    use std::time::Duration;

    #[test]
    fn defaults_applied() {
        let (interval, updates) = StartSimulationRequest::default().normalized();
        assert_eq!(interval, Duration::from_millis(1000));
        assert_eq!(updates, 5);
    }

    #[test]
    fn parameters_clamped() {
        let (interval, updates) = StartSimulationRequest {
            interval_ms: 10,
            updates_per_tick: 0,
        }
        .normalized();
        assert_eq!(interval, Duration::from_millis(100));
        assert_eq!(updates, 1);

        let (interval, updates) = StartSimulationRequest {
            interval_ms: 60_000,
            updates_per_tick: 10_000,
        }
        .normalized();
        assert_eq!(interval, Duration::from_millis(60_000));
        assert_eq!(updates, 100);
    }
}
