//! Listening session: lifecycle, restart policy and consumer-facing state

mod engine;
mod retry;
mod state;

pub use engine::WakeWordEngine;
pub use retry::RetryPolicy;
pub use state::{EngineEvent, ListeningState, NoiseEstimator};
