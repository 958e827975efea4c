use dotenvy::dotenv;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

use crate::error::ActionError;
use crate::models::config::EngineConfig;
use crate::models::player::Participant;
use crate::models::session::GroupId;
use crate::persistence::{NoSnapshots, SnapshotSink};
use crate::services::lobby_service;
use crate::services::role_assignment::ClassicRoleTable;
use crate::state::AppState;

static INIT: Once = Once::new();

pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenv().ok();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("mafia_engine=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// State with default timings, no persistence and a seeded RNG.
pub fn test_state(seed: u64) -> AppState {
    test_state_with(seed, Arc::new(NoSnapshots))
}

pub fn test_state_with(seed: u64, snapshots: Arc<dyn SnapshotSink>) -> AppState {
    setup_test_env();
    AppState::with_parts(
        EngineConfig::default(),
        snapshots,
        Arc::new(ClassicRoleTable),
        StdRng::seed_from_u64(seed),
    )
}

pub fn roster(count: usize) -> Vec<Participant> {
    (1..=count as i64)
        .map(|id| Participant::new(id, format!("Player{}", id)))
        .collect()
}

/// Opens a lobby and registers `count` participants with ids 1..=count.
pub async fn open_table(state: &AppState, group: GroupId, count: usize) -> Result<(), ActionError> {
    lobby_service::open_lobby(state, group).await?;
    for participant in roster(count) {
        lobby_service::register(state, group, participant).await?;
    }
    Ok(())
}
