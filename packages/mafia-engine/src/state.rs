use rand::rngs::StdRng;
use rand::SeedableRng;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ActionError, PersistError};
use crate::models::config::EngineConfig;
use crate::models::event::GameEvent;
use crate::models::session::{GroupId, Session};
use crate::persistence::{JsonFileSnapshots, NoSnapshots, SnapshotSink};
use crate::services::game_service;
use crate::services::role_assignment::{ClassicRoleTable, RoleTable};

/// A running session plus its pending phase timer.
pub struct SessionSlot {
    pub session: Session,
    /// Bumped on every timer arm; a timer only acts if its epoch is current.
    pub epoch: u64,
    pub timer: Option<JoinHandle<()>>,
}

impl SessionSlot {
    pub fn new(session: Session) -> Self {
        SessionSlot {
            session,
            epoch: 0,
            timer: None,
        }
    }

    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<Mutex<HashMap<GroupId, Arc<Mutex<SessionSlot>>>>>,
    pub events: broadcast::Sender<GameEvent>,
    pub snapshots: Arc<dyn SnapshotSink>,
    pub config: Arc<EngineConfig>,
    pub role_table: Arc<dyn RoleTable>,
    pub rng: Arc<std::sync::Mutex<StdRng>>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Result<Self, PersistError> {
        let snapshots: Arc<dyn SnapshotSink> = match &config.snapshot_dir {
            Some(dir) => Arc::new(JsonFileSnapshots::new(dir)?),
            None => Arc::new(NoSnapshots),
        };
        Ok(Self::with_parts(
            config,
            snapshots,
            Arc::new(ClassicRoleTable),
            StdRng::from_entropy(),
        ))
    }

    pub fn with_parts(
        config: EngineConfig,
        snapshots: Arc<dyn SnapshotSink>,
        role_table: Arc<dyn RoleTable>,
        rng: StdRng,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        AppState {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            events,
            snapshots,
            config: Arc::new(config),
            role_table,
            rng: Arc::new(std::sync::Mutex::new(rng)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, events: Vec<GameEvent>) {
        for event in events {
            if let Err(e) = self.events.send(event) {
                debug!("event dropped, no subscribers: {:?}", e.0.kind);
            }
        }
    }

    pub async fn slot(&self, group: GroupId) -> Result<Arc<Mutex<SessionSlot>>, ActionError> {
        self.sessions
            .lock()
            .await
            .get(&group)
            .cloned()
            .ok_or(ActionError::UnknownSession)
    }

    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// Persists the session; failures never abort the caller.
    pub fn checkpoint(&self, session: &Session) {
        if let Err(e) = self.snapshots.save(session) {
            warn!(group = %session.group, error = %e, "failed to save snapshot");
        }
    }

    pub fn forget(&self, group: GroupId) {
        if let Err(e) = self.snapshots.remove(group) {
            warn!(group = %group, error = %e, "failed to remove snapshot");
        }
    }

    /// Reloads every stored session and re-arms its phase timer.
    pub async fn restore(&self) -> Result<usize, PersistError> {
        let stored = self.snapshots.load_all()?;
        let mut restored = 0;

        for session in stored {
            let group = session.group;
            if self.sessions.lock().await.contains_key(&group) {
                continue;
            }
            if let Some(slot) = game_service::resume(self, session) {
                self.sessions
                    .lock()
                    .await
                    .insert(group, Arc::new(Mutex::new(slot)));
                restored += 1;
            } else {
                self.forget(group);
            }
        }

        info!(restored, "sessions restored from snapshots");
        Ok(restored)
    }
}
