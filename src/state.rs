use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::bank::ItemBank;
use crate::session::{AttemptStore, SessionOrchestrator};

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    orchestrator: Arc<SessionOrchestrator>,
}

impl AppState {
    pub fn new(bank: Arc<ItemBank>, store: AttemptStore) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            orchestrator: Arc::new(SessionOrchestrator::new(bank, store)),
        }
    }

    pub fn orchestrator(&self) -> &SessionOrchestrator {
        &self.orchestrator
    }

    pub fn bank(&self) -> &ItemBank {
        self.orchestrator.bank()
    }

    pub fn store(&self) -> &AttemptStore {
        self.orchestrator.store()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
