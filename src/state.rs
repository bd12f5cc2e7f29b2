use std::sync::Arc;

use crate::db::DbPool;
use crate::services::probes::ProbeSet;

/// Application state containing all shared resources
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub probes: Arc<ProbeSet>,
}

impl AppState {
    pub fn new(pool: DbPool, probes: Arc<ProbeSet>) -> Self {
        Self { pool, probes }
    }
}
