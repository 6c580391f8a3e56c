use std::sync::Arc;

use crate::db::ScheduleStore;
use crate::ingest::IngestPipeline;

/// Shared state handed to every HTTP handler.
pub struct AppState {
    pub store: Arc<ScheduleStore>,
    /// Present when the server runs alongside the ingestion scheduler
    pub pipeline: Option<Arc<IngestPipeline>>,
}

impl AppState {
    pub fn new(store: Arc<ScheduleStore>) -> Self {
        Self {
            store,
            pipeline: None,
        }
    }

    pub fn with_pipeline(pipeline: Arc<IngestPipeline>) -> Self {
        Self {
            store: pipeline.store().clone(),
            pipeline: Some(pipeline),
        }
    }
}
