//! Shared state for the HTTP API.

use crate::query::QueryPipeline;
use std::sync::Arc;
use std::time::Instant;

/// State shared across all API handlers.
pub struct ApiState {
    pub started_at: Instant,
    pub pipeline: Arc<QueryPipeline>,
}

impl ApiState {
    pub fn new(pipeline: Arc<QueryPipeline>) -> Self {
        Self {
            started_at: Instant::now(),
            pipeline,
        }
    }
}
