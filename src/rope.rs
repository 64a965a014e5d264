//! Chainable setup for a [`QueryRecorder`].

use crate::config::{GlobalSettings, RopeConfig, StubDefinition};
use crate::recorder::QueryRecorder;

/// Collects stubs, then hands out a minq recorder.
///
/// ```
/// use minq_rope::{Rope, StubDefinition};
/// use serde_json::json;
///
/// let spy = Rope::new()
///     .stub(StubDefinition::for_collection("users", json!([{"name": "jason"}])))
///     .stub(StubDefinition::wildcard(json!({})))
///     .minq();
/// assert_eq!(spy.registry().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Rope {
    config: RopeConfig,
}

impl Rope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: RopeConfig) -> Self {
        Self { config }
    }

    /// Register a stub. Earlier stubs take precedence.
    pub fn stub(mut self, stub: StubDefinition) -> Self {
        self.config.stubs.push(stub);
        self
    }

    pub fn settings(mut self, settings: GlobalSettings) -> Self {
        self.config.settings = settings;
        self
    }

    pub fn config(&self) -> &RopeConfig {
        &self.config
    }

    /// Build the recorder.
    pub fn minq(self) -> QueryRecorder {
        QueryRecorder::new(self.config)
    }
}
