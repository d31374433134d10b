//! Stored routine definitions.
//!
//! The web UI persists routines as a JSON array; durations there are in
//! minutes and steps carry an explicit `order` plus an `enabled` switch:
//!
//! ```json
//! [{ "name": "Morning",
//!    "steps": [{ "id": 0, "name": "Lawn", "duration": 10, "order": 0 },
//!              { "id": 2, "name": "Beds", "duration": 5, "order": 1, "enabled": false }] }]
//! ```
//!
//! Reading and writing the document is the storage layer's job; this
//! module only turns its text into [`Routine`]s.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::MAX_ROUTINE_STEPS;
use crate::error::{Error, Result};
use crate::routine::Routine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStep {
    /// Relay channel.
    pub id: u8,
    pub name: String,
    /// Minutes.
    pub duration: u32,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub order: u32,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRoutine {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StoredStep>,
}

impl StoredRoutine {
    /// Enabled steps in `order`, minutes converted to seconds.
    pub fn to_routine(&self) -> Routine {
        let mut enabled: Vec<&StoredStep> = self.steps.iter().filter(|s| s.enabled).collect();
        enabled.sort_by_key(|s| s.order);

        if enabled.len() > MAX_ROUTINE_STEPS {
            warn!(
                "Routine '{}': {} enabled steps, keeping the first {}",
                self.name,
                enabled.len(),
                MAX_ROUTINE_STEPS
            );
            enabled.truncate(MAX_ROUTINE_STEPS);
        }

        let mut routine = Routine::new(&self.name);
        for step in enabled {
            routine.push_step(step.id, step.duration.saturating_mul(60), &step.name);
        }
        routine
    }
}

/// Parse the persisted routines document.
pub fn parse_document(text: &str) -> Result<Vec<StoredRoutine>> {
    serde_json::from_str(text).map_err(|e| {
        warn!("Routine document rejected: {}", e);
        Error::Definition("malformed routines document")
    })
}
