//! Line layout and file naming for the event directory.

use shift_metrics::Stage;

/// Stages polled each pass, upstream first.
pub const STAGES: [Stage; 3] = Stage::ALL;

pub const EVENTS_EXTENSION: &str = "jsonl";
pub const INVENTORY_FILE: &str = "inventory.jsonl";
