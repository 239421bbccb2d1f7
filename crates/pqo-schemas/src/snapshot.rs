//! Snapshot type (spec §3, §4.2).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub version: u64,
    pub state: Value,
}
