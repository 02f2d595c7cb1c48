//! Custom resources this service reads and writes. Their definitions and controllers live elsewhere.

pub mod cluster;
pub mod kantaloupeflow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};


/// `metav1.Condition`, tolerant of partially populated entries.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
    pub last_transition_time: Option<DateTime<Utc>>,
    pub observed_generation: Option<i64>,
}

pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    conditions
        .iter()
        .any(|c| c.type_ == type_ && c.status == "True")
}
