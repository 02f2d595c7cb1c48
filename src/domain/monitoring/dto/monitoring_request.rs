use chrono::TimeDelta;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::core::util::time_range::{parse_duration, AlignedRange, TimeRange};
use crate::domain::monitoring::query::{RankingType, RequestType, ResourceType};

pub const DEFAULT_TOP_K: u32 = 5;

/// Window of a trend query. `start`/`end` win over `range` when both are positive; a
/// zero `step` picks one from the window length.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrendQuery {
    pub resource_type: ResourceType,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    #[validate(custom(function = "validate_window"))]
    pub range: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub step: i64,
}

impl TrendQuery {
    pub fn aligned(&self) -> AlignedRange {
        aligned_range(self.start, self.end, &self.range, self.step)
    }
}

pub fn aligned_range(start: i64, end: i64, range: &str, step: i64) -> AlignedRange {
    TimeRange::resolve(start, end, range).align(TimeDelta::seconds(step))
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TopNodesQuery {
    pub resource_type: ResourceType,
    #[serde(default)]
    pub ranking_type: RankingType,
    #[serde(default)]
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CardTopWorkloadsQuery {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default)]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadsTopQuery {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    /// PromQL subquery window, e.g. `1h`.
    #[serde(default = "default_window")]
    #[validate(custom(function = "validate_window"))]
    pub range: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub step: i64,
    #[serde(default)]
    pub limit: u32,
}

fn default_window() -> String {
    "1h".to_string()
}

/// An empty window falls back to one hour; anything else must parse as a duration.
fn validate_window(window: &str) -> Result<(), ValidationError> {
    if window.is_empty() || parse_duration(window).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("duration"))
    }
}

pub fn top_k_limit(limit: u32) -> u32 {
    if limit == 0 {
        DEFAULT_TOP_K
    } else {
        limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_query_accepts_enum_names() {
        let q: TrendQuery = serde_json::from_value(serde_json::json!({
            "resourceType": "RESOURCE_TYPE_GPU_CORE",
            "range": "6h"
        }))
        .unwrap();
        assert_eq!(q.resource_type, ResourceType::GpuCore);
        assert!(q.validate().is_ok());
        assert_eq!(q.aligned().step, TimeDelta::seconds(120));
    }

    #[test]
    fn test_window_must_be_a_duration() {
        let q = WorkloadsTopQuery {
            request_type: RequestType::Core,
            range: "1h]) or vector(1".into(),
            step: 0,
            limit: 3,
        };
        assert!(q.validate().is_err());
    }

    #[test]
    fn test_top_k_default() {
        assert_eq!(top_k_limit(0), 5);
        assert_eq!(top_k_limit(8), 8);
    }
}
