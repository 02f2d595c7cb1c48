//! Bucketed and ranked views over instant vectors.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::core::client::prometheus_client::{Sample, Vector};
use crate::domain::monitoring::query::RequestType;

const BUCKET_WIDTH: i32 = 10;
const MAX_BUCKETS: usize = 5;
/// Upper bound of the last bucket once the busiest node exceeds 40 workloads.
const OPEN_BUCKET_END: i32 = 999;
const MEMORY_KINDS: [&str; 3] = ["context", "data", "module"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionPoint {
    pub name: String,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionPoint64 {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadInfo {
    pub name: String,
    pub core_allocated: f64,
    pub core_usage: f64,
    pub memory_allocated: f64,
    pub memory_usage: f64,
}

/// Workload count per device, ordered by device uuid.
pub fn node_distribution(per_device: HashMap<String, i32>) -> Vec<DistributionPoint> {
    let mut points: Vec<DistributionPoint> = per_device
        .into_iter()
        .map(|(name, value)| DistributionPoint { name, value })
        .collect();
    points.sort_by(|a, b| a.name.cmp(&b.name));
    points
}

/// How many nodes run 0-9, 10-19, .. workloads. Only non-empty buckets are returned.
pub fn cluster_distribution(per_node: &HashMap<String, i32>) -> Vec<DistributionPoint> {
    if per_node.is_empty() {
        return Vec::new();
    }
    let max = per_node.values().copied().max().unwrap_or(0);

    let mut buckets: Vec<(i32, i32, i32)> = Vec::with_capacity(MAX_BUCKETS);
    let mut start = 0;
    while start <= max {
        let end = start + BUCKET_WIDTH - 1;
        buckets.push((start, end, 0));
        start += BUCKET_WIDTH;
    }
    if max > 40 {
        if let Some(last) = buckets.get_mut(MAX_BUCKETS - 1) {
            last.1 = OPEN_BUCKET_END;
        }
    }

    for count in per_node.values() {
        if let Some(bucket) = buckets.iter_mut().find(|b| *count >= b.0 && *count <= b.1) {
            bucket.2 += 1;
        }
    }

    buckets
        .into_iter()
        .filter(|b| b.2 > 0)
        .map(|(start, end, count)| DistributionPoint {
            name: if start == end {
                start.to_string()
            } else {
                format!("{}-{}", start, end)
            },
            value: count,
        })
        .collect()
}

/// Sum the `context`, `data` and `module` byte labels across samples.
pub fn memory_distribution(vector: &[Sample]) -> Result<Vec<DistributionPoint64>> {
    MEMORY_KINDS
        .iter()
        .map(|kind| {
            let mut total = 0i64;
            for sample in vector {
                let raw = sample.label(kind);
                let value: i64 = raw
                    .parse()
                    .map_err(|e| anyhow!("invalid {} value {:?}: {}", kind, raw, e))?;
                total += value;
            }
            Ok(DistributionPoint64 {
                name: kind.to_string(),
                value: total,
            })
        })
        .collect()
}

/// Keep samples whose `label` names a known workload (`namespace/name`).
pub fn filter_workloads(known: &HashSet<String>, vector: Vector, label: &str) -> Vector {
    vector
        .into_iter()
        .filter(|s| known.contains(s.label(label)))
        .collect()
}

/// Sort descending and, when `n` leaves room, keep `n` entries after the first. The
/// first sample of a `sum by` ranking is the aggregate over every workload.
pub fn top_n_after_total(mut vector: Vector, n: usize) -> Vector {
    vector.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    if n > 0 && n + 1 < vector.len() {
        vector.drain(1..n + 1).collect()
    } else {
        vector
    }
}

/// Rank the workloads allocated on one card. Memory figures are percentages of the
/// card's memory; a card reporting no memory yields zeros.
pub fn rank_card_workloads(
    kind: RequestType,
    uuid: &str,
    allocated: &[Sample],
    used: &HashMap<String, Sample>,
    memory_total: f64,
    limit: usize,
) -> (Vec<WorkloadInfo>, usize) {
    let mut workloads: Vec<WorkloadInfo> = allocated
        .iter()
        .filter(|s| s.label("UUID") == uuid)
        .map(|s| {
            let name = s.label("deployment").to_string();
            let used = used.get(&name).map(|u| u.value).unwrap_or(0.0);
            match kind {
                RequestType::Core => WorkloadInfo {
                    name,
                    core_allocated: s.value,
                    core_usage: used,
                    ..Default::default()
                },
                RequestType::Memory if memory_total <= 0.0 => WorkloadInfo {
                    name,
                    ..Default::default()
                },
                RequestType::Memory => WorkloadInfo {
                    name,
                    memory_allocated: s.value / memory_total * 100.0,
                    memory_usage: used / memory_total * 100.0,
                    ..Default::default()
                },
            }
        })
        .collect();

    let key = |w: &WorkloadInfo| match kind {
        RequestType::Core => w.core_allocated,
        RequestType::Memory => w.memory_allocated,
    };
    workloads.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));

    let total = workloads.len();
    if limit > 0 && limit < workloads.len() {
        workloads.truncate(limit);
    }
    (workloads, total)
}
