//! Accelerator cards are assembled from the per-card exporter series; the node objects
//! only contribute addresses and memory oversubscription.

use std::collections::{BTreeSet, HashMap};

use anyhow::{anyhow, Result};
use kube::ResourceExt;
use tracing::debug;

use crate::core::client::clusters::fetch_cluster_by_name;
use crate::core::client::kube_resources::Node;
use crate::core::client::nodes::{fetch_node_by_name, fetch_nodes};
use crate::core::client::prometheus_client::{MetricsError, Sample, Vector};
use crate::core::util::annotations::{memory_factor, NODE_NVIDIA_GPU_ANNOTATION};
use crate::core::util::constants::{METAX_WORKLOAD_LIMIT, SELECT_ALL};
use crate::core::util::filter::matches_fuzzy;
use crate::core::util::sort::snake_to_camel;
use crate::core::util::validation::require_dns1035;
use crate::domain::acceleratorcard::dto::acceleratorcard_request::AcceleratorCardFilter;
use crate::domain::acceleratorcard::dto::acceleratorcard_view::{AcceleratorCard, CardSamples, ModelNames};
use crate::domain::cluster::dto::cluster_request::{specified, ClusterType};
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::context::ServiceContext;
use crate::domain::monitoring::metrics::{best_effort, MetricsQuerier};
use crate::domain::monitoring::query::{GpuQueryType, MetricQuery};
use crate::domain::node::dto::node_view::node_addresses;
use crate::errors::AppError;

/// Labels that carry the card id, per vendor exporter.
const ID_LABELS: [&str; 4] = ["UUID", "deviceuuid", "uuid", "vdie_id"];

fn select(value: &str) -> &str {
    if value == SELECT_ALL {
        ""
    } else {
        value
    }
}

/// Samples whose id label equals `uuid`.
pub fn samples_for(uuid: &str, vector: &[Sample]) -> Vec<Sample> {
    vector
        .iter()
        .filter(|s| ID_LABELS.iter().any(|key| s.metric.get(*key).is_some_and(|v| v == uuid)))
        .cloned()
        .collect()
}

/// Every family except temperature. An unreachable endpoint leaves a family empty.
async fn card_families(
    metrics: &MetricsQuerier,
    query: impl Fn(GpuQueryType) -> MetricQuery,
) -> Result<CardSamples, MetricsError> {
    let fetch = |q: GpuQueryType| {
        let query = query(q);
        async move { best_effort(q.as_str(), metrics.vector(&query).await) }
    };
    let (power, errors, memory_allocatable, memory_used, memory_allocated, core_total, core_used, core_allocated) = tokio::try_join!(
        fetch(GpuQueryType::Power),
        fetch(GpuQueryType::Errors),
        fetch(GpuQueryType::MemTotal),
        fetch(GpuQueryType::MemUsed),
        fetch(GpuQueryType::MemAllocated),
        fetch(GpuQueryType::CoreTotal),
        fetch(GpuQueryType::CoreUsed),
        fetch(GpuQueryType::CoreAllocated),
    )?;
    Ok(CardSamples {
        temperature: Vec::new(),
        power,
        errors,
        memory_allocatable,
        memory_used,
        memory_allocated,
        core_total,
        core_used,
        core_allocated,
    })
}

/// One card per temperature sample carrying a `UUID`, in temperature order.
pub fn cards_from(temperature: &Vector, families: &CardSamples) -> Vec<AcceleratorCard> {
    temperature
        .iter()
        .filter_map(|t| t.metric.get("UUID"))
        .map(|uuid| {
            let per_card = CardSamples {
                temperature: samples_for(uuid, temperature),
                power: samples_for(uuid, &families.power),
                errors: samples_for(uuid, &families.errors),
                memory_allocatable: samples_for(uuid, &families.memory_allocatable),
                memory_used: samples_for(uuid, &families.memory_used),
                memory_allocated: samples_for(uuid, &families.memory_allocated),
                core_total: samples_for(uuid, &families.core_total),
                core_used: samples_for(uuid, &families.core_used),
                core_allocated: samples_for(uuid, &families.core_allocated),
            };
            AcceleratorCard::from(&per_card)
        })
        .collect()
}

pub fn filter_cards(cards: Vec<AcceleratorCard>, uuid: &str, state: &str) -> Vec<AcceleratorCard> {
    cards
        .into_iter()
        .filter(|c| matches_fuzzy(&c.uuid, uuid))
        .filter(|c| specified(state).map_or(true, |s| s == c.state.as_str()))
        .collect()
}

/// Node addresses and effective memory total from the card's node, when known.
pub fn attach_nodes(cards: &mut [AcceleratorCard], nodes: &[Node]) {
    let by_name: HashMap<String, &Node> = nodes.iter().map(|n| (n.name_any(), n)).collect();
    for card in cards {
        let Some(node) = by_name.get(&card.node) else {
            continue;
        };
        card.gpu_memory_total = (card.gpu_memory_allocatable as f64 / memory_factor(node.annotations())) as i64;
        card.node_addresses = node_addresses(node);
    }
}

/// How many workloads may share one card on `node`. METAX cards have a fixed limit;
/// otherwise the second field of the node's HAMi NVIDIA register label.
pub fn workload_limit(node: &Node, cluster_type: &str) -> Result<i32> {
    if ClusterType::parse(cluster_type) == Some(ClusterType::Metax) {
        return Ok(METAX_WORKLOAD_LIMIT);
    }
    let Some(raw) = node.labels().get(NODE_NVIDIA_GPU_ANNOTATION) else {
        return Ok(0);
    };
    match raw.split(',').nth(1) {
        Some(limit) => limit
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid workload limit {:?} on node {}: {}", limit, node.name_any(), e)),
        None => {
            debug!(annotation = %raw, "invalid node GPU annotation");
            Ok(0)
        }
    }
}

// ==================== Operations ====================

pub async fn list_accelerator_cards(
    ctx: &ServiceContext,
    cluster: &str,
    filter: &AcceleratorCardFilter,
    opts: &ListOptions,
) -> Result<ListResponse<AcceleratorCard>> {
    require_dns1035("cluster name", cluster)?;
    let metrics = &ctx.metrics;

    let temperature_query = MetricQuery::gpu_filtered(
        cluster,
        select(&filter.node),
        "",
        select(&filter.model),
        "",
        GpuQueryType::Temperature,
    );
    let (temperature, families) = tokio::join!(
        metrics.vector(&temperature_query),
        card_families(metrics, |q| MetricQuery::gpu_filtered(cluster, "", "", "", "", q)),
    );
    let (temperature, families) = (temperature?, families?);

    let mut cards = cards_from(&temperature, &families);
    let client = ctx.cluster_client(cluster).await?;
    attach_nodes(&mut cards, &fetch_nodes(&client).await?);

    let filtered = filter_cards(cards, &filter.uuid, &filter.state);
    Ok(opts.apply(filtered, &snake_to_camel)?)
}

pub async fn get_accelerator_card(ctx: &ServiceContext, cluster: &str, node: &str, uuid: &str) -> Result<AcceleratorCard> {
    require_dns1035("cluster name", cluster)?;
    let local = ctx.local_client().await?;
    let registered = fetch_cluster_by_name(&local, cluster).await?;

    let metrics = &ctx.metrics;
    let temperature_query = MetricQuery::gpu(cluster, uuid, GpuQueryType::Temperature);
    let (temperature, samples) = tokio::join!(
        metrics.vector(&temperature_query),
        card_families(metrics, |q| MetricQuery::gpu(cluster, uuid, q)),
    );
    let mut samples = samples?;
    samples.temperature = temperature?;
    if samples.temperature.is_empty() {
        return Err(AppError::NotFound(format!("accelerator card {} not found in cluster {}", uuid, cluster)).into());
    }

    let mut card = AcceleratorCard::from(&samples);
    card.provider = registered.spec.provider.clone();
    card.cluster_type = registered.spec.type_.clone();

    let client = ctx.cluster_client(cluster).await?;
    let node = fetch_node_by_name(&client, node).await?;
    card.workload_limit = workload_limit(&node, &registered.spec.type_)?;
    attach_nodes(std::slice::from_mut(&mut card), std::slice::from_ref(&node));
    Ok(card)
}

/// Distinct models reporting a temperature, sorted.
pub async fn list_model_names(ctx: &ServiceContext, cluster: &str) -> Result<ModelNames> {
    require_dns1035("cluster name", cluster)?;
    let query = MetricQuery::gpu_filtered(cluster, "", "", "", "", GpuQueryType::Temperature);
    let temperature = ctx.metrics.vector(&query).await?;
    Ok(ModelNames {
        model_names: model_names(&temperature),
    })
}

pub fn model_names(temperature: &[Sample]) -> Vec<String> {
    temperature
        .iter()
        .filter_map(|s| s.metric.get("modelName").cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::acceleratorcard::dto::acceleratorcard_view::AcceleratorCardState;
    use crate::domain::monitoring::metrics::testing::sample;
    use k8s_openapi::api::core::v1::{NodeAddress, NodeStatus};
    use std::collections::BTreeMap;

    fn temp(uuid: &str, model: &str, node: &str, value: f64) -> Sample {
        sample(&[("UUID", uuid), ("modelName", model), ("node", node)], value)
    }

    #[test]
    fn test_one_card_per_uuid_in_temperature_order() {
        let temperature = vec![temp("A", "H100", "n1", 55.0), temp("B", "H100", "n2", 60.0)];
        let families = CardSamples {
            memory_used: vec![sample(&[("UUID", "B")], 10.0), sample(&[("UUID", "A")], 20.0)],
            memory_allocatable: vec![sample(&[("deviceuuid", "A")], 100.0)],
            ..Default::default()
        };
        let cards = cards_from(&temperature, &families);
        let uuids: Vec<_> = cards.iter().map(|c| c.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["A", "B"]);
        assert_eq!(cards[0].gpu_memory_usage, 20);
        assert_eq!(cards[0].gpu_memory_allocatable, 100);
        assert_eq!(cards[1].gpu_memory_usage, 10);
    }

    #[test]
    fn test_filter_by_uuid_pattern_and_state() {
        let mut a = AcceleratorCard {
            uuid: "GPU-aaa".into(),
            state: AcceleratorCardState::Health,
            ..Default::default()
        };
        let b = AcceleratorCard {
            uuid: "GPU-bbb".into(),
            state: AcceleratorCardState::Error,
            ..Default::default()
        };
        assert_eq!(filter_cards(vec![a.clone(), b.clone()], "aaa", "").len(), 1);
        assert_eq!(filter_cards(vec![a.clone(), b.clone()], "", "ERROR")[0].uuid, "GPU-bbb");
        a.state = AcceleratorCardState::Error;
        assert_eq!(filter_cards(vec![a, b], "", "ACCELERATORCARD_STATE_UNSPECIFIED").len(), 2);
    }

    #[test]
    fn test_attach_nodes() {
        let mut node = Node::default();
        node.metadata.name = Some("n1".into());
        node.metadata.annotations = Some(BTreeMap::from([("NVIDIA_GPU_MEMORY_FACTOR".to_string(), "4".to_string())]));
        node.status = Some(NodeStatus {
            addresses: Some(vec![NodeAddress {
                type_: "InternalIP".into(),
                address: "10.1.1.1".into(),
            }]),
            ..Default::default()
        });
        let mut cards = vec![
            AcceleratorCard {
                node: "n1".into(),
                gpu_memory_allocatable: 400,
                ..Default::default()
            },
            AcceleratorCard {
                node: "gone".into(),
                gpu_memory_allocatable: 400,
                ..Default::default()
            },
        ];
        attach_nodes(&mut cards, &[node]);
        assert_eq!(cards[0].gpu_memory_total, 100);
        assert_eq!(cards[0].node_addresses.len(), 1);
        assert_eq!(cards[1].gpu_memory_total, 0);
    }

    #[test]
    fn test_workload_limit() {
        let mut node = Node::default();
        assert_eq!(workload_limit(&node, "METAX").unwrap(), 16);
        assert_eq!(workload_limit(&node, "NVIDIA").unwrap(), 0);

        node.metadata.labels = Some(BTreeMap::from([(NODE_NVIDIA_GPU_ANNOTATION.to_string(), "GPU-1,10,32768".to_string())]));
        assert_eq!(workload_limit(&node, "NVIDIA").unwrap(), 10);

        node.metadata.labels = Some(BTreeMap::from([(NODE_NVIDIA_GPU_ANNOTATION.to_string(), "GPU-1,x".to_string())]));
        assert!(workload_limit(&node, "NVIDIA").is_err());
    }

    #[test]
    fn test_model_names_distinct_sorted() {
        let temperature = vec![temp("A", "T4", "n1", 1.0), temp("B", "H100", "n1", 1.0), temp("C", "T4", "n1", 1.0)];
        assert_eq!(model_names(&temperature), vec!["H100", "T4"]);
    }
}
