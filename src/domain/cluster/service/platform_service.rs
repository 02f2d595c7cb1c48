use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use kube::ResourceExt;

use crate::core::client::clusters::fetch_clusters;
use crate::core::client::prometheus_client::{MetricsError, Sample};
use crate::core::crd::cluster::Cluster;
use crate::core::util::fanout::try_fan_out;
use crate::domain::cluster::dto::cluster_request::{GpuTopQuery, PlatformSummaryQuery, RankOption};
use crate::domain::cluster::dto::cluster_view::{AcceleratorCardSummary, GpuSummary, GpuTop, PlatformSummary};
use crate::domain::context::ServiceContext;
use crate::domain::monitoring::metrics::MetricsQuerier;
use crate::domain::monitoring::query::{GpuQueryType, MetricQuery};

pub const DEFAULT_IDLE_THRESHOLD: f64 = 5.0;
const UUID_LABEL: &str = "UUID";
const MODEL_LABEL: &str = "modelName";

type ByUuid = HashMap<String, Sample>;

fn card_query(cluster: &str, query: GpuQueryType) -> MetricQuery {
    MetricQuery::gpu_filtered(cluster, "", "", "", "", query)
}

// ==================== Platform summary ====================

/// One cluster's card series keyed by UUID.
struct SummarySeries {
    core_used: Vec<Sample>,
    mem_used: ByUuid,
    mem_allocated: ByUuid,
    core_allocated: ByUuid,
    mem_total: ByUuid,
}

async fn summary_series(metrics: &MetricsQuerier, cluster: &str) -> Result<SummarySeries, MetricsError> {
    let q = |t| card_query(cluster, t);
    let (core_used_q, mem_used_q, mem_allocated_q, core_allocated_q, mem_total_q) = (
        q(GpuQueryType::CoreUsed),
        q(GpuQueryType::MemUsed),
        q(GpuQueryType::MemAllocated),
        q(GpuQueryType::CoreAllocated),
        q(GpuQueryType::MemTotal),
    );
    let (core_used, mem_used, mem_allocated, core_allocated, mem_total) = tokio::try_join!(
        metrics.vector(&core_used_q),
        metrics.map_by(&mem_used_q, UUID_LABEL),
        metrics.map_by(&mem_allocated_q, UUID_LABEL),
        metrics.map_by(&core_allocated_q, UUID_LABEL),
        metrics.map_by(&mem_total_q, UUID_LABEL),
    )?;
    Ok(SummarySeries {
        core_used,
        mem_used,
        mem_allocated,
        core_allocated,
        mem_total,
    })
}

/// Counts across every cluster, plus per-model card usage across the running ones.
pub async fn get_platform_summary(ctx: &ServiceContext, query: &PlatformSummaryQuery) -> Result<PlatformSummary> {
    let local = ctx.local_client().await?;
    let clusters = fetch_clusters(&local).await?;

    let mut summary = PlatformSummary::default();
    count_clusters(&mut summary, &clusters);

    let threshold = if query.threshold <= 0.0 {
        DEFAULT_IDLE_THRESHOLD
    } else {
        query.threshold
    };

    let running: Vec<String> = clusters.iter().filter(|c| c.is_ready()).map(|c| c.name_any()).collect();
    let metrics = &ctx.metrics;
    let series = try_fan_out(
        ctx.settings.fanout_limit,
        running.iter().map(|name| summary_series(metrics, name)),
    )
    .await?;

    let mut models = BTreeMap::new();
    for s in &series {
        summary.accelerator_card_num += s.core_used.len() as i32;
        tally_cards(&mut models, s, threshold);
    }
    summary.accelerator_card_summary = sort_card_summaries(models.into_values().collect());
    Ok(summary)
}

pub fn count_clusters(summary: &mut PlatformSummary, clusters: &[Cluster]) {
    for cluster in clusters {
        summary.cluster_num += 1;
        let Some(status) = cluster.status.as_ref() else {
            continue;
        };
        if let Some(nodes) = &status.node_summary {
            summary.node_num += nodes.total_num;
        }
        if let Some(flows) = &status.kantaloupeflow_summary {
            summary.kantaloupeflow_num += flows.total_num;
        }
    }
}

/// A card is in use when it has core or memory allocated; an in-use card whose core
/// and memory usage both stay under `threshold` percent is idle.
fn tally_cards(models: &mut BTreeMap<String, AcceleratorCardSummary>, s: &SummarySeries, threshold: f64) {
    for sample in &s.core_used {
        let model = sample.label(MODEL_LABEL).to_string();
        let uuid = sample.label(UUID_LABEL);
        let entry = models.entry(model.clone()).or_insert_with(|| AcceleratorCardSummary {
            model,
            ..Default::default()
        });
        entry.total_num += 1;

        let mem_usage = match (s.mem_used.get(uuid), s.mem_total.get(uuid)) {
            (Some(used), Some(total)) if total.value != 0.0 => used.value / total.value * 100.0,
            _ => 0.0,
        };
        if let (Some(mem), Some(core)) = (s.mem_allocated.get(uuid), s.core_allocated.get(uuid)) {
            if mem.value > 0.0 || core.value > 0.0 {
                entry.usage_num += 1;
                if sample.value < threshold && mem_usage < threshold {
                    entry.idle_num += 1;
                }
            }
        }
    }
}

/// Most idle cards first, then by model.
pub fn sort_card_summaries(mut summaries: Vec<AcceleratorCardSummary>) -> Vec<AcceleratorCardSummary> {
    summaries.sort_by(|a, b| b.idle_num.cmp(&a.idle_num).then_with(|| a.model.cmp(&b.model)));
    summaries
}

// ==================== GPU top ====================

struct TopSeries {
    mem_used: Vec<Sample>,
    mem_allocated: ByUuid,
    core_used: ByUuid,
    core_allocated: ByUuid,
    mem_total: ByUuid,
    core_total: ByUuid,
}

async fn top_series(metrics: &MetricsQuerier, cluster: &str) -> Result<TopSeries, MetricsError> {
    let q = |t| card_query(cluster, t);
    let queries = [
        q(GpuQueryType::MemUsed),
        q(GpuQueryType::MemAllocated),
        q(GpuQueryType::CoreUsed),
        q(GpuQueryType::CoreAllocated),
        q(GpuQueryType::MemTotal),
        q(GpuQueryType::CoreTotal),
    ];
    let (mem_used, mem_allocated, core_used, core_allocated, mem_total, core_total) = tokio::try_join!(
        metrics.vector(&queries[0]),
        metrics.map_by(&queries[1], UUID_LABEL),
        metrics.map_by(&queries[2], UUID_LABEL),
        metrics.map_by(&queries[3], UUID_LABEL),
        metrics.map_by(&queries[4], UUID_LABEL),
        metrics.map_by(&queries[5], UUID_LABEL),
    )?;
    Ok(TopSeries {
        mem_used,
        mem_allocated,
        core_used,
        core_allocated,
        mem_total,
        core_total,
    })
}

/// Per-model average usage and allocation of the cards in running clusters.
pub async fn get_gpu_top(ctx: &ServiceContext, query: &GpuTopQuery) -> Result<GpuTop> {
    let local = ctx.local_client().await?;
    let clusters = fetch_clusters(&local).await?;
    let running: Vec<String> = clusters.iter().filter(|c| c.is_ready()).map(|c| c.name_any()).collect();

    let metrics = &ctx.metrics;
    let series = try_fan_out(
        ctx.settings.fanout_limit,
        running.iter().map(|name| top_series(metrics, name)),
    )
    .await?;

    let mut sums = BTreeMap::new();
    for s in &series {
        accumulate(&mut sums, s);
    }
    let gpus = rank(average(sums), query.rank_option, query.topn);
    Ok(GpuTop { gpus })
}

fn accumulate(sums: &mut BTreeMap<String, GpuSummary>, s: &TopSeries) {
    for sample in &s.mem_used {
        let uuid = sample.label(UUID_LABEL);
        let mem_total = s.mem_total.get(uuid).map(|t| t.value).unwrap_or(0.0);
        let core_total = s.core_total.get(uuid).map(|t| t.value).unwrap_or(0.0);
        if mem_total == 0.0 || core_total == 0.0 {
            continue;
        }
        let value = |m: &ByUuid| m.get(uuid).map(|x| x.value).unwrap_or(0.0);

        let model = sample.label(MODEL_LABEL).to_string();
        let entry = sums.entry(model.clone()).or_insert_with(|| GpuSummary {
            model,
            ..Default::default()
        });
        entry.total += 1;
        entry.mem_usage += sample.value / mem_total * 100.0;
        entry.mem_allocated += value(&s.mem_allocated) / mem_total * 100.0;
        entry.core_usage += value(&s.core_used) / core_total * 100.0;
        entry.core_allocated += value(&s.core_allocated) / core_total * 100.0;
    }
}

fn average(sums: BTreeMap<String, GpuSummary>) -> Vec<GpuSummary> {
    sums.into_values()
        .map(|mut g| {
            let n = f64::from(g.total);
            g.mem_usage /= n;
            g.mem_allocated /= n;
            g.core_usage /= n;
            g.core_allocated /= n;
            g
        })
        .collect()
}

pub fn rank(mut gpus: Vec<GpuSummary>, option: RankOption, topn: i32) -> Vec<GpuSummary> {
    let desc = |a: f64, b: f64| b.partial_cmp(&a).unwrap_or(Ordering::Equal);
    match option {
        RankOption::Unspecified => gpus.sort_by(|a, b| b.total.cmp(&a.total)),
        RankOption::Core => gpus.sort_by(|a, b| desc(a.core_usage, b.core_usage)),
        RankOption::Memory => gpus.sort_by(|a, b| desc(a.mem_usage, b.mem_usage)),
    }
    if topn > 0 && (topn as usize) < gpus.len() {
        gpus.truncate(topn as usize);
    }
    gpus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crd::cluster::{ClusterSpec, ClusterStatus, ResourceSummary};
    use crate::domain::monitoring::metrics::testing::{sample, FakeProm};
    use std::sync::Arc;

    fn card(uuid: &str, model: &str, value: f64) -> Sample {
        sample(&[("UUID", uuid), ("modelName", model)], value)
    }

    fn by_uuid(samples: Vec<Sample>) -> ByUuid {
        samples.into_iter().map(|s| (s.label(UUID_LABEL).to_string(), s)).collect()
    }

    #[test]
    fn test_count_clusters_skips_missing_summaries() {
        let mut a = Cluster::new("a", ClusterSpec::default());
        a.status = Some(ClusterStatus {
            node_summary: Some(ResourceSummary { total_num: 3, ready_num: 2 }),
            kantaloupeflow_summary: Some(ResourceSummary { total_num: 4, ready_num: 4 }),
            ..Default::default()
        });
        let b = Cluster::new("b", ClusterSpec::default());

        let mut summary = PlatformSummary::default();
        count_clusters(&mut summary, &[a, b]);
        assert_eq!(summary.cluster_num, 2);
        assert_eq!(summary.node_num, 3);
        assert_eq!(summary.kantaloupeflow_num, 4);
    }

    #[test]
    fn test_tally_usage_and_idle() {
        let series = SummarySeries {
            core_used: vec![card("g1", "A100", 1.0), card("g2", "A100", 80.0), card("g3", "T4", 0.0)],
            mem_used: by_uuid(vec![card("g1", "A100", 1.0), card("g2", "A100", 50.0)]),
            mem_allocated: by_uuid(vec![card("g1", "A100", 10.0), card("g2", "A100", 10.0), card("g3", "T4", 0.0)]),
            core_allocated: by_uuid(vec![card("g1", "A100", 0.0), card("g2", "A100", 30.0), card("g3", "T4", 0.0)]),
            mem_total: by_uuid(vec![card("g1", "A100", 100.0), card("g2", "A100", 100.0)]),
        };
        let mut models = BTreeMap::new();
        tally_cards(&mut models, &series, DEFAULT_IDLE_THRESHOLD);

        let a100 = &models["A100"];
        assert_eq!((a100.total_num, a100.usage_num, a100.idle_num), (2, 2, 1));
        // allocated nothing, so neither used nor idle
        let t4 = &models["T4"];
        assert_eq!((t4.total_num, t4.usage_num, t4.idle_num), (1, 0, 0));
    }

    #[test]
    fn test_card_summaries_sorted_by_idle_then_model() {
        let s = |model: &str, idle| AcceleratorCardSummary {
            model: model.into(),
            idle_num: idle,
            ..Default::default()
        };
        let sorted = sort_card_summaries(vec![s("T4", 1), s("A100", 1), s("H100", 3)]);
        let models: Vec<_> = sorted.iter().map(|s| s.model.as_str()).collect();
        assert_eq!(models, vec!["H100", "A100", "T4"]);
    }

    #[test]
    fn test_accumulate_averages_per_model_and_skips_zero_totals() {
        let series = TopSeries {
            mem_used: vec![card("g1", "A100", 20.0), card("g2", "A100", 60.0), card("g3", "A100", 5.0)],
            mem_allocated: by_uuid(vec![card("g1", "A100", 50.0)]),
            core_used: by_uuid(vec![card("g1", "A100", 10.0), card("g2", "A100", 30.0)]),
            core_allocated: by_uuid(vec![]),
            mem_total: by_uuid(vec![card("g1", "A100", 100.0), card("g2", "A100", 100.0), card("g3", "A100", 0.0)]),
            core_total: by_uuid(vec![card("g1", "A100", 100.0), card("g2", "A100", 100.0), card("g3", "A100", 100.0)]),
        };
        let mut sums = BTreeMap::new();
        accumulate(&mut sums, &series);
        let gpus = average(sums);

        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0].total, 2);
        assert_eq!(gpus[0].mem_usage, 40.0);
        assert_eq!(gpus[0].core_usage, 20.0);
        assert_eq!(gpus[0].mem_allocated, 25.0);
        assert_eq!(gpus[0].core_allocated, 0.0);
    }

    #[test]
    fn test_rank_and_truncate() {
        let g = |model: &str, total, core| GpuSummary {
            model: model.into(),
            total,
            core_usage: core,
            ..Default::default()
        };
        let gpus = vec![g("A", 1, 90.0), g("B", 5, 10.0), g("C", 3, 50.0)];

        let by_total = rank(gpus.clone(), RankOption::Unspecified, 0);
        assert_eq!(by_total[0].model, "B");

        let by_core = rank(gpus.clone(), RankOption::Core, 2);
        let models: Vec<_> = by_core.iter().map(|g| g.model.as_str()).collect();
        assert_eq!(models, vec!["A", "C"]);

        assert_eq!(rank(gpus, RankOption::Memory, 10).len(), 3);
    }

    #[tokio::test]
    async fn test_summary_series_reads_card_queries() {
        let fake = FakeProm::default()
            .with_vector(r#"kantaloupe_gpu_core_used{cluster="a"}"#, vec![card("g1", "A100", 3.0)])
            .with_vector(r#"kantaloupe_gpu_mem_total{cluster="a"}"#, vec![card("g1", "A100", 80.0)]);
        let metrics = MetricsQuerier::new(Arc::new(fake));

        let series = summary_series(&metrics, "a").await.unwrap();
        assert_eq!(series.core_used.len(), 1);
        assert_eq!(series.mem_total["g1"].value, 80.0);
        assert!(series.mem_used.is_empty());
    }
}
