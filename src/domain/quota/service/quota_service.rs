//! GPU resource quotas, with usage read from the quota exporter.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use k8s_openapi::api::core::v1::ResourceQuotaSpec;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::core::client::kantaloupeflows::fetch_kantaloupeflows;
use crate::core::client::kube_resources::{ObjectMeta, ResourceQuota};
use crate::core::client::other_resources::{
    create_namespaced, delete_namespaced, fetch_namespaced, fetch_namespaced_by_name, replace_namespaced,
};
use crate::core::util::constants::{LOCAL_CLUSTER, MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE, SELECT_ALL};
use crate::core::util::filter::filter_by_fuzzy_name;
use crate::core::util::quantity::parse_quantity;
use crate::core::util::sort::snake_to_camel;
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::context::ServiceContext;
use crate::domain::monitoring::metrics::{best_effort, MetricsQuerier};
use crate::domain::quota::dto::quota_dto::{QuotaFilter, QuotaRequest, QuotaView};
use crate::errors::{invalid_argument, is_not_found, AppError};

/// A quota is a GPU quota when it caps any of these.
const GPU_QUOTA_KEYS: [&str; 4] = [
    "requests.nvidia.com/gpucores",
    "requests.nvidia.com/gpumem",
    "limits.nvidia.com/gpucores",
    "limits.nvidia.com/gpumem",
];

fn target_cluster(cluster: &str) -> &str {
    if cluster.is_empty() {
        LOCAL_CLUSTER
    } else {
        cluster
    }
}

fn target_namespace<'a>(ctx: &'a ServiceContext, namespace: &'a str) -> &'a str {
    if namespace.is_empty() {
        &ctx.settings.namespace
    } else {
        namespace
    }
}

pub fn is_gpu_quota(quota: &ResourceQuota) -> bool {
    quota
        .spec
        .as_ref()
        .and_then(|s| s.hard.as_ref())
        .is_some_and(|hard| GPU_QUOTA_KEYS.iter().any(|k| hard.contains_key(*k)))
}

fn managed_selector() -> String {
    format!("{}={}", MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE)
}

fn parse_hard(hard: &BTreeMap<String, String>) -> Result<BTreeMap<String, Quantity>> {
    hard.iter()
        .map(|(k, v)| {
            parse_quantity(v)
                .map(|_| (k.clone(), Quantity(v.clone())))
                .map_err(|e| invalid_argument(format!("invalid quantity for {}: {}", k, e)))
        })
        .collect()
}

fn validate(req: &QuotaRequest) -> Result<()> {
    if req.name.is_empty() {
        return Err(invalid_argument("quota name cannot be empty"));
    }
    if req.hard.is_empty() {
        return Err(invalid_argument("quota hard limits cannot be empty"));
    }
    Ok(())
}

// ==================== Usage ====================

pub fn quota_used_query(cluster: &str, namespace: &str) -> String {
    format!(r#"QuotaUsed{{cluster="{}", quotanamespace="{}"}}"#, cluster, namespace)
}

/// Overlay exporter usage onto `status.used` as `requests.<quotaName>`.
pub async fn patch_gpu_usage(metrics: &MetricsQuerier, cluster: &str, quota: &mut ResourceQuota) -> Result<()> {
    let query = quota_used_query(cluster, &quota.namespace().unwrap_or_default());
    let vector = best_effort("quota usage", metrics.query_vector(&query).await)?;

    let status = quota.status.get_or_insert_with(Default::default);
    let used = status.used.get_or_insert_with(BTreeMap::new);
    for sample in &vector {
        let name = sample.label("quotaName");
        if name.is_empty() {
            continue;
        }
        used.insert(format!("requests.{}", name), Quantity(format!("{}", sample.value)));
    }
    Ok(())
}

// ==================== Operations ====================

/// Every quota in `namespace` with exporter usage overlaid.
pub async fn fetch_quotas(ctx: &ServiceContext, cluster: &str, namespace: &str) -> Result<Vec<ResourceQuota>> {
    let cluster = target_cluster(cluster);
    let client = ctx.cluster_client(cluster).await?;
    let mut quotas: Vec<ResourceQuota> = fetch_namespaced(&client, namespace, None).await?;
    for quota in quotas.iter_mut() {
        patch_gpu_usage(&ctx.metrics, cluster, quota).await?;
    }
    Ok(quotas)
}

pub async fn list_quotas(ctx: &ServiceContext, cluster: &str, filter: &QuotaFilter, opts: &ListOptions) -> Result<ListResponse<QuotaView>> {
    let quotas = fetch_quotas(ctx, cluster, &filter.namespace).await?;
    let client = ctx.cluster_client(target_cluster(cluster)).await?;

    let views: Vec<QuotaView> = quotas.iter().filter(|q| is_gpu_quota(q)).map(QuotaView::from).collect();
    let filtered = filter_by_fuzzy_name(views, &filter.name);
    let mut page = opts.apply(filtered, &snake_to_camel)?;

    let flows = fetch_kantaloupeflows(&client, SELECT_ALL).await?;
    let mut by_namespace: HashMap<String, Vec<String>> = HashMap::new();
    for flow in &flows {
        by_namespace
            .entry(flow.namespace().unwrap_or_default())
            .or_default()
            .push(flow.name_any());
    }
    for item in page.items.iter_mut() {
        item.workload = by_namespace.get(&item.namespace).cloned().unwrap_or_default();
    }
    Ok(page)
}

pub async fn get_quota(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<QuotaView> {
    let cluster = target_cluster(cluster);
    let client = ctx.cluster_client(cluster).await?;
    let mut quota: ResourceQuota = fetch_namespaced_by_name(&client, namespace, name).await?;
    patch_gpu_usage(&ctx.metrics, cluster, &mut quota).await?;
    Ok(QuotaView::from(&quota))
}

/// One managed quota per namespace.
pub async fn create_quota(ctx: &ServiceContext, cluster: &str, req: &QuotaRequest) -> Result<QuotaView> {
    validate(req)?;
    let client = ctx.cluster_client(target_cluster(cluster)).await?;

    let selector = managed_selector();
    let managed: Vec<ResourceQuota> = fetch_namespaced(&client, "", Some(&selector)).await?;
    if managed.iter().any(|q| q.namespace().as_deref() == Some(req.namespace.as_str())) {
        return Err(AppError::Conflict("the namespace already exists".to_string()).into());
    }

    let namespace = target_namespace(ctx, &req.namespace);
    let quota = ResourceQuota {
        metadata: ObjectMeta {
            name: Some(req.name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL_KEY.to_string(),
                MANAGED_BY_LABEL_VALUE.to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(ResourceQuotaSpec {
            hard: Some(parse_hard(&req.hard)?),
            ..Default::default()
        }),
        ..Default::default()
    };
    let created = create_namespaced(&client, namespace, &quota).await?;
    info!("Created resource quota {}/{}", namespace, req.name);
    Ok(QuotaView::from(&created))
}

/// Replace the hard limits, keeping the existing labels and annotations.
pub async fn update_quota(ctx: &ServiceContext, cluster: &str, req: &QuotaRequest) -> Result<QuotaView> {
    validate(req)?;
    let client = ctx.cluster_client(target_cluster(cluster)).await?;
    let namespace = target_namespace(ctx, &req.namespace);

    let mut quota: ResourceQuota = fetch_namespaced_by_name(&client, namespace, &req.name).await?;
    quota
        .labels_mut()
        .insert(MANAGED_BY_LABEL_KEY.to_string(), MANAGED_BY_LABEL_VALUE.to_string());
    quota.spec = Some(ResourceQuotaSpec {
        hard: Some(parse_hard(&req.hard)?),
        ..quota.spec.unwrap_or_default()
    });
    quota.status = None;

    let updated = replace_namespaced(&client, namespace, &quota).await?;
    info!("Updated resource quota {}/{}", namespace, req.name);
    Ok(QuotaView::from(&updated))
}

/// Delete a managed quota. Missing or unmanaged quotas are left alone.
pub async fn delete_quota(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid_argument("quota name cannot be empty"));
    }
    let client = ctx.cluster_client(target_cluster(cluster)).await?;
    let namespace = target_namespace(ctx, namespace);

    let quota: ResourceQuota = match fetch_namespaced_by_name(&client, namespace, name).await {
        Ok(q) => q,
        Err(err) if is_not_found(&err) => {
            debug!("Resource quota {}/{} not found, skipping deletion", namespace, name);
            return Ok(());
        }
        Err(err) => return Err(err),
    };
    if quota.labels().get(MANAGED_BY_LABEL_KEY).map(String::as_str) != Some(MANAGED_BY_LABEL_VALUE) {
        debug!("Resource quota {}/{} is not managed, skipping deletion", namespace, name);
        return Ok(());
    }

    match delete_namespaced::<ResourceQuota>(&client, namespace, name).await {
        Err(err) if !is_not_found(&err) => Err(err),
        _ => {
            info!("Deleted resource quota {}/{}", namespace, name);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::monitoring::metrics::testing::{sample, FakeProm};
    use std::sync::Arc;

    fn quota(hard: &[&str]) -> ResourceQuota {
        let mut q = ResourceQuota::default();
        q.metadata.name = Some("q".into());
        q.metadata.namespace = Some("team-a".into());
        q.spec = Some(ResourceQuotaSpec {
            hard: Some(hard.iter().map(|k| (k.to_string(), Quantity("1".into()))).collect()),
            ..Default::default()
        });
        q
    }

    #[test]
    fn test_gpu_quota_detection() {
        assert!(is_gpu_quota(&quota(&["limits.nvidia.com/gpumem"])));
        assert!(is_gpu_quota(&quota(&["pods", "requests.nvidia.com/gpucores"])));
        assert!(!is_gpu_quota(&quota(&["pods", "requests.cpu"])));
        assert!(!is_gpu_quota(&ResourceQuota::default()));
    }

    #[test]
    fn test_hard_limits_validated() {
        let ok = BTreeMap::from([("requests.nvidia.com/gpumem".to_string(), "40Gi".to_string())]);
        assert_eq!(parse_hard(&ok).unwrap()["requests.nvidia.com/gpumem"].0, "40Gi");
        let bad = BTreeMap::from([("pods".to_string(), "many".to_string())]);
        assert!(parse_hard(&bad).is_err());

        let empty = QuotaRequest {
            name: "gpu".into(),
            ..Default::default()
        };
        assert!(validate(&empty).is_err());
    }

    #[tokio::test]
    async fn test_usage_overlay() {
        let query = quota_used_query("member-1", "team-a");
        assert_eq!(query, r#"QuotaUsed{cluster="member-1", quotanamespace="team-a"}"#);
        let fake = FakeProm::default().with_vector(
            query,
            vec![
                sample(&[("quotaName", "nvidia.com/gpumem")], 2048.0),
                sample(&[("quotaName", "")], 1.0),
            ],
        );
        let metrics = MetricsQuerier::new(Arc::new(fake));

        let mut q = quota(&["requests.nvidia.com/gpumem"]);
        patch_gpu_usage(&metrics, "member-1", &mut q).await.unwrap();
        let used = q.status.unwrap().used.unwrap();
        assert_eq!(used.len(), 1);
        assert_eq!(used["requests.nvidia.com/gpumem"].0, "2048");
    }
}
