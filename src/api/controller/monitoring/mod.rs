use axum::extract::{Path, Query, State};
use axum::Json;

use crate::api::util::json::{to_json, validated};
use crate::app_state::AppState;
use crate::domain::monitoring::dto::monitoring_request::{
    CardTopWorkloadsQuery, LimitQuery, TopNodesQuery, TrendQuery, WorkloadsTopQuery,
};
use crate::domain::monitoring::series::ResourceTrend;
use crate::domain::monitoring::service::monitoring_service::{
    CardTopWorkloads, Distribution, MemoryDistribution, TrendScope, WorkloadsTop,
};
use crate::errors::AppError;

pub struct MonitoringController;

impl MonitoringController {
    // ==================== Trends ====================

    pub async fn get_platform_trend(
        State(state): State<AppState>,
        Query(query): Query<TrendQuery>,
    ) -> Result<Json<ResourceTrend>, AppError> {
        let query = validated(query)?;
        to_json(state.monitoring_service.get_resource_trend(TrendScope::Platform, query).await)
    }

    pub async fn get_cluster_trend(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(query): Query<TrendQuery>,
    ) -> Result<Json<ResourceTrend>, AppError> {
        let query = validated(query)?;
        to_json(
            state
                .monitoring_service
                .get_resource_trend(TrendScope::Cluster { cluster }, query)
                .await,
        )
    }

    pub async fn get_node_trend(
        State(state): State<AppState>,
        Path((cluster, node)): Path<(String, String)>,
        Query(query): Query<TrendQuery>,
    ) -> Result<Json<ResourceTrend>, AppError> {
        let query = validated(query)?;
        to_json(
            state
                .monitoring_service
                .get_resource_trend(TrendScope::Node { cluster, node }, query)
                .await,
        )
    }

    pub async fn get_gpu_trend(
        State(state): State<AppState>,
        Path((cluster, _node, uuid)): Path<(String, String, String)>,
        Query(query): Query<TrendQuery>,
    ) -> Result<Json<ResourceTrend>, AppError> {
        let query = validated(query)?;
        to_json(state.monitoring_service.get_gpu_trend(&cluster, &uuid, query).await)
    }

    pub async fn get_kantaloupeflow_trend(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
        Query(query): Query<TrendQuery>,
    ) -> Result<Json<ResourceTrend>, AppError> {
        let query = validated(query)?;
        to_json(
            state
                .monitoring_service
                .get_kantaloupeflow_trend(&cluster, &namespace, &name, query)
                .await,
        )
    }

    // ==================== Distributions ====================

    pub async fn get_node_workload_distribution(
        State(state): State<AppState>,
        Path((cluster, node)): Path<(String, String)>,
    ) -> Result<Json<Distribution>, AppError> {
        to_json(state.monitoring_service.get_node_workload_distribution(&cluster, &node).await)
    }

    pub async fn get_cluster_workload_distribution(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
    ) -> Result<Json<Distribution>, AppError> {
        to_json(state.monitoring_service.get_cluster_workload_distribution(&cluster).await)
    }

    pub async fn get_kantaloupeflow_memory_distribution(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<MemoryDistribution>, AppError> {
        to_json(
            state
                .monitoring_service
                .get_kantaloupeflow_memory_distribution(&cluster, &namespace, &name)
                .await,
        )
    }

    // ==================== Rankings ====================

    pub async fn get_top_nodes(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(query): Query<TopNodesQuery>,
    ) -> Result<Json<Distribution>, AppError> {
        let query = validated(query)?;
        to_json(state.monitoring_service.get_top_nodes(&cluster, query).await)
    }

    pub async fn get_top_node_workloads(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(query): Query<LimitQuery>,
    ) -> Result<Json<Distribution>, AppError> {
        let query = validated(query)?;
        to_json(state.monitoring_service.get_top_node_workloads(&cluster, query).await)
    }

    pub async fn get_card_top_workloads(
        State(state): State<AppState>,
        Path((cluster, _node, uuid)): Path<(String, String, String)>,
        Query(query): Query<CardTopWorkloadsQuery>,
    ) -> Result<Json<CardTopWorkloads>, AppError> {
        let query = validated(query)?;
        to_json(state.monitoring_service.get_card_top_workloads(&cluster, &uuid, query).await)
    }

    pub async fn get_cluster_workloads_top(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(query): Query<WorkloadsTopQuery>,
    ) -> Result<Json<WorkloadsTop>, AppError> {
        let query = validated(query)?;
        to_json(state.monitoring_service.get_cluster_workloads_top(&cluster, query).await)
    }
}
