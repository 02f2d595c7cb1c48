use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::api::util::json::{to_empty, to_json, validated};
use crate::app_state::AppState;
use crate::domain::cluster::dto::cluster_request::{
    ClusterFilter, GpuTopQuery, IntegrateClusterRequest, PlatformSummaryQuery, UpdateClusterRequest,
    ValidateKubeconfigRequest, ValidatePrometheusRequest,
};
use crate::domain::cluster::dto::cluster_view::{
    CardRequestTypes, ClusterPlugins, ClusterVersions, ClusterView, GpuTop, PlatformSummary, Validation,
};
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::errors::AppError;

pub struct ClusterController;
pub struct PlatformController;

impl ClusterController {
    pub async fn list_clusters(
        State(state): State<AppState>,
        Query(filter): Query<ClusterFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<ClusterView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(state.cluster_service.list_clusters(&filter, &opts).await)
    }

    pub async fn get_cluster(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
    ) -> Result<Json<ClusterView>, AppError> {
        to_json(state.cluster_service.get_cluster(&cluster).await)
    }

    pub async fn integrate_cluster(
        State(state): State<AppState>,
        Json(payload): Json<IntegrateClusterRequest>,
    ) -> Result<Json<ClusterView>, AppError> {
        let payload = validated(payload)?;
        to_json(state.cluster_service.integrate_cluster(payload).await)
    }

    pub async fn update_cluster(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Json(payload): Json<UpdateClusterRequest>,
    ) -> Result<Json<Value>, AppError> {
        let payload = validated(payload)?;
        to_empty(state.cluster_service.update_cluster(&cluster, payload).await)
    }

    pub async fn delete_cluster(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
    ) -> Result<Json<Value>, AppError> {
        to_empty(state.cluster_service.delete_cluster(&cluster).await)
    }

    pub async fn list_cluster_versions(State(state): State<AppState>) -> Result<Json<ClusterVersions>, AppError> {
        to_json(state.cluster_service.list_cluster_versions().await)
    }

    pub async fn validate_kubeconfig(
        State(state): State<AppState>,
        Json(payload): Json<ValidateKubeconfigRequest>,
    ) -> Result<Json<Validation>, AppError> {
        let payload = validated(payload)?;
        to_json(state.cluster_service.validate_kubeconfig(&payload.kubeconfig).await)
    }

    pub async fn validate_prometheus_address(
        State(state): State<AppState>,
        Json(payload): Json<ValidatePrometheusRequest>,
    ) -> Result<Json<Validation>, AppError> {
        let payload = validated(payload)?;
        to_json(
            state
                .cluster_service
                .validate_prometheus_address(&payload.prometheus_address)
                .await,
        )
    }

    pub async fn get_cluster_plugins(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
    ) -> Result<Json<ClusterPlugins>, AppError> {
        to_json(state.cluster_service.get_cluster_plugins(&cluster).await)
    }

    pub async fn get_cluster_card_request_types(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
    ) -> Result<Json<CardRequestTypes>, AppError> {
        to_json(state.cluster_service.get_cluster_card_request_types(&cluster).await)
    }
}

impl PlatformController {
    pub async fn get_platform_summary(
        State(state): State<AppState>,
        Query(query): Query<PlatformSummaryQuery>,
    ) -> Result<Json<PlatformSummary>, AppError> {
        let query = validated(query)?;
        to_json(state.cluster_service.get_platform_summary(&query).await)
    }

    pub async fn get_gpu_top(
        State(state): State<AppState>,
        Query(query): Query<GpuTopQuery>,
    ) -> Result<Json<GpuTop>, AppError> {
        let query = validated(query)?;
        to_json(state.cluster_service.get_gpu_top(&query).await)
    }
}
