use axum::extract::{Path, Query, State};
use axum::Json;

use crate::api::dto::NodeQuery;
use crate::api::util::json::{to_json, validated};
use crate::app_state::AppState;
use crate::domain::acceleratorcard::dto::acceleratorcard_request::AcceleratorCardFilter;
use crate::domain::acceleratorcard::dto::acceleratorcard_view::{AcceleratorCard, ModelNames};
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::node::dto::node_request::NodeFilter;
use crate::domain::node::dto::node_view::{ClusterGpuSummary, NodeView};
use crate::errors::AppError;

pub struct NodeController;
pub struct AcceleratorCardController;

impl NodeController {
    pub async fn list_nodes(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(filter): Query<NodeFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<NodeView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(state.node_service.list_nodes(&cluster, &filter, &opts).await)
    }

    pub async fn get_node(
        State(state): State<AppState>,
        Path((cluster, node)): Path<(String, String)>,
    ) -> Result<Json<NodeView>, AppError> {
        to_json(state.node_service.get_node(&cluster, &node).await)
    }

    pub async fn list_cluster_gpu_summary(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
    ) -> Result<Json<ClusterGpuSummary>, AppError> {
        to_json(state.node_service.list_cluster_gpu_summary(&cluster).await)
    }
}

impl AcceleratorCardController {
    pub async fn list_accelerator_cards(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(filter): Query<AcceleratorCardFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<AcceleratorCard>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(
            state
                .accelerator_card_service
                .list_accelerator_cards(&cluster, &filter, &opts)
                .await,
        )
    }

    pub async fn get_accelerator_card(
        State(state): State<AppState>,
        Path((cluster, uuid)): Path<(String, String)>,
        Query(query): Query<NodeQuery>,
    ) -> Result<Json<AcceleratorCard>, AppError> {
        to_json(
            state
                .accelerator_card_service
                .get_accelerator_card(&cluster, &query.node, &uuid)
                .await,
        )
    }

    pub async fn list_model_names(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
    ) -> Result<Json<ModelNames>, AppError> {
        to_json(state.accelerator_card_service.list_model_names(&cluster).await)
    }
}
