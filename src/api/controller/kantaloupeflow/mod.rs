use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::api::util::json::{to_empty, to_json, validated};
use crate::app_state::AppState;
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::kantaloupeflow::dto::kantaloupeflow_request::{KantaloupeflowFilter, UpdateGpuMemoryRequest};
use crate::domain::kantaloupeflow::dto::kantaloupeflow_view::{
    KantaloupeTree, KantaloupeflowConditions, KantaloupeflowDetail, KantaloupeflowView,
};
use crate::errors::AppError;

pub struct KantaloupeflowController;

impl KantaloupeflowController {
    pub async fn create_kantaloupeflow(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Json(payload): Json<KantaloupeflowView>,
    ) -> Result<Json<KantaloupeflowView>, AppError> {
        to_json(state.kantaloupeflow_service.create_kantaloupeflow(&cluster, &payload).await)
    }

    /// The namespace comes from the path; `?namespace=` is ignored here.
    pub async fn list_kantaloupeflows(
        State(state): State<AppState>,
        Path((cluster, namespace)): Path<(String, String)>,
        Query(filter): Query<KantaloupeflowFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<KantaloupeflowView>>, AppError> {
        let mut filter = validated(filter)?;
        let opts = validated(opts)?;
        filter.namespace = namespace;
        to_json(
            state
                .kantaloupeflow_service
                .list_kantaloupeflows(&cluster, &filter, &opts)
                .await,
        )
    }

    pub async fn get_kantaloupeflow(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<KantaloupeflowDetail>, AppError> {
        to_json(
            state
                .kantaloupeflow_service
                .get_kantaloupeflow(&cluster, &namespace, &name)
                .await,
        )
    }

    pub async fn delete_kantaloupeflow(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<Value>, AppError> {
        to_empty(
            state
                .kantaloupeflow_service
                .delete_kantaloupeflow(&cluster, &namespace, &name)
                .await,
        )
    }

    pub async fn get_kantaloupeflow_conditions(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<KantaloupeflowConditions>, AppError> {
        to_json(
            state
                .kantaloupeflow_service
                .get_kantaloupeflow_conditions(&cluster, &namespace, &name)
                .await,
        )
    }

    pub async fn update_gpu_memory(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
        Json(payload): Json<UpdateGpuMemoryRequest>,
    ) -> Result<Json<Value>, AppError> {
        let payload = validated(payload)?;
        to_empty(
            state
                .kantaloupeflow_service
                .update_kantaloupeflow_gpu_memory(&cluster, &namespace, &name, &payload)
                .await,
        )
    }

    pub async fn get_kantaloupe_tree(State(state): State<AppState>) -> Result<Json<KantaloupeTree>, AppError> {
        to_json(state.kantaloupeflow_service.get_kantaloupe_tree().await)
    }
}
