use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::api::util::json::{to_empty, to_json, validated};
use crate::app_state::AppState;
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::quota::dto::quota_dto::{QuotaFilter, QuotaRequest, QuotaView};
use crate::errors::AppError;

pub struct QuotaController;

impl QuotaController {
    pub async fn list_quotas(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(filter): Query<QuotaFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<QuotaView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(state.quota_service.list_quotas(&cluster, &filter, &opts).await)
    }

    pub async fn get_quota(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<QuotaView>, AppError> {
        to_json(state.quota_service.get_quota(&cluster, &namespace, &name).await)
    }

    pub async fn create_quota(
        State(state): State<AppState>,
        Path((cluster, namespace)): Path<(String, String)>,
        Json(payload): Json<QuotaRequest>,
    ) -> Result<Json<QuotaView>, AppError> {
        let mut payload = validated(payload)?;
        if payload.namespace.is_empty() {
            payload.namespace = namespace;
        }
        to_json(state.quota_service.create_quota(&cluster, &payload).await)
    }

    pub async fn update_quota(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
        Json(payload): Json<QuotaRequest>,
    ) -> Result<Json<QuotaView>, AppError> {
        let mut payload = validated(payload)?;
        if payload.namespace.is_empty() {
            payload.namespace = namespace;
        }
        if payload.name.is_empty() {
            payload.name = name;
        }
        to_json(state.quota_service.update_quota(&cluster, &payload).await)
    }

    pub async fn delete_quota(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<Value>, AppError> {
        to_empty(state.quota_service.delete_quota(&cluster, &namespace, &name).await)
    }
}
