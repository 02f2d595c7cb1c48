use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::api::util::json::{to_empty, to_json, validated};
use crate::app_state::AppState;
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::resource::dto::resource_request::NameFilter;
use crate::domain::resource::dto::volume_view::{PersistentVolumeClaimView, StorageClassView};
use crate::domain::storage::dto::storage_request::{CreateStorageRequest, StorageFilter, StorageView};
use crate::errors::AppError;

pub struct StorageController;

impl StorageController {
    pub async fn list_storages(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(filter): Query<StorageFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<PersistentVolumeClaimView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(state.storage_service.list_storages(&cluster, &filter, &opts).await)
    }

    /// The path namespace wins when the body leaves it empty.
    pub async fn create_storage(
        State(state): State<AppState>,
        Path((cluster, namespace)): Path<(String, String)>,
        Json(payload): Json<CreateStorageRequest>,
    ) -> Result<Json<StorageView>, AppError> {
        let mut payload = validated(payload)?;
        if payload.namespace.is_empty() {
            payload.namespace = namespace;
        }
        to_json(state.storage_service.create_storage(&cluster, &payload).await)
    }

    pub async fn delete_storage(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<Value>, AppError> {
        to_empty(state.storage_service.delete_storage(&cluster, &namespace, &name).await)
    }

    pub async fn list_storage_classes(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(filter): Query<NameFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<StorageClassView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(state.storage_service.list_storage_classes(&cluster, &filter, &opts).await)
    }
}
