//! Plain Kubernetes objects of a member cluster: config maps, secrets, volumes, namespaces and events.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::api::dto::NamespaceQuery;
use crate::api::util::json::{to_empty, to_json, validated};
use crate::app_state::AppState;
use crate::core::client::kube_resources::ConfigMap;
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::resource::dto::resource_request::{EventFilter, NameFilter, NamespaceFilter, SecretRequest};
use crate::domain::resource::dto::resource_view::{ConfigMapView, EventView, NamespaceView, SecretView};
use crate::domain::resource::dto::volume_view::{
    PersistentVolumeClaimView, PersistentVolumeView, StorageClassView,
};
use crate::errors::AppError;

pub struct ConfigMapController;
pub struct SecretController;
pub struct VolumeController;
pub struct NamespaceController;
pub struct EventController;

impl ConfigMapController {
    pub async fn list_configmaps(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(ns): Query<NamespaceQuery>,
        Query(filter): Query<NameFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<ConfigMapView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(
            state
                .resource_service
                .list_configmaps(&cluster, &ns.namespace, &filter, &opts)
                .await,
        )
    }

    pub async fn get_configmap(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<ConfigMapView>, AppError> {
        to_json(state.resource_service.get_configmap(&cluster, &namespace, &name).await)
    }

    /// The raw object, as stored.
    pub async fn get_configmap_json(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<ConfigMap>, AppError> {
        to_json(state.resource_service.get_configmap_json(&cluster, &namespace, &name).await)
    }

    pub async fn create_configmap(
        State(state): State<AppState>,
        Path((cluster, namespace)): Path<(String, String)>,
        Json(payload): Json<ConfigMap>,
    ) -> Result<Json<ConfigMapView>, AppError> {
        to_json(state.resource_service.create_configmap(&cluster, &namespace, payload).await)
    }

    pub async fn update_configmap(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
        Json(payload): Json<ConfigMap>,
    ) -> Result<Json<ConfigMap>, AppError> {
        to_json(
            state
                .resource_service
                .update_configmap(&cluster, &namespace, &name, payload)
                .await,
        )
    }

    pub async fn delete_configmap(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<Value>, AppError> {
        to_empty(state.resource_service.delete_configmap(&cluster, &namespace, &name).await)
    }
}

impl SecretController {
    pub async fn list_secrets(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(ns): Query<NamespaceQuery>,
        Query(filter): Query<NameFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<SecretView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(
            state
                .resource_service
                .list_secrets(&cluster, &ns.namespace, &filter, &opts)
                .await,
        )
    }

    pub async fn get_secret(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<SecretView>, AppError> {
        to_json(state.resource_service.get_secret(&cluster, &namespace, &name).await)
    }

    pub async fn create_secret(
        State(state): State<AppState>,
        Path((cluster, namespace)): Path<(String, String)>,
        Json(payload): Json<SecretRequest>,
    ) -> Result<Json<SecretView>, AppError> {
        let payload = validated(payload)?;
        to_json(state.resource_service.create_secret(&cluster, &namespace, &payload).await)
    }

    pub async fn update_secret(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
        Json(payload): Json<SecretRequest>,
    ) -> Result<Json<SecretView>, AppError> {
        let payload = validated(payload)?;
        to_json(
            state
                .resource_service
                .update_secret(&cluster, &namespace, &name, &payload)
                .await,
        )
    }

    pub async fn delete_secret(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<Value>, AppError> {
        to_empty(state.resource_service.delete_secret(&cluster, &namespace, &name).await)
    }
}

impl VolumeController {
    pub async fn list_persistent_volumes(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(filter): Query<NameFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<PersistentVolumeView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(state.resource_service.list_persistent_volumes(&cluster, &filter, &opts).await)
    }

    pub async fn get_persistent_volume(
        State(state): State<AppState>,
        Path((cluster, name)): Path<(String, String)>,
    ) -> Result<Json<PersistentVolumeView>, AppError> {
        to_json(state.resource_service.get_persistent_volume(&cluster, &name).await)
    }

    pub async fn delete_persistent_volume(
        State(state): State<AppState>,
        Path((cluster, name)): Path<(String, String)>,
    ) -> Result<Json<Value>, AppError> {
        to_empty(state.resource_service.delete_persistent_volume(&cluster, &name).await)
    }

    pub async fn list_persistent_volume_claims(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(ns): Query<NamespaceQuery>,
        Query(filter): Query<NameFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<PersistentVolumeClaimView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(
            state
                .resource_service
                .list_persistent_volume_claims(&cluster, &ns.namespace, &filter, &opts)
                .await,
        )
    }

    pub async fn get_persistent_volume_claim(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<PersistentVolumeClaimView>, AppError> {
        to_json(
            state
                .resource_service
                .get_persistent_volume_claim(&cluster, &namespace, &name)
                .await,
        )
    }

    pub async fn delete_persistent_volume_claim(
        State(state): State<AppState>,
        Path((cluster, namespace, name)): Path<(String, String, String)>,
    ) -> Result<Json<Value>, AppError> {
        to_empty(
            state
                .resource_service
                .delete_persistent_volume_claim(&cluster, &namespace, &name)
                .await,
        )
    }

    pub async fn get_storage_class(
        State(state): State<AppState>,
        Path((cluster, name)): Path<(String, String)>,
    ) -> Result<Json<StorageClassView>, AppError> {
        to_json(state.resource_service.get_storage_class(&cluster, &name).await)
    }

    pub async fn delete_storage_class(
        State(state): State<AppState>,
        Path((cluster, name)): Path<(String, String)>,
    ) -> Result<Json<Value>, AppError> {
        to_empty(state.resource_service.delete_storage_class(&cluster, &name).await)
    }
}

impl NamespaceController {
    pub async fn list_namespaces(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(filter): Query<NamespaceFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<NamespaceView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(state.resource_service.list_namespaces(&cluster, &filter, &opts).await)
    }
}

impl EventController {
    /// Events across every namespace.
    pub async fn list_events(
        State(state): State<AppState>,
        Path(cluster): Path<String>,
        Query(filter): Query<EventFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<EventView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(state.resource_service.list_events(&cluster, "", &filter, &opts).await)
    }

    pub async fn list_namespaced_events(
        State(state): State<AppState>,
        Path((cluster, namespace)): Path<(String, String)>,
        Query(filter): Query<EventFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<EventView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(state.resource_service.list_events(&cluster, &namespace, &filter, &opts).await)
    }
}
