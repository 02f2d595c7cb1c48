//! Credentials always live in the control-plane cluster; the cluster segment of the path is not consulted.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::api::dto::NamespaceQuery;
use crate::api::util::json::{to_empty, to_json, validated};
use crate::app_state::AppState;
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::credential::dto::credential_dto::{CredentialFilter, CredentialRequest, CredentialView};
use crate::errors::AppError;

pub struct CredentialController;

impl CredentialController {
    pub async fn list_credentials(
        State(state): State<AppState>,
        Path(_cluster): Path<String>,
        Query(filter): Query<CredentialFilter>,
        Query(opts): Query<ListOptions>,
    ) -> Result<Json<ListResponse<CredentialView>>, AppError> {
        let filter = validated(filter)?;
        let opts = validated(opts)?;
        to_json(state.credential_service.list_credentials(&filter, &opts).await)
    }

    pub async fn get_credential(
        State(state): State<AppState>,
        Path((_cluster, name)): Path<(String, String)>,
        Query(ns): Query<NamespaceQuery>,
    ) -> Result<Json<CredentialView>, AppError> {
        to_json(state.credential_service.get_credential(&ns.namespace, &name).await)
    }

    pub async fn create_credential(
        State(state): State<AppState>,
        Path(_cluster): Path<String>,
        Json(payload): Json<CredentialRequest>,
    ) -> Result<Json<CredentialView>, AppError> {
        let payload = validated(payload)?;
        to_json(state.credential_service.create_credential(&payload).await)
    }

    pub async fn update_credential(
        State(state): State<AppState>,
        Path((_cluster, name)): Path<(String, String)>,
        Query(ns): Query<NamespaceQuery>,
        Json(payload): Json<CredentialRequest>,
    ) -> Result<Json<CredentialView>, AppError> {
        let mut payload = validated(payload)?;
        if payload.namespace.is_empty() {
            payload.namespace = ns.namespace;
        }
        to_json(state.credential_service.update_credential(&name, &payload).await)
    }

    pub async fn delete_credential(
        State(state): State<AppState>,
        Path((_cluster, name)): Path<(String, String)>,
        Query(ns): Query<NamespaceQuery>,
    ) -> Result<Json<Value>, AppError> {
        to_empty(state.credential_service.delete_credential(&ns.namespace, &name).await)
    }
}
