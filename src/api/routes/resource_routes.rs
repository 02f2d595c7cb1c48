use axum::routing::{get, post};
use axum::Router;

use crate::api::controller::resource::{
    ConfigMapController, EventController, NamespaceController, SecretController, VolumeController,
};
use crate::app_state::AppState;

pub fn resource_routes() -> Router<AppState> {
    Router::new()
        // config maps
        .route("/clusters/{cluster}/configmaps", get(ConfigMapController::list_configmaps))
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/configmaps",
            post(ConfigMapController::create_configmap),
        )
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/configmaps/{name}",
            get(ConfigMapController::get_configmap)
                .put(ConfigMapController::update_configmap)
                .delete(ConfigMapController::delete_configmap),
        )
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/configmaps/{name}/json",
            get(ConfigMapController::get_configmap_json),
        )
        // secrets
        .route("/clusters/{cluster}/secrets", get(SecretController::list_secrets))
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/secrets",
            post(SecretController::create_secret),
        )
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/secrets/{name}",
            get(SecretController::get_secret)
                .put(SecretController::update_secret)
                .delete(SecretController::delete_secret),
        )
        // volumes
        .route("/clusters/{cluster}/persistentvolumes", get(VolumeController::list_persistent_volumes))
        .route(
            "/clusters/{cluster}/persistentvolumes/{name}",
            get(VolumeController::get_persistent_volume).delete(VolumeController::delete_persistent_volume),
        )
        .route(
            "/clusters/{cluster}/persistentvolumeclaims",
            get(VolumeController::list_persistent_volume_claims),
        )
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/persistentvolumeclaims/{name}",
            get(VolumeController::get_persistent_volume_claim)
                .delete(VolumeController::delete_persistent_volume_claim),
        )
        .route(
            "/clusters/{cluster}/storageclasses/{name}",
            get(VolumeController::get_storage_class).delete(VolumeController::delete_storage_class),
        )
        // namespaces and events
        .route("/clusters/{cluster}/namespaces", get(NamespaceController::list_namespaces))
        .route("/clusters/{cluster}/events", get(EventController::list_events))
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/events",
            get(EventController::list_namespaced_events),
        )
}
