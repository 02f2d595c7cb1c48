//! Cluster registry and platform-wide views.

use axum::routing::{get, post};
use axum::Router;

use crate::api::controller::cluster::{ClusterController, PlatformController};
use crate::api::controller::kantaloupeflow::KantaloupeflowController;
use crate::api::controller::monitoring::MonitoringController;
use crate::app_state::AppState;

pub fn cluster_routes() -> Router<AppState> {
    Router::new()
        .route("/clusters", get(ClusterController::list_clusters).post(ClusterController::integrate_cluster))
        .route("/clusters/versions", get(ClusterController::list_cluster_versions))
        .route("/clusters/kubeconfig:validate", post(ClusterController::validate_kubeconfig))
        .route("/clusters/prometheus:validate", post(ClusterController::validate_prometheus_address))
        .route(
            "/clusters/{cluster}",
            get(ClusterController::get_cluster)
                .put(ClusterController::update_cluster)
                .delete(ClusterController::delete_cluster),
        )
        .route("/clusters/{cluster}/plugins", get(ClusterController::get_cluster_plugins))
        .route("/clusters/{cluster}/requesttype", get(ClusterController::get_cluster_card_request_types))
}

pub fn platform_routes() -> Router<AppState> {
    Router::new()
        // both spellings are served
        .route("/platform/summury", get(PlatformController::get_platform_summary))
        .route("/platform/summary", get(PlatformController::get_platform_summary))
        .route("/platform/gpu/top", get(PlatformController::get_gpu_top))
        .route("/platform/resource/trend", get(MonitoringController::get_platform_trend))
        .route("/platform/kantaloupeflows/tree", get(KantaloupeflowController::get_kantaloupe_tree))
}
