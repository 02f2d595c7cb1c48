//! Cluster-level charts; node, card and flow charts sit with their own resources.

use axum::routing::get;
use axum::Router;

use crate::api::controller::monitoring::MonitoringController;
use crate::app_state::AppState;

pub fn monitoring_routes() -> Router<AppState> {
    Router::new()
        .route("/clusters/{cluster}/resource/trend", get(MonitoringController::get_cluster_trend))
        .route(
            "/clusters/{cluster}/workloads/distribution",
            get(MonitoringController::get_cluster_workload_distribution),
        )
        .route("/clusters/{cluster}/workloads/top", get(MonitoringController::get_cluster_workloads_top))
        .route("/clusters/{cluster}/nodeWorkloads/top", get(MonitoringController::get_top_node_workloads))
}
