use axum::routing::get;
use axum::Router;

use crate::api::controller::monitoring::MonitoringController;
use crate::api::controller::node::{AcceleratorCardController, NodeController};
use crate::app_state::AppState;

pub fn node_routes() -> Router<AppState> {
    Router::new()
        .route("/clusters/{cluster}/nodes", get(NodeController::list_nodes))
        .route("/clusters/{cluster}/nodes/top", get(MonitoringController::get_top_nodes))
        .route("/clusters/{cluster}/nodes/{node}", get(NodeController::get_node))
        .route("/clusters/{cluster}/gpusummary", get(NodeController::list_cluster_gpu_summary))
        .route("/clusters/{cluster}/nodes/{node}/resource/trend", get(MonitoringController::get_node_trend))
        .route(
            "/clusters/{cluster}/nodes/{node}/gpus/{uuid}/resource/trend",
            get(MonitoringController::get_gpu_trend),
        )
        .route(
            "/clusters/{cluster}/nodes/{node}/workloads/distribution",
            get(MonitoringController::get_node_workload_distribution),
        )
        .route(
            "/clusters/{cluster}/nodes/{node}/uuids/{uuid}/top",
            get(MonitoringController::get_card_top_workloads),
        )
        .route("/clusters/{cluster}/acceleratorcards", get(AcceleratorCardController::list_accelerator_cards))
        .route(
            "/clusters/{cluster}/acceleratorcards/modelnames",
            get(AcceleratorCardController::list_model_names),
        )
        .route(
            "/clusters/{cluster}/acceleratorcards/{uuid}",
            get(AcceleratorCardController::get_accelerator_card),
        )
}
