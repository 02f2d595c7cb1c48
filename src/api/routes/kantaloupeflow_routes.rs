use axum::routing::{get, post};
use axum::Router;

use crate::api::controller::kantaloupeflow::KantaloupeflowController;
use crate::api::controller::monitoring::MonitoringController;
use crate::app_state::AppState;

pub fn kantaloupeflow_routes() -> Router<AppState> {
    Router::new()
        .route("/clusters/{cluster}/kantaloupeflows", post(KantaloupeflowController::create_kantaloupeflow))
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/kantaloupeflows",
            get(KantaloupeflowController::list_kantaloupeflows),
        )
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/kantaloupeflows/{name}",
            get(KantaloupeflowController::get_kantaloupeflow).delete(KantaloupeflowController::delete_kantaloupeflow),
        )
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/kantaloupeflows/{name}/conditions",
            get(KantaloupeflowController::get_kantaloupeflow_conditions),
        )
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/kantaloupeflows/{name}/gpumemory",
            post(KantaloupeflowController::update_gpu_memory),
        )
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/kantaloupeflows/{name}/resource/trend",
            get(MonitoringController::get_kantaloupeflow_trend),
        )
        .route(
            "/clusters/{cluster}/namespace/{namespace}/kantaloupeflow/{name}/memory/distribution",
            get(MonitoringController::get_kantaloupeflow_memory_distribution),
        )
}
