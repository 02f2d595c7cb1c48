use axum::routing::{get, post};
use axum::Router;

use crate::api::controller::quota::QuotaController;
use crate::app_state::AppState;

pub fn quota_routes() -> Router<AppState> {
    Router::new()
        .route("/clusters/{cluster}/quotas", get(QuotaController::list_quotas))
        .route("/clusters/{cluster}/namespaces/{namespace}/quotas", post(QuotaController::create_quota))
        .route(
            "/clusters/{cluster}/namespaces/{namespace}/quotas/{name}",
            get(QuotaController::get_quota)
                .put(QuotaController::update_quota)
                .delete(QuotaController::delete_quota),
        )
}
