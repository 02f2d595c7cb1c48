use axum::routing::{delete, get, post};
use axum::Router;

use crate::api::controller::storage::StorageController;
use crate::app_state::AppState;

pub fn storage_routes() -> Router<AppState> {
    Router::new()
        .route("/clusters/{cluster}/storage", get(StorageController::list_storages))
        .route(
            "/clusters/{cluster}/namespace/{namespace}/storage",
            post(StorageController::create_storage),
        )
        .route(
            "/clusters/{cluster}/namespace/{namespace}/name/{name}/storage",
            delete(StorageController::delete_storage),
        )
        .route("/clusters/{cluster}/storageclasses", get(StorageController::list_storage_classes))
}
