use axum::routing::get;
use axum::Router;

use crate::api::controller::credential::CredentialController;
use crate::app_state::AppState;

pub fn credential_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/clusters/{cluster}/credentials",
            get(CredentialController::list_credentials).post(CredentialController::create_credential),
        )
        .route(
            "/clusters/{cluster}/credentials/{name}",
            get(CredentialController::get_credential)
                .put(CredentialController::update_credential)
                .delete(CredentialController::delete_credential),
        )
}
