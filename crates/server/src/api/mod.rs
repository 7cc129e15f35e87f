pub mod contacts;
pub mod forms;
pub mod health;
pub mod json;
pub mod openapi;
pub mod schemas;
pub mod views;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use contacts_gateway::Gateway;

use self::openapi::ApiDoc;
use self::views::Views;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The gateway instance. Clones share stores and in-flight flows.
    pub gateway: Gateway,
    /// Compiled HTML templates.
    pub views: Arc<Views>,
    /// Request body cap, applied to the multipart form routes.
    pub max_body_bytes: usize,
}

/// Build the Axum router with the HTML pages, JSON API, and Swagger UI.
pub fn router(state: AppState) -> Router {
    let forms = Router::new()
        .route("/contactos", post(contacts::create))
        .route(
            "/contactos/{id}",
            post(contacts::method_override)
                .put(contacts::update)
                .delete(contacts::delete),
        )
        .layer(DefaultBodyLimit::max(state.max_body_bytes));

    let pages = Router::new()
        .route("/", get(contacts::index))
        .route("/nuevo", get(contacts::new_form))
        .route("/buscar", get(contacts::search))
        .route("/editar/{id}", get(contacts::edit_form));

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route("/admin/leaked-blobs", get(health::leaked_blobs))
        .route("/api/contactos", get(json::list_contacts))
        .route("/api/contactos/{id}", get(json::get_contact));

    Router::new()
        .merge(pages)
        .merge(forms)
        .merge(api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
