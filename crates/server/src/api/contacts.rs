//! HTML contact pages and form handlers.
//!
//! Every successful mutation answers `302 Found` back to the listing.
//! Browsers cannot send `PUT`/`DELETE` from a form, so
//! `POST /contactos/{id}?_method=PUT|DELETE` is dispatched to the matching
//! handler.

use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;

use contacts_core::ContactOrder;

use crate::error::ServerError;

use super::AppState;
use super::forms::ContactForm;

fn back_to_list() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// `recientes` lists the newest contacts first.
    pub orden: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub apellido: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MethodOverride {
    #[serde(rename = "_method")]
    pub method: Option<String>,
}

/// `GET /` -- every contact, by surname then name.
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Html<String>, ServerError> {
    let order = match params.orden.as_deref() {
        Some("recientes") => ContactOrder::Newest,
        _ => ContactOrder::Name,
    };
    let contacts = state.gateway.list(order).await?;
    state.views.list(&contacts, None)
}

/// `GET /nuevo`
pub async fn new_form(State(state): State<AppState>) -> Result<Html<String>, ServerError> {
    state.views.form(None)
}

/// `POST /contactos`
pub async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let form = ContactForm::read(multipart).await?;
    state.gateway.create(&form.draft, form.photo).await?;
    Ok(back_to_list())
}

/// `GET /buscar?apellido=`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Html<String>, ServerError> {
    let pattern = params.apellido.trim();
    let contacts = state.gateway.search(pattern).await?;
    state.views.list(&contacts, Some(pattern))
}

/// `GET /editar/{id}`
pub async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Html<String>, ServerError> {
    let contact = state.gateway.get(id).await?;
    state.views.form(Some(&contact))
}

/// `PUT /contactos/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let form = ContactForm::read(multipart).await?;
    state.gateway.update(id, &form.draft, form.photo).await?;
    Ok(back_to_list())
}

/// `DELETE /contactos/{id}`
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServerError> {
    state.gateway.delete(id).await?;
    Ok(back_to_list())
}

/// `POST /contactos/{id}?_method=PUT|DELETE`
pub async fn method_override(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<MethodOverride>,
    request: Request,
) -> Result<Response, ServerError> {
    let method = params.method.unwrap_or_default().to_ascii_uppercase();
    match method.as_str() {
        "PUT" => {
            let multipart = Multipart::from_request(request, &state).await?;
            update(State(state), Path(id), multipart).await
        }
        "DELETE" => delete(State(state), Path(id)).await,
        _ => Ok((
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "PUT, DELETE")],
            axum::Json(serde_json::json!({
                "error": "POST to a contact requires _method=PUT or _method=DELETE"
            })),
        )
            .into_response()),
    }
}
