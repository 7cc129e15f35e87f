//! Read-only JSON contact endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};

use contacts_core::{Contact, ContactOrder};

use crate::error::ServerError;

use super::AppState;
use super::contacts::SearchParams;
use super::schemas::{ContactListResponse, ErrorResponse};

/// `GET /api/contactos` -- list contacts, optionally filtered by surname.
#[utoipa::path(
    get,
    path = "/api/contactos",
    tag = "Contacts",
    summary = "List contacts",
    description = "Lists contacts ordered by surname then name. With `apellido`, only contacts whose surname contains it (case-insensitive).",
    params(
        ("apellido" = Option<String>, Query, description = "Surname substring"),
    ),
    responses(
        (status = 200, description = "Matching contacts", body = ContactListResponse),
        (status = 503, description = "Metadata store unavailable", body = ErrorResponse),
    )
)]
pub async fn list_contacts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ContactListResponse>, ServerError> {
    let contacts = if params.apellido.trim().is_empty() {
        state.gateway.list(ContactOrder::Name).await?
    } else {
        state.gateway.search(&params.apellido).await?
    };
    let total = contacts.len();
    Ok(Json(ContactListResponse { contacts, total }))
}

/// `GET /api/contactos/{id}` -- fetch one contact.
#[utoipa::path(
    get,
    path = "/api/contactos/{id}",
    tag = "Contacts",
    summary = "Get contact",
    params(("id" = i64, Path, description = "Contact id")),
    responses(
        (status = 200, description = "The contact", body = Contact),
        (status = 404, description = "No such contact", body = ErrorResponse),
        (status = 503, description = "Metadata store unavailable", body = ErrorResponse),
    )
)]
pub async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Contact>, ServerError> {
    Ok(Json(state.gateway.get(id).await?))
}
