#![allow(clippy::needless_for_each)]

use contacts_core::Contact;

use super::schemas::{
    ContactListResponse, ErrorResponse, HealthResponse, LeakedBlobResponse, LeakedBlobsResponse,
    MetricsResponse,
};

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "Contacts API",
        version = "0.1.0",
        description = "JSON endpoints of the contacts service. The HTML pages at `/`, `/nuevo`, `/buscar` and `/editar/{id}` and the form endpoints under `/contactos` are not described here.",
        license(name = "Apache-2.0")
    ),
    tags(
        (name = "Health", description = "Service health and metrics"),
        (name = "Contacts", description = "Read-only contact queries"),
        (name = "Admin", description = "Operational views"),
    ),
    paths(
        super::health::health,
        super::health::metrics,
        super::health::leaked_blobs,
        super::json::list_contacts,
        super::json::get_contact,
    ),
    components(schemas(
        Contact,
        ContactListResponse,
        ErrorResponse,
        HealthResponse,
        LeakedBlobResponse,
        LeakedBlobsResponse,
        MetricsResponse,
    ))
)]
pub struct ApiDoc;
