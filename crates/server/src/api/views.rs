//! HTML views rendered with minijinja.
//!
//! Templates are compiled into the binary; HTML output is auto-escaped.

use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;

use contacts_core::{Contact, PhotoPolicy};

use crate::error::ServerError;

const TEMPLATES: [(&str, &str); 3] = [
    ("layout.html", include_str!("../../templates/layout.html")),
    ("index.html", include_str!("../../templates/index.html")),
    ("form.html", include_str!("../../templates/form.html")),
];

/// A contact as the templates see it, keyed by the form field names.
#[derive(Debug, Serialize)]
pub struct ContactView {
    pub id: i64,
    pub display_name: String,
    pub nombre: String,
    pub apellidos: String,
    pub correo: String,
    /// `YYYY-MM-DD`, the format `<input type="date">` expects.
    pub fecha_nac: String,
    pub foto_url: Option<String>,
}

impl From<&Contact> for ContactView {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.id,
            display_name: contact.display_name(),
            nombre: contact.first_name.clone(),
            apellidos: contact.last_name.clone(),
            correo: contact.email.clone(),
            fecha_nac: contact.birth_date.format("%Y-%m-%d").to_string(),
            foto_url: contact.photo_ref.clone(),
        }
    }
}

#[derive(Serialize)]
struct ListPage<'a> {
    contactos: Vec<ContactView>,
    apellido: Option<&'a str>,
}

#[derive(Serialize)]
struct FormPage {
    contacto: Option<ContactView>,
    accept: String,
}

/// Compiled template set.
pub struct Views {
    env: Environment<'static>,
    accept: String,
}

impl Views {
    /// Compile every template. `photos` drives the file picker's `accept`
    /// attribute.
    pub fn new(photos: &PhotoPolicy) -> Result<Self, ServerError> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        let accept = photos
            .allowed_extensions
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(",");
        Ok(Self { env, accept })
    }

    /// Contact listing. `search` is the surname filter when the list comes
    /// from a search.
    pub fn list(&self, contacts: &[Contact], search: Option<&str>) -> Result<Html<String>, ServerError> {
        self.render(
            "index.html",
            &ListPage {
                contactos: contacts.iter().map(ContactView::from).collect(),
                apellido: search,
            },
        )
    }

    /// Create form when `contact` is `None`, edit form otherwise.
    pub fn form(&self, contact: Option<&Contact>) -> Result<Html<String>, ServerError> {
        self.render(
            "form.html",
            &FormPage {
                contacto: contact.map(ContactView::from),
                accept: self.accept.clone(),
            },
        )
    }

    fn render(&self, name: &str, ctx: &impl Serialize) -> Result<Html<String>, ServerError> {
        let template = self.env.get_template(name)?;
        Ok(Html(template.render(ctx)?))
    }
}

impl std::fmt::Debug for Views {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Views").finish_non_exhaustive()
    }
}
