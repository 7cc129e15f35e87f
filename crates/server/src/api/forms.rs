use axum::extract::Multipart;

use contacts_core::{ContactDraft, PhotoUpload};

use crate::error::ServerError;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// The multipart contact form: `nombre`, `apellidos`, `correo`, `fecha_nac`
/// and an optional `foto` file.
#[derive(Debug, Default)]
pub struct ContactForm {
    pub draft: ContactDraft,
    pub photo: Option<PhotoUpload>,
}

impl ContactForm {
    /// Drain `multipart` into a form. Unknown fields are skipped. A `foto`
    /// part with neither a file name nor content (no file chosen) counts as
    /// no photo.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "nombre" => form.draft.first_name = field.text().await?,
                "apellidos" => form.draft.last_name = field.text().await?,
                "correo" => form.draft.email = field.text().await?,
                "fecha_nac" => form.draft.birth_date = field.text().await?,
                "foto" => {
                    let file_name = field.file_name().unwrap_or_default().to_owned();
                    let content_type = field
                        .content_type()
                        .unwrap_or(FALLBACK_CONTENT_TYPE)
                        .to_owned();
                    let data = field.bytes().await?;
                    if !(file_name.is_empty() && data.is_empty()) {
                        form.photo = Some(PhotoUpload::new(file_name, content_type, data));
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }
}
