use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum length of the name and surname columns.
pub const MAX_NAME_CHARS: usize = 100;

/// Maximum length of the email column.
pub const MAX_EMAIL_CHARS: usize = 150;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// A contact row as persisted by the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Contact {
    /// Surrogate key assigned on insert.
    pub id: i64,
    /// Given name.
    pub first_name: String,
    /// Surname(s).
    pub last_name: String,
    /// Unique email address.
    pub email: String,
    /// Date of birth.
    pub birth_date: NaiveDate,
    /// Locator of the contact's photo in the blob store, if any.
    pub photo_ref: Option<String>,
    /// Set by the store on insert.
    pub created_at: DateTime<Utc>,
    /// Set by the store on every mutation.
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Listing label: `"<last name>, <first name>"`.
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    /// The validated fields of this contact.
    pub fn fields(&self) -> ContactFields {
        ContactFields {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            birth_date: self.birth_date,
        }
    }
}

/// Raw, unvalidated contact input as received from a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub birth_date: String,
}

impl ContactDraft {
    /// Create a draft from the four form values.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        birth_date: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            birth_date: birth_date.into(),
        }
    }

    /// Trim and check every field, producing the typed [`ContactFields`].
    ///
    /// The email is lowercased, so stores that compare it exactly still treat
    /// `Ana@X.com` and `ana@x.com` as the same address.
    pub fn validate(&self) -> Result<ContactFields, ValidationError> {
        let first_name = required("nombre", &self.first_name, MAX_NAME_CHARS)?;
        let last_name = required("apellidos", &self.last_name, MAX_NAME_CHARS)?;
        let email = required("correo", &self.email, MAX_EMAIL_CHARS)?.to_lowercase();
        if !EMAIL_RE.is_match(&email) {
            return Err(ValidationError::InvalidEmail(email));
        }

        let raw_date = self.birth_date.trim();
        if raw_date.is_empty() {
            return Err(ValidationError::EmptyField("fecha_nac"));
        }
        let birth_date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidDate(raw_date.to_owned()))?;

        Ok(ContactFields {
            first_name,
            last_name,
            email,
            birth_date,
        })
    }
}

fn required(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_owned())
}

/// Validated contact fields. Only obtainable through [`ContactDraft::validate`]
/// or from an existing [`Contact`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub birth_date: NaiveDate,
}

/// Everything the metadata store writes for a contact row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub fields: ContactFields,
    pub photo_ref: Option<String>,
}

impl ContactRecord {
    pub fn new(fields: ContactFields, photo_ref: Option<String>) -> Self {
        Self { fields, photo_ref }
    }
}

/// Sort order for listing contacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactOrder {
    /// Surname, then given name, then id.
    #[default]
    Name,
    /// Most recently created first.
    Newest,
}
