#![allow(dead_code)]
//! Download filename and storage-key derivation for exported PDFs.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::export::DocumentType;

/// Lowercases and strips a display name down to `[a-z0-9-]`, collapsing runs
/// of other characters into single hyphens.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Suggested download filename, e.g. `jane-doe-resume-2026-08-27.pdf`.
pub fn derive_filename(owner_name: &str, document_type: DocumentType) -> String {
    filename_at(owner_name, document_type, Utc::now().date_naive())
}

pub fn filename_at(owner_name: &str, document_type: DocumentType, date: NaiveDate) -> String {
    let slug = slugify(owner_name);
    let kind = match document_type {
        DocumentType::Resume => "resume",
        DocumentType::CoverLetter => "cover-letter",
    };
    if slug.is_empty() {
        format!("{kind}-{}.pdf", date.format("%Y-%m-%d"))
    } else {
        format!("{slug}-{kind}-{}.pdf", date.format("%Y-%m-%d"))
    }
}

/// Object-store key for an exported document. Each export gets its own key;
/// re-exports never overwrite earlier ones.
pub fn storage_path(user_id: Uuid, document_id: Uuid) -> String {
    storage_path_at(user_id, document_id, Utc::now())
}

pub fn storage_path_at(user_id: Uuid, document_id: Uuid, now: DateTime<Utc>) -> String {
    format!("{user_id}/{document_id}/{}.pdf", now.timestamp_millis())
}
