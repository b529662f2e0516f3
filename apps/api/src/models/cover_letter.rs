//! Validated cover letter document as received from the editor frontend.

use serde::{Deserialize, Serialize};

use crate::models::resume::{DocumentSettings, Profile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverLetterData {
    pub profile: Profile,
    #[serde(default)]
    pub recipient: Option<Recipient>,
    #[serde(default)]
    pub subject: Option<String>,
    /// Letter body as ordered plain-text paragraphs.
    #[serde(default)]
    pub body: Vec<String>,
    #[serde(default)]
    pub settings: DocumentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default)]
    pub name: Option<String>,
    pub company: String,
    #[serde(default)]
    pub address: Option<String>,
}
