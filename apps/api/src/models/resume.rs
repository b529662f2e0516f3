//! Validated resume document as received from the editor frontend.
//!
//! Schema validation happens upstream (the editor persists only documents
//! that pass it); the export pipeline treats these types as trusted input
//! and handles absent optional sections by omission, never by erroring.

use serde::{Deserialize, Serialize};

use crate::models::artboard::PageFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeData {
    pub profile: Profile,
    #[serde(default)]
    pub sections: ResumeSections,
    #[serde(default)]
    pub settings: DocumentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    /// Absolute URL of the profile picture, if any.
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeSections {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub experience: Vec<ExperienceItem>,
    #[serde(default)]
    pub education: Vec<EducationItem>,
    #[serde(default)]
    pub skills: Vec<SkillItem>,
    #[serde(default)]
    pub projects: Vec<ProjectItem>,
    #[serde(default)]
    pub certifications: Vec<CertificationItem>,
    #[serde(default)]
    pub languages: Vec<LanguageItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceItem {
    pub company: String,
    pub position: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationItem {
    pub institution: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillItem {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationItem {
    pub name: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageItem {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

/// Per-document appearance/layout settings. All optional; the mapper
/// resolves effective values (Letter, fixed margin) when unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSettings {
    #[serde(default)]
    pub page: Option<PageSettings>,
    #[serde(default)]
    pub custom_css: Option<String>,
    /// Section keys arranged as pages → columns → ordered keys. Absent means
    /// a single page with the default section order.
    #[serde(default)]
    pub layout: Option<Vec<Vec<Vec<String>>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSettings {
    #[serde(default)]
    pub format: Option<PageFormat>,
    #[serde(default)]
    pub margin: Option<u32>,
    #[serde(default)]
    pub show_page_numbers: Option<bool>,
}
