//! Document Mapper: converts validated source documents into the
//! renderer-neutral artboard model.
//!
//! Pure functions, no I/O. Input is assumed to have passed schema validation
//! upstream; missing optional sections are omitted, never an error. Mapping
//! is deterministic: the same input always yields a structurally identical
//! artboard (no timestamps, no randomness).

use std::collections::HashSet;

use crate::models::artboard::{
    ArtboardBlock, ArtboardDocument, ArtboardItem, ArtboardMetadata, ArtboardPage, PageFormat,
};
use crate::models::cover_letter::CoverLetterData;
use crate::models::resume::{DocumentSettings, Profile, ResumeData, ResumeSections};

/// Margin applied when the document settings leave it unset.
pub const DEFAULT_MARGIN_PX: u32 = 48;

/// Section order used when the document carries no explicit layout.
const DEFAULT_SECTION_ORDER: [&str; 7] = [
    "summary",
    "experience",
    "education",
    "skills",
    "projects",
    "certifications",
    "languages",
];

pub fn map_resume(data: &ResumeData) -> ArtboardDocument {
    let metadata = resolve_metadata(&data.settings);
    let mut pages: Vec<ArtboardPage> = Vec::new();

    let layout = data
        .settings
        .layout
        .as_deref()
        .filter(|pages| !pages.is_empty());

    match layout {
        Some(layout_pages) => {
            // Layout assigns section keys to pages/columns. Each key is
            // honored once; unknown keys and empty sections are skipped.
            let mut used: HashSet<&str> = HashSet::new();
            for (page_index, columns) in layout_pages.iter().enumerate() {
                let mut blocks = Vec::new();
                if page_index == 0 {
                    blocks.push(header_block(&data.profile));
                }
                for column in columns {
                    for key in column {
                        if !used.insert(key.as_str()) {
                            continue;
                        }
                        if let Some(block) = section_block(key, &data.sections) {
                            blocks.push(block);
                        }
                    }
                }
                pages.push(ArtboardPage { blocks });
            }
        }
        None => {
            let mut blocks = vec![header_block(&data.profile)];
            for key in DEFAULT_SECTION_ORDER {
                if let Some(block) = section_block(key, &data.sections) {
                    blocks.push(block);
                }
            }
            pages.push(ArtboardPage { blocks });
        }
    }

    // The artboard always has at least one page, even if the layout was empty.
    if pages.is_empty() {
        pages.push(ArtboardPage::default());
    }

    ArtboardDocument { metadata, pages }
}

pub fn map_cover_letter(data: &CoverLetterData) -> ArtboardDocument {
    let metadata = resolve_metadata(&data.settings);
    let mut blocks = vec![header_block(&data.profile)];

    if let Some(recipient) = &data.recipient {
        let mut lines = Vec::new();
        if let Some(name) = recipient.name.as_deref().filter(|n| !n.trim().is_empty()) {
            lines.push(name.to_string());
        }
        lines.push(recipient.company.clone());
        if let Some(address) = recipient
            .address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
        {
            lines.push(address.to_string());
        }
        blocks.push(ArtboardBlock::Paragraph {
            text: lines.join("\n"),
        });
    }

    if let Some(subject) = data.subject.as_deref().filter(|s| !s.trim().is_empty()) {
        blocks.push(ArtboardBlock::Paragraph {
            text: format!("Re: {subject}"),
        });
    }

    for paragraph in &data.body {
        if !paragraph.trim().is_empty() {
            blocks.push(ArtboardBlock::Paragraph {
                text: paragraph.clone(),
            });
        }
    }

    ArtboardDocument {
        metadata,
        pages: vec![ArtboardPage { blocks }],
    }
}

fn resolve_metadata(settings: &DocumentSettings) -> ArtboardMetadata {
    let page = settings.page.clone().unwrap_or_default();
    ArtboardMetadata {
        format: page.format.unwrap_or(PageFormat::Letter),
        margin_px: page.margin.unwrap_or(DEFAULT_MARGIN_PX),
        custom_css: settings
            .custom_css
            .clone()
            .filter(|css| !css.trim().is_empty()),
        show_page_numbers: page.show_page_numbers.unwrap_or(false),
    }
}

fn header_block(profile: &Profile) -> ArtboardBlock {
    let contacts = [
        profile.email.as_deref(),
        profile.phone.as_deref(),
        profile.location.as_deref(),
        profile.website.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|c| !c.trim().is_empty())
    .map(str::to_string)
    .collect();

    ArtboardBlock::Header {
        name: profile.name.clone(),
        headline: profile
            .headline
            .clone()
            .filter(|h| !h.trim().is_empty()),
        contacts,
        picture: profile.picture.clone(),
    }
}

fn section_block(key: &str, sections: &ResumeSections) -> Option<ArtboardBlock> {
    match key {
        "summary" => sections
            .summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| ArtboardBlock::Paragraph {
                text: s.to_string(),
            }),
        "experience" => section(
            "Experience",
            1,
            sections.experience.iter().map(|e| ArtboardItem {
                title: e.position.clone(),
                subtitle: Some(e.company.clone()),
                dates: date_range(e.start_date.as_deref(), e.end_date.as_deref()),
                summary: e.summary.clone(),
                bullets: e.highlights.clone(),
            }),
        ),
        "education" => section(
            "Education",
            1,
            sections.education.iter().map(|e| ArtboardItem {
                title: e.institution.clone(),
                subtitle: e.degree.clone(),
                dates: date_range(e.start_date.as_deref(), e.end_date.as_deref()),
                summary: e.summary.clone(),
                bullets: Vec::new(),
            }),
        ),
        "skills" => section(
            "Skills",
            2,
            sections.skills.iter().map(|s| ArtboardItem {
                title: s.name.clone(),
                summary: (!s.keywords.is_empty()).then(|| s.keywords.join(", ")),
                ..Default::default()
            }),
        ),
        "projects" => section(
            "Projects",
            1,
            sections.projects.iter().map(|p| ArtboardItem {
                title: p.name.clone(),
                subtitle: p.url.clone(),
                summary: p.description.clone(),
                bullets: p.highlights.clone(),
                ..Default::default()
            }),
        ),
        "certifications" => section(
            "Certifications",
            2,
            sections.certifications.iter().map(|c| ArtboardItem {
                title: c.name.clone(),
                subtitle: c.issuer.clone(),
                dates: c.date.clone(),
                ..Default::default()
            }),
        ),
        "languages" => section(
            "Languages",
            2,
            sections.languages.iter().map(|l| ArtboardItem {
                title: l.name.clone(),
                subtitle: l.level.clone(),
                ..Default::default()
            }),
        ),
        _ => None,
    }
}

/// Builds a section block, or None when it would carry no items.
fn section(
    title: &str,
    columns: u8,
    items: impl Iterator<Item = ArtboardItem>,
) -> Option<ArtboardBlock> {
    let items: Vec<ArtboardItem> = items.collect();
    (!items.is_empty()).then(|| ArtboardBlock::Section {
        title: title.to_string(),
        columns,
        items,
    })
}

fn date_range(start: Option<&str>, end: Option<&str>) -> Option<String> {
    match (start, end) {
        (Some(s), Some(e)) => Some(format!("{s} – {e}")),
        (Some(s), None) => Some(format!("{s} – Present")),
        (None, Some(e)) => Some(e.to_string()),
        (None, None) => None,
    }
}
