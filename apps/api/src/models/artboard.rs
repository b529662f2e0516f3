//! Renderer-neutral artboard model, the intermediate representation between
//! a source document and the rendered HTML.
//!
//! An artboard is built fresh per export request by the mapper and discarded
//! once the HTML string exists. It carries the layout tree plus the page
//! metadata the capture loop needs (format, margin, custom CSS).

use serde::{Deserialize, Serialize};

/// Physical page format at 96 CSS px/inch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    A4,
    Letter,
}

impl PageFormat {
    pub fn width_px(&self) -> f64 {
        match self {
            PageFormat::A4 => 794.0,
            PageFormat::Letter => 816.0,
        }
    }

    pub fn height_px(&self) -> f64 {
        match self {
            PageFormat::A4 => 1123.0,
            PageFormat::Letter => 1056.0,
        }
    }

    pub fn width_in(&self) -> f64 {
        match self {
            PageFormat::A4 => 8.27,
            PageFormat::Letter => 8.5,
        }
    }

    pub fn height_in(&self) -> f64 {
        match self {
            PageFormat::A4 => 11.69,
            PageFormat::Letter => 11.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtboardMetadata {
    pub format: PageFormat,
    pub margin_px: u32,
    pub custom_css: Option<String>,
    pub show_page_numbers: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtboardDocument {
    pub metadata: ArtboardMetadata,
    /// Logical pages in order. Never empty: an empty source document still
    /// maps to a single empty page.
    pub pages: Vec<ArtboardPage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtboardPage {
    pub blocks: Vec<ArtboardBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArtboardBlock {
    /// Document header: owner name, headline, contact line.
    Header {
        name: String,
        headline: Option<String>,
        contacts: Vec<String>,
        picture: Option<String>,
    },
    /// Titled section with ordered items, laid out in `columns` columns.
    Section {
        title: String,
        columns: u8,
        items: Vec<ArtboardItem>,
    },
    /// Free-flowing paragraph (cover letter body, summary text).
    Paragraph { text: String },
}

/// One entry inside a section: an experience, a degree, a project, a skill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtboardItem {
    pub title: String,
    pub subtitle: Option<String>,
    pub dates: Option<String>,
    pub summary: Option<String>,
    pub bullets: Vec<String>,
}
