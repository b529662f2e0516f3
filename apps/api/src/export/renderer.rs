//! HTML Renderer: serializes an artboard document into a self-contained
//! HTML string the browser driver can load from disk.
//!
//! Each logical page becomes one wrapper element carrying a sequential
//! `data-page` marker; the stylesheet gives every wrapper the physical page
//! dimensions so the browser's own layout produces the visual pages the
//! capture loop measures. A small injected script flips the body-level
//! `data-pagination-ready` flag once fonts/layout have settled. The flag is
//! set at most once and never reverts.

use crate::export::ExportError;
use crate::models::artboard::{ArtboardBlock, ArtboardDocument, ArtboardItem, ArtboardMetadata};

/// Attribute the driver polls before measuring pages.
pub const READY_ATTRIBUTE: &str = "data-pagination-ready";

/// Attribute marking a logical page wrapper, valued 0..N-1 in page order.
pub const PAGE_MARKER_ATTRIBUTE: &str = "data-page";

const READINESS_SCRIPT: &str = r#"<script>
(function () {
  function markReady() {
    if (document.body.getAttribute('data-pagination-ready') === 'true') return;
    requestAnimationFrame(function () {
      document.body.setAttribute('data-pagination-ready', 'true');
    });
  }
  if (document.fonts && document.fonts.ready) {
    document.fonts.ready.then(markReady);
  }
  window.addEventListener('load', markReady);
})();
</script>
"#;

pub fn render(artboard: &ArtboardDocument) -> Result<String, ExportError> {
    if artboard.pages.is_empty() {
        return Err(ExportError::InvalidArtboard(
            "artboard has no pages".to_string(),
        ));
    }

    let mut html = String::with_capacity(16 * 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Export</title>\n<style>\n");
    html.push_str(&stylesheet(&artboard.metadata));
    html.push_str("\n</style>\n</head>\n<body>\n");

    for (index, page) in artboard.pages.iter().enumerate() {
        html.push_str(&format!(
            "<div class=\"page\" {PAGE_MARKER_ATTRIBUTE}=\"{index}\">\n"
        ));
        for block in &page.blocks {
            render_block(&mut html, block);
        }
        if artboard.metadata.show_page_numbers {
            html.push_str(&format!(
                "<footer class=\"page-number\">{}</footer>\n",
                index + 1
            ));
        }
        html.push_str("</div>\n");
    }

    html.push_str(READINESS_SCRIPT);
    html.push_str("</body>\n</html>\n");
    Ok(html)
}

fn stylesheet(metadata: &ArtboardMetadata) -> String {
    let mut css = format!(
        "* {{ margin: 0; padding: 0; box-sizing: border-box; animation: none !important; transition: none !important; }}\n\
         body {{ background: #ffffff; font-family: 'Helvetica Neue', Arial, sans-serif; font-size: 13px; line-height: 1.45; color: #1a1a1a; }}\n\
         .page {{ position: relative; width: {width}px; min-height: {height}px; padding: {margin}px; background: #ffffff; overflow: hidden; }}\n\
         .doc-header {{ margin-bottom: 18px; }}\n\
         .doc-header h1 {{ font-size: 26px; font-weight: 700; }}\n\
         .doc-header .headline {{ font-size: 15px; color: #444444; margin-top: 2px; }}\n\
         .doc-header .contacts {{ font-size: 12px; color: #666666; margin-top: 6px; }}\n\
         .doc-header .picture {{ float: right; width: 72px; height: 72px; border-radius: 50%; object-fit: cover; }}\n\
         .doc-section {{ margin-bottom: 14px; }}\n\
         .doc-section h2 {{ font-size: 14px; text-transform: uppercase; letter-spacing: 0.05em; border-bottom: 1px solid #cccccc; padding-bottom: 2px; margin-bottom: 8px; }}\n\
         .cols-2 .items {{ column-count: 2; column-gap: 24px; }}\n\
         .item {{ margin-bottom: 10px; break-inside: avoid; }}\n\
         .item .item-head {{ display: flex; justify-content: space-between; align-items: baseline; }}\n\
         .item h3 {{ font-size: 13px; font-weight: 600; }}\n\
         .item .dates {{ font-size: 11px; color: #666666; white-space: nowrap; }}\n\
         .item .subtitle {{ font-size: 12px; color: #444444; font-style: italic; }}\n\
         .item ul {{ padding-left: 18px; margin-top: 4px; }}\n\
         .para {{ margin-bottom: 10px; white-space: pre-line; }}\n\
         .page-number {{ position: absolute; bottom: 12px; left: 0; right: 0; text-align: center; font-size: 10px; color: #888888; }}",
        width = metadata.format.width_px(),
        height = metadata.format.height_px(),
        margin = metadata.margin_px,
    );

    if let Some(custom) = &metadata.custom_css {
        css.push('\n');
        css.push_str(custom);
    }
    css
}

fn render_block(html: &mut String, block: &ArtboardBlock) {
    match block {
        ArtboardBlock::Header {
            name,
            headline,
            contacts,
            picture,
        } => {
            html.push_str("<header class=\"doc-header\">\n");
            if let Some(src) = picture {
                html.push_str(&format!(
                    "<img class=\"picture\" src=\"{}\" alt=\"\">\n",
                    escape_html(src)
                ));
            }
            html.push_str(&format!("<h1>{}</h1>\n", escape_html(name)));
            if let Some(headline) = headline {
                html.push_str(&format!(
                    "<p class=\"headline\">{}</p>\n",
                    escape_html(headline)
                ));
            }
            if !contacts.is_empty() {
                let joined = contacts
                    .iter()
                    .map(|c| escape_html(c))
                    .collect::<Vec<_>>()
                    .join(" · ");
                html.push_str(&format!("<p class=\"contacts\">{joined}</p>\n"));
            }
            html.push_str("</header>\n");
        }
        ArtboardBlock::Section {
            title,
            columns,
            items,
        } => {
            html.push_str(&format!(
                "<section class=\"doc-section cols-{columns}\">\n<h2>{}</h2>\n<div class=\"items\">\n",
                escape_html(title)
            ));
            for item in items {
                render_item(html, item);
            }
            html.push_str("</div>\n</section>\n");
        }
        ArtboardBlock::Paragraph { text } => {
            html.push_str(&format!("<p class=\"para\">{}</p>\n", escape_html(text)));
        }
    }
}

fn render_item(html: &mut String, item: &ArtboardItem) {
    html.push_str("<article class=\"item\">\n<div class=\"item-head\">\n");
    html.push_str(&format!("<h3>{}</h3>\n", escape_html(&item.title)));
    if let Some(dates) = &item.dates {
        html.push_str(&format!(
            "<span class=\"dates\">{}</span>\n",
            escape_html(dates)
        ));
    }
    html.push_str("</div>\n");
    if let Some(subtitle) = &item.subtitle {
        html.push_str(&format!(
            "<p class=\"subtitle\">{}</p>\n",
            escape_html(subtitle)
        ));
    }
    if let Some(summary) = &item.summary {
        html.push_str(&format!("<p>{}</p>\n", escape_html(summary)));
    }
    if !item.bullets.is_empty() {
        html.push_str("<ul>\n");
        for bullet in &item.bullets {
            html.push_str(&format!("<li>{}</li>\n", escape_html(bullet)));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</article>\n");
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
