//! PDF Assembler: merges per-page capture buffers into one document, with a
//! single-pass fallback when per-page capture is unavailable or unusable.
//!
//! Merging works at the object level: each single-page buffer is parsed,
//! renumbered into a shared ID space, and its page object re-parented under
//! one Pages tree. A buffer that fails to parse poisons the whole merge, and
//! the caller falls back to capturing the full document in one pass.

use lopdf::{Document, Object, ObjectId};
use tracing::warn;

use crate::export::ExportError;

/// Result of the per-page capture loop, before assembly.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// One single-page PDF buffer per page marker, in page order.
    PerPage(Vec<Vec<u8>>),
    /// The document carried no page markers; only single-pass capture applies.
    NoMarkers,
}

/// How the final buffer was produced. Carried into the export summary log so
/// degraded exports are visible operationally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStrategy {
    /// Multiple per-page captures merged into one document.
    PerPageMerge,
    /// A single per-page capture, used directly without merging.
    SinglePage,
    /// Full-document single-pass capture (no markers, or the merge failed).
    SinglePass,
}

/// Final assembled document plus the page count reported to the caller.
#[derive(Debug)]
pub struct AssembledPdf {
    pub buffer: Vec<u8>,
    pub page_count: u32,
    pub strategy: AssemblyStrategy,
}

/// Turns a capture outcome into the final PDF, falling back to the provided
/// single-pass capture when merging is not possible.
///
/// `capture_fallback` is invoked at most once, and only when needed. It
/// returns the full-document buffer plus the total rendered height in px,
/// from which the fallback page count is estimated.
pub fn assemble<F>(
    outcome: CaptureOutcome,
    page_height_px: f64,
    mut capture_fallback: F,
) -> Result<AssembledPdf, ExportError>
where
    F: FnMut() -> Result<(Vec<u8>, f64), ExportError>,
{
    match outcome {
        CaptureOutcome::PerPage(mut buffers) => {
            // A single capture needs no merging; its buffer is the document.
            if buffers.len() == 1 {
                return Ok(AssembledPdf {
                    buffer: buffers.remove(0),
                    page_count: 1,
                    strategy: AssemblyStrategy::SinglePage,
                });
            }
            let page_count = buffers.len() as u32;
            match merge_page_buffers(&buffers) {
                Ok(buffer) => Ok(AssembledPdf {
                    buffer,
                    page_count,
                    strategy: AssemblyStrategy::PerPageMerge,
                }),
                Err(e) => {
                    warn!("Page merge failed, falling back to single-pass capture: {e}");
                    single_pass(page_height_px, &mut capture_fallback)
                }
            }
        }
        CaptureOutcome::NoMarkers => {
            warn!("No page markers found, capturing document in a single pass");
            single_pass(page_height_px, &mut capture_fallback)
        }
    }
}

fn single_pass<F>(page_height_px: f64, capture: &mut F) -> Result<AssembledPdf, ExportError>
where
    F: FnMut() -> Result<(Vec<u8>, f64), ExportError>,
{
    let (buffer, total_height_px) = capture()?;
    Ok(AssembledPdf {
        buffer,
        page_count: estimate_page_count(total_height_px, page_height_px),
        strategy: AssemblyStrategy::SinglePass,
    })
}

/// Estimates how many physical pages a continuous document of
/// `total_height_px` occupies. Always at least one.
pub fn estimate_page_count(total_height_px: f64, page_height_px: f64) -> u32 {
    if page_height_px <= 0.0 || total_height_px <= 0.0 {
        return 1;
    }
    ((total_height_px / page_height_px).ceil() as u32).max(1)
}

/// Merges single-page PDF buffers into one document, preserving order.
///
/// Each source document's objects are renumbered into a shared ID space and
/// its pages re-parented under a fresh Pages tree. The source catalogs and
/// page-tree roots are dropped; everything else (content streams, fonts,
/// images) is carried over untouched. Any parse failure aborts the merge;
/// partial output is never produced.
pub fn merge_page_buffers(buffers: &[Vec<u8>]) -> Result<Vec<u8>, ExportError> {
    use lopdf::dictionary;

    if buffers.is_empty() {
        return Err(ExportError::Merge("no page buffers to merge".to_string()));
    }

    let mut merged = Document::with_version("1.5");
    let pages_id = merged.new_object_id();
    let mut kids: Vec<ObjectId> = Vec::new();
    let mut max_id = pages_id.0 + 1;

    for (index, buffer) in buffers.iter().enumerate() {
        let mut doc = Document::load_mem(buffer)
            .map_err(|e| ExportError::Merge(format!("page {index} is unreadable: {e}")))?;

        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let skip = structural_ids(&doc)
            .map_err(|e| ExportError::Merge(format!("page {index} has no catalog: {e}")))?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(ExportError::Merge(format!("page {index} contains no pages")));
        }

        for (object_id, object) in doc.objects {
            if !skip.contains(&object_id) {
                merged.objects.insert(object_id, object);
            }
        }

        for page_id in page_ids {
            let page = merged
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| ExportError::Merge(format!("page {index} is malformed: {e}")))?;
            page.set("Parent", pages_id);
            kids.push(page_id);
        }
    }

    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
        }),
    );
    // Keep the allocator ahead of every copied ID before minting the catalog.
    merged.max_id = max_id;
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });

    merged.trailer.set("Root", catalog_id);
    merged.renumber_objects();
    merged.compress();

    let mut out = Vec::new();
    merged
        .save_to(&mut out)
        .map_err(|e| ExportError::Merge(format!("failed to serialize merged PDF: {e}")))?;
    Ok(out)
}

/// Catalog and page-tree-root IDs of a source document, which the merge
/// replaces rather than copies.
fn structural_ids(doc: &Document) -> lopdf::Result<Vec<ObjectId>> {
    let catalog_id = doc.trailer.get(b"Root")?.as_reference()?;
    let pages_root = doc
        .get_object(catalog_id)?
        .as_dict()?
        .get(b"Pages")?
        .as_reference()?;
    Ok(vec![catalog_id, pages_root])
}

#[cfg(test)]
pub(crate) fn minimal_pdf(label: &str) -> Vec<u8> {
    use lopdf::dictionary;
    use lopdf::{Stream, StringFormat};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = format!("BT /F1 24 Tf 72 720 Td ({label}) Tj ET");
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.into_bytes(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(b"letterpress".to_vec(), StringFormat::Hexadecimal),
            Object::String(b"letterpress".to_vec(), StringFormat::Hexadecimal),
        ]),
    );

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_preserves_page_count_and_order() {
        let buffers = vec![minimal_pdf("one"), minimal_pdf("two"), minimal_pdf("three")];
        let merged = merge_page_buffers(&buffers).unwrap();

        let doc = Document::load_mem(&merged).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);

        // Page text order matches buffer order.
        let texts: Vec<String> = (1..=3)
            .map(|n| doc.extract_text(&[n]).unwrap())
            .collect();
        assert!(texts[0].contains("one"));
        assert!(texts[1].contains("two"));
        assert!(texts[2].contains("three"));
    }

    #[test]
    fn test_merge_rejects_empty_input() {
        assert!(matches!(
            merge_page_buffers(&[]),
            Err(ExportError::Merge(_))
        ));
    }

    #[test]
    fn test_merge_rejects_corrupt_buffer() {
        let buffers = vec![minimal_pdf("ok"), b"not a pdf".to_vec()];
        assert!(matches!(
            merge_page_buffers(&buffers),
            Err(ExportError::Merge(_))
        ));
    }

    #[test]
    fn test_assemble_merges_per_page_buffers() {
        let outcome = CaptureOutcome::PerPage(vec![minimal_pdf("a"), minimal_pdf("b")]);
        let assembled = assemble(outcome, 1056.0, || {
            panic!("fallback must not run when merge succeeds")
        })
        .unwrap();
        assert_eq!(assembled.page_count, 2);
        assert_eq!(assembled.strategy, AssemblyStrategy::PerPageMerge);
        assert!(Document::load_mem(&assembled.buffer).is_ok());
    }

    #[test]
    fn test_assemble_uses_single_buffer_directly() {
        let original = minimal_pdf("only");
        let outcome = CaptureOutcome::PerPage(vec![original.clone()]);
        let assembled = assemble(outcome, 1056.0, || {
            panic!("fallback must not run for a single capture")
        })
        .unwrap();
        // Byte-identical: no re-serialization through the merge.
        assert_eq!(assembled.buffer, original);
        assert_eq!(assembled.page_count, 1);
        assert_eq!(assembled.strategy, AssemblyStrategy::SinglePage);
    }

    #[test]
    fn test_assemble_falls_back_on_corrupt_capture() {
        let outcome = CaptureOutcome::PerPage(vec![minimal_pdf("ok"), b"garbage".to_vec()]);
        let fallback_pdf = minimal_pdf("fallback");
        let assembled = assemble(outcome, 1000.0, || Ok((fallback_pdf.clone(), 2500.0))).unwrap();
        assert_eq!(assembled.buffer, fallback_pdf);
        // ceil(2500 / 1000) pages.
        assert_eq!(assembled.page_count, 3);
        assert_eq!(assembled.strategy, AssemblyStrategy::SinglePass);
    }

    #[test]
    fn test_assemble_falls_back_when_markers_missing() {
        let fallback_pdf = minimal_pdf("flat");
        let assembled = assemble(CaptureOutcome::NoMarkers, 1056.0, || {
            Ok((fallback_pdf.clone(), 900.0))
        })
        .unwrap();
        assert_eq!(assembled.buffer, fallback_pdf);
        assert_eq!(assembled.page_count, 1);
        assert_eq!(assembled.strategy, AssemblyStrategy::SinglePass);
    }

    #[test]
    fn test_page_count_estimate_is_at_least_one() {
        assert_eq!(estimate_page_count(0.0, 1056.0), 1);
        assert_eq!(estimate_page_count(500.0, 0.0), 1);
        assert_eq!(estimate_page_count(1056.0, 1056.0), 1);
        assert_eq!(estimate_page_count(1057.0, 1056.0), 2);
    }
}
