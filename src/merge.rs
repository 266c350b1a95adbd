//! Appends vendored PDF attachments to a composed receipt. Each source page
//! is wrapped as a Form XObject and mounted on a fresh output page sized to
//! the source box, so attachment pages keep their native geometry.

use crate::error::FormPressError;
use lopdf::{
    Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream,
    dictionary,
};

fn lopdf_err(err: lopdf::Error) -> FormPressError {
    FormPressError::Pdf(format!("pdf merge error: {err}"))
}

pub(crate) fn load_document(bytes: &[u8]) -> Result<LoDocument, FormPressError> {
    LoDocument::load_mem(bytes).map_err(lopdf_err)
}

/// Prunes unreachable objects (the source page dictionaries replaced by
/// form wrappers) and serializes back to bytes.
pub(crate) fn save_document(mut doc: LoDocument) -> Result<Vec<u8>, FormPressError> {
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn page_box(page: &lopdf::Dictionary) -> Vec<LoObject> {
    if let Ok(arr) = page.get(b"CropBox").and_then(LoObject::as_array) {
        return arr.clone();
    }
    if let Ok(arr) = page.get(b"MediaBox").and_then(LoObject::as_array) {
        return arr.clone();
    }
    // A4 in points when the source declares no box.
    vec![
        0.into(),
        0.into(),
        LoObject::Real(595.28),
        LoObject::Real(841.89),
    ]
}

fn box_number(value: &LoObject) -> f32 {
    match value {
        LoObject::Integer(n) => *n as f32,
        LoObject::Real(n) => *n,
        _ => 0.0,
    }
}

/// Width and height of a page box, tolerating offset origins.
fn box_extent(bbox: &[LoObject]) -> (f32, f32, f32, f32) {
    if bbox.len() != 4 {
        return (0.0, 0.0, 595.28, 841.89);
    }
    let x1 = box_number(&bbox[0]);
    let y1 = box_number(&bbox[1]);
    let x2 = box_number(&bbox[2]);
    let y2 = box_number(&bbox[3]);
    (x1, y1, (x2 - x1).abs(), (y2 - y1).abs())
}

fn page_resources_object(doc: &LoDocument, page: &lopdf::Dictionary) -> LoObject {
    match page.get(b"Resources") {
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .cloned()
            .unwrap_or_else(|_| LoObject::Dictionary(lopdf::Dictionary::new())),
        Ok(obj) => obj.clone(),
        Err(_) => LoObject::Dictionary(lopdf::Dictionary::new()),
    }
}

fn import_document_objects(
    dst: &mut LoDocument,
    mut src: LoDocument,
) -> Result<Vec<LoObjectId>, FormPressError> {
    if src.is_encrypted() {
        return Err(FormPressError::Attachment(
            "attachment PDF is encrypted".to_string(),
        ));
    }
    let start_id = dst.max_id + 1;
    src.renumber_objects_with(start_id);
    let page_ids: Vec<LoObjectId> = src.get_pages().values().copied().collect();
    if src.max_id > dst.max_id {
        dst.max_id = src.max_id;
    }
    dst.objects.extend(src.objects);
    Ok(page_ids)
}

fn pages_root(doc: &LoDocument) -> Result<LoObjectId, FormPressError> {
    let catalog = doc.catalog().map_err(lopdf_err)?;
    catalog
        .get(b"Pages")
        .and_then(LoObject::as_reference)
        .map_err(lopdf_err)
}

/// Appends every page of an attachment PDF to `dst` in source order.
/// Returns the number of pages appended. The nominal page size of each
/// appended page is taken from the source box, so oversized attachments
/// arrive at their native size instead of being cropped to the receipt.
pub(crate) fn append_pdf_pages(
    dst: &mut LoDocument,
    source: &[u8],
) -> Result<usize, FormPressError> {
    let src = LoDocument::load_mem(source)
        .map_err(|err| FormPressError::Attachment(format!("attachment PDF unreadable: {err}")))?;
    let page_ids = import_document_objects(dst, src)?;
    if page_ids.is_empty() {
        return Ok(0);
    }
    let pages_id = pages_root(dst)?;

    let mut new_page_ids = Vec::with_capacity(page_ids.len());
    for src_page_id in &page_ids {
        let page_dict = dst
            .get_object(*src_page_id)
            .and_then(LoObject::as_dict)
            .map_err(lopdf_err)?
            .clone();
        let content = dst.get_page_content(*src_page_id).map_err(lopdf_err)?;
        let bbox = page_box(&page_dict);
        let resources = page_resources_object(dst, &page_dict);
        let (origin_x, origin_y, width_pt, height_pt) = box_extent(&bbox);

        let form_id = dst.add_object(LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "FormType" => 1,
                "BBox" => LoObject::Array(bbox),
                "Resources" => resources,
            },
            content,
        ));
        let form_name = format!("Att{}", form_id.0);

        // Shift offset source boxes back to the output page origin.
        let page_content = format!(
            "q 1 0 0 1 {} {} cm /{} Do Q",
            -origin_x, -origin_y, form_name
        )
        .into_bytes();
        let page_content_id = dst.add_object(LoStream::new(dictionary! {}, page_content));

        let page_id = dst.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                LoObject::Real(width_pt),
                LoObject::Real(height_pt),
            ],
            "Contents" => page_content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { form_name => form_id },
            },
        });
        new_page_ids.push(page_id);
    }

    let pages_dict = dst
        .get_object_mut(pages_id)
        .and_then(LoObject::as_dict_mut)
        .map_err(lopdf_err)?;
    let mut kids = pages_dict
        .get(b"Kids")
        .and_then(LoObject::as_array)
        .ok()
        .cloned()
        .unwrap_or_default();
    for id in &new_page_ids {
        kids.push((*id).into());
    }
    let count = kids.len() as i64;
    pages_dict.set("Kids", kids);
    pages_dict.set("Count", count);
    Ok(new_page_ids.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::pdf::document_to_pdf;
    use crate::types::{Mm, Size as MmSize};

    fn base_receipt_bytes() -> Vec<u8> {
        let mut canvas = Canvas::new(MmSize::a4());
        canvas.draw_string(Mm::from_i32(10), Mm::from_i32(20), "base receipt");
        document_to_pdf(&canvas.finish()).unwrap()
    }

    fn letter_attachment_bytes(pages: usize) -> Vec<u8> {
        let mut doc = LoDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<LoObject> = Vec::new();
        for idx in 0..pages {
            let content =
                format!("BT /F1 18 Tf 72 720 Td (attachment {}) Tj ET", idx + 1).into_bytes();
            let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            LoObject::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn appends_every_source_page_in_order() {
        let mut doc = load_document(&base_receipt_bytes()).unwrap();
        let appended = append_pdf_pages(&mut doc, &letter_attachment_bytes(3)).unwrap();
        assert_eq!(appended, 3);
        let bytes = save_document(doc).unwrap();
        let reloaded = load_document(&bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 4);
    }

    #[test]
    fn appended_pages_keep_the_source_box() {
        let mut doc = load_document(&base_receipt_bytes()).unwrap();
        append_pdf_pages(&mut doc, &letter_attachment_bytes(1)).unwrap();
        let bytes = save_document(doc).unwrap();
        let reloaded = load_document(&bytes).unwrap();
        let pages = reloaded.get_pages();
        let last_id = *pages.values().last().unwrap();
        let dict = reloaded
            .get_object(last_id)
            .and_then(LoObject::as_dict)
            .unwrap();
        let media = dict.get(b"MediaBox").and_then(LoObject::as_array).unwrap();
        let (_, _, width_pt, height_pt) = box_extent(media);
        assert!((width_pt - 612.0).abs() < 0.5);
        assert!((height_pt - 792.0).abs() < 0.5);
    }

    #[test]
    fn unreadable_attachment_is_a_recoverable_error() {
        let mut doc = load_document(&base_receipt_bytes()).unwrap();
        let err = append_pdf_pages(&mut doc, b"not a pdf").unwrap_err();
        assert!(matches!(err, FormPressError::Attachment(_)));
        // The base document is untouched.
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn merge_failure_leaves_base_bytes_loadable() {
        let base = base_receipt_bytes();
        let mut doc = load_document(&base).unwrap();
        let _ = append_pdf_pages(&mut doc, b"garbage");
        let bytes = save_document(doc).unwrap();
        assert_eq!(load_document(&bytes).unwrap().get_pages().len(), 1);
    }
}
