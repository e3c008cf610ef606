//! Detection of the interactive fields of an uploaded document.

use crate::document::PdfDocument;
use crate::error::Result;
use crate::forms::field_flags::FieldFlags;
use crate::forms::tree::{acroform, collect_fields, widget_rect, FieldNode};
use crate::forms::{DetectedField, FieldKind};
use crate::object::{Object, ObjectRef};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

lazy_static! {
    /// Disambiguator for names that still collide after widget indexing.
    /// Seeded from the clock so suffixes differ between processes.
    static ref NAME_SUFFIX: AtomicU64 = AtomicU64::new(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .map(|n| n.unsigned_abs())
            .unwrap_or(1)
    );
}

/// Detect the text, checkbox and radio fields of a document.
pub fn extract_fields(bytes: &[u8]) -> Result<Vec<DetectedField>> {
    let doc = PdfDocument::load(bytes)?;
    extract_from_document(&doc)
}

/// Detect the fields of an already loaded document.
pub fn extract_from_document(doc: &PdfDocument) -> Result<Vec<DetectedField>> {
    if acroform(doc).is_none() {
        log::debug!("No interactive form, nothing to extract");
        return Ok(Vec::new());
    }

    let pages = PageLookup::new(doc)?;
    let mut used = HashSet::new();
    let mut unnamed = 0usize;
    let mut result = Vec::new();

    for field in collect_fields(doc) {
        let Some(kind) = control_kind(&field) else {
            log::debug!("Skipping field '{}' ({:?})", field.full_name, field.field_type);
            continue;
        };

        let base = if field.full_name.trim().is_empty() {
            let name = format!("{}_imported_{}", kind, unnamed);
            unnamed += 1;
            name
        } else {
            field.full_name.clone()
        };
        let group_name = (kind == FieldKind::Radio).then(|| field.partial_name.clone());
        let several = field.widgets.len() > 1;

        for (index, widget_ref) in field.widgets.iter().enumerate() {
            let Some(widget) = doc.get(*widget_ref).and_then(Object::as_dict) else {
                continue;
            };
            let Some((x, y, width, height)) = widget_rect(doc, widget) else {
                log::debug!("Widget {} of '{}' has no /Rect", widget_ref, base);
                continue;
            };

            let mut name = if several {
                format!("{}_{}", base, index)
            } else {
                base.clone()
            };
            while used.contains(&name) {
                name = format!("{}_{}", name, NAME_SUFFIX.fetch_add(1, Ordering::Relaxed));
            }
            used.insert(name.clone());

            result.push(DetectedField {
                field_name: name,
                field_type: kind,
                page: pages.page_of(*widget_ref, widget.get("P")),
                x,
                y,
                width,
                height,
                group_name: group_name.clone(),
            });
        }
    }

    log::info!("Detected {} form field(s)", result.len());
    Ok(result)
}

/// Supported control type of a terminal field.
fn control_kind(field: &FieldNode) -> Option<FieldKind> {
    match field.field_type.as_deref() {
        Some("Tx") => Some(FieldKind::Text),
        Some("Btn") if field.flags.contains(FieldFlags::PUSHBUTTON) => None,
        Some("Btn") if field.flags.contains(FieldFlags::RADIO) => Some(FieldKind::Radio),
        Some("Btn") => Some(FieldKind::Checkbox),
        _ => None,
    }
}

/// Page index lookups built once per extraction.
struct PageLookup {
    by_page: HashMap<ObjectRef, usize>,
    by_annot: HashMap<ObjectRef, usize>,
}

impl PageLookup {
    fn new(doc: &PdfDocument) -> Result<Self> {
        let by_page = doc.page_index_map()?;
        let mut by_annot = HashMap::new();
        for (page_ref, index) in &by_page {
            let annots = doc
                .get(*page_ref)
                .and_then(Object::as_dict)
                .and_then(|page| page.get("Annots"))
                .and_then(|a| doc.resolve_array(a));
            for annot in annots.into_iter().flatten() {
                if let Some(r) = annot.as_reference() {
                    by_annot.insert(r, *index);
                }
            }
        }
        Ok(Self { by_page, by_annot })
    }

    fn page_of(&self, widget: ObjectRef, page: Option<&Object>) -> usize {
        page.and_then(Object::as_reference)
            .and_then(|p| self.by_page.get(&p))
            .or_else(|| self.by_annot.get(&widget))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{blank_pdf, build_pdf, form_document};

    #[test]
    fn test_no_form_yields_nothing() {
        assert!(extract_fields(&blank_pdf(1)).unwrap().is_empty());
    }

    #[test]
    fn test_text_field_rect_is_native() {
        let doc = form_document(
            "<< /T (name) /FT /Tx /Subtype /Widget /Rect [100 700 300 720] /P 3 0 R >>",
            &[],
        );
        let fields = extract_from_document(&doc).unwrap();
        assert_eq!(fields.len(), 1);
        let f = &fields[0];
        assert_eq!(f.field_name, "name");
        assert_eq!(f.field_type, FieldKind::Text);
        assert_eq!((f.x, f.y, f.width, f.height), (100.0, 700.0, 200.0, 20.0));
        assert_eq!(f.page, 0);
        assert!(f.group_name.is_none());
    }

    #[test]
    fn test_radio_widgets_are_indexed() {
        let doc = form_document(
            "<< /T (color) /FT /Btn /Ff 32768 /Kids [6 0 R 7 0 R] >>",
            &[
                "<< /Parent 5 0 R /Subtype /Widget /Rect [0 0 10 10] >>",
                "<< /Parent 5 0 R /Subtype /Widget /Rect [20 0 30 10] >>",
            ],
        );
        let fields = extract_from_document(&doc).unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.field_name.as_str()).collect();
        assert_eq!(names, vec!["color_0", "color_1"]);
        assert!(fields.iter().all(|f| f.field_type == FieldKind::Radio));
        assert_eq!(fields[0].group_name.as_deref(), Some("color"));
    }

    #[test]
    fn test_push_buttons_and_signatures_skipped() {
        let doc = form_document(
            "<< /T (group) /Kids [6 0 R 7 0 R 8 0 R] >>",
            &[
                "<< /T (go) /Parent 5 0 R /FT /Btn /Ff 65536 /Rect [0 0 10 10] >>",
                "<< /T (sig) /Parent 5 0 R /FT /Sig /Rect [0 0 10 10] >>",
                "<< /T (ok) /Parent 5 0 R /FT /Btn /Rect [0 0 10 10] >>",
            ],
        );
        let fields = extract_from_document(&doc).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_name, "group.ok");
        assert_eq!(fields[0].field_type, FieldKind::Checkbox);
    }

    #[test]
    fn test_missing_rect_skipped() {
        let doc = form_document("<< /T (a) /FT /Tx /Subtype /Widget >>", &[]);
        assert!(extract_from_document(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_page_from_annots_and_unnamed() {
        let bytes = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [5 0 R 6 0 R] >> >>",
            "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [5 0 R 6 0 R] >>",
            "<< /FT /Tx /Subtype /Widget /Rect [0 0 50 10] >>",
            "<< /T (dup) /FT /Tx /Subtype /Widget /Rect [0 20 50 30] >>",
        ]);
        let fields = extract_fields(&bytes).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field_name, "text_imported_0");
        assert!(fields.iter().all(|f| f.page == 1));
    }

    #[test]
    fn test_colliding_names_disambiguated() {
        let doc = form_document(
            "<< /T (a) /Kids [6 0 R 7 0 R] >>",
            &[
                "<< /T (b_0) /Parent 5 0 R /FT /Tx /Rect [0 0 10 10] >>",
                "<< /T (b) /Parent 5 0 R /FT /Tx /Kids [8 0 R 9 0 R] >>",
                "<< /Parent 7 0 R /Subtype /Widget /Rect [0 0 10 10] >>",
                "<< /Parent 7 0 R /Subtype /Widget /Rect [0 20 10 30] >>",
            ],
        );
        let fields = extract_from_document(&doc).unwrap();
        let names: HashSet<&str> = fields.iter().map(|f| f.field_name.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains("a.b_0"));
        assert!(names.contains("a.b_1"));
    }
}
