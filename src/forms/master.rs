//! Master document construction from field placements.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::fonts::StandardFont;
use crate::forms::field_flags::AnnotationFlags;
use crate::forms::{FieldKind, FieldPlacement};
use crate::object::{Dict, Object, ObjectRef};

/// Resource name of the form's default font
pub(crate) const DEFAULT_FONT: &str = "Helv";

/// `/DA` of the interactive form itself
const FORM_DA: &str = "/Helv 0 Tf 0 g";

/// `/DA` of text fields
const TEXT_DA: &str = "/Helv 10 Tf 0 g";

/// `/DA` of toggle fields (auto size)
const TOGGLE_DA: &str = "/Helv 0 Tf 0 g";

/// Rebuild the document's form from `placements`.
///
/// Existing widgets and the original form are discarded. Every placement
/// becomes a text field carrying `/Assign` (owner) and `/FieldType`
/// (semantic type), merged with a single printable widget. The result is
/// a full save.
pub fn create_master_pdf(original: &[u8], placements: &[FieldPlacement]) -> Result<Vec<u8>> {
    let mut doc = PdfDocument::load(original)?;
    let pages = doc.page_refs()?;

    if let Some(bad) = placements.iter().find(|p| p.page >= pages.len()) {
        return Err(Error::BadRequest(format!(
            "field '{}' is on page {} but the document has {} page(s)",
            bad.field_name,
            bad.page,
            pages.len()
        )));
    }

    let mut annots: Vec<Vec<Object>> = Vec::with_capacity(pages.len());
    for page in &pages {
        annots.push(non_widget_annotations(&doc, *page));
    }

    let font = doc.add_object(StandardFont::Helvetica.font_dict());
    let mut fields = Vec::with_capacity(placements.len());
    for placement in placements {
        let page = pages[placement.page];
        let field = doc.add_object(Object::Dictionary(field_dict(placement, page)));
        annots[placement.page].push(Object::Reference(field));
        fields.push(Object::Reference(field));
        log::debug!(
            "Created field '{}' ({}) for '{}' on page {}",
            placement.field_name,
            placement.field_type,
            placement.assigned_to,
            placement.page
        );
    }

    for (page, page_annots) in pages.iter().zip(annots) {
        let dict = doc.dict_mut(*page)?;
        if page_annots.is_empty() {
            dict.remove("Annots");
        } else {
            dict.insert("Annots".to_string(), Object::Array(page_annots));
        }
    }

    let mut font_resources = Dict::new();
    font_resources.insert(DEFAULT_FONT.to_string(), Object::Reference(font));
    let mut resources = Dict::new();
    resources.insert("Font".to_string(), Object::Dictionary(font_resources));

    let mut form = Dict::new();
    form.insert("Fields".to_string(), Object::Array(fields));
    form.insert("DR".to_string(), Object::Dictionary(resources));
    form.insert("DA".to_string(), Object::text(FORM_DA));
    form.insert("NeedAppearances".to_string(), Object::Boolean(true));
    let form = doc.add_object(Object::Dictionary(form));

    let catalog = doc.catalog_ref()?;
    let catalog = doc.dict_mut(catalog)?;
    catalog.insert("AcroForm".to_string(), Object::Reference(form));
    catalog.remove("Perms");

    log::info!("Master document built with {} field(s)", placements.len());
    doc.save_full()
}

fn field_dict(placement: &FieldPlacement, page: ObjectRef) -> Dict {
    let da = match placement.field_type {
        FieldKind::Text => TEXT_DA,
        FieldKind::Checkbox | FieldKind::Radio => TOGGLE_DA,
    };
    let mut dict = Dict::new();
    dict.insert("FT".to_string(), Object::name("Tx"));
    dict.insert("T".to_string(), Object::text(&placement.field_name));
    dict.insert("DA".to_string(), Object::text(da));
    dict.insert("Assign".to_string(), Object::text(&placement.assigned_to));
    dict.insert("FieldType".to_string(), Object::text(placement.field_type.as_str()));
    dict.insert("Type".to_string(), Object::name("Annot"));
    dict.insert("Subtype".to_string(), Object::name("Widget"));
    dict.insert(
        "Rect".to_string(),
        Object::rect(placement.x, placement.y, placement.width, placement.height),
    );
    dict.insert("P".to_string(), Object::Reference(page));
    dict.insert("F".to_string(), Object::Integer(i64::from(AnnotationFlags::PRINT.bits())));
    dict
}

/// A page's annotations with every widget removed.
fn non_widget_annotations(doc: &PdfDocument, page: ObjectRef) -> Vec<Object> {
    let Some(annots) = doc
        .get(page)
        .and_then(Object::as_dict)
        .and_then(|p| p.get("Annots"))
        .and_then(|a| doc.resolve_array(a))
    else {
        return Vec::new();
    };
    annots
        .iter()
        .filter(|annot| {
            doc.resolve_dict(annot)
                .and_then(|d| d.get("Subtype"))
                .and_then(Object::as_name)
                != Some("Widget")
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::extract_fields;
    use crate::forms::tree::{acroform, collect_fields};
    use crate::test_support::{blank_pdf, build_pdf};

    fn placement(name: &str, kind: FieldKind, page: usize) -> FieldPlacement {
        FieldPlacement {
            field_name: name.to_string(),
            assigned_to: "jean-dupont".to_string(),
            field_type: kind,
            page,
            x: 72.0,
            y: 600.0,
            width: 200.0,
            height: 20.0,
        }
    }

    #[test]
    fn test_fields_carry_metadata() {
        let bytes = create_master_pdf(
            &blank_pdf(2),
            &[
                placement("name", FieldKind::Text, 0),
                placement("agree", FieldKind::Checkbox, 1),
            ],
        )
        .unwrap();
        let doc = PdfDocument::load(&bytes).unwrap();
        let form = acroform(&doc).unwrap();
        assert_eq!(form.get("NeedAppearances"), Some(&Object::Boolean(true)));

        let fields = collect_fields(&doc);
        assert_eq!(fields.len(), 2);
        for field in &fields {
            assert_eq!(field.field_type.as_deref(), Some("Tx"));
            let dict = doc.get(field.reference).unwrap().as_dict().unwrap();
            assert_eq!(dict["Assign"].as_text().as_deref(), Some("jean-dupont"));
        }
        let agree = fields.iter().find(|f| f.full_name == "agree").unwrap();
        let dict = doc.get(agree.reference).unwrap().as_dict().unwrap();
        assert_eq!(dict["FieldType"].as_text().as_deref(), Some("checkbox"));
        assert_eq!(dict["DA"].as_text().as_deref(), Some(TOGGLE_DA));

        let detected = extract_fields(&bytes).unwrap();
        let agree = detected.iter().find(|f| f.field_name == "agree").unwrap();
        assert_eq!(agree.page, 1);
        assert_eq!((agree.x, agree.y, agree.width, agree.height), (72.0, 600.0, 200.0, 20.0));
    }

    #[test]
    fn test_page_out_of_range() {
        let err = create_master_pdf(&blank_pdf(1), &[placement("x", FieldKind::Text, 3)]).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_old_widgets_removed() {
        let original = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [4 0 R] >> >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [4 0 R 5 0 R] >>",
            "<< /T (old) /FT /Tx /Subtype /Widget /Rect [0 0 10 10] >>",
            "<< /Subtype /Link /Rect [0 0 10 10] >>",
        ]);
        let bytes = create_master_pdf(&original, &[placement("new", FieldKind::Text, 0)]).unwrap();
        let doc = PdfDocument::load(&bytes).unwrap();
        let names: Vec<String> = collect_fields(&doc).into_iter().map(|f| f.full_name).collect();
        assert_eq!(names, vec!["new".to_string()]);

        let page = doc.page_refs().unwrap()[0];
        let annots = doc.get(page).unwrap().as_dict().unwrap()["Annots"].as_array().unwrap();
        assert_eq!(annots.len(), 2);
    }

    #[test]
    fn test_no_placements_yields_empty_form() {
        let bytes = create_master_pdf(&blank_pdf(1), &[]).unwrap();
        let doc = PdfDocument::load(&bytes).unwrap();
        assert!(acroform(&doc).is_some());
        assert!(collect_fields(&doc).is_empty());
    }
}
