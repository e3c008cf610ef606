//! Writing submitted values into the master document's fields.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::forms::appearance::text_field_appearance;
use crate::forms::field_flags::FieldFlags;
use crate::forms::tree::{acroform, collect_fields, widget_rect, FieldNode};
use crate::forms::{FieldKind, FieldValue};
use crate::object::{Dict, Object};
use std::collections::HashMap;

/// Stored value of a checked toggle field
const TOGGLE_ON: &str = "X";

/// Write `values` into the form and mark each written field read-only.
///
/// Toggle fields (per their `/FieldType` tag) store `X` for a
/// case-insensitive "true" and an empty string otherwise. Every widget
/// gets a fresh normal appearance showing the stored value, so the change
/// is visible without viewer-side regeneration. Nothing is saved; the
/// caller chooses how.
pub fn apply_field_values(doc: &mut PdfDocument, values: &[FieldValue]) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    if acroform(doc).is_none() {
        return Err(Error::Internal("master document has no interactive form".to_string()));
    }

    let form_da = acroform(doc)
        .and_then(|form| form.get("DA"))
        .and_then(|da| doc.resolve(da).as_text());
    let fields: HashMap<String, FieldNode> = collect_fields(doc)
        .into_iter()
        .map(|f| (f.full_name.clone(), f))
        .collect();

    for value in values {
        let field = fields
            .get(&value.field_name)
            .ok_or_else(|| Error::NotFound(format!("field '{}' not found in master document", value.field_name)))?;

        let kind = FieldKind::parse(field_type_tag(doc, field).as_deref());
        let stored = if kind.is_toggle() {
            if value.value.trim().eq_ignore_ascii_case("true") {
                TOGGLE_ON
            } else {
                ""
            }
        } else {
            value.value.as_str()
        };

        let flags = field.flags | FieldFlags::READ_ONLY;
        let dict = doc.dict_mut(field.reference)?;
        dict.insert("V".to_string(), Object::text(stored));
        dict.insert("Ff".to_string(), Object::Integer(i64::from(flags.bits())));

        let da = field.default_appearance.as_deref().or(form_da.as_deref());
        for widget in &field.widgets {
            let rect = doc
                .get(*widget)
                .and_then(Object::as_dict)
                .and_then(|w| widget_rect(doc, w))
                .filter(|&(_, _, width, height)| width > 0.0 && height > 0.0);
            let Some((_, _, width, height)) = rect else {
                doc.dict_mut(*widget)?.remove("AP");
                continue;
            };
            let appearance = text_field_appearance(doc, stored, da, width, height)?;
            let normal = doc.add_object(appearance);
            let mut ap = Dict::new();
            ap.insert("N".to_string(), Object::Reference(normal));
            doc.dict_mut(*widget)?.insert("AP".to_string(), Object::Dictionary(ap));
        }
        log::debug!("Set field '{}' ({}) to {:?}", value.field_name, kind, stored);
    }

    log::info!("Applied {} field value(s)", values.len());
    Ok(())
}

/// The `/FieldType` entry, stored as a string or a name.
pub(crate) fn field_type_tag(doc: &PdfDocument, field: &FieldNode) -> Option<String> {
    let entry = doc.get(field.reference)?.as_dict()?.get("FieldType")?;
    match doc.resolve(entry) {
        Object::Name(name) => Some(name.clone()),
        other => other.as_text(),
    }
}
