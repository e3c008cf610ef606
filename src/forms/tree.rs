//! Interactive form (AcroForm) access and field tree traversal.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::forms::field_flags::FieldFlags;
use crate::object::{Dict, Object, ObjectRef};
use std::collections::HashSet;

/// Maximum nesting of the field hierarchy
const MAX_FIELD_DEPTH: usize = 32;

/// A terminal field with the attributes it inherits from its ancestors.
#[derive(Debug, Clone)]
pub struct FieldNode {
    /// The field dictionary
    pub reference: ObjectRef,
    /// Fully qualified name (`parent.child`)
    pub full_name: String,
    /// Partial name (`/T`)
    pub partial_name: String,
    /// Inherited `/FT`
    pub field_type: Option<String>,
    /// Inherited `/Ff`
    pub flags: FieldFlags,
    /// Inherited `/DA`
    pub default_appearance: Option<String>,
    /// Widget annotations, possibly the field dictionary itself
    pub widgets: Vec<ObjectRef>,
}

/// The interactive form dictionary, if the document has one.
pub fn acroform(doc: &PdfDocument) -> Option<&Dict> {
    let catalog = doc.catalog().ok()?;
    doc.resolve_dict(catalog.get("AcroForm")?)
}

/// Mutable access to the interactive form dictionary, wherever it lives.
pub fn acroform_mut(doc: &mut PdfDocument) -> Result<Option<&mut Dict>> {
    let catalog_ref = doc.catalog_ref()?;
    let indirect = match doc.catalog()?.get("AcroForm") {
        Some(Object::Reference(r)) => Some(*r),
        Some(Object::Dictionary(_)) => None,
        _ => return Ok(None),
    };
    match indirect {
        Some(r) => doc.dict_mut(r).map(Some),
        None => Ok(doc
            .dict_mut(catalog_ref)?
            .get_mut("AcroForm")
            .and_then(Object::as_dict_mut)),
    }
}

/// Walk `/Fields` and return every terminal field.
pub fn collect_fields(doc: &PdfDocument) -> Vec<FieldNode> {
    let Some(form) = acroform(doc) else {
        return Vec::new();
    };
    let roots = form
        .get("Fields")
        .and_then(|f| doc.resolve_array(f))
        .cloned()
        .unwrap_or_default();

    let inherited = Inherited {
        name: String::new(),
        field_type: None,
        flags: FieldFlags::empty(),
        default_appearance: form.get("DA").and_then(|da| doc.resolve(da).as_text()),
    };

    let mut out = Vec::new();
    let mut visited = HashSet::new();
    for root in roots {
        if let Some(r) = root.as_reference() {
            walk(doc, r, &inherited, 0, &mut visited, &mut out);
        }
    }
    out
}

/// Find a terminal field by fully qualified name.
pub fn find_field(doc: &PdfDocument, name: &str) -> Option<FieldNode> {
    collect_fields(doc).into_iter().find(|f| f.full_name == name)
}

/// Append a field reference to `/Fields`, creating the array if needed.
pub fn push_field(doc: &mut PdfDocument, field: ObjectRef) -> Result<()> {
    let existing = acroform(doc)
        .and_then(|form| form.get("Fields"))
        .map(|fields| doc.resolve_array(fields).cloned().unwrap_or_default());
    let mut fields = existing.unwrap_or_default();
    fields.push(Object::Reference(field));

    let form = acroform_mut(doc)?
        .ok_or_else(|| Error::Internal("document has no interactive form".to_string()))?;
    form.insert("Fields".to_string(), Object::Array(fields));
    Ok(())
}

struct Inherited {
    name: String,
    field_type: Option<String>,
    flags: FieldFlags,
    default_appearance: Option<String>,
}

fn walk(
    doc: &PdfDocument,
    node_ref: ObjectRef,
    parent: &Inherited,
    depth: usize,
    visited: &mut HashSet<ObjectRef>,
    out: &mut Vec<FieldNode>,
) {
    if depth > MAX_FIELD_DEPTH || !visited.insert(node_ref) {
        log::warn!("Skipping field {} (cycle or excessive depth)", node_ref);
        return;
    }
    let Some(dict) = doc.get(node_ref).and_then(Object::as_dict) else {
        return;
    };

    let partial_name = dict
        .get("T")
        .and_then(|t| doc.resolve(t).as_text())
        .unwrap_or_default();
    let full_name = match (parent.name.is_empty(), partial_name.is_empty()) {
        (true, _) => partial_name.clone(),
        (false, true) => parent.name.clone(),
        (false, false) => format!("{}.{}", parent.name, partial_name),
    };
    let inherited = Inherited {
        name: full_name.clone(),
        field_type: dict
            .get("FT")
            .and_then(|ft| doc.resolve(ft).as_name())
            .map(str::to_string)
            .or_else(|| parent.field_type.clone()),
        flags: dict
            .get("Ff")
            .and_then(|ff| doc.resolve(ff).as_integer())
            .map(FieldFlags::from_value)
            .unwrap_or(parent.flags),
        default_appearance: dict
            .get("DA")
            .and_then(|da| doc.resolve(da).as_text())
            .or_else(|| parent.default_appearance.clone()),
    };

    let kids: Vec<ObjectRef> = dict
        .get("Kids")
        .and_then(|k| doc.resolve_array(k))
        .map(|kids| kids.iter().filter_map(Object::as_reference).collect())
        .unwrap_or_default();

    let kids_are_fields = kids.iter().any(|kid| {
        doc.get(*kid)
            .and_then(Object::as_dict)
            .is_some_and(|d| d.contains_key("T"))
    });

    if kids_are_fields {
        for kid in kids {
            walk(doc, kid, &inherited, depth + 1, visited, out);
        }
        return;
    }

    let widgets = if kids.is_empty() {
        let is_widget = dict.get("Subtype").and_then(Object::as_name) == Some("Widget")
            || dict.contains_key("Rect");
        if is_widget {
            vec![node_ref]
        } else {
            Vec::new()
        }
    } else {
        kids
    };

    out.push(FieldNode {
        reference: node_ref,
        full_name,
        partial_name,
        field_type: inherited.field_type,
        flags: inherited.flags,
        default_appearance: inherited.default_appearance,
        widgets,
    });
}

/// Normalized widget rectangle as (x, y, width, height).
pub fn widget_rect(doc: &PdfDocument, widget: &Dict) -> Option<(f64, f64, f64, f64)> {
    let rect = doc.resolve_array(widget.get("Rect")?)?;
    if rect.len() != 4 {
        return None;
    }
    let coords: Vec<f64> = rect
        .iter()
        .map(|v| doc.resolve(v).as_number())
        .collect::<Option<_>>()?;
    let (x1, y1, x2, y2) = (coords[0], coords[1], coords[2], coords[3]);
    Some((x1.min(x2), y1.min(y2), (x2 - x1).abs(), (y2 - y1).abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::test_support::form_document;

    #[test]
    fn test_hierarchical_names_and_inheritance() {
        let doc = form_document(
            "<< /T (parent) /FT /Tx /Ff 4096 /Kids [6 0 R] >>",
            &["<< /T (child) /Parent 5 0 R /Subtype /Widget /Rect [0 0 10 10] >>"],
        );
        let fields = collect_fields(&doc);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].full_name, "parent.child");
        assert_eq!(fields[0].field_type.as_deref(), Some("Tx"));
        assert!(fields[0].flags.contains(FieldFlags::MULTILINE));
        assert_eq!(fields[0].widgets, vec![ObjectRef::new(6, 0)]);
    }

    #[test]
    fn test_widget_kids_without_names() {
        let doc = form_document(
            "<< /T (choice) /FT /Btn /Ff 32768 /Kids [6 0 R 7 0 R] >>",
            &[
                "<< /Parent 5 0 R /Subtype /Widget /Rect [0 0 10 10] >>",
                "<< /Parent 5 0 R /Subtype /Widget /Rect [20 0 30 10] >>",
            ],
        );
        let fields = collect_fields(&doc);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].widgets.len(), 2);
        assert!(find_field(&doc, "choice").is_some());
        assert!(find_field(&doc, "missing").is_none());
    }

    #[test]
    fn test_normalized_rect() {
        let doc = form_document("<< /T (a) /FT /Tx /Subtype /Widget /Rect [50 80 10 20] >>", &[]);
        let field = &collect_fields(&doc)[0];
        let widget = doc.get(field.widgets[0]).and_then(Object::as_dict).unwrap();
        assert_eq!(widget_rect(&doc, widget), Some((10.0, 20.0, 40.0, 60.0)));
    }
}
