//! Flattening: burning field values into page content.
//!
//! Each visible widget's appearance is painted as a Form XObject at the
//! widget rectangle. Text fields are always regenerated from `/V` and
//! `/DA`; other fields keep the appearance they already have. The original
//! page content is wrapped in `q`/`Q` so its graphics state cannot leak
//! into the painted appearances. Widgets and the form are then removed.

use crate::document::PdfDocument;
use crate::error::Result;
use crate::forms::appearance::text_field_appearance;
use crate::forms::field_flags::AnnotationFlags;
use crate::forms::tree::{acroform_mut, collect_fields, widget_rect};
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::ContentStreamBuilder;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Maximum `/Parent` hops when looking up inherited page resources
const MAX_INHERIT_DEPTH: usize = 32;

/// An appearance to paint on a page.
struct Stamp {
    xobject: ObjectRef,
    x: f64,
    y: f64,
}

/// Flatten a document and return a full save.
pub fn flatten_pdf(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut doc = PdfDocument::load(bytes)?;
    flatten_document(&mut doc)?;
    doc.save_full()
}

/// Flatten a loaded document in place.
///
/// A document without an interactive form is left untouched.
pub fn flatten_document(doc: &mut PdfDocument) -> Result<()> {
    match acroform_mut(doc)? {
        Some(form) => {
            form.insert("NeedAppearances".to_string(), Object::Boolean(true));
        },
        None => {
            log::debug!("No interactive form, nothing to flatten");
            return Ok(());
        },
    }

    let pages = doc.page_refs()?;
    let page_set: HashSet<ObjectRef> = pages.iter().copied().collect();
    let annot_pages = annotation_owners(doc, &pages);

    let mut stamps: BTreeMap<ObjectRef, Vec<Stamp>> = BTreeMap::new();
    let mut painted = 0usize;
    for field in collect_fields(doc) {
        let value = doc
            .get(field.reference)
            .and_then(Object::as_dict)
            .and_then(|d| d.get("V"))
            .map(|v| match doc.resolve(v) {
                Object::Name(name) => name.clone(),
                other => other.as_text().unwrap_or_default(),
            })
            .unwrap_or_default();

        for widget_ref in &field.widgets {
            let Some(widget) = doc.get(*widget_ref).and_then(Object::as_dict) else {
                continue;
            };
            let flags = widget
                .get("F")
                .and_then(Object::as_integer)
                .and_then(|f| u32::try_from(f).ok())
                .map(AnnotationFlags::from_bits_retain)
                .unwrap_or_default();
            if flags.intersects(AnnotationFlags::HIDDEN | AnnotationFlags::INVISIBLE) {
                continue;
            }
            let Some((x, y, width, height)) = widget_rect(doc, widget) else {
                continue;
            };
            if width <= 0.0 || height <= 0.0 {
                continue;
            }
            let page = widget
                .get("P")
                .and_then(Object::as_reference)
                .filter(|p| page_set.contains(p))
                .or_else(|| annot_pages.get(widget_ref).copied());
            let Some(page) = page else {
                log::debug!("Widget {} of '{}' is on no page", widget_ref, field.full_name);
                continue;
            };

            let xobject = if field.field_type.as_deref() == Some("Tx") {
                let ap = text_field_appearance(
                    doc,
                    &value,
                    field.default_appearance.as_deref(),
                    width,
                    height,
                )?;
                Some(doc.add_object(ap))
            } else {
                match existing_appearance(doc, widget) {
                    Some(Object::Reference(r)) => Some(r),
                    Some(stream) => Some(doc.add_object(stream)),
                    None => None,
                }
            };
            if let Some(xobject) = xobject {
                stamps.entry(page).or_default().push(Stamp { xobject, x, y });
                painted += 1;
            }
        }
    }

    for (page, page_stamps) in stamps {
        stamp_page(doc, page, &page_stamps)?;
    }

    for page in &pages {
        remove_widgets(doc, *page)?;
    }
    let catalog = doc.catalog_ref()?;
    let catalog = doc.dict_mut(catalog)?;
    catalog.remove("AcroForm");
    catalog.remove("Perms");

    log::info!("Flattened {} widget appearance(s) on {} page(s)", painted, pages.len());
    Ok(())
}

/// Map from annotation reference to the page listing it.
fn annotation_owners(doc: &PdfDocument, pages: &[ObjectRef]) -> HashMap<ObjectRef, ObjectRef> {
    let mut owners = HashMap::new();
    for page in pages {
        let annots = doc
            .get(*page)
            .and_then(Object::as_dict)
            .and_then(|p| p.get("Annots"))
            .and_then(|a| doc.resolve_array(a));
        for annot in annots.into_iter().flatten() {
            if let Some(r) = annot.as_reference() {
                owners.insert(r, *page);
            }
        }
    }
    owners
}

/// The widget's current normal appearance: a reference to a stream, or a
/// direct stream.
fn existing_appearance(doc: &PdfDocument, widget: &Dict) -> Option<Object> {
    let normal = doc
        .resolve_dict(widget.get("AP")?)?
        .get("N")?
        .clone();
    let chosen = match doc.resolve(&normal) {
        Object::Stream { .. } => normal,
        Object::Dictionary(states) => {
            let state = widget.get("AS").and_then(Object::as_name)?;
            states.get(state)?.clone()
        },
        _ => return None,
    };
    match &chosen {
        Object::Reference(r) if matches!(doc.get(*r), Some(Object::Stream { .. })) => Some(chosen),
        Object::Stream { .. } => Some(chosen),
        _ => None,
    }
}

/// Wrap the page content and paint `stamps` after it.
fn stamp_page(doc: &mut PdfDocument, page: ObjectRef, stamps: &[Stamp]) -> Result<()> {
    let mut resources = inherited_resources(doc, page);
    let mut xobjects = resources
        .get("XObject")
        .and_then(|x| doc.resolve_dict(x))
        .cloned()
        .unwrap_or_default();

    let mut suffix = ContentStreamBuilder::new();
    suffix.restore_state();
    let mut counter = 0usize;
    for stamp in stamps {
        let name = loop {
            counter += 1;
            let candidate = format!("Flat{}", counter);
            if !xobjects.contains_key(&candidate) {
                break candidate;
            }
        };
        xobjects.insert(name.clone(), Object::Reference(stamp.xobject));
        suffix
            .save_state()
            .transform(1.0, 0.0, 0.0, 1.0, stamp.x, stamp.y)
            .paint_xobject(&name)
            .restore_state();
    }
    resources.insert("XObject".to_string(), Object::Dictionary(xobjects));

    let mut prefix = ContentStreamBuilder::new();
    prefix.save_state();
    let prefix = doc.add_object(content_stream(prefix.build()?));
    let suffix = doc.add_object(content_stream(suffix.build()?));

    let mut contents = vec![Object::Reference(prefix)];
    let existing = doc
        .get(page)
        .and_then(Object::as_dict)
        .and_then(|p| p.get("Contents"))
        .cloned();
    match existing {
        Some(Object::Reference(r)) => match doc.get(r) {
            Some(Object::Array(items)) => contents.extend(items.iter().cloned()),
            Some(_) => contents.push(Object::Reference(r)),
            None => {},
        },
        Some(Object::Array(items)) => contents.extend(items),
        _ => {},
    }
    contents.push(Object::Reference(suffix));

    let dict = doc.dict_mut(page)?;
    dict.insert("Contents".to_string(), Object::Array(contents));
    dict.insert("Resources".to_string(), Object::Dictionary(resources));
    Ok(())
}

fn content_stream(data: Vec<u8>) -> Object {
    Object::Stream {
        dict: Dict::new(),
        data: Bytes::from(data),
    }
}

/// The page's resources, following `/Parent` when they are inherited.
fn inherited_resources(doc: &PdfDocument, page: ObjectRef) -> Dict {
    let mut current = doc.get(page).and_then(Object::as_dict);
    for _ in 0..MAX_INHERIT_DEPTH {
        let Some(node) = current else {
            break;
        };
        if let Some(resources) = node.get("Resources").and_then(|r| doc.resolve_dict(r)) {
            return resources.clone();
        }
        current = node.get("Parent").and_then(|p| doc.resolve_dict(p));
    }
    Dict::new()
}

/// Drop every widget annotation from a page.
fn remove_widgets(doc: &mut PdfDocument, page: ObjectRef) -> Result<()> {
    let Some(annots) = doc
        .get(page)
        .and_then(Object::as_dict)
        .and_then(|p| p.get("Annots"))
        .and_then(|a| doc.resolve_array(a))
    else {
        return Ok(());
    };
    let kept: Vec<Object> = annots
        .iter()
        .filter(|a| {
            doc.resolve_dict(a)
                .and_then(|d| d.get("Subtype"))
                .and_then(Object::as_name)
                != Some("Widget")
        })
        .cloned()
        .collect();
    if kept.len() == annots.len() {
        return Ok(());
    }

    let dict = doc.dict_mut(page)?;
    if kept.is_empty() {
        dict.remove("Annots");
    } else {
        dict.insert("Annots".to_string(), Object::Array(kept));
    }
    Ok(())
}
