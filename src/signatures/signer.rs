//! PDF signing.
//!
//! A signature is appended as one incremental revision holding the field
//! values (if any), the signature dictionary, the signature field and its
//! widget. Placeholders for `/ByteRange` and `/Contents` are reserved at a
//! fixed width, the revision is serialized, and both are patched in place.
//! All earlier bytes are untouched, so earlier signatures stay valid.

use super::appearance::signature_appearance;
use super::byterange::ByteRangeCalculator;
use super::pkcs7::build_detached_signature;
use super::types::{SignOptions, SignaturePlacement, SignatureRequest, SigningCredentials};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::forms::field_flags::AnnotationFlags;
use crate::forms::tree::{acroform_mut, collect_fields, push_field};
use crate::forms::{apply_field_values, FieldValue};
use crate::object::{Dict, Object, ObjectRef};
use chrono::{DateTime, Local, Offset, TimeZone};
use std::collections::HashSet;

/// `/SigFlags`: SignaturesExist | AppendOnly
const SIG_FLAGS: i64 = 3;

/// Transform parameters version
const TRANSFORM_VERSION: &str = "1.2";

/// Fill, sign and return the new file in one incremental revision.
pub fn sign_pdf(
    master: &[u8],
    request: &SignatureRequest,
    fields: &[FieldValue],
    placement: Option<&SignaturePlacement>,
    credentials: &SigningCredentials,
    options: &SignOptions,
) -> Result<Vec<u8>> {
    let mut doc = PdfDocument::load(master)?;
    apply_field_values(&mut doc, fields)?;

    let signed_at = Local::now();
    let calculator = ByteRangeCalculator::new(options.reserve);
    let signature = doc.add_object(Object::Dictionary(signature_dictionary(
        request,
        options,
        &calculator,
        &signed_at,
    )));

    if let SignatureRequest::Certification { .. } = request {
        let mut perms = Dict::new();
        perms.insert("DocMDP".to_string(), Object::Reference(signature));
        let catalog = doc.catalog_ref()?;
        doc.dict_mut(catalog)?.insert("Perms".to_string(), Object::Dictionary(perms));
    }

    let field = create_signature_field(&mut doc, signature, request.signer_name(), placement, options, &signed_at)?;
    log::debug!("Signature field {} holds signature {}", field, signature);

    let update = doc.write_incremental()?;
    let mut bytes = update.bytes;
    let span = update
        .offsets
        .get(&signature.id)
        .cloned()
        .ok_or_else(|| Error::Internal("signature dictionary was not written".to_string()))?;

    let contents_offset = ByteRangeCalculator::find_contents_offset(&bytes, span.clone())
        .ok_or_else(|| Error::Internal("signature /Contents placeholder not found".to_string()))?;
    let byte_range = calculator.calculate_byte_range(bytes.len(), contents_offset);
    ByteRangeCalculator::patch_byte_range(&mut bytes, span, &byte_range)?;
    ByteRangeCalculator::validate_byte_range(&byte_range, bytes.len())?;

    let signed_bytes = ByteRangeCalculator::extract_signed_bytes(&bytes, &byte_range)?;
    let cms = build_detached_signature(&signed_bytes, credentials)?;
    if cms.len() > options.reserve {
        return Err(Error::Internal(format!(
            "signature of {} bytes exceeds the {} byte reserve",
            cms.len(),
            options.reserve
        )));
    }
    calculator.insert_signature(&mut bytes, contents_offset, &bytes_to_hex(&cms))?;

    log::info!(
        "Signed by '{}': ByteRange {}, CMS {} bytes",
        request.signer_name(),
        ByteRangeCalculator::format_byte_range(&byte_range),
        cms.len()
    );
    Ok(bytes)
}

/// Build the signature dictionary with fixed-width placeholders.
fn signature_dictionary<Tz: TimeZone>(
    request: &SignatureRequest,
    options: &SignOptions,
    calculator: &ByteRangeCalculator,
    signed_at: &DateTime<Tz>,
) -> Dict {
    let signer = request.signer_name();
    let mut dict = Dict::new();
    dict.insert("Type".to_string(), Object::name("Sig"));
    dict.insert("Filter".to_string(), Object::name("Adobe.PPKLite"));
    dict.insert("SubFilter".to_string(), Object::name("adbe.pkcs7.detached"));
    dict.insert("Name".to_string(), Object::text(&format!("{} {}", options.name_prefix, signer)));
    dict.insert("Reason".to_string(), Object::text(&format!("Signature {}", signer)));
    dict.insert("M".to_string(), Object::text(&format_pdf_date(signed_at)));
    dict.insert("ByteRange".to_string(), ByteRangeCalculator::byte_range_placeholder());
    dict.insert("Contents".to_string(), calculator.contents_placeholder());

    let params = match request {
        SignatureRequest::Certification { permission, .. } => {
            let mut params = transform_params();
            params.insert("P".to_string(), Object::Integer(permission.value()));
            Some(("DocMDP", params))
        },
        SignatureRequest::Approval { fields_to_lock, .. } if !fields_to_lock.is_empty() => {
            let mut params = transform_params();
            params.insert("Action".to_string(), Object::name("Include"));
            params.insert(
                "Fields".to_string(),
                Object::Array(fields_to_lock.iter().map(|f| Object::text(f)).collect()),
            );
            Some(("FieldMDP", params))
        },
        SignatureRequest::Approval { .. } => None,
    };
    if let Some((method, params)) = params {
        let mut reference = Dict::new();
        reference.insert("Type".to_string(), Object::name("SigRef"));
        reference.insert("TransformMethod".to_string(), Object::name(method));
        reference.insert("TransformParams".to_string(), Object::Dictionary(params));
        dict.insert("Reference".to_string(), Object::Array(vec![Object::Dictionary(reference)]));
    }
    dict
}

fn transform_params() -> Dict {
    let mut params = Dict::new();
    params.insert("Type".to_string(), Object::name("TransformParams"));
    params.insert("V".to_string(), Object::name(TRANSFORM_VERSION));
    params
}

/// Create the signature field and widget, register it in the form and on
/// its page, and return its reference.
fn create_signature_field<Tz: TimeZone>(
    doc: &mut PdfDocument,
    signature: ObjectRef,
    signer_name: &str,
    placement: Option<&SignaturePlacement>,
    options: &SignOptions,
    signed_at: &DateTime<Tz>,
) -> Result<ObjectRef>
where
    Tz::Offset: std::fmt::Display,
{
    ensure_form(doc)?;
    if let Some(form) = acroform_mut(doc)? {
        form.insert("NeedAppearances".to_string(), Object::Boolean(false));
        form.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));
    }

    let taken: HashSet<String> = collect_fields(doc).into_iter().map(|f| f.full_name).collect();
    let name = (1..)
        .map(|n| format!("Signature{}", n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| "Signature".to_string());

    let pages = doc.page_refs()?;
    let page_index = placement.map_or(0, |p| p.page.min(pages.len().saturating_sub(1)));
    let page = pages
        .get(page_index)
        .copied()
        .ok_or_else(|| Error::InvalidPdf("document has no pages".to_string()))?;

    let flags = AnnotationFlags::PRINT | AnnotationFlags::LOCKED;
    let mut widget = Dict::new();
    widget.insert("FT".to_string(), Object::name("Sig"));
    widget.insert("T".to_string(), Object::text(&name));
    widget.insert("V".to_string(), Object::Reference(signature));
    widget.insert("Type".to_string(), Object::name("Annot"));
    widget.insert("Subtype".to_string(), Object::name("Widget"));
    widget.insert("F".to_string(), Object::Integer(i64::from(flags.bits())));
    widget.insert("P".to_string(), Object::Reference(page));

    match placement {
        Some(p) => {
            widget.insert("Rect".to_string(), Object::rect(p.x, p.y, p.width, p.height));
            let ap = signature_appearance(p.width, p.height, &options.label, signer_name, signed_at)?;
            let ap = doc.add_object(ap);
            let mut states = Dict::new();
            states.insert("N".to_string(), Object::Reference(ap));
            widget.insert("AP".to_string(), Object::Dictionary(states));
        },
        None => {
            widget.insert("Rect".to_string(), Object::rect(0.0, 0.0, 0.0, 0.0));
        },
    }

    let field = doc.add_object(Object::Dictionary(widget));
    push_field(doc, field)?;
    add_annotation(doc, page, field)?;
    log::debug!("Created signature field '{}' on page {}", name, page_index);
    Ok(field)
}

/// Create an empty interactive form when the document has none.
fn ensure_form(doc: &mut PdfDocument) -> Result<()> {
    if acroform_mut(doc)?.is_some() {
        return Ok(());
    }
    log::warn!("Document has no interactive form, creating one for the signature field");
    let mut form = Dict::new();
    form.insert("Fields".to_string(), Object::Array(Vec::new()));
    let form = doc.add_object(Object::Dictionary(form));
    let catalog = doc.catalog_ref()?;
    doc.dict_mut(catalog)?.insert("AcroForm".to_string(), Object::Reference(form));
    Ok(())
}

/// Append an annotation to a page's `/Annots`, wherever the array lives.
fn add_annotation(doc: &mut PdfDocument, page: ObjectRef, annot: ObjectRef) -> Result<()> {
    let indirect = doc
        .get(page)
        .and_then(Object::as_dict)
        .and_then(|p| p.get("Annots"))
        .and_then(Object::as_reference)
        .filter(|r| matches!(doc.get(*r), Some(Object::Array(_))));

    let annots = match indirect {
        Some(r) => doc.get_mut(r),
        None => {
            let dict = doc.dict_mut(page)?;
            if !matches!(dict.get("Annots"), Some(Object::Array(_))) {
                dict.insert("Annots".to_string(), Object::Array(Vec::new()));
            }
            dict.get_mut("Annots")
        },
    };
    if let Some(Object::Array(items)) = annots {
        items.push(Object::Reference(annot));
    }
    Ok(())
}

/// Convert bytes to uppercase hex string.
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8] = b"0123456789ABCDEF";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}

/// Format a time as a PDF date string: `D:YYYYMMDDHHmmSS+HH'mm'`.
pub(crate) fn format_pdf_date<Tz: TimeZone>(time: &DateTime<Tz>) -> String {
    let offset = time.offset().fix().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!(
        "D:{}{}{:02}'{:02}'",
        time.naive_local().format("%Y%m%d%H%M%S"),
        sign,
        minutes / 60,
        minutes % 60
    )
}
