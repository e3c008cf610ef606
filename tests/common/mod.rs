//! Shared builders and inspectors for integration tests.

#![allow(dead_code)]

use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use const_oid::db::rfc5911::ID_MESSAGE_DIGEST;
use der::asn1::OctetString;
use der::{Decode, SliceReader};
use pdf_cosign::config::WorkflowConfig;
use pdf_cosign::document::PdfDocument;
use pdf_cosign::forms::tree::collect_fields;
use pdf_cosign::object::{Dict, Object};
use pdf_cosign::signatures::{read_byte_range, SigningCredentials};
use pdf_cosign::workflow::WorkflowService;

pub const CERT_PEM: &str = include_str!("../fixtures/signing/platform_cert.pem");
pub const KEY_PEM: &str = include_str!("../fixtures/signing/platform_key.pem");

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn credentials() -> SigningCredentials {
    SigningCredentials::from_pem(CERT_PEM, KEY_PEM).expect("fixture credentials")
}

pub fn service() -> WorkflowService {
    init_logging();
    WorkflowService::in_memory(credentials(), WorkflowConfig::default())
}

/// Assemble a PDF from object bodies numbered from 1. Object 1 is the catalog.
pub fn build_pdf<S: AsRef<str>>(objects: &[S]) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body.as_ref()).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

/// `pages` empty letter-size pages, no form.
pub fn blank_pdf(pages: usize) -> Vec<u8> {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), pages),
    ];
    for _ in 0..pages {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string());
    }
    build_pdf(&objects)
}

/// A one-page template with a text field, a checkbox and a radio group
/// whose kids carry the widgets.
pub fn template_with_form() -> Vec<u8> {
    build_pdf(&[
        "<< /Type /Catalog /Pages 2 0 R /AcroForm 4 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [5 0 R 6 0 R 8 0 R 9 0 R] >>",
        "<< /Fields [5 0 R 6 0 R 7 0 R] /DA (/Helv 0 Tf 0 g) >>",
        "<< /FT /Tx /T (nom) /Type /Annot /Subtype /Widget /Rect [50 700 250 720] /P 3 0 R >>",
        "<< /FT /Btn /T (accord) /Type /Annot /Subtype /Widget /Rect [50 650 62 662] /P 3 0 R >>",
        "<< /FT /Btn /Ff 49152 /T (choix) /Kids [8 0 R 9 0 R] >>",
        "<< /Parent 7 0 R /Type /Annot /Subtype /Widget /Rect [50 600 62 612] /P 3 0 R >>",
        "<< /Parent 7 0 R /Type /Annot /Subtype /Widget /Rect [80 600 92 612] /P 3 0 R >>",
    ])
}

/// Signature dictionaries reachable from the form, in field order.
pub fn signature_dicts(doc: &PdfDocument) -> Vec<Dict> {
    collect_fields(doc)
        .into_iter()
        .filter(|f| f.field_type.as_deref() == Some("Sig"))
        .filter_map(|f| {
            let value = doc.get(f.reference)?.as_dict()?.get("V")?;
            doc.resolve_dict(value).cloned()
        })
        .collect()
}

pub fn byte_range(sig: &Dict) -> [i64; 4] {
    read_byte_range(sig).expect("signature has a ByteRange")
}

/// The message-digest signed attribute of the CMS blob in `/Contents`.
pub fn message_digest(sig: &Dict) -> Vec<u8> {
    let contents = sig.get("Contents").and_then(Object::as_string).expect("signature has Contents");
    // The blob is zero-padded up to the reserved size.
    let mut reader = SliceReader::new(contents).expect("non-empty Contents");
    let info = ContentInfo::decode(&mut reader).expect("Contents is a ContentInfo");
    let signed: SignedData = info.content.decode_as().expect("ContentInfo holds SignedData");
    let signer = signed.signer_infos.0.iter().next().expect("one signer info");
    let attrs = signer.signed_attrs.as_ref().expect("signed attributes");
    let digest = attrs
        .iter()
        .find(|a| a.oid == ID_MESSAGE_DIGEST)
        .expect("message-digest attribute");
    let value: OctetString = digest.values.iter().next().expect("digest value").decode_as().expect("octet string");
    value.as_bytes().to_vec()
}

/// Decoded content of every XObject painted on `page`.
pub fn page_xobject_text(doc: &PdfDocument, page: usize) -> String {
    let pages = doc.page_refs().expect("page tree");
    let page = doc.get(pages[page]).and_then(Object::as_dict).expect("page dictionary");
    let Some(xobjects) = page
        .get("Resources")
        .and_then(|r| doc.resolve_dict(r))
        .and_then(|r| r.get("XObject"))
        .and_then(|x| doc.resolve_dict(x))
    else {
        return String::new();
    };

    let mut text = String::new();
    for value in xobjects.values() {
        if let Some(reference) = value.as_reference() {
            if let Some(data) = doc.get(reference).and_then(|s| s.decode_stream_data().ok()) {
                text.push_str(&String::from_utf8_lossy(&data));
                text.push('\n');
            }
        }
    }
    text
}
