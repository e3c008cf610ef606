//! Small PDF builders shared by unit tests.

use crate::document::PdfDocument;

/// Assemble a PDF from object bodies numbered from 1, with a correct xref.
/// Object 1 must be the catalog.
pub fn build_pdf<S: AsRef<str>>(objects: &[S]) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n".to_vec();
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

/// A document with `pages` empty letter-size pages and no form.
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

/// A one-page document whose form holds a single root field (object 5).
/// `extra` objects are numbered from 6.
pub fn form_document(field: &str, extra: &[&str]) -> PdfDocument {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R /AcroForm 4 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string(),
        "<< /Fields [5 0 R] /DA (/Helv 0 Tf 0 g) >>".to_string(),
        field.to_string(),
    ];
    objects.extend(extra.iter().map(|s| s.to_string()));
    PdfDocument::load(&build_pdf(&objects)).unwrap()
}
