//! Integration tests for chained incremental signatures.
//!
//! Each signature must keep verifying after later revisions are appended:
//! its ByteRange covers a prefix of the final file minus its own
//! `/Contents`, and the CMS message digest matches those bytes.

mod common;

use common::{blank_pdf, byte_range, credentials, message_digest, service, signature_dicts};
use pdf_cosign::document::PdfDocument;
use pdf_cosign::forms::{create_master_pdf, FieldKind, FieldPlacement, FieldValue};
use pdf_cosign::object::Object;
use pdf_cosign::workflow::WorkflowStore;
use pdf_cosign::signatures::{
    compute_digest, sign_pdf, ByteRangeCalculator, PermissionLevel, SignOptions, SignaturePlacement,
    SignatureRequest,
};
use pdf_cosign::workflow::{FieldRequest, FillAndSignRequest, SignerRequest, WorkflowCreateRequest};
use std::collections::HashMap;

fn placement(y: f64) -> SignaturePlacement {
    SignaturePlacement {
        page: 0,
        x: 350.0,
        y,
        width: 180.0,
        height: 50.0,
    }
}

fn assert_signature_valid(final_pdf: &[u8], sig: &pdf_cosign::object::Dict) {
    let range = byte_range(sig);
    ByteRangeCalculator::validate_byte_range(&[0, range[1], range[2], range[3]], (range[2] + range[3]) as usize)
        .unwrap();
    assert!((range[2] + range[3]) as usize <= final_pdf.len());

    let signed = ByteRangeCalculator::extract_signed_bytes(final_pdf, &range).unwrap();
    assert_eq!(message_digest(sig), compute_digest(&signed));

    // The gap is exactly the hex string
    assert_eq!(final_pdf[range[1] as usize], b'<');
    assert_eq!(final_pdf[range[2] as usize - 1], b'>');
}

#[test]
fn test_certification_then_approvals() {
    common::init_logging();
    let placements = vec![
        FieldPlacement {
            field_name: "nom".to_string(),
            assigned_to: "a".to_string(),
            field_type: FieldKind::Text,
            page: 0,
            x: 50.0,
            y: 700.0,
            width: 200.0,
            height: 20.0,
        },
        FieldPlacement {
            field_name: "ville".to_string(),
            assigned_to: "b".to_string(),
            field_type: FieldKind::Text,
            page: 0,
            x: 50.0,
            y: 650.0,
            width: 200.0,
            height: 20.0,
        },
    ];
    let credentials = credentials();
    let options = SignOptions::default();

    let master = create_master_pdf(&blank_pdf(1), &placements).unwrap();
    let certified = sign_pdf(
        &master,
        &SignatureRequest::Certification {
            signer_name: "coc_platform".to_string(),
            permission: PermissionLevel::FormFill,
        },
        &[],
        None,
        &credentials,
        &options,
    )
    .unwrap();

    let first = sign_pdf(
        &certified,
        &SignatureRequest::Approval {
            signer_name: "a".to_string(),
            fields_to_lock: vec!["nom".to_string()],
        },
        &[FieldValue::new("nom", "Dupont")],
        Some(&placement(80.0)),
        &credentials,
        &options,
    )
    .unwrap();

    let second = sign_pdf(
        &first,
        &SignatureRequest::Approval {
            signer_name: "b".to_string(),
            fields_to_lock: vec!["ville".to_string()],
        },
        &[FieldValue::new("ville", "Lyon")],
        Some(&placement(20.0)),
        &credentials,
        &options,
    )
    .unwrap();

    assert!(first.starts_with(&certified));
    assert!(second.starts_with(&first));

    let doc = PdfDocument::load(&second).unwrap();
    let sigs = signature_dicts(&doc);
    assert_eq!(sigs.len(), 3);
    for sig in &sigs {
        assert_signature_valid(&second, sig);
    }

    let ends: Vec<usize> = sigs
        .iter()
        .map(|s| {
            let r = byte_range(s);
            (r[2] + r[3]) as usize
        })
        .collect();
    assert!(ends.contains(&certified.len()));
    assert!(ends.contains(&first.len()));
    assert!(ends.contains(&second.len()));

    let catalog = doc.catalog().unwrap();
    let perms = catalog.get("Perms").and_then(|p| doc.resolve_dict(p)).unwrap();
    let docmdp = perms.get("DocMDP").and_then(|d| doc.resolve_dict(d)).unwrap();
    assert_eq!(byte_range(docmdp)[2] + byte_range(docmdp)[3], certified.len() as i64);

    let field_mdp = sigs
        .iter()
        .filter_map(|s| s.get("Reference").and_then(Object::as_array))
        .filter_map(|r| r.first().and_then(Object::as_dict))
        .filter(|r| r.get("TransformMethod").and_then(Object::as_name) == Some("FieldMDP"))
        .count();
    assert_eq!(field_mdp, 2);
}

#[test]
fn test_workflow_master_accumulates_signatures() {
    let service = service();
    let request = WorkflowCreateRequest {
        name: "Chaîne".to_string(),
        signers: (1..=3)
            .map(|order| SignerRequest {
                name: format!("Signataire {}", order),
                order,
            })
            .collect(),
        fields: vec![FieldRequest {
            field_name: "commentaire".to_string(),
            label: Some("Commentaire".to_string()),
            assigned_to: "signataire-1".to_string(),
            field_type: None,
            group_name: None,
            page: 0,
            x: 50.0,
            y: 500.0,
            width: 300.0,
            height: 24.0,
        }],
    };
    let id = service.create_workflow(&blank_pdf(1), "c.pdf", &request).unwrap().workflow_id;

    let mut revisions = vec![service.store().document(&id).unwrap().unwrap().master_pdf];
    for order in 1..=3u32 {
        let submission = FillAndSignRequest {
            signer_name: format!("Signataire {}", order),
            fields: HashMap::from([("commentaire".to_string(), format!("note {}", order))]),
            signature_placement: Some(placement(60.0 * order as f64)),
        };
        service.fill_and_sign(&id, &submission).unwrap();
        revisions.push(service.store().document(&id).unwrap().unwrap().master_pdf);
    }

    let final_pdf = service.download_final(&id).unwrap().bytes;
    for revision in &revisions {
        assert!(final_pdf.starts_with(revision));
    }

    let doc = PdfDocument::load(&final_pdf).unwrap();
    let sigs = signature_dicts(&doc);
    assert_eq!(sigs.len(), 4);
    for sig in &sigs {
        assert_signature_valid(&final_pdf, sig);
    }

    // Only the owner's value was written
    let document = service.store().document(&id).unwrap().unwrap();
    assert_eq!(document.fields[0].current_value, "note 1");
    assert_eq!(document.revision, 3);
}

#[test]
fn test_signature_names_and_reasons() {
    common::init_logging();
    let signed = sign_pdf(
        &blank_pdf(1),
        &SignatureRequest::Approval {
            signer_name: "jean-dupont".to_string(),
            fields_to_lock: Vec::new(),
        },
        &[],
        Some(&placement(80.0)),
        &credentials(),
        &SignOptions::default(),
    )
    .unwrap();

    let doc = PdfDocument::load(&signed).unwrap();
    let sigs = signature_dicts(&doc);
    assert_eq!(sigs.len(), 1);
    let sig = &sigs[0];
    assert_eq!(sig.get("Name").and_then(Object::as_text).as_deref(), Some("PDF Forms POC jean-dupont"));
    assert_eq!(sig.get("SubFilter").and_then(Object::as_name), Some("adbe.pkcs7.detached"));
    assert!(sig.get("Reference").is_none());
    assert_signature_valid(&signed, sig);
}
