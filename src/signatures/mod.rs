//! PDF digital signatures.
//!
//! Signatures are `adbe.pkcs7.detached` CMS blobs over a ByteRange of the
//! file, each appended as an incremental revision so earlier signatures
//! keep verifying. The first signature of a workflow certifies the
//! document (DocMDP); each signer then adds an approval signature that
//! locks the fields they filled (FieldMDP).
//!
//! ## Example
//!
//! ```no_run
//! use pdf_cosign::signatures::{sign_pdf, PermissionLevel, SignOptions, SignatureRequest, SigningCredentials};
//!
//! let credentials = SigningCredentials::from_files("cert.pem", "key.pem")?;
//! let master = std::fs::read("master.pdf")?;
//! let request = SignatureRequest::Certification {
//!     signer_name: "coc_platform".to_string(),
//!     permission: PermissionLevel::FormFill,
//! };
//! let signed = sign_pdf(&master, &request, &[], None, &credentials, &SignOptions::default())?;
//! std::fs::write("signed.pdf", signed)?;
//! # Ok::<(), pdf_cosign::error::Error>(())
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - RFC 5652 - Cryptographic Message Syntax

mod appearance;
mod byterange;
mod pkcs7;
mod signer;
mod types;

pub use appearance::signature_appearance;
pub use byterange::{read_byte_range, ByteRangeCalculator};
pub use pkcs7::{build_detached_signature, compute_digest};
pub use signer::sign_pdf;
pub use types::{
    PermissionLevel, SignOptions, SignaturePlacement, SignatureRequest, SigningCredentials,
    DEFAULT_SIGNATURE_RESERVE,
};

#[cfg(test)]
pub(crate) use types::fixtures;
