//! Detached CMS (PKCS#7) SignedData construction (RFC 5652).
//!
//! Signed attributes are content-type (data), message-digest and
//! signing-time. The signature is RSA PKCS#1 v1.5 over SHA-256 and the
//! signer is identified by issuer and serial number. The signing
//! certificate is embedded.

use super::types::SigningCredentials;
use crate::error::{Error, Result};
use cms::builder::{create_signing_time_attribute, SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::signed_data::{EncapsulatedContentInfo, SignerIdentifier};
use const_oid::db::rfc5911::ID_DATA;
use const_oid::db::rfc5912::ID_SHA_256;
use der::Encode;
use rsa::pkcs1v15::SigningKey;
use sha2::{Digest, Sha256};
use spki::AlgorithmIdentifierOwned;

/// SHA-256 of the signed byte ranges.
pub fn compute_digest(signed_bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(signed_bytes).to_vec()
}

/// Build a DER-encoded detached SignedData over `signed_bytes`.
pub fn build_detached_signature(signed_bytes: &[u8], credentials: &SigningCredentials) -> Result<Vec<u8>> {
    let digest = compute_digest(signed_bytes);
    let certificate = credentials.certificate().clone();
    let signer = SigningKey::<Sha256>::new(credentials.key().clone());

    let content = EncapsulatedContentInfo {
        econtent_type: ID_DATA,
        econtent: None,
    };
    let digest_algorithm = AlgorithmIdentifierOwned {
        oid: ID_SHA_256,
        parameters: None,
    };
    let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: certificate.tbs_certificate.issuer.clone(),
        serial_number: certificate.tbs_certificate.serial_number.clone(),
    });

    let mut signer_info =
        SignerInfoBuilder::new(&signer, sid, digest_algorithm.clone(), &content, Some(digest.as_slice()))
            .map_err(|e| cms_error("signer info", e))?;
    signer_info
        .add_signed_attribute(create_signing_time_attribute().map_err(|e| cms_error("signing time", e))?)
        .map_err(|e| cms_error("signing time", e))?;

    let mut builder = SignedDataBuilder::new(&content);
    builder
        .add_digest_algorithm(digest_algorithm)
        .map_err(|e| cms_error("digest algorithm", e))?;
    builder
        .add_certificate(CertificateChoices::Certificate(certificate))
        .map_err(|e| cms_error("certificate", e))?;
    builder
        .add_signer_info::<SigningKey<Sha256>, rsa::pkcs1v15::Signature>(signer_info)
        .map_err(|e| cms_error("signature", e))?;
    let content_info = builder.build().map_err(|e| cms_error("SignedData", e))?;

    let der = content_info.to_der()?;
    log::debug!("Built CMS SignedData: {} bytes", der.len());
    Ok(der)
}

fn cms_error(stage: &str, e: cms::builder::Error) -> Error {
    Error::Signing(format!("failed to build CMS {}: {:?}", stage, e))
}
