//! Signature request, placement and credential types.

use crate::error::{Error, Result};
use der::{Decode, DecodePem};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use x509_cert::Certificate;

/// Default byte budget for the DER-encoded CMS blob
pub const DEFAULT_SIGNATURE_RESERVE: usize = 0x2500;

/// DocMDP permission level of a certification signature
/// (ISO 32000-1 §12.8.2.2, table 254).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    /// No changes permitted
    NoChanges,
    /// Form filling and signing permitted
    #[default]
    FormFill,
    /// Form filling, signing and annotation permitted
    Annotate,
}

impl PermissionLevel {
    /// Value of `/P` in the transform parameters.
    pub fn value(&self) -> i64 {
        match self {
            Self::NoChanges => 1,
            Self::FormFill => 2,
            Self::Annotate => 3,
        }
    }
}

/// What kind of signature to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureRequest {
    /// First signature of a document; sets the permission ceiling (DocMDP).
    Certification {
        /// Name recorded in the signature dictionary
        signer_name: String,
        /// Changes allowed after certification
        permission: PermissionLevel,
    },
    /// Signer approval; locks the fields it names (FieldMDP).
    Approval {
        /// Name recorded in the signature dictionary
        signer_name: String,
        /// Fully qualified names of the fields to lock
        fields_to_lock: Vec<String>,
    },
}

impl SignatureRequest {
    /// Name recorded in the signature dictionary.
    pub fn signer_name(&self) -> &str {
        match self {
            Self::Certification { signer_name, .. } | Self::Approval { signer_name, .. } => signer_name,
        }
    }
}

/// Where to draw a visible signature, in bottom-left-origin points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePlacement {
    /// Page index, 0-based; clamped to the document
    pub page: usize,
    /// Lower-left x
    pub x: f64,
    /// Lower-left y
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

/// Options shared by every signature the engine produces.
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Bytes reserved for the DER-encoded CMS blob
    pub reserve: usize,
    /// Prefix of `/Name`, followed by the signer name
    pub name_prefix: String,
    /// Caption drawn above the signer name
    pub label: String,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            reserve: DEFAULT_SIGNATURE_RESERVE,
            name_prefix: "PDF Forms POC".to_string(),
            label: "Signé par".to_string(),
        }
    }
}

/// The platform's RSA private key and X.509 certificate.
#[derive(Clone)]
pub struct SigningCredentials {
    key: RsaPrivateKey,
    certificate: Certificate,
}

impl SigningCredentials {
    /// Pair an already decoded key and certificate.
    pub fn new(key: RsaPrivateKey, certificate: Certificate) -> Self {
        Self { key, certificate }
    }

    /// Load from PEM. The key may be PKCS#8 (`PRIVATE KEY`) or PKCS#1
    /// (`RSA PRIVATE KEY`).
    pub fn from_pem(certificate_pem: &str, key_pem: &str) -> Result<Self> {
        let certificate = Certificate::from_pem(certificate_pem.as_bytes())
            .map_err(|e| Error::Signing(format!("invalid certificate PEM: {}", e)))?;
        let key = RsaPrivateKey::from_pkcs8_pem(key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(key_pem))
            .map_err(|e| Error::Signing(format!("invalid private key PEM: {}", e)))?;
        Ok(Self::new(key, certificate))
    }

    /// Load from DER. The key may be PKCS#8 or PKCS#1.
    pub fn from_der(certificate_der: &[u8], key_der: &[u8]) -> Result<Self> {
        let certificate = Certificate::from_der(certificate_der)
            .map_err(|e| Error::Signing(format!("invalid certificate DER: {}", e)))?;
        let key = RsaPrivateKey::from_pkcs8_der(key_der)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(key_der))
            .map_err(|e| Error::Signing(format!("invalid private key DER: {}", e)))?;
        Ok(Self::new(key, certificate))
    }

    /// Load from a certificate file and a key file, PEM or DER.
    pub fn from_files(
        certificate_path: impl AsRef<std::path::Path>,
        key_path: impl AsRef<std::path::Path>,
    ) -> Result<Self> {
        let certificate = std::fs::read(certificate_path.as_ref())?;
        let key = std::fs::read(key_path.as_ref())?;
        match (std::str::from_utf8(&certificate), std::str::from_utf8(&key)) {
            (Ok(cert), Ok(key)) if cert.contains("-----BEGIN") => Self::from_pem(cert, key),
            _ => Self::from_der(&certificate, &key),
        }
    }

    /// The signing key.
    pub fn key(&self) -> &RsaPrivateKey {
        &self.key
    }

    /// The certificate embedded in every signature.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// PKCS#1 DER of the key, for re-export.
    pub fn key_pkcs1_der(&self) -> Result<Vec<u8>> {
        self.key
            .to_pkcs1_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| Error::Signing(format!("failed to encode private key: {}", e)))
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("subject", &self.certificate.tbs_certificate.subject.to_string())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::SigningCredentials;

    pub const CERT_PEM: &str = include_str!("../../tests/fixtures/signing/platform_cert.pem");
    pub const KEY_PEM: &str = include_str!("../../tests/fixtures/signing/platform_key.pem");

    pub fn credentials() -> SigningCredentials {
        SigningCredentials::from_pem(CERT_PEM, KEY_PEM).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_values() {
        assert_eq!(PermissionLevel::NoChanges.value(), 1);
        assert_eq!(PermissionLevel::default(), PermissionLevel::FormFill);
        assert_eq!(PermissionLevel::Annotate.value(), 3);
    }

    #[test]
    fn test_request_signer_name() {
        let request = SignatureRequest::Approval {
            signer_name: "jean-dupont".to_string(),
            fields_to_lock: vec![],
        };
        assert_eq!(request.signer_name(), "jean-dupont");
    }

    #[test]
    fn test_credentials_from_pem_redacted() {
        let creds = fixtures::credentials();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("PDF Forms POC"));
    }

    #[test]
    fn test_pkcs1_key_accepted() {
        let creds = fixtures::credentials();
        let der = creds.key_pkcs1_der().unwrap();
        let cert_der = der::Encode::to_der(creds.certificate()).unwrap();
        assert!(SigningCredentials::from_der(&cert_der, &der).is_ok());
    }

    #[test]
    fn test_garbage_rejected() {
        let err = SigningCredentials::from_pem("nope", "nope").unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[test]
    fn test_placement_camel_case() {
        let p: SignaturePlacement =
            serde_json::from_str(r#"{"page":1,"x":10,"y":20,"width":150,"height":40}"#).unwrap();
        assert_eq!(p.page, 1);
        assert_eq!(p.width, 150.0);
    }
}
