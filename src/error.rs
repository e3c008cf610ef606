//! Error types for PDF processing, signing and the signing workflow.
//!
//! PDF-level variants describe structural problems in the bytes being read or
//! written. The workflow variants (`NotFound`, `Forbidden`, `BadRequest`,
//! `Internal`, `Conflict`) carry a human-readable reason that callers surface
//! as-is. [`Error::kind`] folds everything onto that smaller taxonomy.

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while processing documents and workflows.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(crate::object::ObjectRef),

    /// Key, certificate or CMS construction failure
    #[error("Signing error: {0}")]
    Signing(String),

    /// Workflow, document or field absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Turn violation, already signed, or unknown signer
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed caller input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Broken structural invariant
    #[error("Internal error: {0}")]
    Internal(String),

    /// Concurrent modification detected on commit
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Coarse classification of an [`Error`], as seen by API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing workflow, document or field
    NotFound,
    /// Caller is not allowed to act now
    Forbidden,
    /// Caller input was malformed
    BadRequest,
    /// A concurrent writer won the race
    Conflict,
    /// Everything else; never retried
    Internal,
}

impl Error {
    /// Classify this error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::Conflict(_) => ErrorKind::Conflict,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::Signing(format!("DER encoding failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_error() {
        let err = Error::InvalidHeader("NotAPDF".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid PDF header"));
        assert!(msg.contains("NotAPDF"));
    }

    #[test]
    fn test_parse_error() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10, 0);
        assert!(format!("{}", err).contains("10 0 R"));
    }

    #[test]
    fn test_forbidden_carries_reason() {
        let err = Error::Forbidden("not your turn".to_string());
        assert_eq!(format!("{}", err), "Forbidden: not your turn");
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_pdf_errors_are_internal() {
        assert_eq!(Error::InvalidXref.kind(), ErrorKind::Internal);
        assert_eq!(Error::Signing("bad key".into()).kind(), ErrorKind::Internal);
        assert_eq!(Error::Internal("no form".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_workflow_kinds() {
        assert_eq!(Error::NotFound("wf".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::BadRequest("placement".into()).kind(), ErrorKind::BadRequest);
        assert_eq!(Error::Conflict("version".into()).kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
