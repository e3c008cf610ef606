//! Configuration for the signing workflow.

use crate::signatures::{PermissionLevel, SignOptions, DEFAULT_SIGNATURE_RESERVE};

/// Workflow configuration.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Signer name recorded in the certification signature.
    pub platform_signer_name: String,

    /// DocMDP level of the certification signature.
    pub certification_permission: PermissionLevel,

    /// Bytes reserved for each CMS blob.
    pub signature_reserve: usize,

    /// Prefix of each signature's `/Name`.
    pub signature_name_prefix: String,

    /// Caption of visible signatures.
    pub signature_label: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            platform_signer_name: "coc_platform".to_string(),
            certification_permission: PermissionLevel::FormFill,
            signature_reserve: DEFAULT_SIGNATURE_RESERVE,
            signature_name_prefix: "PDF Forms POC".to_string(),
            signature_label: "Signé par".to_string(),
        }
    }

    /// Set the platform signer name.
    pub fn with_platform_signer_name(mut self, name: impl Into<String>) -> Self {
        self.platform_signer_name = name.into();
        self
    }

    /// Set the certification permission level.
    pub fn with_certification_permission(mut self, permission: PermissionLevel) -> Self {
        self.certification_permission = permission;
        self
    }

    /// Set the signature reserve in bytes.
    pub fn with_signature_reserve(mut self, reserve: usize) -> Self {
        self.signature_reserve = reserve;
        self
    }

    /// Set the signature name prefix.
    pub fn with_signature_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.signature_name_prefix = prefix.into();
        self
    }

    /// Set the visible signature caption.
    pub fn with_signature_label(mut self, label: impl Into<String>) -> Self {
        self.signature_label = label.into();
        self
    }

    /// Signing options derived from this configuration.
    pub fn sign_options(&self) -> SignOptions {
        SignOptions {
            reserve: self.signature_reserve,
            name_prefix: self.signature_name_prefix.clone(),
            label: self.signature_label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.platform_signer_name, "coc_platform");
        assert_eq!(config.certification_permission, PermissionLevel::FormFill);
        assert_eq!(config.signature_reserve, 0x2500);
    }

    #[test]
    fn test_builders_flow_into_sign_options() {
        let options = WorkflowConfig::new()
            .with_signature_reserve(0x4000)
            .with_signature_label("Signed by")
            .sign_options();
        assert_eq!(options.reserve, 0x4000);
        assert_eq!(options.label, "Signed by");
        assert_eq!(options.name_prefix, "PDF Forms POC");
    }
}
