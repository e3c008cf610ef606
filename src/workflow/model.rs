//! Persisted workflow records.

use crate::forms::FieldKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a workflow. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    /// Waiting for at least one signer
    InProgress,
    /// Every signer has signed
    Completed,
}

impl WorkflowStatus {
    /// Name as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored state of one signer. Whether it is the signer's turn is derived
/// from the workflow's `current_signer_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignerStatus {
    /// Has not signed yet
    Pending,
    /// Has signed
    Signed,
}

/// A participant in a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signer {
    /// Slug of the display name
    pub signer_id: String,
    /// Display name
    pub name: String,
    /// Position in the signing sequence
    pub order: u32,
    /// Stored status
    pub status: SignerStatus,
}

/// A multi-party signing workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// UUID v4
    pub id: String,
    /// Display name, also the final file name
    pub name: String,
    /// File name of the uploaded template
    pub pdf_original_name: String,
    /// Lifecycle status
    pub status: WorkflowStatus,
    /// Signers sorted by order
    pub signers: Vec<Signer>,
    /// Order of the signer whose turn it is
    pub current_signer_order: u32,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token, bumped on every commit
    pub version: u64,
}

impl Workflow {
    /// Signer with the given id.
    pub fn signer(&self, signer_id: &str) -> Option<&Signer> {
        self.signers.iter().find(|s| s.signer_id == signer_id)
    }

    /// Highest order among the signers.
    pub fn max_order(&self) -> u32 {
        self.signers.iter().map(|s| s.order).max().unwrap_or(0)
    }

    /// Whether some signer holds `order`.
    pub fn has_order(&self, order: u32) -> bool {
        self.signers.iter().any(|s| s.order == order)
    }
}

/// A field of the master document and its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Unique field name
    pub field_name: String,
    /// Display label
    pub label: Option<String>,
    /// Owning signer id
    pub assigned_to: String,
    /// Semantic type
    pub field_type: FieldKind,
    /// Radio group hint
    pub group_name: Option<String>,
    /// Page index, 0-based
    pub page: usize,
    /// Lower-left x
    pub x: f64,
    /// Lower-left y
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
    /// Last submitted value; "true"/"false" for toggles
    pub current_value: String,
}

/// The binary side of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Owning workflow
    pub workflow_id: String,
    /// Authoritative, append-only master
    pub master_pdf: Vec<u8>,
    /// Flattened snapshot of `master_pdf`
    pub flattened_pdf: Vec<u8>,
    /// True when `master_pdf` changed after the snapshot was taken
    pub flattened_stale: bool,
    /// Bumped every time `master_pdf` changes
    pub revision: u64,
    /// Field definitions
    pub fields: Vec<FieldDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(id: &str, order: u32) -> Signer {
        Signer {
            signer_id: id.to_string(),
            name: id.to_string(),
            order,
            status: SignerStatus::Pending,
        }
    }

    #[test]
    fn test_workflow_helpers() {
        let now = Utc::now();
        let workflow = Workflow {
            id: "w".to_string(),
            name: "Contrat".to_string(),
            pdf_original_name: "contrat.pdf".to_string(),
            status: WorkflowStatus::InProgress,
            signers: vec![signer("a", 1), signer("b", 5)],
            current_signer_order: 1,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        assert_eq!(workflow.max_order(), 5);
        assert!(workflow.has_order(5));
        assert!(!workflow.has_order(2));
        assert_eq!(workflow.signer("b").map(|s| s.order), Some(5));
        assert!(workflow.signer("c").is_none());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&WorkflowStatus::InProgress).unwrap(), "\"IN_PROGRESS\"");
        assert_eq!(serde_json::to_string(&SignerStatus::Signed).unwrap(), "\"SIGNED\"");
        assert_eq!(WorkflowStatus::Completed.to_string(), "COMPLETED");
    }

    #[test]
    fn test_signer_camel_case() {
        let json = serde_json::to_value(signer("jean-dupont", 1)).unwrap();
        assert_eq!(json["signerId"], "jean-dupont");
        assert_eq!(json["status"], "PENDING");
    }
}
