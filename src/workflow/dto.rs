//! Requests and responses of the workflow operations.

use super::model::{FieldDefinition, WorkflowStatus};
use crate::forms::{FieldKind, FieldPlacement};
use crate::signatures::SignaturePlacement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A signer named in a creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerRequest {
    /// Display name; the signer id is its slug
    pub name: String,
    /// Position in the signing sequence
    pub order: u32,
}

/// A field to place in the master document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRequest {
    pub field_name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Signer id of the owner
    pub assigned_to: String,
    #[serde(default)]
    pub field_type: Option<FieldKind>,
    #[serde(default)]
    pub group_name: Option<String>,
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FieldRequest {
    /// Placement handed to the master builder.
    pub fn placement(&self) -> FieldPlacement {
        FieldPlacement {
            field_name: self.field_name.clone(),
            assigned_to: self.assigned_to.clone(),
            field_type: self.field_type.unwrap_or_default(),
            page: self.page,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    /// Initial, empty definition.
    pub fn definition(&self) -> FieldDefinition {
        FieldDefinition {
            field_name: self.field_name.clone(),
            label: self.label.clone(),
            assigned_to: self.assigned_to.clone(),
            field_type: self.field_type.unwrap_or_default(),
            group_name: self.group_name.clone(),
            page: self.page,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            current_value: String::new(),
        }
    }
}

/// Input of `create_workflow`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowCreateRequest {
    pub name: String,
    pub signers: Vec<SignerRequest>,
    #[serde(default)]
    pub fields: Vec<FieldRequest>,
}

/// Signer as reported after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerInfo {
    pub name: String,
    pub signer_id: String,
    pub order: u32,
}

/// Output of `create_workflow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowCreateResponse {
    pub workflow_id: String,
    pub name: String,
    pub signers: Vec<SignerInfo>,
}

/// A field as shown to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub field_name: String,
    pub label: Option<String>,
    pub field_type: FieldKind,
    pub group_name: Option<String>,
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub current_value: String,
}

impl From<&FieldDefinition> for FieldView {
    fn from(field: &FieldDefinition) -> Self {
        Self {
            field_name: field.field_name.clone(),
            label: field.label.clone(),
            field_type: field.field_type,
            group_name: field.group_name.clone(),
            page: field.page,
            x: field.x,
            y: field.y,
            width: field.width,
            height: field.height,
            current_value: field.current_value.clone(),
        }
    }
}

/// Status of another participant, from the requesting signer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignerViewStatus {
    /// The requesting signer
    Current,
    Signed,
    Pending,
}

/// A participant as listed in the signer view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerContext {
    pub name: String,
    pub order: u32,
    pub status: SignerViewStatus,
}

/// Output of `get_document_for_signer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerDocumentResponse {
    pub workflow_id: String,
    pub workflow_name: String,
    pub signer_name: String,
    pub signer_id: String,
    /// Flattened snapshot, standard base64
    pub pdf_base64: String,
    /// Fields owned by the signer
    pub fields: Vec<FieldView>,
    /// Whether the signer holds the highest order
    pub last_signer: bool,
    /// Every participant, sorted by order
    pub signers: Vec<SignerContext>,
}

/// Input of `fill_and_sign`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillAndSignRequest {
    /// Display name or id; slugified before lookup
    pub signer_name: String,
    /// Field name to value
    #[serde(default)]
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub signature_placement: Option<SignaturePlacement>,
}

/// Output of `fill_and_sign`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillAndSignResponse {
    pub workflow_status: WorkflowStatus,
    /// True when this signature completed the workflow
    pub completed: bool,
}

/// Output of `download_final`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalDocument {
    /// `<workflow name>.pdf`
    pub file_name: String,
    /// The master, byte for byte
    pub bytes: Vec<u8>,
}

/// Progress of a signer, as listed in summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignerProgress {
    Signed,
    /// Holds the current turn
    InProgress,
    Pending,
}

/// A signer within a workflow summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerSummary {
    pub name: String,
    pub signer_id: String,
    pub order: u32,
    pub status: SignerProgress,
}

/// One entry of `list_workflows`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub pdf_original_name: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub signers: Vec<SignerSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let json = r#"{
            "name": "Contrat",
            "signers": [{"name": "Jean Dupont", "order": 1}],
            "fields": [{"fieldName": "nom", "assignedTo": "jean-dupont", "page": 0,
                        "x": 50, "y": 700, "width": 200, "height": 20}]
        }"#;
        let request: WorkflowCreateRequest = serde_json::from_str(json).unwrap();
        let field = &request.fields[0];
        assert_eq!(field.placement().field_type, FieldKind::Text);
        let definition = field.definition();
        assert_eq!(definition.current_value, "");
        assert!(definition.label.is_none());
    }

    #[test]
    fn test_fill_request_without_placement() {
        let json = r#"{"signerName": "Jean Dupont", "fields": {"nom": "Dupont"}}"#;
        let request: FillAndSignRequest = serde_json::from_str(json).unwrap();
        assert!(request.signature_placement.is_none());
        assert_eq!(request.fields.get("nom").map(String::as_str), Some("Dupont"));
    }

    #[test]
    fn test_response_serialization() {
        let response = FillAndSignResponse {
            workflow_status: WorkflowStatus::Completed,
            completed: true,
        };
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["workflowStatus"], "COMPLETED");
        assert_eq!(serde_json::to_string(&SignerProgress::InProgress).unwrap(), "\"IN_PROGRESS\"");
    }
}
