//! The signing workflow state machine.

use super::dto::{
    FieldView, FillAndSignRequest, FillAndSignResponse, FinalDocument, SignerContext, SignerDocumentResponse,
    SignerInfo, SignerProgress, SignerSummary, SignerViewStatus, WorkflowCreateRequest, WorkflowCreateResponse,
    WorkflowSummary,
};
use super::model::{Document, Signer, SignerStatus, Workflow, WorkflowStatus};
use super::slug::slugify;
use super::store::{InMemoryStore, WorkflowStore};
use crate::config::WorkflowConfig;
use crate::error::{Error, Result};
use crate::forms::{create_master_pdf, extract_fields, flatten_pdf, DetectedField, FieldPlacement, FieldValue};
use crate::signatures::{sign_pdf, SignatureRequest, SigningCredentials};
use base64::Engine as _;
use chrono::Utc;
use log::{debug, info};
use std::collections::HashSet;

/// Drives workflows through creation, turn-based signing and download.
///
/// Every operation reads the latest records, validates, and writes at most
/// once. The service holds no mutable state of its own and can be shared
/// between threads.
pub struct WorkflowService<S: WorkflowStore = InMemoryStore> {
    store: S,
    credentials: SigningCredentials,
    config: WorkflowConfig,
}

impl WorkflowService<InMemoryStore> {
    /// Service backed by a fresh in-memory store.
    pub fn in_memory(credentials: SigningCredentials, config: WorkflowConfig) -> Self {
        Self::new(InMemoryStore::new(), credentials, config)
    }
}

impl<S: WorkflowStore> WorkflowService<S> {
    /// Create a service over `store`.
    pub fn new(store: S, credentials: SigningCredentials, config: WorkflowConfig) -> Self {
        Self {
            store,
            credentials,
            config,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Detect the fields of an uploaded template.
    pub fn analyze(&self, pdf: &[u8]) -> Result<Vec<DetectedField>> {
        extract_fields(pdf)
    }

    /// Create a workflow from a template and a field layout.
    ///
    /// Builds the master, certifies it, takes the first snapshot and
    /// persists both records. The first turn goes to the lowest order.
    pub fn create_workflow(
        &self,
        pdf: &[u8],
        pdf_original_name: &str,
        request: &WorkflowCreateRequest,
    ) -> Result<WorkflowCreateResponse> {
        info!(
            "Creating workflow '{}' with {} signers and {} fields",
            request.name,
            request.signers.len(),
            request.fields.len()
        );

        let signers = prepare_signers(request)?;
        validate_fields(request, &signers)?;
        let first_order = signers
            .first()
            .map(|s| s.order)
            .ok_or_else(|| Error::BadRequest("a workflow needs at least one signer".to_string()))?;

        let placements: Vec<FieldPlacement> = request.fields.iter().map(|f| f.placement()).collect();
        let master = create_master_pdf(pdf, &placements)?;
        let certification = SignatureRequest::Certification {
            signer_name: self.config.platform_signer_name.clone(),
            permission: self.config.certification_permission,
        };
        let master = sign_pdf(
            &master,
            &certification,
            &[],
            None,
            &self.credentials,
            &self.config.sign_options(),
        )?;
        let flattened = flatten_pdf(&master)?;

        let now = Utc::now();
        let workflow = Workflow {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name.clone(),
            pdf_original_name: pdf_original_name.to_string(),
            status: WorkflowStatus::InProgress,
            signers,
            current_signer_order: first_order,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let document = Document {
            workflow_id: workflow.id.clone(),
            master_pdf: master,
            flattened_pdf: flattened,
            flattened_stale: false,
            revision: 0,
            fields: request.fields.iter().map(|f| f.definition()).collect(),
        };

        let response = WorkflowCreateResponse {
            workflow_id: workflow.id.clone(),
            name: workflow.name.clone(),
            signers: workflow
                .signers
                .iter()
                .map(|s| SignerInfo {
                    name: s.name.clone(),
                    signer_id: s.signer_id.clone(),
                    order: s.order,
                })
                .collect(),
        };
        info!(
            "Workflow '{}' created with id {} ({} byte master)",
            workflow.name,
            workflow.id,
            document.master_pdf.len()
        );
        self.store.insert(workflow, document)?;
        Ok(response)
    }

    /// The snapshot and fields a signer needs to act, if it is their turn.
    ///
    /// Regenerates the snapshot first when it is stale.
    pub fn get_document_for_signer(&self, workflow_id: &str, signer_id: &str) -> Result<SignerDocumentResponse> {
        debug!("Loading document of {} for signer '{}'", workflow_id, signer_id);

        let workflow = self.load_workflow(workflow_id)?;
        let signer = check_turn(&workflow, signer_id)?;
        let mut document = self.load_document(workflow_id)?;

        if document.flattened_stale {
            info!("Refreshing snapshot of {} at revision {}", workflow_id, document.revision);
            let flattened = flatten_pdf(&document.master_pdf)?;
            self.store
                .store_flattened(workflow_id, document.revision, flattened.clone())?;
            document.flattened_pdf = flattened;
            document.flattened_stale = false;
        }

        let fields = document
            .fields
            .iter()
            .filter(|f| f.assigned_to == signer_id)
            .map(FieldView::from)
            .collect();

        let signers = workflow
            .signers
            .iter()
            .map(|s| SignerContext {
                name: s.name.clone(),
                order: s.order,
                status: if s.signer_id == signer_id {
                    SignerViewStatus::Current
                } else if s.status == SignerStatus::Signed {
                    SignerViewStatus::Signed
                } else {
                    SignerViewStatus::Pending
                },
            })
            .collect();

        Ok(SignerDocumentResponse {
            workflow_id: workflow.id.clone(),
            workflow_name: workflow.name.clone(),
            signer_name: signer.name.clone(),
            signer_id: signer.signer_id.clone(),
            pdf_base64: base64::engine::general_purpose::STANDARD.encode(&document.flattened_pdf),
            fields,
            last_signer: signer.order == workflow.max_order(),
            signers,
        })
    }

    /// Apply a signer's values and sign, then pass the turn.
    ///
    /// Values for fields the signer does not own, or that do not exist, are
    /// dropped. The new master, the signer status and the turn pointer are
    /// committed together; a concurrent commit makes this one fail with
    /// [`Error::Conflict`].
    pub fn fill_and_sign(&self, workflow_id: &str, request: &FillAndSignRequest) -> Result<FillAndSignResponse> {
        let signer_id = slugify(&request.signer_name);
        info!("Fill and sign of {} by '{}'", workflow_id, signer_id);

        let mut workflow = self.load_workflow(workflow_id)?;
        check_turn(&workflow, &signer_id)?;
        let mut document = self.load_document(workflow_id)?;
        let placement = request
            .signature_placement
            .ok_or_else(|| Error::BadRequest("a signature placement is required".to_string()))?;
        let next_order = workflow
            .current_signer_order
            .checked_add(1)
            .ok_or_else(|| Error::Internal(format!("signer order of {} cannot advance", workflow_id)))?;

        let mut values = Vec::new();
        for field in document.fields.iter_mut().filter(|f| f.assigned_to == signer_id) {
            if let Some(value) = request.fields.get(&field.field_name) {
                field.current_value = value.clone();
                values.push(FieldValue::new(field.field_name.clone(), value.clone()));
            }
        }
        debug!(
            "Applying {} of {} submitted values for '{}'",
            values.len(),
            request.fields.len(),
            signer_id
        );

        let approval = SignatureRequest::Approval {
            signer_name: signer_id.clone(),
            fields_to_lock: values.iter().map(|v| v.field_name.clone()).collect(),
        };
        let signed = sign_pdf(
            &document.master_pdf,
            &approval,
            &values,
            Some(&placement),
            &self.credentials,
            &self.config.sign_options(),
        )?;

        document.master_pdf = signed;
        document.flattened_stale = true;
        document.revision += 1;

        for signer in workflow.signers.iter_mut().filter(|s| s.signer_id == signer_id) {
            signer.status = SignerStatus::Signed;
        }
        let completed = !workflow.has_order(next_order);
        workflow.current_signer_order = next_order;
        if completed {
            workflow.status = WorkflowStatus::Completed;
        }
        workflow.updated_at = Utc::now();

        let expected_version = workflow.version;
        let master_len = document.master_pdf.len();
        let workflow = self.store.commit(workflow, document, expected_version)?;
        if completed {
            info!("Workflow {} completed by '{}' ({} bytes)", workflow_id, signer_id, master_len);
        } else {
            info!("Workflow {} passed to order {}", workflow_id, next_order);
        }

        Ok(FillAndSignResponse {
            workflow_status: workflow.status,
            completed,
        })
    }

    /// The signed master of a completed workflow, byte for byte.
    pub fn download_final(&self, workflow_id: &str) -> Result<FinalDocument> {
        let workflow = self.load_workflow(workflow_id)?;
        if workflow.status != WorkflowStatus::Completed {
            return Err(Error::Forbidden(format!(
                "workflow is not completed yet (status {})",
                workflow.status
            )));
        }
        let document = self.load_document(workflow_id)?;
        Ok(FinalDocument {
            file_name: format!("{}.pdf", workflow.name),
            bytes: document.master_pdf,
        })
    }

    /// Summaries of every workflow, most recently updated first.
    pub fn list_workflows(&self) -> Result<Vec<WorkflowSummary>> {
        let mut workflows = self.store.list()?;
        workflows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(workflows.iter().map(summarize).collect())
    }

    fn load_workflow(&self, workflow_id: &str) -> Result<Workflow> {
        self.store
            .workflow(workflow_id)?
            .ok_or_else(|| Error::NotFound(format!("workflow {}", workflow_id)))
    }

    fn load_document(&self, workflow_id: &str) -> Result<Document> {
        self.store
            .document(workflow_id)?
            .ok_or_else(|| Error::Internal(format!("no document for workflow {}", workflow_id)))
    }
}

/// Slugify and sort the requested signers, rejecting ambiguous sequences.
fn prepare_signers(request: &WorkflowCreateRequest) -> Result<Vec<Signer>> {
    if request.signers.is_empty() {
        return Err(Error::BadRequest("a workflow needs at least one signer".to_string()));
    }

    let mut ids = HashSet::new();
    let mut orders = HashSet::new();
    let mut signers = Vec::with_capacity(request.signers.len());
    for requested in &request.signers {
        let signer_id = slugify(&requested.name);
        if signer_id.is_empty() {
            return Err(Error::BadRequest(format!(
                "signer name '{}' has no usable characters",
                requested.name
            )));
        }
        if requested.order == 0 || requested.order == u32::MAX {
            return Err(Error::BadRequest(format!(
                "signer '{}' has out-of-range order {}",
                requested.name, requested.order
            )));
        }
        if !ids.insert(signer_id.clone()) {
            return Err(Error::BadRequest(format!("duplicate signer id '{}'", signer_id)));
        }
        if !orders.insert(requested.order) {
            return Err(Error::BadRequest(format!("duplicate signer order {}", requested.order)));
        }
        signers.push(Signer {
            signer_id,
            name: requested.name.clone(),
            order: requested.order,
            status: SignerStatus::Pending,
        });
    }
    signers.sort_by_key(|s| s.order);
    Ok(signers)
}

fn validate_fields(request: &WorkflowCreateRequest, signers: &[Signer]) -> Result<()> {
    let mut names = HashSet::new();
    for field in &request.fields {
        if field.field_name.is_empty() {
            return Err(Error::BadRequest("field names must not be empty".to_string()));
        }
        if !names.insert(field.field_name.as_str()) {
            return Err(Error::BadRequest(format!("duplicate field name '{}'", field.field_name)));
        }
        if !signers.iter().any(|s| s.signer_id == field.assigned_to) {
            return Err(Error::BadRequest(format!(
                "field '{}' is assigned to unknown signer '{}'",
                field.field_name, field.assigned_to
            )));
        }
    }
    Ok(())
}

/// The signer, provided it is their turn and they have not signed.
fn check_turn<'a>(workflow: &'a Workflow, signer_id: &str) -> Result<&'a Signer> {
    let signer = workflow
        .signer(signer_id)
        .ok_or_else(|| Error::Forbidden("unknown signer for this workflow".to_string()))?;
    if signer.status == SignerStatus::Signed {
        return Err(Error::Forbidden("this signer has already signed".to_string()));
    }
    if signer.order != workflow.current_signer_order {
        return Err(Error::Forbidden(format!(
            "not your turn: order {} is expected to sign first",
            workflow.current_signer_order
        )));
    }
    Ok(signer)
}

fn summarize(workflow: &Workflow) -> WorkflowSummary {
    WorkflowSummary {
        id: workflow.id.clone(),
        name: workflow.name.clone(),
        pdf_original_name: workflow.pdf_original_name.clone(),
        status: workflow.status,
        created_at: workflow.created_at,
        updated_at: workflow.updated_at,
        signers: workflow
            .signers
            .iter()
            .map(|s| SignerSummary {
                name: s.name.clone(),
                signer_id: s.signer_id.clone(),
                order: s.order,
                status: if s.status == SignerStatus::Signed {
                    SignerProgress::Signed
                } else if s.order == workflow.current_signer_order {
                    SignerProgress::InProgress
                } else {
                    SignerProgress::Pending
                },
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfDocument;
    use crate::forms::tree::collect_fields;
    use crate::forms::FieldKind;
    use crate::signatures::{fixtures, SignaturePlacement};
    use crate::test_support::blank_pdf;
    use crate::workflow::dto::{FieldRequest, SignerRequest};
    use crate::workflow::model::FieldDefinition;
    use std::collections::HashMap;

    fn service() -> WorkflowService {
        WorkflowService::in_memory(fixtures::credentials(), WorkflowConfig::default())
    }

    fn field(name: &str, owner: &str, kind: FieldKind) -> FieldRequest {
        FieldRequest {
            field_name: name.to_string(),
            label: Some(name.to_uppercase()),
            assigned_to: owner.to_string(),
            field_type: Some(kind),
            group_name: None,
            page: 0,
            x: 72.0,
            y: 600.0,
            width: 180.0,
            height: 20.0,
        }
    }

    fn request() -> WorkflowCreateRequest {
        WorkflowCreateRequest {
            name: "Contrat".to_string(),
            signers: vec![
                SignerRequest {
                    name: "Marie Curie".to_string(),
                    order: 2,
                },
                SignerRequest {
                    name: "Jean Dupont".to_string(),
                    order: 1,
                },
            ],
            fields: vec![
                field("nom", "jean-dupont", FieldKind::Text),
                field("accord", "jean-dupont", FieldKind::Checkbox),
                field("ville", "marie-curie", FieldKind::Text),
            ],
        }
    }

    fn placement() -> SignaturePlacement {
        SignaturePlacement {
            page: 0,
            x: 350.0,
            y: 80.0,
            width: 180.0,
            height: 50.0,
        }
    }

    fn fill(signer: &str, values: &[(&str, &str)]) -> FillAndSignRequest {
        FillAndSignRequest {
            signer_name: signer.to_string(),
            fields: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            signature_placement: Some(placement()),
        }
    }

    fn definition<'a>(fields: &'a [FieldDefinition], name: &str) -> &'a FieldDefinition {
        fields.iter().find(|f| f.field_name == name).unwrap()
    }

    #[test]
    fn test_create_sorts_signers_and_certifies() {
        let service = service();
        let created = service.create_workflow(&blank_pdf(1), "contrat.pdf", &request()).unwrap();

        let ids: Vec<&str> = created.signers.iter().map(|s| s.signer_id.as_str()).collect();
        assert_eq!(ids, ["jean-dupont", "marie-curie"]);

        let workflow = service.store().workflow(&created.workflow_id).unwrap().unwrap();
        assert_eq!(workflow.current_signer_order, 1);
        assert_eq!(workflow.status, WorkflowStatus::InProgress);

        let document = service.store().document(&created.workflow_id).unwrap().unwrap();
        assert_eq!(document.revision, 0);
        assert!(!document.flattened_stale);
        assert!(document.fields.iter().all(|f| f.current_value.is_empty()));

        let master = PdfDocument::load(&document.master_pdf).unwrap();
        assert!(master.catalog().unwrap().get("Perms").is_some());
        assert_eq!(collect_fields(&master).len(), 4);
    }

    #[test]
    fn test_create_rejects_bad_signers() {
        let service = service();
        let mut duplicate = request();
        duplicate.signers[0].name = "jean dupont".to_string();
        let err = service.create_workflow(&blank_pdf(1), "a.pdf", &duplicate).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let mut empty = request();
        empty.signers.clear();
        empty.fields.clear();
        let err = service.create_workflow(&blank_pdf(1), "a.pdf", &empty).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let mut orphan = request();
        orphan.fields.push(field("x", "nobody", FieldKind::Text));
        let err = service.create_workflow(&blank_pdf(1), "a.pdf", &orphan).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert!(service.list_workflows().unwrap().is_empty());
    }

    #[test]
    fn test_create_rejects_orders_that_cannot_advance() {
        let service = service();
        let mut last = request();
        last.signers[0].order = u32::MAX;
        let err = service.create_workflow(&blank_pdf(1), "a.pdf", &last).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let mut zero = request();
        zero.signers[1].order = 0;
        let err = service.create_workflow(&blank_pdf(1), "a.pdf", &zero).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert!(service.list_workflows().unwrap().is_empty());
    }

    #[test]
    fn test_turn_at_order_limit_fails_before_signing() {
        let service = service();
        let id = service.create_workflow(&blank_pdf(1), "a.pdf", &request()).unwrap().workflow_id;
        let mut workflow = service.store().workflow(&id).unwrap().unwrap();
        let document = service.store().document(&id).unwrap().unwrap();
        workflow.current_signer_order = u32::MAX;
        for signer in workflow.signers.iter_mut().filter(|s| s.signer_id == "jean-dupont") {
            signer.order = u32::MAX;
        }
        service.store().commit(workflow, document.clone(), 0).unwrap();

        let err = service.fill_and_sign(&id, &fill("Jean Dupont", &[("nom", "Dupont")])).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(service.store().document(&id).unwrap().unwrap(), document);
        assert_eq!(service.store().workflow(&id).unwrap().unwrap().current_signer_order, u32::MAX);
    }

    #[test]
    fn test_turn_enforcement() {
        let service = service();
        let id = service.create_workflow(&blank_pdf(1), "a.pdf", &request()).unwrap().workflow_id;

        let err = service.get_document_for_signer(&id, "marie-curie").unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        let err = service.get_document_for_signer(&id, "inconnu").unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        let err = service.get_document_for_signer("missing", "jean-dupont").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let before = service.store().document(&id).unwrap().unwrap();
        let err = service.fill_and_sign(&id, &fill("Marie Curie", &[("ville", "Paris")])).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(service.store().document(&id).unwrap().unwrap(), before);
        assert_eq!(service.store().workflow(&id).unwrap().unwrap().version, 0);
    }

    #[test]
    fn test_signer_view() {
        let service = service();
        let id = service.create_workflow(&blank_pdf(1), "a.pdf", &request()).unwrap().workflow_id;

        let view = service.get_document_for_signer(&id, "jean-dupont").unwrap();
        assert_eq!(view.signer_name, "Jean Dupont");
        assert_eq!(view.workflow_name, "Contrat");
        assert!(!view.last_signer);
        assert_eq!(view.fields.len(), 2);
        assert_eq!(view.signers[0].status, SignerViewStatus::Current);
        assert_eq!(view.signers[1].status, SignerViewStatus::Pending);

        let pdf = base64::engine::general_purpose::STANDARD
            .decode(&view.pdf_base64)
            .unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_missing_placement_is_bad_request() {
        let service = service();
        let id = service.create_workflow(&blank_pdf(1), "a.pdf", &request()).unwrap().workflow_id;

        let mut request = fill("Jean Dupont", &[("nom", "Dupont")]);
        request.signature_placement = None;
        let err = service.fill_and_sign(&id, &request).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        let document = service.store().document(&id).unwrap().unwrap();
        assert_eq!(document.revision, 0);
        assert_eq!(definition(&document.fields, "nom").current_value, "");
    }

    #[test]
    fn test_fill_and_sign_ownership_and_turns() {
        let service = service();
        let id = service.create_workflow(&blank_pdf(1), "a.pdf", &request()).unwrap().workflow_id;

        let response = service
            .fill_and_sign(
                &id,
                &fill("Jean Dupont", &[("nom", "Dupont"), ("accord", "true"), ("ville", "Lyon"), ("zzz", "1")]),
            )
            .unwrap();
        assert!(!response.completed);
        assert_eq!(response.workflow_status, WorkflowStatus::InProgress);

        let workflow = service.store().workflow(&id).unwrap().unwrap();
        assert_eq!(workflow.current_signer_order, 2);
        assert_eq!(workflow.version, 1);
        assert_eq!(workflow.signer("jean-dupont").unwrap().status, SignerStatus::Signed);

        let document = service.store().document(&id).unwrap().unwrap();
        assert!(document.flattened_stale);
        assert_eq!(document.revision, 1);
        assert_eq!(definition(&document.fields, "nom").current_value, "Dupont");
        assert_eq!(definition(&document.fields, "accord").current_value, "true");
        assert_eq!(definition(&document.fields, "ville").current_value, "");

        let err = service.get_document_for_signer(&id, "jean-dupont").unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let view = service.get_document_for_signer(&id, "marie-curie").unwrap();
        assert!(view.last_signer);
        assert_eq!(view.signers[0].status, SignerViewStatus::Signed);
        assert!(!service.store().document(&id).unwrap().unwrap().flattened_stale);

        let err = service.download_final(&id).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let response = service.fill_and_sign(&id, &fill("Marie Curie", &[])).unwrap();
        assert!(response.completed);
        assert_eq!(response.workflow_status, WorkflowStatus::Completed);

        let final_doc = service.download_final(&id).unwrap();
        assert_eq!(final_doc.file_name, "Contrat.pdf");
        assert_eq!(final_doc.bytes, service.store().document(&id).unwrap().unwrap().master_pdf);
    }

    #[test]
    fn test_list_workflows_newest_first() {
        let service = service();
        let first = service.create_workflow(&blank_pdf(1), "a.pdf", &request()).unwrap().workflow_id;
        let second = service.create_workflow(&blank_pdf(1), "b.pdf", &request()).unwrap().workflow_id;
        service.fill_and_sign(&first, &fill("Jean Dupont", &[])).unwrap();

        let summaries = service.list_workflows().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, first);
        assert_eq!(summaries[1].id, second);
        assert_eq!(summaries[0].signers[0].status, SignerProgress::Signed);
        assert_eq!(summaries[0].signers[1].status, SignerProgress::InProgress);
        assert_eq!(summaries[1].signers[1].status, SignerProgress::Pending);
    }
}
