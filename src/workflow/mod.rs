//! Multi-party signing workflows.
//!
//! A workflow pairs a [`Workflow`] record (signers, turn pointer, status)
//! with a [`Document`] record (the append-only master, its flattened
//! snapshot and the field definitions). [`WorkflowService`] moves both
//! through their lifecycle:
//!
//! 1. `create_workflow` builds and certifies the master;
//! 2. each signer, in order, reads the snapshot with
//!    `get_document_for_signer` and submits with `fill_and_sign`;
//! 3. once the last signer is done, `download_final` hands out the master.
//!
//! ## Example
//!
//! ```no_run
//! use pdf_cosign::config::WorkflowConfig;
//! use pdf_cosign::signatures::SigningCredentials;
//! use pdf_cosign::workflow::{SignerRequest, WorkflowCreateRequest, WorkflowService};
//!
//! let credentials = SigningCredentials::from_files("cert.pem", "key.pem")?;
//! let service = WorkflowService::in_memory(credentials, WorkflowConfig::default());
//! let request = WorkflowCreateRequest {
//!     name: "Contrat".to_string(),
//!     signers: vec![SignerRequest { name: "Jean Dupont".to_string(), order: 1 }],
//!     fields: Vec::new(),
//! };
//! let created = service.create_workflow(&std::fs::read("contrat.pdf")?, "contrat.pdf", &request)?;
//! let view = service.get_document_for_signer(&created.workflow_id, "jean-dupont")?;
//! # let _ = view;
//! # Ok::<(), pdf_cosign::error::Error>(())
//! ```

mod dto;
mod model;
mod service;
mod slug;
mod store;

pub use dto::{
    FieldRequest, FieldView, FillAndSignRequest, FillAndSignResponse, FinalDocument, SignerContext,
    SignerDocumentResponse, SignerInfo, SignerProgress, SignerRequest, SignerSummary, SignerViewStatus,
    WorkflowCreateRequest, WorkflowCreateResponse, WorkflowSummary,
};
pub use model::{Document, FieldDefinition, Signer, SignerStatus, Workflow, WorkflowStatus};
pub use service::WorkflowService;
pub use slug::slugify;
pub use store::{InMemoryStore, WorkflowStore};
