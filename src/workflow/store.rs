//! Workflow persistence.
//!
//! [`WorkflowStore`] is the seam between the state machine and whatever
//! keeps the records. Writes that race are settled here: `commit` compares
//! the workflow version, `store_flattened` compares the document revision.

use super::model::{Document, Workflow};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Storage for workflows and their documents.
pub trait WorkflowStore: Send + Sync {
    /// Store a new workflow with its document.
    fn insert(&self, workflow: Workflow, document: Document) -> Result<()>;

    /// Workflow by id.
    fn workflow(&self, id: &str) -> Result<Option<Workflow>>;

    /// Document of a workflow.
    fn document(&self, workflow_id: &str) -> Result<Option<Document>>;

    /// Every workflow, in no particular order.
    fn list(&self) -> Result<Vec<Workflow>>;

    /// Replace a workflow and its document together.
    ///
    /// Fails with [`Error::Conflict`] and changes nothing when the stored
    /// version is not `expected_version`. On success the stored workflow
    /// carries `expected_version + 1` and is returned.
    fn commit(&self, workflow: Workflow, document: Document, expected_version: u64) -> Result<Workflow>;

    /// Cache a flattened snapshot taken at `revision` and mark it fresh.
    ///
    /// Returns `false` without writing when the document has moved past
    /// `revision`.
    fn store_flattened(&self, workflow_id: &str, revision: u64, flattened: Vec<u8>) -> Result<bool>;
}

#[derive(Debug, Default)]
struct Records {
    workflows: HashMap<String, Workflow>,
    documents: HashMap<String, Document>,
}

/// Process-local store behind a single mutex.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<Records>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>> {
        self.records
            .lock()
            .map_err(|_| Error::Internal("workflow store lock poisoned".to_string()))
    }
}

impl WorkflowStore for InMemoryStore {
    fn insert(&self, workflow: Workflow, document: Document) -> Result<()> {
        let mut records = self.lock()?;
        if records.workflows.contains_key(&workflow.id) {
            return Err(Error::Conflict(format!("workflow {} already exists", workflow.id)));
        }
        records.documents.insert(workflow.id.clone(), document);
        records.workflows.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    fn workflow(&self, id: &str) -> Result<Option<Workflow>> {
        Ok(self.lock()?.workflows.get(id).cloned())
    }

    fn document(&self, workflow_id: &str) -> Result<Option<Document>> {
        Ok(self.lock()?.documents.get(workflow_id).cloned())
    }

    fn list(&self) -> Result<Vec<Workflow>> {
        Ok(self.lock()?.workflows.values().cloned().collect())
    }

    fn commit(&self, mut workflow: Workflow, document: Document, expected_version: u64) -> Result<Workflow> {
        let mut records = self.lock()?;
        let stored = records
            .workflows
            .get(&workflow.id)
            .ok_or_else(|| Error::NotFound(format!("workflow {}", workflow.id)))?;
        if stored.version != expected_version {
            return Err(Error::Conflict(format!(
                "workflow {} was modified concurrently (version {} expected, {} stored)",
                workflow.id, expected_version, stored.version
            )));
        }

        workflow.version = expected_version + 1;
        records.documents.insert(workflow.id.clone(), document);
        records.workflows.insert(workflow.id.clone(), workflow.clone());
        Ok(workflow)
    }

    fn store_flattened(&self, workflow_id: &str, revision: u64, flattened: Vec<u8>) -> Result<bool> {
        let mut records = self.lock()?;
        let document = records
            .documents
            .get_mut(workflow_id)
            .ok_or_else(|| Error::NotFound(format!("document of workflow {}", workflow_id)))?;
        if document.revision != revision {
            log::debug!(
                "Dropping snapshot of revision {} for {}: document is at revision {}",
                revision,
                workflow_id,
                document.revision
            );
            return Ok(false);
        }
        document.flattened_pdf = flattened;
        document.flattened_stale = false;
        Ok(true)
    }
}
