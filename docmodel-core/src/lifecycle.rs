//! Saving and deleting top-level documents.
//!
//! Save runs, in order: pre-validate hooks, default re-affirmation, validation,
//! canonicalization, record construction with references reduced to identities,
//! post-validate hooks, pre-save hooks, the backend upsert, identity adoption and finally
//! post-save hooks. A failure at any step before the upsert leaves the store untouched.

use bson::{Bson, Document as Record};

use crate::{
    database::Database,
    document::{Document, LifecycleState},
    error::{DocumentStoreError, DocumentStoreResult},
    hooks::{HookStage, run_hooks},
    value::{Identity, IdentityKind, Value},
};

impl Document {
    /// Validates and persists the document.
    ///
    /// The first save inserts and adopts the identity the backend generated; later saves
    /// replace the stored record under that identity.
    ///
    /// # Arguments
    ///
    /// * `db` - The database to save into
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidDocument`] for embedded or deleted documents
    /// - [`DocumentStoreError::Validation`] if the document does not satisfy its schema
    /// - any error returned by a hook or by the backend, unchanged
    pub async fn save(&mut self, db: &Database) -> DocumentStoreResult<&mut Self> {
        if self.is_embedded() {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "embedded {} documents are saved with their parent",
                self.model().name()
            )));
        }

        if self.state() == LifecycleState::Deleted {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "cannot save a deleted {} document",
                self.model().name()
            )));
        }

        let identity = db.identity_kind();

        run_hooks(self, HookStage::PreValidate).await?;

        self.ensure_defaults();
        self.validate(identity)?;
        self.canonicalize();

        let record = self.storage_record(identity);

        run_hooks(self, HookStage::PostValidate).await?;
        run_hooks(self, HookStage::PreSave).await?;

        let id = db
            .backend()
            .upsert(self.model().name(), self.id(), record)
            .await?;

        log::debug!("saved {} document {id}", self.model().name());

        self.set_id(id);
        self.set_state(LifecycleState::Persisted);

        run_hooks(self, HookStage::PostSave).await?;

        Ok(self)
    }

    /// Deletes the document from the store.
    ///
    /// A document that was never saved, or was already deleted, has nothing to delete: no
    /// hooks run, the backend is not called, and the result is `0`. Otherwise the document
    /// ends up [`Deleted`](LifecycleState::Deleted).
    ///
    /// # Returns
    ///
    /// The number of records removed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] for embedded documents, and any error
    /// returned by a hook or by the backend unchanged.
    pub async fn delete(&mut self, db: &Database) -> DocumentStoreResult<u64> {
        if self.is_embedded() {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "embedded {} documents are deleted with their parent",
                self.model().name()
            )));
        }

        if self.state() == LifecycleState::Deleted {
            return Ok(0);
        }

        let Some(id) = self.id().cloned() else {
            return Ok(0);
        };

        run_hooks(self, HookStage::PreDelete).await?;

        let deleted = db
            .backend()
            .delete_by_id(self.model().name(), &id)
            .await?;

        log::debug!("deleted {} document {id}", self.model().name());

        self.set_state(LifecycleState::Deleted);

        run_hooks(self, HookStage::PostDelete).await?;

        Ok(deleted)
    }

    /// Builds the record written on save: the storage form without identity, with every
    /// reference field reduced to the bare identity of its target.
    fn storage_record(&self, identity: IdentityKind) -> Record {
        let mut record = self.to_storage_form(false);

        for (field, _) in self.model().schema().reference_fields() {
            if let Some(value) = self.get(field) {
                record.insert(field, reference_to_bson(value, identity));
            }
        }

        record
    }
}

fn reference_to_bson(value: &Value, identity: IdentityKind) -> Bson {
    match value {
        Value::Array(items) => Bson::Array(
            items
                .iter()
                .map(|item| reference_to_bson(item, identity))
                .collect(),
        ),
        Value::Document(target) => target
            .id()
            .map(Identity::to_bson)
            .unwrap_or(Bson::Null),
        other => identity
            .parse(other)
            .map(|id| id.to_bson())
            .unwrap_or_else(|| other.to_bson()),
    }
}
