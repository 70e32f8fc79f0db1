//! Lifecycle hooks.
//!
//! A model may carry a [`Hooks`] implementation. Every method defaults to a no-op, so an
//! implementation only overrides the stages it cares about. Returning an error from any
//! hook aborts the surrounding save or delete, and the error reaches the caller as-is.
//!
//! # Example
//!
//! ```ignore
//! struct Slugify;
//!
//! #[async_trait]
//! impl Hooks for Slugify {
//!     async fn pre_validate(&self, document: &mut Document) -> DocumentStoreResult<()> {
//!         let slug = document
//!             .get("title")
//!             .and_then(Value::as_str)
//!             .map(|title| title.to_lowercase().replace(' ', "-"));
//!
//!         document.set("slug", slug)
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::{FutureExt, future::BoxFuture};

use crate::{document::Document, error::DocumentStoreResult, value::Value};

/// Callbacks around validation, save and delete.
///
/// Hooks run for the document being saved or deleted and then, in field order, for every
/// embedded document it holds, including embedded documents inside arrays.
#[async_trait]
pub trait Hooks: Send + Sync {
    /// Runs before defaults are re-applied and the document is validated.
    async fn pre_validate(&self, _document: &mut Document) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Runs after validation succeeded.
    async fn post_validate(&self, _document: &mut Document) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Runs right before the record is written.
    async fn pre_save(&self, _document: &mut Document) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Runs after the record was written and the identity adopted.
    async fn post_save(&self, _document: &mut Document) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Runs before the record is deleted.
    async fn pre_delete(&self, _document: &mut Document) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Runs after the record was deleted.
    async fn post_delete(&self, _document: &mut Document) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// A point in the lifecycle where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    PreValidate,
    PostValidate,
    PreSave,
    PostSave,
    PreDelete,
    PostDelete,
}

impl HookStage {
    async fn invoke(self, hooks: &dyn Hooks, document: &mut Document) -> DocumentStoreResult<()> {
        match self {
            HookStage::PreValidate => hooks.pre_validate(document).await,
            HookStage::PostValidate => hooks.post_validate(document).await,
            HookStage::PreSave => hooks.pre_save(document).await,
            HookStage::PostSave => hooks.post_save(document).await,
            HookStage::PreDelete => hooks.pre_delete(document).await,
            HookStage::PostDelete => hooks.post_delete(document).await,
        }
    }
}

/// Runs `stage` for `document`, then for each embedded document it holds.
pub(crate) fn run_hooks(
    document: &mut Document,
    stage: HookStage,
) -> BoxFuture<'_, DocumentStoreResult<()>> {
    async move {
        if let Some(hooks) = document.model().hooks().cloned() {
            stage
                .invoke(hooks.as_ref(), document)
                .await?;
        }

        let model = Arc::clone(document.model());

        for (name, _) in model.schema().fields() {
            match document.get_mut(name) {
                Some(Value::Document(child)) if child.is_embedded() => {
                    run_hooks(child, stage).await?;
                }
                Some(Value::Array(items)) => {
                    for item in items.iter_mut() {
                        if let Value::Document(child) = item {
                            if child.is_embedded() {
                                run_hooks(child, stage).await?;
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        error::DocumentStoreError,
        model::Model,
        types::FieldType,
    };

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Hooks for Recorder {
        async fn pre_save(&self, document: &mut Document) -> DocumentStoreResult<()> {
            self.0
                .lock()
                .unwrap()
                .push(document.model().name().to_string());
            Ok(())
        }

        async fn pre_delete(&self, _document: &mut Document) -> DocumentStoreResult<()> {
            Err(DocumentStoreError::Hook("deletes are disabled".to_string()))
        }
    }

    #[tokio::test]
    async fn hooks_run_parent_first_then_embedded_in_field_order() {
        let recorder = Recorder::default();
        let wheel = Model::embedded("wheel")
            .hooks(recorder.clone())
            .build()
            .unwrap();
        let engine = Model::embedded("engine")
            .hooks(recorder.clone())
            .build()
            .unwrap();
        let car = Model::document("cars")
            .field("engine", FieldType::embedded(&engine))
            .field("wheels", FieldType::array_of(FieldType::embedded(&wheel)))
            .hooks(recorder.clone())
            .build()
            .unwrap();

        let mut document = Document::new(&car);
        document
            .set("engine", Document::new(&engine))
            .unwrap();
        document
            .set(
                "wheels",
                vec![Value::from(Document::new(&wheel)), Value::from(Document::new(&wheel))],
            )
            .unwrap();

        run_hooks(&mut document, HookStage::PreSave)
            .await
            .unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["cars", "engine", "wheel", "wheel"]
        );
    }

    #[tokio::test]
    async fn hook_errors_propagate_unchanged() {
        let model = Model::document("cars")
            .hooks(Recorder::default())
            .build()
            .unwrap();
        let mut document = Document::new(&model);

        let err = run_hooks(&mut document, HookStage::PreDelete)
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Hook(ref reason) if reason == "deletes are disabled"));
    }

    #[tokio::test]
    async fn models_without_hooks_are_a_no_op() {
        let model = Model::document("cars")
            .build()
            .unwrap();
        let mut document = Document::new(&model);

        assert!(
            run_hooks(&mut document, HookStage::PostSave)
                .await
                .is_ok()
        );
    }
}
