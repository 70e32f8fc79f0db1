//! One-hop reference population.
//!
//! Population replaces bare identities in reference fields with instances of the target
//! model. It issues at most one query per reference field for the whole batch, however many
//! documents or duplicate identities the batch holds, and runs those queries concurrently.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use futures::future::join_all;

use crate::{
    database::Database,
    document::Document,
    error::DocumentStoreResult,
    model::Model,
    query::{Filter, Query},
    value::{Identity, IdentityKind, Value},
};

/// A reference field to resolve and the identities the batch holds for it.
struct FieldLookup {
    field: String,
    target: Arc<Model>,
    ids: Vec<Identity>,
}

/// Resolves reference fields of `documents` in place.
///
/// The reference fields are taken from the first document's model and narrowed to
/// `fields` when given. Each slot holding an identity that resolves is replaced by the
/// loaded instance, in place, so arrays keep their order and duplicates. Slots already
/// holding an instance are left alone, as are identities with no matching record.
///
/// # Arguments
///
/// * `db` - The database to load targets from
/// * `documents` - Documents sharing one model
/// * `fields` - Reference fields to resolve, or `None` for all of them
///
/// # Errors
///
/// Returns [`DocumentStoreError::UnknownModel`](crate::error::DocumentStoreError::UnknownModel)
/// if a reference targets a model not registered on `db`, or an error from rehydrating a
/// loaded record. A failed lookup query is logged and treated as finding nothing.
pub async fn populate(
    db: &Database,
    documents: &mut [Document],
    fields: Option<&[&str]>,
) -> DocumentStoreResult<()> {
    let Some(first) = documents.first() else {
        return Ok(());
    };

    let identity = db.identity_kind();
    let model = Arc::clone(first.model());

    let mut lookups = Vec::new();

    for (field, target) in model.schema().reference_fields() {
        if fields.is_some_and(|allowed| !allowed.contains(&field)) {
            continue;
        }

        lookups.push(FieldLookup {
            field: field.to_string(),
            target: Arc::clone(db.model(target)?),
            ids: collect_ids(documents, field, identity),
        });
    }

    let resolved = join_all(
        lookups
            .iter()
            .map(|lookup| load_targets(db, lookup)),
    )
    .await
    .into_iter()
    .collect::<DocumentStoreResult<Vec<_>>>()?;

    for (lookup, targets) in lookups.iter().zip(resolved) {
        if targets.is_empty() {
            continue;
        }

        for document in documents.iter_mut() {
            if let Some(value) = document.values.get_mut(&lookup.field) {
                assign(value, &targets, identity);
            }
        }
    }

    Ok(())
}

/// Collects the distinct identities held in `field` across `documents`, in first-seen order.
fn collect_ids(documents: &[Document], field: &str, identity: IdentityKind) -> Vec<Identity> {
    let mut seen = HashSet::new();

    documents
        .iter()
        .filter_map(|document| document.get(field))
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            single => vec![single],
        })
        .filter_map(|value| identity.parse(value))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Loads the records behind `lookup.ids` as instances of the target model, keyed by identity.
async fn load_targets(
    db: &Database,
    lookup: &FieldLookup,
) -> DocumentStoreResult<HashMap<Identity, Document>> {
    if lookup.ids.is_empty() {
        return Ok(HashMap::new());
    }

    let query = Query::from(Filter::id_in(&lookup.ids));

    let records = match db
        .backend()
        .find(lookup.target.name(), query)
        .await
    {
        Ok(records) => records,
        Err(err) => {
            log::warn!(
                "failed to load {} references for field {}: {err}",
                lookup.target.name(),
                lookup.field
            );
            return Ok(HashMap::new());
        }
    };

    let mut targets = HashMap::with_capacity(records.len());

    for record in records {
        let document = Document::from_record(&lookup.target, record)?;

        if let Some(id) = document.id().cloned() {
            targets.insert(id, document);
        }
    }

    Ok(targets)
}

fn assign(value: &mut Value, targets: &HashMap<Identity, Document>, identity: IdentityKind) {
    match value {
        Value::Array(items) => items
            .iter_mut()
            .for_each(|item| assign(item, targets, identity)),
        Value::Document(_) => {}
        slot => {
            if let Some(target) = identity
                .parse(slot)
                .and_then(|id| targets.get(&id))
            {
                *slot = Value::from(target.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::Model, types::FieldType};

    #[test]
    fn collect_ids_deduplicates_across_documents() {
        let posts = Model::document("posts")
            .field("authors", FieldType::array_of(FieldType::reference("users")))
            .build()
            .unwrap();
        let a = IdentityKind::Uuid.generate();
        let b = IdentityKind::Uuid.generate();

        let mut first = Document::new(&posts);
        first
            .set("authors", vec![a.clone(), a.clone(), b.clone()])
            .unwrap();
        let mut second = Document::new(&posts);
        second
            .set("authors", vec![Value::Text(b.to_string())])
            .unwrap();

        let ids = collect_ids(&[first, second], "authors", IdentityKind::Uuid);

        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn assign_preserves_order_and_duplicates() {
        let users = Model::document("users")
            .field("name", FieldType::Text)
            .build()
            .unwrap();
        let a = IdentityKind::Uuid.generate();
        let b = IdentityKind::Uuid.generate();
        let missing = IdentityKind::Uuid.generate();

        let mut targets = HashMap::new();
        for (id, name) in [(&a, "a"), (&b, "b")] {
            let mut user = Document::new(&users);
            user.set("name", name).unwrap();
            user.set_id(id.clone());
            targets.insert(id.clone(), user);
        }

        let mut value = Value::from(vec![a.clone(), a, b, missing.clone()]);
        assign(&mut value, &targets, IdentityKind::Uuid);

        let items = value.as_array().unwrap();
        let names = items
            .iter()
            .filter_map(Value::as_document)
            .filter_map(|user| user.get("name").and_then(Value::as_str))
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["a", "a", "b"]);
        assert_eq!(items[3], Value::Id(missing));
    }
}
