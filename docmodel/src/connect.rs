use docmodel_core::{
    backend::StoreBackendBuilder,
    database::Database,
    error::{DocumentStoreError, DocumentStoreResult},
};
use docmodel_memory::InMemoryStore;

/// Opens a [`Database`] over the backend named by the scheme of `url`.
///
/// | Scheme | Backend |
/// |---|---|
/// | `memory://` | [`InMemoryStore`] |
/// | `mongodb://`, `mongodb+srv://` | `MongoDbStore`, with the database taken from the URL path (feature `mongodb`) |
///
/// The returned database has no models registered.
///
/// # Arguments
///
/// * `url` - The connection string
///
/// # Errors
///
/// Returns [`DocumentStoreError::UnsupportedScheme`] for any other scheme, including the
/// MongoDB schemes when the `mongodb` feature is disabled, and
/// [`DocumentStoreError::Initialization`] if the backend cannot be set up.
///
/// # Example
///
/// ```ignore
/// let db = docmodel::connect("memory://").await?;
/// ```
pub async fn connect(url: &str) -> DocumentStoreResult<Database> {
    let scheme = url
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .ok_or_else(|| DocumentStoreError::UnsupportedScheme(url.to_string()))?;

    log::debug!("Connecting to {scheme} backend");

    match scheme {
        "memory" => Ok(Database::new(InMemoryStore::builder().build().await?)),
        #[cfg(feature = "mongodb")]
        "mongodb" | "mongodb+srv" => Ok(Database::new(
            docmodel_mongodb::MongoDbStore::from_url(url)
                .build()
                .await?,
        )),
        other => Err(DocumentStoreError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use docmodel_core::value::IdentityKind;

    use super::*;

    #[tokio::test]
    async fn memory_scheme_opens_an_in_memory_database() {
        let db = connect("memory://").await.unwrap();

        assert_eq!(db.identity_kind(), IdentityKind::Uuid);
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let err = connect("postgres://localhost/db").await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::UnsupportedScheme(scheme) if scheme == "postgres"));
        assert!(matches!(
            connect("not a url").await,
            Err(DocumentStoreError::UnsupportedScheme(_))
        ));
    }

    #[cfg(not(feature = "mongodb"))]
    #[tokio::test]
    async fn mongodb_scheme_needs_the_feature() {
        assert!(matches!(
            connect("mongodb://localhost:27017/blog").await,
            Err(DocumentStoreError::UnsupportedScheme(_))
        ));
    }
}
