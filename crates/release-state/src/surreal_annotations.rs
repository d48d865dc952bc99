//! SurrealDB-backed AnnotationStore implementation
//!
//! Each annotation kind lives in its own table and each row's record key is
//! the owning release key, so an upsert replaces in place.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, error, instrument};

use crate::error::StorageError;
use crate::outcome::Outcome;
use crate::schema::AnnotationRow;
use crate::storage_traits::{AnnotationKind, AnnotationStore, ReleaseId};

/// SurrealDB-backed implementation of [`AnnotationStore`].
///
/// Cheap to clone; every clone shares the underlying connection.
#[derive(Clone)]
pub struct SurrealAnnotationStore {
    db: Surreal<Any>,
}

impl SurrealAnnotationStore {
    pub fn new(db: Surreal<Any>) -> Self {
        Self { db }
    }

    async fn run(
        &self,
        operation: &'static str,
        sql: &'static str,
        kind: AnnotationKind,
        release_id: &ReleaseId,
        value: Option<&str>,
    ) -> Result<surrealdb::Response, StorageError> {
        let mut query = self
            .db
            .query(sql)
            .bind(("tb", kind.table()))
            .bind(("rid", release_id.0.clone()));
        if let Some(value) = value {
            query = query.bind(("value", value.to_string()));
        }
        query.await.map_err(|e| StorageError::backend(operation, e))
    }
}

#[async_trait]
impl AnnotationStore for SurrealAnnotationStore {
    #[instrument(skip(self, value), fields(kind = %kind, release_id = %release_id))]
    async fn upsert(&self, kind: AnnotationKind, release_id: &ReleaseId, value: &str) -> bool {
        const OP: &str = "upsert_annotation";
        const SQL: &str = "UPSERT type::thing($tb, $rid) SET release_id = $rid, value = $value";

        let result = async {
            let mut response = self.run(OP, SQL, kind, release_id, Some(value)).await?;
            let rows: Vec<AnnotationRow> = response
                .take(0)
                .map_err(|e| StorageError::backend(OP, e))?;
            Ok::<usize, StorageError>(rows.len())
        }
        .await;

        match result {
            Ok(1) => true,
            Ok(affected) => {
                error!(affected, "annotation upsert did not affect exactly one row");
                false
            }
            Err(err) => {
                error!(error = %err, "annotation store operation failed");
                false
            }
        }
    }

    #[instrument(skip(self), fields(kind = %kind, release_id = %release_id))]
    async fn get(&self, kind: AnnotationKind, release_id: &ReleaseId) -> Outcome<String> {
        const OP: &str = "get_annotation";
        const SQL: &str = "SELECT release_id, value FROM type::thing($tb, $rid)";

        let result = async {
            let mut response = self.run(OP, SQL, kind, release_id, None).await?;
            let rows: Vec<AnnotationRow> = response
                .take(0)
                .map_err(|e| StorageError::backend(OP, e))?;
            match rows.len() {
                0 | 1 => Ok(rows.into_iter().next().map(|row| row.value)),
                n => Err(StorageError::malformed(
                    OP,
                    format!("{n} rows for one release"),
                )),
            }
        }
        .await;

        match result {
            Ok(Some(value)) => Outcome::Present(value),
            Ok(None) => {
                debug!("annotation not set");
                Outcome::Empty
            }
            Err(err) => {
                error!(error = %err, "annotation store operation failed");
                Outcome::Error
            }
        }
    }

    #[instrument(skip(self), fields(kind = %kind, release_id = %release_id))]
    async fn delete(&self, kind: AnnotationKind, release_id: &ReleaseId) -> Outcome<bool> {
        const OP: &str = "delete_annotation";
        const SQL: &str = "DELETE type::thing($tb, $rid) RETURN BEFORE";

        let result = async {
            let mut response = self.run(OP, SQL, kind, release_id, None).await?;
            let rows: Vec<AnnotationRow> = response
                .take(0)
                .map_err(|e| StorageError::backend(OP, e))?;
            Ok::<usize, StorageError>(rows.len())
        }
        .await;

        match result {
            Ok(0) => Outcome::Empty,
            Ok(_) => Outcome::Present(true),
            Err(err) => {
                error!(error = %err, "annotation store operation failed");
                Outcome::Error
            }
        }
    }
}
