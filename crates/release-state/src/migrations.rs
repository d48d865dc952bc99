//! SurrealDB schema initialization
//!
//! Sets up the release table and the five annotation tables with their
//! uniqueness constraints. Safe to call on every connection (idempotent).

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StateError;
use crate::storage_traits::AnnotationKind;
use crate::Result;

/// Initialize all release tracker tables.
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing release tracker schema");

    init_releases_table(db).await?;
    for kind in AnnotationKind::ALL {
        init_annotation_table(db, kind).await?;
    }

    info!("Release tracker schema initialization complete");
    Ok(())
}

/// Initialize `releases` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE releases {
///   id:                 RECORD (releases:<ulid>, store-assigned)
///   application:        STRING
///   environment:        STRING
///   version:            STRING
///   release_timestamp:  DATETIME (nanosecond precision)
/// }
/// ```
///
/// Constraints:
/// - `(application, environment, version, release_timestamp)` is unique
/// - rows are never updated or deleted by the tracker
async fn init_releases_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing releases table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS releases SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS application ON releases TYPE string;
        DEFINE FIELD IF NOT EXISTS environment ON releases TYPE string;
        DEFINE FIELD IF NOT EXISTS version ON releases TYPE string;
        DEFINE FIELD IF NOT EXISTS release_timestamp ON releases TYPE datetime;

        -- Identity tuple is unique; a second insert must fail
        DEFINE INDEX IF NOT EXISTS idx_release_identity ON TABLE releases
            COLUMNS application, environment, version, release_timestamp UNIQUE;

        -- "Current" lookups per application and per application + environment
        DEFINE INDEX IF NOT EXISTS idx_release_app ON TABLE releases
            COLUMNS application, release_timestamp;
        DEFINE INDEX IF NOT EXISTS idx_release_app_env ON TABLE releases
            COLUMNS application, environment, release_timestamp;
    "#;

    db.query(sql)
        .await?
        .check()
        .map_err(|e| StateError::SchemaSetup(format!("releases: {e}")))?;
    debug!("releases table initialized");
    Ok(())
}

/// Initialize one annotation table
///
/// Schema:
/// ```text
/// TABLE <kind table> {
///   id:          RECORD (<table>:<release key>)
///   release_id:  STRING (release key)
///   value:       STRING
/// }
/// ```
///
/// The record key equals the release key, so a release has at most one row
/// per kind. The unique index on `release_id` backs the same invariant for
/// joins.
async fn init_annotation_table(db: &Surreal<Any>, kind: AnnotationKind) -> Result<()> {
    let table = kind.table();
    debug!(table, "Initializing annotation table");

    let sql = format!(
        r#"
        DEFINE TABLE IF NOT EXISTS {table} SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS release_id ON {table} TYPE string;
        DEFINE FIELD IF NOT EXISTS value ON {table} TYPE string;
        DEFINE INDEX IF NOT EXISTS idx_{table}_release ON TABLE {table} COLUMNS release_id UNIQUE;
        "#
    );

    db.query(sql)
        .await?
        .check()
        .map_err(|e| StateError::SchemaSetup(format!("{table}: {e}")))?;
    debug!(table, "annotation table initialized");
    Ok(())
}
