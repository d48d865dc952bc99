//! SurrealDB-backed ReleaseStore implementation
//!
//! Uses `schema::ReleaseRow` and `schema::FullReleaseRow` for persistence,
//! converting to `storage_traits` types at the boundary. Every fault is
//! logged here, once, and reported as `Outcome::Error`.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, error, instrument};

use crate::error::StorageError;
use crate::outcome::Outcome;
use crate::schema::{FullReleaseRow, ReleaseRow};
use crate::storage_traits::{
    FullRelease, Release, ReleaseId, ReleaseIdentity, ReleaseScope, ReleaseStore,
};

const RELEASE_PROJECTION: &str =
    "meta::id(id) AS id, application, environment, version, release_timestamp";

/// Left join of a release with every annotation table, one column per kind.
const FULL_RELEASE_PROJECTION: &str = r#"
    meta::id(id) AS id, application, environment, version, release_timestamp,
    (SELECT VALUE value FROM release_names WHERE release_id = meta::id($parent.id))[0] AS release_name,
    (SELECT VALUE value FROM descriptions WHERE release_id = meta::id($parent.id))[0] AS description,
    (SELECT VALUE value FROM changes WHERE release_id = meta::id($parent.id))[0] AS changes,
    (SELECT VALUE value FROM responsibilities WHERE release_id = meta::id($parent.id))[0] AS responsibility,
    (SELECT VALUE value FROM build_locations WHERE release_id = meta::id($parent.id))[0] AS build_location
"#;

/// SurrealDB-backed implementation of [`ReleaseStore`].
#[derive(Clone)]
pub struct SurrealReleaseStore {
    db: Surreal<Any>,
}

impl SurrealReleaseStore {
    pub fn new(db: Surreal<Any>) -> Self {
        Self { db }
    }

    fn scope_filter(scope: &ReleaseScope) -> &'static str {
        match scope {
            ReleaseScope::All => "",
            ReleaseScope::Application(_) => "WHERE application = $app",
            ReleaseScope::ApplicationEnvironment(_, _) => {
                "WHERE application = $app AND environment = $env"
            }
        }
    }

    async fn run_scoped(
        &self,
        operation: &'static str,
        scope: &ReleaseScope,
        sql: String,
    ) -> Result<Vec<FullReleaseRow>, StorageError> {
        let mut query = self.db.query(sql);
        match scope {
            ReleaseScope::All => {}
            ReleaseScope::Application(app) => {
                query = query.bind(("app", app.clone()));
            }
            ReleaseScope::ApplicationEnvironment(app, env) => {
                query = query.bind(("app", app.clone())).bind(("env", env.clone()));
            }
        }

        let mut response = query
            .await
            .map_err(|e| StorageError::backend(operation, e))?;
        response
            .take(0)
            .map_err(|e| StorageError::backend(operation, e))
    }
}

fn single_release(
    operation: &'static str,
    rows: Vec<ReleaseRow>,
) -> Result<Option<Release>, StorageError> {
    if rows.len() > 1 {
        return Err(StorageError::malformed(
            operation,
            format!("{} rows for a unique key", rows.len()),
        ));
    }
    rows.into_iter()
        .next()
        .map(|row| row.into_release(operation))
        .transpose()
}

fn failed<T>(err: StorageError) -> Outcome<T> {
    error!(error = %err, "release store operation failed");
    Outcome::Error
}

#[async_trait]
impl ReleaseStore for SurrealReleaseStore {
    #[instrument(skip(self, identity), fields(
        application = %identity.application,
        environment = %identity.environment,
        version = %identity.version,
        release_timestamp = %identity.release_timestamp,
    ))]
    async fn find_release(&self, identity: &ReleaseIdentity) -> Outcome<Release> {
        const OP: &str = "find_release";
        let sql = format!(
            "SELECT {RELEASE_PROJECTION} FROM releases \
             WHERE application = $app AND environment = $env AND version = $ver \
             AND release_timestamp = $rts"
        );

        let result = async {
            let mut response = self
                .db
                .query(sql)
                .bind(("app", identity.application.clone()))
                .bind(("env", identity.environment.clone()))
                .bind(("ver", identity.version.clone()))
                .bind(("rts", SurrealDatetime::from(identity.release_timestamp)))
                .await
                .map_err(|e| StorageError::backend(OP, e))?;
            let rows: Vec<ReleaseRow> = response
                .take(0)
                .map_err(|e| StorageError::backend(OP, e))?;
            single_release(OP, rows)
        }
        .await;

        match result {
            Ok(found) => {
                if found.is_none() {
                    debug!("no release with this identity");
                }
                found.into()
            }
            Err(err) => failed(err),
        }
    }

    #[instrument(skip(self), fields(release_id = %id))]
    async fn find_release_by_id(&self, id: &ReleaseId) -> Outcome<Release> {
        const OP: &str = "find_release_by_id";
        let sql = format!("SELECT {RELEASE_PROJECTION} FROM type::thing('releases', $id)");

        let result = async {
            let mut response = self
                .db
                .query(sql)
                .bind(("id", id.0.clone()))
                .await
                .map_err(|e| StorageError::backend(OP, e))?;
            let rows: Vec<ReleaseRow> = response
                .take(0)
                .map_err(|e| StorageError::backend(OP, e))?;
            single_release(OP, rows)
        }
        .await;

        match result {
            Ok(found) => found.into(),
            Err(err) => failed(err),
        }
    }

    #[instrument(skip(self))]
    async fn find_releases(
        &self,
        application: &str,
        environment: &str,
        version: &str,
    ) -> Outcome<Vec<Release>> {
        const OP: &str = "find_releases";
        let sql = format!(
            "SELECT {RELEASE_PROJECTION} FROM releases \
             WHERE application = $app AND environment = $env AND version = $ver \
             ORDER BY release_timestamp ASC, id ASC"
        );

        let result = async {
            let mut response = self
                .db
                .query(sql)
                .bind(("app", application.to_string()))
                .bind(("env", environment.to_string()))
                .bind(("ver", version.to_string()))
                .await
                .map_err(|e| StorageError::backend(OP, e))?;
            let rows: Vec<ReleaseRow> = response
                .take(0)
                .map_err(|e| StorageError::backend(OP, e))?;
            rows.into_iter()
                .map(|row| row.into_release(OP))
                .collect::<Result<Vec<_>, StorageError>>()
        }
        .await;

        match result {
            Ok(releases) => Outcome::from_collection(releases),
            Err(err) => failed(err),
        }
    }

    #[instrument(skip(self, identity), fields(
        application = %identity.application,
        environment = %identity.environment,
        version = %identity.version,
        release_timestamp = %identity.release_timestamp,
    ))]
    async fn insert_release(&self, identity: &ReleaseIdentity) -> Outcome<ReleaseId> {
        const OP: &str = "insert_release";
        let sql = r#"
            LET $key = rand::ulid();
            CREATE type::thing('releases', $key) SET
                application = $app,
                environment = $env,
                version = $ver,
                release_timestamp = $rts;
            RETURN $key;
        "#;

        let result = async {
            let response = self
                .db
                .query(sql)
                .bind(("app", identity.application.clone()))
                .bind(("env", identity.environment.clone()))
                .bind(("ver", identity.version.clone()))
                .bind(("rts", SurrealDatetime::from(identity.release_timestamp)))
                .await
                .map_err(|e| StorageError::backend(OP, e))?;
            // A unique-index violation surfaces here as a statement error.
            let mut response = response
                .check()
                .map_err(|e| StorageError::backend(OP, e))?;
            let key: Option<String> = response
                .take(2)
                .map_err(|e| StorageError::backend(OP, e))?;
            key.filter(|k| !k.is_empty())
                .map(ReleaseId)
                .ok_or_else(|| StorageError::malformed(OP, "no key returned for created release"))
        }
        .await;

        match result {
            Ok(id) => {
                debug!(release_id = %id, "release inserted");
                Outcome::Present(id)
            }
            Err(err) => failed(err),
        }
    }

    #[instrument(skip(self))]
    async fn current_release(&self, scope: &ReleaseScope) -> Outcome<FullRelease> {
        const OP: &str = "current_release";
        let sql = format!(
            "SELECT {FULL_RELEASE_PROJECTION} FROM releases {} \
             ORDER BY release_timestamp DESC, id DESC LIMIT 1",
            Self::scope_filter(scope)
        );

        let result = self.run_scoped(OP, scope, sql).await.and_then(|rows| {
            rows.into_iter()
                .next()
                .map(|row| row.into_full_release(OP))
                .transpose()
        });

        match result {
            Ok(current) => current.into(),
            Err(err) => failed(err),
        }
    }

    #[instrument(skip(self))]
    async fn all_releases(&self, scope: &ReleaseScope) -> Outcome<Vec<FullRelease>> {
        const OP: &str = "all_releases";
        let sql = format!(
            "SELECT {FULL_RELEASE_PROJECTION} FROM releases {} \
             ORDER BY release_timestamp ASC, id ASC",
            Self::scope_filter(scope)
        );

        let result = self.run_scoped(OP, scope, sql).await.and_then(|rows| {
            rows.into_iter()
                .map(|row| row.into_full_release(OP))
                .collect::<Result<Vec<_>, StorageError>>()
        });

        match result {
            Ok(releases) => {
                if releases.is_empty() {
                    debug!("no releases in scope");
                }
                Outcome::from_collection(releases)
            }
            Err(err) => failed(err),
        }
    }
}
