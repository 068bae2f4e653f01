//! SQLite-backed [`ContextStore`] implementation.
//!
//! Rows live in four tables (see [`crate::migrate`]); each context's
//! serialized similarity index lives in an [`ArtifactDir`]. Every public
//! operation runs on its own pooled connection and, when it writes, inside
//! one transaction. Index artifacts written by a call that fails are removed
//! again, before the transaction releases its write lock, so a row id handed
//! out again by a later write never finds its file deleted.

use async_trait::async_trait;
use std::collections::HashSet;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use context_assistant_core::context::Context;
use context_assistant_core::equivalence::equivalent;
use context_assistant_core::error::{Error, Result};
use context_assistant_core::index::FlatIndex;
use context_assistant_core::models::{Chunk, ContextSummary, ProfileSummary};
use context_assistant_core::profile::AssistantProfile;
use context_assistant_core::store::{plan_context_write, ContextStore, ContextWrite};
use context_assistant_core::vector::{blob_to_vec, vec_to_blob};

use crate::artifact::ArtifactDir;
use crate::config::Config;
use crate::db;
use crate::migrate;

#[derive(Debug, sqlx::FromRow)]
struct ContextRow {
    id: i64,
    name: String,
    origin_filename: String,
    index_artifact_ref: String,
    embedding_model: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ChunkRow {
    chunk_index: i64,
    chunk_text: String,
    embedding_vector: Vec<u8>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    name: String,
    model: String,
    context_embedding_model: String,
    initial_role: String,
    initial_context: String,
}

const CONTEXT_COLUMNS: &str =
    "c.id, c.name, c.origin_filename, c.index_artifact_ref, c.embedding_model";

const PROFILE_COLUMNS: &str =
    "id, name, model, context_embedding_model, initial_role, initial_context";

/// SQLite implementation of the [`ContextStore`] trait.
pub struct SqliteContextStore {
    pool: SqlitePool,
    artifacts: ArtifactDir,
}

impl SqliteContextStore {
    pub fn new(pool: SqlitePool, artifacts: ArtifactDir) -> Self {
        Self { pool, artifacts }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        let store = Self::new(pool, ArtifactDir::new(config.db.artifact_dir()));
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn artifacts(&self) -> &ArtifactDir {
        &self.artifacts
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create any missing tables. Never touches existing data.
    pub async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(Error::persistence)?;
        migrate::run_migrations(&mut conn)
            .await
            .map_err(Error::persistence)
    }

    /// Reset the store, then write `contexts` followed by `profiles`.
    pub async fn initialize_with_entries(
        &self,
        contexts: &[Context],
        profiles: &mut [AssistantProfile],
    ) -> Result<()> {
        self.initialize_schema().await?;
        for context in contexts {
            self.write_context(context).await?;
        }
        for profile in profiles.iter_mut() {
            self.write_assistant_profile(profile).await?;
        }
        Ok(())
    }

    /// Commit or roll back `tx` depending on `result`. On any failure the
    /// artifacts in `written` are removed and the original error returned.
    async fn finish<T>(
        &self,
        tx: sqlx::Transaction<'_, sqlx::Sqlite>,
        result: Result<T>,
        written: &[String],
    ) -> Result<T> {
        match result {
            Ok(value) => match tx.commit().await {
                Ok(()) => Ok(value),
                Err(e) => {
                    self.remove_artifacts(written).await;
                    Err(Error::persistence(e))
                }
            },
            Err(e) => {
                self.remove_artifacts(written).await;
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn remove_artifacts(&self, written: &[String]) {
        for reference in written {
            if let Err(e) = self.artifacts.remove(reference).await {
                warn!(artifact = %reference, error = %e, "failed to remove index artifact of a failed write");
            }
        }
    }

    /// Insert `context` and its chunks and write its index artifact.
    async fn insert_context(
        &self,
        conn: &mut SqliteConnection,
        context: &Context,
        written: &mut Vec<String>,
    ) -> Result<i64> {
        context.ensure_complete()?;
        let index_bytes = context.index().serialize()?;
        let origin = context
            .associated_doc_name
            .as_deref()
            .ok_or_else(|| Error::IncompleteContext {
                name: context.name.clone(),
                missing: "associated document name",
            })?;

        let id = sqlx::query(
            "INSERT INTO context (name, origin_filename, index_artifact_ref, embedding_model) VALUES (?, ?, '', ?)",
        )
        .bind(&context.name)
        .bind(origin)
        .bind(&context.embedding_model)
        .execute(&mut *conn)
        .await
        .map_err(|e| unique_or_persistence(e, "context", &context.name))?
        .last_insert_rowid();

        // AUTOINCREMENT never reuses a committed id, so each row gets its own file.
        let artifact_ref = ArtifactDir::artifact_ref(&context.name, id);
        sqlx::query("UPDATE context SET index_artifact_ref = ? WHERE id = ?")
            .bind(&artifact_ref)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(Error::persistence)?;

        for chunk in context.chunks() {
            sqlx::query(
                "INSERT INTO context_chunks (context_id, chunk_index, chunk_text, embedding_vector) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.text)
            .bind(vec_to_blob(&chunk.vector))
            .execute(&mut *conn)
            .await
            .map_err(Error::persistence)?;
        }

        written.push(artifact_ref.clone());
        self.artifacts
            .write(&artifact_ref, &index_bytes)
            .await
            .map_err(Error::persistence)?;

        debug!(context = %context.name, id, chunks = context.chunks().len(), "inserted context");
        Ok(id)
    }

    async fn load_context(&self, conn: &mut SqliteConnection, row: ContextRow) -> Result<Context> {
        let chunk_rows: Vec<ChunkRow> = sqlx::query_as(
            "SELECT chunk_index, chunk_text, embedding_vector FROM context_chunks WHERE context_id = ? ORDER BY chunk_index ASC",
        )
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await
        .map_err(Error::persistence)?;

        let chunks: Vec<Chunk> = chunk_rows
            .into_iter()
            .map(|r| {
                Chunk::new(
                    r.chunk_index as usize,
                    r.chunk_text,
                    blob_to_vec(&r.embedding_vector),
                )
            })
            .collect();

        let bytes = self
            .artifacts
            .read(&row.index_artifact_ref)
            .await
            .map_err(Error::persistence)?;
        let index = FlatIndex::deserialize(&bytes)?;
        if index.len() != chunks.len() {
            return Err(Error::IndexOutOfSync {
                indexed: index.len(),
                chunks: chunks.len(),
            });
        }

        Context::from_stored(
            row.name,
            row.origin_filename,
            row.embedding_model,
            chunks,
            index,
        )
    }

    async fn find_context_by_name(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
    ) -> Result<Option<(i64, Context)>> {
        let row: Option<ContextRow> = sqlx::query_as(&format!(
            "SELECT {} FROM context c WHERE c.name = ?",
            CONTEXT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(Error::persistence)?;

        match row {
            Some(row) => {
                let id = row.id;
                Ok(Some((id, self.load_context(conn, row).await?)))
            }
            None => Ok(None),
        }
    }

    /// Resolve one attached context to a stored row id, writing it when no
    /// equivalent row exists. Returns the id and the name it is stored under.
    async fn resolve_context(
        &self,
        conn: &mut SqliteConnection,
        context: &Context,
        profile_name: &str,
        written: &mut Vec<String>,
    ) -> Result<(i64, String)> {
        let stored = self.find_context_by_name(conn, &context.name).await?;
        let plan = plan_context_write(
            context,
            stored.as_ref().map(|(id, c)| (*id, c)),
            profile_name,
        );

        match plan {
            ContextWrite::Reuse(id) => {
                debug!(context = %context.name, id, "reusing equivalent stored context");
                Ok((id, context.name.clone()))
            }
            ContextWrite::Insert => {
                let id = self.insert_context(conn, context, written).await?;
                Ok((id, context.name.clone()))
            }
            ContextWrite::InsertRenamed { name } => {
                let mut renamed = context.clone();
                renamed.name = name.clone();

                if let Some((id, existing)) = self.find_context_by_name(conn, &name).await? {
                    if equivalent(&existing, &renamed) {
                        debug!(context = %name, id, "reusing equivalent renamed context");
                        return Ok((id, name));
                    }
                }

                info!(
                    original = %context.name,
                    renamed = %name,
                    "context name taken by different content; storing under new name"
                );
                let id = self.insert_context(conn, &renamed, written).await?;
                Ok((id, name))
            }
        }
    }

    async fn load_profile(
        &self,
        conn: &mut SqliteConnection,
        row: ProfileRow,
    ) -> Result<AssistantProfile> {
        let context_rows: Vec<ContextRow> = sqlx::query_as(&format!(
            "SELECT {} FROM profile_context pc JOIN context c ON c.id = pc.context_id WHERE pc.profile_id = ? ORDER BY pc.id ASC",
            CONTEXT_COLUMNS
        ))
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await
        .map_err(Error::persistence)?;

        let mut profile = AssistantProfile::new(
            row.name,
            row.model,
            row.context_embedding_model,
            row.initial_role,
            row.initial_context,
        );
        for context_row in context_rows {
            let context = self.load_context(conn, context_row).await?;
            profile.add_context(context)?;
        }
        Ok(profile)
    }

    async fn read_profile_where(
        &self,
        column: &str,
        bind: RowKey<'_>,
    ) -> Result<Option<AssistantProfile>> {
        let mut conn = self.pool.acquire().await.map_err(Error::persistence)?;
        let sql = format!(
            "SELECT {} FROM assistant_profile WHERE {} = ?",
            PROFILE_COLUMNS, column
        );
        let query = sqlx::query_as::<_, ProfileRow>(&sql);
        let query = match bind {
            RowKey::Id(id) => query.bind(id),
            RowKey::Name(name) => query.bind(name),
        };
        let row = query
            .fetch_optional(&mut *conn)
            .await
            .map_err(Error::persistence)?;

        match row {
            Some(row) => Ok(Some(self.load_profile(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn delete_context_where(&self, column: &str, bind: RowKey<'_>) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::persistence)?;

        let sql = format!(
            "SELECT id, index_artifact_ref FROM context WHERE {} = ?",
            column
        );
        let query = sqlx::query_as::<_, (i64, String)>(&sql);
        let query = match bind {
            RowKey::Id(id) => query.bind(id),
            RowKey::Name(name) => query.bind(name),
        };

        let result: Result<Option<(i64, String)>> = async {
            let Some((id, artifact_ref)) = query
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::persistence)?
            else {
                return Ok(None);
            };

            // Chunk and association rows go with it via ON DELETE CASCADE.
            sqlx::query("DELETE FROM context WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(Error::persistence)?;
            Ok(Some((id, artifact_ref)))
        }
        .await;

        let deleted = self.finish(tx, result, &[]).await?;
        match deleted {
            Some((id, artifact_ref)) => {
                if let Err(e) = self.artifacts.remove(&artifact_ref).await {
                    warn!(id, artifact = %artifact_ref, error = %e, "failed to remove index artifact");
                }
                info!(id, "deleted context");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_profile_where(&self, column: &str, bind: RowKey<'_>) -> Result<bool> {
        let sql = format!("DELETE FROM assistant_profile WHERE {} = ?", column);
        let query = sqlx::query(&sql);
        let query = match bind {
            RowKey::Id(id) => query.bind(id),
            RowKey::Name(name) => query.bind(name),
        };
        let result = query
            .execute(&self.pool)
            .await
            .map_err(Error::persistence)?;
        Ok(result.rows_affected() > 0)
    }
}

/// Lookup key for by-id / by-name variants.
#[derive(Clone, Copy)]
enum RowKey<'a> {
    Id(i64),
    Name(&'a str),
}

fn unique_or_persistence(err: sqlx::Error, entity: &'static str, name: &str) -> Error {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::UniqueConstraintViolation {
            entity,
            name: name.to_string(),
        },
        other => Error::persistence(other),
    }
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    async fn write_context(&self, context: &Context) -> Result<i64> {
        context.ensure_complete()?;

        let mut tx = self.pool.begin().await.map_err(Error::persistence)?;
        let mut written = Vec::new();
        let result = self.insert_context(&mut *tx, context, &mut written).await;
        let id = self.finish(tx, result, &written).await?;

        info!(context = %context.name, id, "wrote context");
        Ok(id)
    }

    async fn read_context_by_id(&self, id: i64) -> Result<Option<Context>> {
        let mut conn = self.pool.acquire().await.map_err(Error::persistence)?;
        let row: Option<ContextRow> = sqlx::query_as(&format!(
            "SELECT {} FROM context c WHERE c.id = ?",
            CONTEXT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(Error::persistence)?;

        match row {
            Some(row) => Ok(Some(self.load_context(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn read_context_by_name(&self, name: &str) -> Result<Option<Context>> {
        let mut conn = self.pool.acquire().await.map_err(Error::persistence)?;
        Ok(self
            .find_context_by_name(&mut conn, name)
            .await?
            .map(|(_, context)| context))
    }

    async fn delete_context_by_id(&self, id: i64) -> Result<bool> {
        self.delete_context_where("id", RowKey::Id(id)).await
    }

    async fn delete_context_by_name(&self, name: &str) -> Result<bool> {
        self.delete_context_where("name", RowKey::Name(name)).await
    }

    async fn list_contexts(&self) -> Result<Vec<ContextSummary>> {
        let rows: Vec<(i64, String, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.origin_filename, c.embedding_model, COUNT(cc.id)
            FROM context c
            LEFT JOIN context_chunks cc ON cc.context_id = c.id
            GROUP BY c.id
            ORDER BY c.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::persistence)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, name, origin_filename, embedding_model, chunk_count)| ContextSummary {
                    id,
                    name,
                    origin_filename,
                    embedding_model,
                    chunk_count,
                },
            )
            .collect())
    }

    async fn write_assistant_profile(&self, profile: &mut AssistantProfile) -> Result<i64> {
        for context in profile.contexts() {
            context.ensure_complete()?;
        }

        let mut tx = self.pool.begin().await.map_err(Error::persistence)?;
        let mut written = Vec::new();
        let mut renames: Vec<(usize, String)> = Vec::new();
        let mut attached: HashSet<i64> = HashSet::new();

        let result: Result<i64> = async {
            // The profile row goes first so a duplicate profile name fails
            // before any context is written.
            let profile_id = sqlx::query(
                "INSERT INTO assistant_profile (name, model, context_embedding_model, initial_role, initial_context) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&profile.name)
            .bind(&profile.model)
            .bind(&profile.context_embedding_model)
            .bind(&profile.initial_role)
            .bind(&profile.initial_context)
            .execute(&mut *tx)
            .await
            .map_err(|e| unique_or_persistence(e, "assistant profile", &profile.name))?
            .last_insert_rowid();

            for (position, context) in profile.contexts().iter().enumerate() {
                let (context_id, stored_name) = self
                    .resolve_context(&mut *tx, context, &profile.name, &mut written)
                    .await?;
                // A renamed context can land on a row another attached
                // context resolves to; one profile never links a row twice.
                if !attached.insert(context_id) {
                    return Err(Error::DuplicateContext(stored_name));
                }
                if stored_name != context.name {
                    renames.push((position, stored_name));
                }

                sqlx::query("INSERT INTO profile_context (profile_id, context_id) VALUES (?, ?)")
                    .bind(profile_id)
                    .bind(context_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(Error::persistence)?;
            }
            Ok(profile_id)
        }
        .await;

        let profile_id = self.finish(tx, result, &written).await?;

        let contexts = profile.contexts_mut();
        for (position, name) in renames {
            contexts[position].name = name;
        }

        info!(
            profile = %profile.name,
            id = profile_id,
            contexts = profile.contexts().len(),
            new_contexts = written.len(),
            "wrote assistant profile"
        );
        Ok(profile_id)
    }

    async fn read_assistant_profile_by_id(&self, id: i64) -> Result<Option<AssistantProfile>> {
        self.read_profile_where("id", RowKey::Id(id)).await
    }

    async fn read_assistant_profile_by_name(&self, name: &str) -> Result<Option<AssistantProfile>> {
        self.read_profile_where("name", RowKey::Name(name)).await
    }

    async fn delete_assistant_profile_by_id(&self, id: i64) -> Result<bool> {
        self.delete_profile_where("id", RowKey::Id(id)).await
    }

    async fn delete_assistant_profile_by_name(&self, name: &str) -> Result<bool> {
        self.delete_profile_where("name", RowKey::Name(name)).await
    }

    async fn get_all_profile_summaries(&self) -> Result<Vec<ProfileSummary>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT name, model FROM assistant_profile ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(Error::persistence)?;

        Ok(rows
            .into_iter()
            .map(|(name, model)| ProfileSummary { name, model })
            .collect())
    }

    async fn initialize_schema(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::persistence)?;
        let result: Result<usize> = async {
            migrate::reset_schema(&mut *tx)
                .await
                .map_err(Error::persistence)?;
            // Row ids restart after the drop; old files go while the write
            // lock is still held.
            self.artifacts.clear().await.map_err(Error::persistence)
        }
        .await;
        let removed = self.finish(tx, result, &[]).await?;

        info!(artifacts_removed = removed, "schema initialized");
        Ok(())
    }
}
