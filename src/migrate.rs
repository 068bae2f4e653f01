//! Schema creation and destructive reset.
//!
//! Both entry points take a bare connection so callers can run them inside
//! their own transaction.

use sqlx::SqliteConnection;

/// Tables in dependency order (parents first).
const TABLES: [&str; 4] = [
    "context",
    "context_chunks",
    "assistant_profile",
    "profile_context",
];

/// Create every table and index that does not exist yet. Idempotent.
pub async fn run_migrations(conn: &mut SqliteConnection) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS context (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            origin_filename TEXT NOT NULL,
            index_artifact_ref TEXT NOT NULL,
            embedding_model TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS context_chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            context_id INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            embedding_vector BLOB NOT NULL,
            UNIQUE(context_id, chunk_index),
            FOREIGN KEY (context_id) REFERENCES context(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assistant_profile (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            model TEXT NOT NULL,
            context_embedding_model TEXT NOT NULL,
            initial_role TEXT NOT NULL,
            initial_context TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profile_context (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id INTEGER NOT NULL,
            context_id INTEGER NOT NULL,
            FOREIGN KEY (profile_id) REFERENCES assistant_profile(id) ON DELETE CASCADE,
            FOREIGN KEY (context_id) REFERENCES context(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_context_chunks_context_id ON context_chunks(context_id)",
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_profile_context_profile_id ON profile_context(profile_id)",
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_profile_context_context_id ON profile_context(context_id)",
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Drop every table (children first) and recreate the schema.
pub async fn reset_schema(conn: &mut SqliteConnection) -> sqlx::Result<()> {
    for table in TABLES.iter().rev() {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&mut *conn)
            .await?;
    }
    run_migrations(conn).await
}
