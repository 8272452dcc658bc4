use sqlx::postgres::PgPool;

use crate::document::Collection;
use crate::error::{StoreError, StoreResult};

/// Schema steps in application order. Each entry is one statement.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_create_documents",
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id UUID PRIMARY KEY,
            collection TEXT NOT NULL,
            data JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "002_index_documents_by_collection",
        "CREATE INDEX IF NOT EXISTS documents_collection_created_idx ON documents (collection, created_at DESC)",
    ),
    (
        "003_create_sequences",
        r#"
        CREATE TABLE IF NOT EXISTS sequences (
            name TEXT PRIMARY KEY,
            value BIGINT NOT NULL
        )
        "#,
    ),
];

/// Apply pending schema steps, then make sure every collection's unique
/// fields are backed by an index.
pub async fn run_migrations(pool: &PgPool, collections: &[Collection]) -> StoreResult<()> {
    init_migrations_tracker(pool).await?;

    for (name, sql) in MIGRATIONS {
        if is_applied(pool, name).await? {
            continue;
        }
        tracing::info!("Running migration: {}", name);
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Migration {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        record_migration(pool, name).await?;
    }

    for collection in collections {
        ensure_unique_indexes(pool, collection).await?;
    }

    tracing::info!("✓ Migrations complete");
    Ok(())
}

async fn init_migrations_tracker(pool: &PgPool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            id SERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn is_applied(pool: &PgPool, name: &str) -> StoreResult<bool> {
    let found: Option<i32> = sqlx::query_scalar("SELECT id FROM migrations WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

async fn record_migration(pool: &PgPool, name: &str) -> StoreResult<()> {
    sqlx::query("INSERT INTO migrations (name) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}

async fn ensure_unique_indexes(pool: &PgPool, collection: &Collection) -> StoreResult<()> {
    for field in collection.unique {
        let sql = unique_index_sql(collection, field);
        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Migration {
                name: collection.unique_index_name(field),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

/// DDL cannot take bind parameters; collection and field names are
/// compile-time constants and are checked to be plain identifiers.
fn unique_index_sql(collection: &Collection, field: &str) -> String {
    debug_assert!(is_identifier(collection.name) && is_identifier(field));
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {index} ON documents ((lower(data ->> '{field}'))) WHERE collection = '{name}'",
        index = collection.unique_index_name(field),
        field = field,
        name = collection.name,
    )
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
