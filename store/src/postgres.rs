use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::document::{Collection, StoredDocument};
use crate::error::{StoreError, StoreResult};
use crate::migrations;
use crate::query::{Filter, FindQuery, Page, Sort, SortKey};
use crate::DocumentStore;

const COLUMNS: &str = "id, data, created_at, updated_at";
const UNIQUE_VIOLATION: &str = "23505";

/// All collections share one JSONB table, discriminated by `collection`.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &StoreConfig<'_>) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self, collections: &[Collection]) -> StoreResult<()> {
        migrations::run_migrations(&self.pool, collections).await
    }
}

fn decode_row(row: &PgRow) -> Result<StoredDocument, sqlx::Error> {
    Ok(StoredDocument {
        id: row.try_get("id")?,
        data: row.try_get("data")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Unique violations become `Conflict`, naming the field when the violated
/// index belongs to the collection.
fn map_write_error(collection: &Collection, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let field = db
                .constraint()
                .and_then(|constraint| {
                    collection
                        .unique
                        .iter()
                        .find(|field| collection.unique_index_name(field) == constraint)
                })
                .map(|field| field.to_string())
                .unwrap_or_else(|| "value".to_string());
            return StoreError::Conflict {
                collection: collection.name,
                field,
            };
        }
    }
    StoreError::Database(err)
}

fn push_text_operand(qb: &mut QueryBuilder<'_, Postgres>, field: &str) {
    qb.push("(data ->> ");
    qb.push_bind(field.to_string());
    qb.push(") COLLATE \"C\"");
}

fn push_comparison(qb: &mut QueryBuilder<'_, Postgres>, field: &str, op: &str, value: &Value) {
    match value.as_f64() {
        Some(number) => {
            qb.push("(data ->> ");
            qb.push_bind(field.to_string());
            qb.push(")::float8 ");
            qb.push(op);
            qb.push(" ");
            qb.push_bind(number);
        }
        None => {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            push_text_operand(qb, field);
            qb.push(" ");
            qb.push(op);
            qb.push(" ");
            qb.push_bind(text);
        }
    }
}

/// OFFSET and LIMIT are signed in Postgres.
fn bound(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::Eq(field, value) => {
            qb.push("data -> ");
            qb.push_bind(field.to_string());
            qb.push(" = ");
            qb.push_bind(value.clone());
        }
        Filter::In(field, values) => {
            if values.is_empty() {
                qb.push("FALSE");
                return;
            }
            qb.push("(");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push("data -> ");
                qb.push_bind(field.to_string());
                qb.push(" = ");
                qb.push_bind(value.clone());
            }
            qb.push(")");
        }
        Filter::Gte(field, value) => push_comparison(qb, field, ">=", value),
        Filter::Lt(field, value) => push_comparison(qb, field, "<", value),
        Filter::CreatedAtGte(at) => {
            qb.push("created_at >= ");
            qb.push_bind(*at);
        }
        Filter::CreatedAtLt(at) => {
            qb.push("created_at < ");
            qb.push_bind(*at);
        }
        Filter::Search { fields, term } => {
            if fields.is_empty() {
                qb.push("TRUE");
                return;
            }
            let pattern = escape_like(term);
            qb.push("(");
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push("COALESCE(data ->> ");
                qb.push_bind(field.to_string());
                qb.push(", '') ILIKE ");
                qb.push_bind(pattern.clone());
            }
            qb.push(")");
        }
        Filter::And(filters) => {
            if filters.is_empty() {
                qb.push("TRUE");
                return;
            }
            qb.push("(");
            for (i, inner) in filters.iter().enumerate() {
                if i > 0 {
                    qb.push(" AND ");
                }
                push_filter(qb, inner);
            }
            qb.push(")");
        }
    }
}

fn push_sort(qb: &mut QueryBuilder<'_, Postgres>, sort: &Sort) {
    match &sort.key {
        SortKey::CreatedAt => {
            qb.push("created_at");
        }
        SortKey::Field(field) => push_text_operand(qb, field),
    }
    qb.push(if sort.descending { " DESC" } else { " ASC" });
}

fn scoped<'a>(select: &str, collection: &Collection, filter: &Filter) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM documents WHERE collection = ");
    qb.push_bind(collection.name);
    qb.push(" AND ");
    push_filter(&mut qb, filter);
    qb
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, collection: &Collection, data: Value) -> StoreResult<StoredDocument> {
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO documents (id, collection, data, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING id, data, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(collection.name)
        .bind(&data)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(collection, e))?;

        let doc = decode_row(&row)?;
        tracing::debug!("✓ Document inserted: {} ({})", collection.name, doc.id);
        Ok(doc)
    }

    async fn get(&self, collection: &Collection, id: Uuid) -> StoreResult<Option<StoredDocument>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2"
        ))
        .bind(collection.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(decode_row).transpose()?)
    }

    async fn get_many(&self, collection: &Collection, ids: &[Uuid]) -> StoreResult<Vec<StoredDocument>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = ANY($2) ORDER BY id"
        ))
        .bind(collection.name)
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(decode_row).collect::<Result<_, _>>()?)
    }

    async fn find_one(&self, collection: &Collection, filter: &Filter) -> StoreResult<Option<StoredDocument>> {
        let query = FindQuery::new().with_filter(filter.clone()).with_limit(1);
        Ok(self.find(collection, &query).await?.documents.into_iter().next())
    }

    async fn find(&self, collection: &Collection, query: &FindQuery) -> StoreResult<Page> {
        let mut qb = scoped(&format!("SELECT {COLUMNS}"), collection, &query.filter);
        qb.push(" ORDER BY ");
        for sort in &query.sort {
            push_sort(&mut qb, sort);
            qb.push(", ");
        }
        qb.push("id ASC OFFSET ");
        qb.push_bind(bound(query.skip));
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(bound(limit));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        let documents = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
        let total = self.count(collection, &query.filter).await?;

        tracing::debug!(
            "✓ Find on {} returned {} of {} documents",
            collection.name,
            documents.len(),
            total
        );
        Ok(Page { documents, total })
    }

    async fn count(&self, collection: &Collection, filter: &Filter) -> StoreResult<u64> {
        let mut qb = scoped("SELECT COUNT(*)", collection, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn replace(&self, collection: &Collection, id: Uuid, data: Value) -> StoreResult<Option<StoredDocument>> {
        let row = sqlx::query(
            "UPDATE documents SET data = $1, updated_at = $2
             WHERE collection = $3 AND id = $4
             RETURNING id, data, created_at, updated_at",
        )
        .bind(&data)
        .bind(Utc::now())
        .bind(collection.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(collection, e))?;

        Ok(row.as_ref().map(decode_row).transpose()?)
    }

    async fn delete(&self, collection: &Collection, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.name)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn next_sequence(&self, name: &str) -> StoreResult<u64> {
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO sequences (name, value) VALUES ($1, 1)
             ON CONFLICT (name) DO UPDATE SET value = sequences.value + 1
             RETURNING value",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(value.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(escape_like("50%_off"), "%50\\%\\_off%");
        assert_eq!(escape_like("jane"), "%jane%");
    }

    #[test]
    fn filters_compile_to_bound_sql() {
        let filter = Filter::eq("status", "paid")
            .and(Filter::search(&["firstName", "email"], "ann"))
            .and(Filter::gte("date", "2024-01-01"))
            .and(Filter::is_in("kind", Vec::<String>::new()));
        let collection = Collection::new("invoices");
        let qb = scoped("SELECT COUNT(*)", &collection, &filter);

        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM documents WHERE collection = $1 AND (data -> $2 = $3 AND \
             (COALESCE(data ->> $4, '') ILIKE $5 OR COALESCE(data ->> $6, '') ILIKE $7) AND \
             (data ->> $8) COLLATE \"C\" >= $9 AND FALSE)"
        );
    }

    #[test]
    fn window_bounds_never_go_negative() {
        assert_eq!(bound(20), 20);
        assert_eq!(bound(u64::MAX), i64::MAX);
        assert_eq!(bound(i64::MAX as u64 + 1), i64::MAX);
    }

    #[test]
    fn numeric_comparisons_cast() {
        let collection = Collection::new("payments");
        let qb = scoped("SELECT COUNT(*)", &collection, &Filter::lt("amount", 100));
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM documents WHERE collection = $1 AND (data ->> $2)::float8 < $3"
        );
    }
}
