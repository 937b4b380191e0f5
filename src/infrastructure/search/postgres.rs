//! PostgreSQL item store on pgvector and full-text search

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::domain::item::{ItemKey, SearchableItem};
use crate::domain::search::{AccessScope, ItemStore, SearchHit};
use crate::domain::DomainError;

/// Configuration for the PostgreSQL item store
#[derive(Debug, Clone)]
pub struct PostgresStoreConfig {
    pub table_name: String,
    /// Embedding dimensions of the `embedding` column
    pub dimensions: usize,
    pub max_connections: u32,
}

impl PostgresStoreConfig {
    pub fn new(dimensions: usize) -> Self {
        Self {
            table_name: "searchable_items".to_string(),
            dimensions,
            max_connections: 10,
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Item store backed by one table holding items, vectors, a `tsvector` and statistics
///
/// Filtering by tenant and role happens in SQL. Vector scores are
/// `1 - cosine distance`; keyword scores are `ts_rank_cd` with the
/// `rank / (rank + 1)` normalisation so they stay below 1.
#[derive(Debug, Clone)]
pub struct PostgresItemStore {
    pool: PgPool,
    config: PostgresStoreConfig,
}

impl PostgresItemStore {
    pub fn new(pool: PgPool, config: PostgresStoreConfig) -> Self {
        Self { pool, config }
    }

    pub async fn connect(database_url: &str, config: PostgresStoreConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(database_url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to database: {}", e)))?;

        Ok(Self::new(pool, config))
    }

    /// Creates the pgvector extension, the item table and its indexes
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create vector extension: {}", e)))?;

        let table = &self.config.table_name;
        let statements = [
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    tenant_id TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    id TEXT NOT NULL,
                    allowed_roles TEXT[] NOT NULL DEFAULT '{{}}',
                    body TEXT NOT NULL,
                    payload JSONB NOT NULL,
                    embedding vector({dims}),
                    search_tsv tsvector GENERATED ALWAYS AS (to_tsvector('simple', body)) STORED,
                    retrieval_count BIGINT NOT NULL DEFAULT 0,
                    mean_relevance DOUBLE PRECISION NOT NULL DEFAULT 0,
                    PRIMARY KEY (tenant_id, kind, id)
                )
                "#,
                dims = self.config.dimensions
            ),
            format!("CREATE INDEX IF NOT EXISTS idx_{table}_tsv ON {table} USING gin (search_tsv)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{table}_roles ON {table} USING gin (allowed_roles)"),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to create schema: {}", e)))?;
        }

        let vector_index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_embedding ON {table} USING hnsw (embedding vector_cosine_ops)"
        );
        if let Err(e) = sqlx::query(&vector_index).execute(&self.pool).await {
            tracing::warn!(error = %e, "Vector index not created, falling back to sequential scan");
        }

        Ok(())
    }

    /// Inserts or replaces an item
    pub async fn upsert(&self, item: &SearchableItem) -> Result<(), DomainError> {
        let mut payload = serde_json::to_value(item)
            .map_err(|e| DomainError::storage(format!("Failed to serialize item: {}", e)))?;
        if let Some(object) = payload.as_object_mut() {
            object.remove("embedding");
        }

        let roles: Vec<String> = item.allowed_roles().iter().cloned().collect();
        let query = format!(
            r#"
            INSERT INTO {} (tenant_id, kind, id, allowed_roles, body, payload, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7::vector)
            ON CONFLICT (tenant_id, kind, id) DO UPDATE SET
                allowed_roles = EXCLUDED.allowed_roles,
                body = EXCLUDED.body,
                payload = EXCLUDED.payload,
                embedding = EXCLUDED.embedding
            "#,
            self.config.table_name
        );

        sqlx::query(&query)
            .bind(item.tenant_id())
            .bind(item.kind().as_str())
            .bind(item.id())
            .bind(&roles)
            .bind(item.text())
            .bind(&payload)
            .bind(item.embedding().map(vector_literal))
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to upsert item: {}", e)))?;

        Ok(())
    }
}

/// pgvector text literal, e.g. `[0.1,0.2]`
fn vector_literal(vector: &[f32]) -> String {
    let values: Vec<String> = vector.iter().map(f32::to_string).collect();
    format!("[{}]", values.join(","))
}

fn hit_from_row(row: &PgRow) -> Result<SearchHit, DomainError> {
    let payload: serde_json::Value = row
        .try_get("payload")
        .map_err(|e| DomainError::storage(format!("Missing payload column: {}", e)))?;
    let score: f64 = row
        .try_get("score")
        .map_err(|e| DomainError::storage(format!("Missing score column: {}", e)))?;

    let item: SearchableItem = serde_json::from_value(payload)
        .map_err(|e| DomainError::storage(format!("Corrupt item payload: {}", e)))?;

    Ok(SearchHit::new(item, score as f32))
}

#[async_trait]
impl ItemStore for PostgresItemStore {
    fn store_type(&self) -> &'static str {
        "postgres"
    }

    async fn vector_search(
        &self,
        scope: &AccessScope,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let query = format!(
            r#"
            SELECT payload, (1 - (embedding <=> $3::vector))::float8 AS score
            FROM {}
            WHERE tenant_id = $1
              AND $2 = ANY(allowed_roles)
              AND embedding IS NOT NULL
            ORDER BY embedding <=> $3::vector, id, kind
            LIMIT $4
            "#,
            self.config.table_name
        );

        let rows = sqlx::query(&query)
            .bind(&scope.tenant_id)
            .bind(&scope.role)
            .bind(vector_literal(vector))
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::index_unavailable("vector", e.to_string()))?;

        rows.iter().map(hit_from_row).collect()
    }

    async fn keyword_search(
        &self,
        scope: &AccessScope,
        text: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        // plainto_tsquery ANDs its terms; any matching term is enough here
        let query = format!(
            r#"
            SELECT payload, ts_rank_cd(search_tsv, q, 32)::float8 AS score
            FROM {}, to_tsquery('simple', replace(plainto_tsquery('simple', $3)::text, '&', '|')) AS q
            WHERE tenant_id = $1
              AND $2 = ANY(allowed_roles)
              AND search_tsv @@ q
            ORDER BY score DESC, id, kind
            LIMIT $4
            "#,
            self.config.table_name
        );

        let rows = sqlx::query(&query)
            .bind(&scope.tenant_id)
            .bind(&scope.role)
            .bind(text)
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::index_unavailable("keyword", e.to_string()))?;

        rows.iter().map(hit_from_row).collect()
    }

    async fn record_surfaced(
        &self,
        tenant_id: &str,
        key: &ItemKey,
        score: f32,
    ) -> Result<(), DomainError> {
        let query = format!(
            r#"
            UPDATE {}
            SET retrieval_count = retrieval_count + 1,
                mean_relevance = mean_relevance + ($4 - mean_relevance) / (retrieval_count + 1)
            WHERE tenant_id = $1 AND kind = $2 AND id = $3
            "#,
            self.config.table_name
        );

        sqlx::query(&query)
            .bind(tenant_id)
            .bind(key.kind.as_str())
            .bind(&key.id)
            .bind(score as f64)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to record retrieval: {}", e)))?;

        Ok(())
    }
}
