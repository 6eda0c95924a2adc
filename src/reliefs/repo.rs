use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{ReliefFields, ReliefItem, UpsertOutcome};
use crate::store::StoreResult;

#[async_trait]
pub trait ReliefStore: Send + Sync {
    /// Records in insertion order, at most `limit` of them when given.
    async fn list(&self, limit: Option<i64>) -> StoreResult<Vec<ReliefItem>>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<ReliefItem>>;
    async fn insert(&self, fields: ReliefFields) -> StoreResult<Uuid>;
    /// Overwrites all five payload fields of `id`, creating the record if it
    /// is missing. A field left as `None` is stored as NULL.
    async fn upsert(&self, id: Uuid, fields: ReliefFields) -> StoreResult<UpsertOutcome>;
    async fn delete(&self, id: Uuid) -> StoreResult<u64>;
}

#[derive(Clone)]
pub struct PgReliefStore {
    db: PgPool,
}

impl PgReliefStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReliefStore for PgReliefStore {
    async fn list(&self, limit: Option<i64>) -> StoreResult<Vec<ReliefItem>> {
        let rows = sqlx::query_as::<_, ReliefItem>(
            r#"
            SELECT id, title, categori, amount, image, description, created_at
            FROM relief_goods
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<ReliefItem>> {
        let row = sqlx::query_as::<_, ReliefItem>(
            r#"
            SELECT id, title, categori, amount, image, description, created_at
            FROM relief_goods
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn insert(&self, fields: ReliefFields) -> StoreResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO relief_goods (title, categori, amount, image, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(fields.title)
        .bind(fields.categori)
        .bind(fields.amount)
        .bind(fields.image)
        .bind(fields.description)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    async fn upsert(&self, id: Uuid, fields: ReliefFields) -> StoreResult<UpsertOutcome> {
        // no row back means the record existed and nothing changed
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO relief_goods AS r (id, title, categori, amount, image, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                title       = EXCLUDED.title,
                categori    = EXCLUDED.categori,
                amount      = EXCLUDED.amount,
                image       = EXCLUDED.image,
                description = EXCLUDED.description
            WHERE (r.title, r.categori, r.amount, r.image, r.description)
                IS DISTINCT FROM (
                    EXCLUDED.title,
                    EXCLUDED.categori,
                    EXCLUDED.amount,
                    EXCLUDED.image,
                    EXCLUDED.description
                )
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(id)
        .bind(fields.title)
        .bind(fields.categori)
        .bind(fields.amount)
        .bind(fields.image)
        .bind(fields.description)
        .fetch_optional(&self.db)
        .await?;

        Ok(match inserted {
            Some(true) => UpsertOutcome {
                matched: 0,
                modified: 0,
                upserted_id: Some(id),
            },
            Some(false) => UpsertOutcome {
                matched: 1,
                modified: 1,
                upserted_id: None,
            },
            None => UpsertOutcome {
                matched: 1,
                modified: 0,
                upserted_id: None,
            },
        })
    }

    async fn delete(&self, id: Uuid) -> StoreResult<u64> {
        let res = sqlx::query("DELETE FROM relief_goods WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}
