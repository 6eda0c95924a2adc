use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Relief goods record. `id` goes over the wire as `_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ReliefItem {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: Option<String>,
    pub categori: Option<String>, // category; the field name is part of the public API
    pub amount: Option<serde_json::Value>,
    pub image: Option<String>,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Payload fields of a relief item, every one optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReliefFields {
    pub title: Option<String>,
    pub categori: Option<String>,
    pub amount: Option<serde_json::Value>,
    pub image: Option<String>,
    pub description: Option<String>,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted_id: Option<Uuid>,
}
