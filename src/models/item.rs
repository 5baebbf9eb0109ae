use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::availability::WeeklyInterval;

/// A shareable item owned by a community member. The recurring availability
/// set is stored as a JSONB list alongside the row; an empty list means the
/// item has no recurring restriction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub community_id: Uuid,
    pub owner_id: Uuid,
    pub is_active: bool,
    pub availability: Json<Vec<WeeklyInterval>>,
    pub available_until: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn intervals(&self) -> &[WeeklyInterval] {
        &self.availability.0
    }
}

#[derive(Debug, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub community_id: Uuid,
    pub owner_id: Uuid,
    pub availability: Vec<WeeklyInterval>,
    pub available_until: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

/// Partial update; a provided availability list replaces the stored one
/// wholesale.
#[derive(Debug, Deserialize)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub availability: Option<Vec<WeeklyInterval>>,
    pub available_until: Option<DateTime<Utc>>,
    pub description: Option<String>,
}
