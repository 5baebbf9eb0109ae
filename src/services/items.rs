use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    availability::{validate_intervals, IntervalSetError},
    item::{Item, NewItem, UpdateItem},
};

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("no item for id {0}")]
    NotFound(Uuid),
    #[error("user has no right to manipulate this item")]
    NotItemOwner,
    #[error(transparent)]
    InvalidAvailability(#[from] IntervalSetError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ItemError {
    /// Stable machine-readable code for the API layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ITEM_NOT_FOUND",
            Self::NotItemOwner => "NOT_ITEM_OWNER",
            Self::InvalidAvailability(e) => e.code(),
            Self::Database(_) => "INTERNAL",
        }
    }
}

pub struct ItemService;

impl ItemService {
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Item, ItemError> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(ItemError::NotFound(id))
    }

    /// Create an item. The availability set is validated before anything is
    /// written; an invalid set aborts the insert.
    pub async fn insert(pool: &PgPool, req: &NewItem) -> Result<Item, ItemError> {
        validate_intervals(&req.availability)?;
        let item = sqlx::query_as::<_, Item>(
            "INSERT INTO items (id, name, community_id, owner_id, availability, available_until, description)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(req.community_id)
        .bind(req.owner_id)
        .bind(Json(&req.availability))
        .bind(req.available_until)
        .bind(&req.description)
        .fetch_one(pool)
        .await?;
        tracing::info!(item_id = %item.id, "item created");
        Ok(item)
    }

    /// Update an item. A provided availability list replaces the stored one
    /// wholesale and is re-validated before the write.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        req: &UpdateItem,
    ) -> Result<Item, ItemError> {
        let current = Self::get(pool, id).await?;
        if current.owner_id != user_id {
            return Err(ItemError::NotItemOwner);
        }
        if let Some(intervals) = &req.availability {
            validate_intervals(intervals)?;
        }
        let item = sqlx::query_as::<_, Item>(
            "UPDATE items
             SET name = COALESCE($1, name),
                 is_active = COALESCE($2, is_active),
                 availability = COALESCE($3, availability),
                 available_until = COALESCE($4, available_until),
                 description = COALESCE($5, description),
                 updated_at = NOW()
             WHERE id = $6
             RETURNING *",
        )
        .bind(&req.name)
        .bind(req.is_active)
        .bind(req.availability.as_ref().map(Json))
        .bind(req.available_until)
        .bind(&req.description)
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(item)
    }

    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<(), ItemError> {
        let current = Self::get(pool, id).await?;
        if current.owner_id != user_id {
            return Err(ItemError::NotItemOwner);
        }
        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        tracing::info!(item_id = %id, "item deleted");
        Ok(())
    }
}
