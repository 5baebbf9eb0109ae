use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    availability,
    booking::{Booking, BookingRequest},
    item::Item,
};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("no item for id {0}")]
    ItemNotFound(Uuid),
    #[error("can not book owned item")]
    CannotBookOwnItem,
    #[error("at least one input param is invalid")]
    InvalidInputParam,
    #[error("the requested interval exceeds the available until date")]
    DateExceedsAvailableUntil,
    #[error("start and/or end date is not in an available interval")]
    DatesNotInInterval,
    #[error("the requested item is already reserved at this time")]
    ItemReserved,
    #[error("no booking for id {0}")]
    NotFound(Uuid),
    #[error("user not allowed to see this booking")]
    NotBookingOwner,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl BookingError {
    /// Stable machine-readable code, one per rejection reason.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ItemNotFound(_) => "ITEM_NOT_FOUND",
            Self::CannotBookOwnItem => "CANNOT_BOOK_OWN_ITEM",
            Self::InvalidInputParam => "INVALID_INPUT_PARAM",
            Self::DateExceedsAvailableUntil => "DATE_EXCEEDS_AVAILABLE_UNTIL",
            Self::DatesNotInInterval => "DATES_NOT_IN_INTERVAL",
            Self::ItemReserved => "ITEM_RESERVED",
            Self::NotFound(_) => "BOOKING_NOT_FOUND",
            Self::NotBookingOwner => "NOT_BOOKING_OWNER",
            Self::Database(_) => "INTERNAL",
        }
    }
}

/// Decide whether a proposed window may be admitted for `item`.
///
/// Ordered, short-circuiting guards: owner check, temporal order, expiry,
/// recurring availability, conflict with existing bookings. Pure computation
/// over its inputs; the caller provides the existing bookings and persists
/// the new one on success.
pub fn admit_booking(
    item: &Item,
    requester_id: Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    existing: &[Booking],
) -> Result<(), BookingError> {
    if item.owner_id == requester_id {
        return Err(BookingError::CannotBookOwnItem);
    }
    if end_at <= start_at {
        return Err(BookingError::InvalidInputParam);
    }
    if let Some(until) = item.available_until {
        if end_at > until {
            return Err(BookingError::DateExceedsAvailableUntil);
        }
    }
    // An empty interval set means the item carries no recurring restriction.
    let intervals = item.intervals();
    if !intervals.is_empty() && !availability::contains_dates(intervals, start_at, end_at) {
        return Err(BookingError::DatesNotInInterval);
    }
    // Full interval overlap, so a window that swallows an existing booking is
    // rejected the same as one that clips its edge.
    if existing
        .iter()
        .any(|b| b.start_at < end_at && b.end_at > start_at)
    {
        return Err(BookingError::ItemReserved);
    }
    Ok(())
}

pub struct BookingService;

impl BookingService {
    /// Admit and persist a booking in one transaction.
    ///
    /// The item row is locked before existing bookings are read so that two
    /// concurrent attempts on the same item serialize; without the lock the
    /// conflict guard could pass for both.
    pub async fn book_item(pool: &PgPool, req: &BookingRequest) -> Result<Booking, BookingError> {
        let mut tx = pool.begin().await?;
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1 FOR UPDATE")
            .bind(req.item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(BookingError::ItemNotFound(req.item_id))?;
        let existing = sqlx::query_as::<_, Booking>(
            "SELECT * FROM item_bookings WHERE item_id = $1",
        )
        .bind(req.item_id)
        .fetch_all(&mut *tx)
        .await?;
        if let Err(err) = admit_booking(&item, req.user_id, req.start_at, req.end_at, &existing) {
            tracing::warn!(item_id = %req.item_id, code = err.code(), "booking rejected");
            return Err(err);
        }
        let booking = sqlx::query_as::<_, Booking>(
            "INSERT INTO item_bookings (id, item_id, user_id, start_at, end_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(req.item_id)
        .bind(req.user_id)
        .bind(req.start_at)
        .bind(req.end_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(booking_id = %booking.id, item_id = %booking.item_id, "booking created");
        Ok(booking)
    }

    /// All bookings placed by a user, most recent window first.
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM item_bookings WHERE user_id = $1 ORDER BY end_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(bookings)
    }

    /// The user's bookings on one specific item.
    pub async fn list_for_item(
        pool: &PgPool,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<Vec<Booking>, BookingError> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM item_bookings WHERE user_id = $1 AND item_id = $2 ORDER BY end_at DESC",
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_all(pool)
        .await?;
        Ok(bookings)
    }

    /// Fetch one booking, restricted to the user who placed it.
    pub async fn get(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Booking, BookingError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM item_bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(BookingError::NotFound(id))?;
        if booking.user_id != user_id {
            return Err(BookingError::NotBookingOwner);
        }
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::availability::WeeklyInterval;
    use chrono::TimeZone;
    use sqlx::types::Json;

    fn item(owner_id: Uuid, intervals: Vec<WeeklyInterval>, until: Option<DateTime<Utc>>) -> Item {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Item {
            id: Uuid::new_v4(),
            name: "cordless drill".into(),
            community_id: Uuid::new_v4(),
            owner_id,
            is_active: true,
            availability: Json(intervals),
            available_until: until,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn booking(item_id: Uuid, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            item_id,
            user_id: Uuid::new_v4(),
            start_at,
            end_at,
            created_at: start_at,
        }
    }

    fn monday_minutes(start_min: u32, end_min: u32) -> (DateTime<Utc>, DateTime<Utc>) {
        // 2024-01-08 was a Monday.
        let day = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        (
            day + chrono::Duration::minutes(start_min as i64),
            day + chrono::Duration::minutes(end_min as i64),
        )
    }

    fn weekly(start_day: u8, end_day: u8, start_min: u16, end_min: u16) -> WeeklyInterval {
        WeeklyInterval {
            start_day_of_week: start_day,
            end_day_of_week: end_day,
            start_time_at_in_minute: start_min,
            end_time_at_in_minute: end_min,
        }
    }

    #[test]
    fn owner_may_not_book_own_item() {
        let owner = Uuid::new_v4();
        let item = item(owner, vec![], None);
        let (start, end) = monday_minutes(70, 170);
        let err = admit_booking(&item, owner, start, end, &[]).unwrap_err();
        assert_eq!(err.code(), "CANNOT_BOOK_OWN_ITEM");
    }

    #[test]
    fn end_before_or_equal_start_is_rejected_first() {
        // Availability and expiry would both fail too; the order guard wins.
        let until = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let item = item(Uuid::new_v4(), vec![weekly(2, 2, 0, 1)], Some(until));
        let (start, end) = monday_minutes(170, 70);
        let err = admit_booking(&item, Uuid::new_v4(), start, end, &[]).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT_PARAM");
        let err = admit_booking(&item, Uuid::new_v4(), start, start, &[]).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT_PARAM");
    }

    #[test]
    fn window_past_available_until_is_rejected() {
        let until = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let item = item(Uuid::new_v4(), vec![], Some(until));
        let start = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap();
        let err = admit_booking(&item, Uuid::new_v4(), start, end, &[]).unwrap_err();
        assert_eq!(err.code(), "DATE_EXCEEDS_AVAILABLE_UNTIL");
    }

    #[test]
    fn window_inside_a_recurring_interval_is_admitted() {
        let item = item(Uuid::new_v4(), vec![weekly(1, 1, 60, 180)], None);
        let (start, end) = monday_minutes(70, 170);
        assert!(admit_booking(&item, Uuid::new_v4(), start, end, &[]).is_ok());
    }

    #[test]
    fn window_outside_all_intervals_is_rejected() {
        let item = item(Uuid::new_v4(), vec![weekly(1, 1, 60, 180)], None);
        let (start, end) = monday_minutes(200, 300);
        let err = admit_booking(&item, Uuid::new_v4(), start, end, &[]).unwrap_err();
        assert_eq!(err.code(), "DATES_NOT_IN_INTERVAL");
    }

    #[test]
    fn empty_interval_set_means_always_available() {
        let item = item(Uuid::new_v4(), vec![], None);
        let (start, end) = monday_minutes(200, 300);
        assert!(admit_booking(&item, Uuid::new_v4(), start, end, &[]).is_ok());
    }

    #[test]
    fn overlapping_existing_booking_is_rejected() {
        let item = item(Uuid::new_v4(), vec![], None);
        let existing_start = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
        let existing_end = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        let existing = vec![booking(item.id, existing_start, existing_end)];
        // clips the start of the existing window
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 11, 0, 0).unwrap();
        let err = admit_booking(&item, Uuid::new_v4(), start, end, &existing).unwrap_err();
        assert_eq!(err.code(), "ITEM_RESERVED");
    }

    #[test]
    fn window_fully_containing_an_existing_booking_is_rejected() {
        let item = item(Uuid::new_v4(), vec![], None);
        let existing_start = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
        let existing_end = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        let existing = vec![booking(item.id, existing_start, existing_end)];
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 13, 0, 0).unwrap();
        let err = admit_booking(&item, Uuid::new_v4(), start, end, &existing).unwrap_err();
        assert_eq!(err.code(), "ITEM_RESERVED");
    }

    #[test]
    fn back_to_back_windows_do_not_conflict() {
        let item = item(Uuid::new_v4(), vec![], None);
        let existing_start = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
        let existing_end = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        let existing = vec![booking(item.id, existing_start, existing_end)];
        // starts exactly where the existing one ends
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 14, 0, 0).unwrap();
        assert!(admit_booking(&item, Uuid::new_v4(), existing_end, end, &existing).is_ok());
    }
}
