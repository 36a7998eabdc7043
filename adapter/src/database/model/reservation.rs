use chrono::{DateTime, Utc};
use kernel::model::{
    id::{BookId, ReservationId, UserId},
    reservation::{BorrowedDays, Reservation},
};
use shared::error::AppError;

use super::parse_status;

#[derive(sqlx::FromRow)]
pub struct ReservationRow {
    pub reservation_id: ReservationId,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub borrowed_days: i32,
    pub status: String,
    pub user_id: UserId,
    pub admin_id: Option<UserId>,
    pub book_id: BookId,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = AppError;

    fn try_from(value: ReservationRow) -> Result<Self, Self::Error> {
        let ReservationRow {
            reservation_id,
            reserved_at,
            expires_at,
            borrowed_days,
            status,
            user_id,
            admin_id,
            book_id,
        } = value;
        Ok(Reservation {
            id: reservation_id,
            reserved_at,
            expires_at,
            borrowed_days: BorrowedDays::try_from(borrowed_days)?,
            status: parse_status("reservation status", &status)?,
            user_id,
            admin_id,
            book_id,
        })
    }
}
