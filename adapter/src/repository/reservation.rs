use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kernel::{
    model::{
        id::{BookId, ReservationId, UserId},
        reservation::{Reservation, ReservationListOptions, ReservationStatus},
    },
    repository::reservation::ReservationRepository,
};
use shared::error::{AppError, AppResult};

use super::unit_of_work::{ensure_affected, UnitOfWorkImpl};
use crate::database::model::reservation::ReservationRow;

fn into_reservations(rows: Vec<ReservationRow>) -> AppResult<Vec<Reservation>> {
    rows.into_iter().map(Reservation::try_from).collect()
}

#[async_trait]
impl ReservationRepository for UnitOfWorkImpl {
    async fn create_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        let res = sqlx::query(
            r#"
                INSERT INTO reservations
                (reservation_id, reserved_at, expires_at, borrowed_days, status, user_id, admin_id, book_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.reserved_at)
        .bind(reservation.expires_at)
        .bind(reservation.borrowed_days.days())
        .bind(reservation.status.as_ref())
        .bind(reservation.user_id)
        .bind(reservation.admin_id)
        .bind(reservation.book_id)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        ensure_affected(res, format!("reservation {}", reservation.id))
    }

    async fn find_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> AppResult<Option<Reservation>> {
        sqlx::query_as::<_, ReservationRow>(
            r#"
                SELECT reservation_id, reserved_at, expires_at, borrowed_days,
                       status, user_id, admin_id, book_id
                FROM reservations
                WHERE reservation_id = $1
                FOR UPDATE
            "#,
        )
        .bind(reservation_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .map(Reservation::try_from)
        .transpose()
    }

    async fn update_reservation_status(&mut self, reservation: &Reservation) -> AppResult<()> {
        let res = sqlx::query(
            r#"
                UPDATE reservations
                SET status = $2, admin_id = $3
                WHERE reservation_id = $1
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.status.as_ref())
        .bind(reservation.admin_id)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        ensure_affected(res, format!("reservation {}", reservation.id))
    }

    async fn find_reservations_by_book(
        &mut self,
        book_id: BookId,
        status: Option<ReservationStatus>,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
                SELECT reservation_id, reserved_at, expires_at, borrowed_days,
                       status, user_id, admin_id, book_id
                FROM reservations
                WHERE book_id = $1
                  AND ($2::VARCHAR IS NULL OR status = $2)
                ORDER BY reserved_at DESC
            "#,
        )
        .bind(book_id)
        .bind(status.as_ref().map(AsRef::<str>::as_ref))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        into_reservations(rows)
    }

    async fn find_reservations_by_user(&mut self, user_id: UserId) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
                SELECT reservation_id, reserved_at, expires_at, borrowed_days,
                       status, user_id, admin_id, book_id
                FROM reservations
                WHERE user_id = $1
                ORDER BY reserved_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        into_reservations(rows)
    }

    async fn count_pending_reservations(
        &mut self,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
                SELECT COUNT(*)
                FROM reservations
                WHERE book_id = $1
                  AND status = 'pending'
                  AND expires_at >= $2
            "#,
        )
        .bind(book_id)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)
    }

    async fn find_reservations(
        &mut self,
        options: &ReservationListOptions,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
                SELECT r.reservation_id, r.reserved_at, r.expires_at, r.borrowed_days,
                       r.status, r.user_id, r.admin_id, r.book_id
                FROM reservations AS r
                INNER JOIN users AS u ON u.user_id = r.user_id
                WHERE ($1::VARCHAR IS NULL OR u.name ILIKE '%' || $1 || '%')
                  AND ($2::DATE IS NULL OR (r.reserved_at AT TIME ZONE 'UTC')::DATE = $2)
                ORDER BY r.reserved_at DESC
            "#,
        )
        .bind(options.user_name.as_deref())
        .bind(options.reserved_on)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        into_reservations(rows)
    }

    async fn expire_pending_reservations(&mut self, now: DateTime<Utc>) -> AppResult<u64> {
        let res = sqlx::query(
            r#"
                UPDATE reservations
                SET status = 'expired'
                WHERE status = 'pending' AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        Ok(res.rows_affected())
    }
}
