use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::error::AppResult;

use crate::model::{
    id::{BookId, ReservationId, UserId},
    reservation::{Reservation, ReservationListOptions, ReservationStatus},
};

/// 予約の保存先。保存されているステータスのまま返すので、
/// Expired の導出は呼び出し側で行う
#[async_trait]
pub trait ReservationRepository: Send {
    async fn create_reservation(&mut self, reservation: &Reservation) -> AppResult<()>;
    /// Unit of Work が終わるまで予約をロックする
    async fn find_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> AppResult<Option<Reservation>>;
    /// `status` と `admin_id` を更新する
    async fn update_reservation_status(&mut self, reservation: &Reservation) -> AppResult<()>;
    async fn find_reservations_by_book(
        &mut self,
        book_id: BookId,
        status: Option<ReservationStatus>,
    ) -> AppResult<Vec<Reservation>>;
    async fn find_reservations_by_user(&mut self, user_id: UserId) -> AppResult<Vec<Reservation>>;
    /// 期限が過ぎていない、保存上 Pending の予約の件数
    async fn count_pending_reservations(
        &mut self,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> AppResult<i64>;
    /// ユーザー名と日付で絞り込む。ステータスでの絞り込みは
    /// 呼び出し側が導出したステータスに対して行う
    async fn find_reservations(
        &mut self,
        options: &ReservationListOptions,
    ) -> AppResult<Vec<Reservation>>;
    /// 期限を過ぎた Pending の予約すべてに Expired を保存する
    async fn expire_pending_reservations(&mut self, now: DateTime<Utc>) -> AppResult<u64>;
}
