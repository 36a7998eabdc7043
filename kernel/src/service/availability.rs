use chrono::{DateTime, Utc};
use shared::error::AppResult;

use crate::{
    model::{book::BookAvailability, id::BookId, stock::StockUnitStatus},
    repository::{reservation::ReservationRepository, stock::StockRepository},
};

/// 蔵書の貸出可能数を構成する 2 つの件数を読む
pub async fn book_availability<S>(
    store: &mut S,
    book_id: BookId,
    now: DateTime<Utc>,
) -> AppResult<BookAvailability>
where
    S: StockRepository + ReservationRepository + ?Sized,
{
    let available_units = store
        .count_stock_units_by_status(book_id, StockUnitStatus::Available)
        .await?;
    let pending_reservations = store.count_pending_reservations(book_id, now).await?;
    Ok(BookAvailability {
        book_id,
        available_units,
        pending_reservations,
    })
}

/// 新規予約に割り当てられる蔵書の冊数
pub async fn available_copies<S>(store: &mut S, book_id: BookId, now: DateTime<Utc>) -> AppResult<i64>
where
    S: StockRepository + ReservationRepository + ?Sized,
{
    book_availability(store, book_id, now)
        .await?
        .available_copies()
}
