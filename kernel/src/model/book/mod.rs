use shared::error::{AppError, AppResult};

use super::id::BookId;

/// 蔵書の目録情報。貸出処理では ID のみを使う
#[derive(Debug, Clone)]
pub struct Book {
    pub id: BookId,
    pub title: String,
}

/// 貸出可能冊数の算出に使う 2 つの件数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookAvailability {
    pub book_id: BookId,
    pub available_units: i64,
    pub pending_reservations: i64,
}

impl BookAvailability {
    /// 新規予約に割り当てられる冊数。差が負になるのは
    /// 在庫台帳と予約の内容が食い違っている場合
    pub fn available_copies(&self) -> AppResult<i64> {
        let copies = self.available_units - self.pending_reservations;
        if copies < 0 {
            return Err(AppError::InconsistentAvailability {
                book_id: self.book_id.to_string(),
                available_units: self.available_units,
                pending_reservations: self.pending_reservations,
            });
        }
        Ok(copies)
    }
}
