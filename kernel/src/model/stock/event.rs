use derive_new::new;

use crate::model::id::{BookId, StockUnitId};

use super::StockUnitStatus;

#[derive(Debug, Clone, new, garde::Validate)]
pub struct CreateStockUnit {
    #[garde(skip)]
    pub book_id: BookId,
    #[garde(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Debug, Clone, Copy, new)]
pub struct RepairStockUnitStatus {
    pub stock_unit_id: StockUnitId,
    pub status: StockUnitStatus,
}

/// `book_id` を指定した場合はその蔵書の在庫に限定して検索する
#[derive(Debug, Clone, Copy, new)]
pub struct DeleteStockUnit {
    pub stock_unit_id: StockUnitId,
    pub book_id: Option<BookId>,
}
