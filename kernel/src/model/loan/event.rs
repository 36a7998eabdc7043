use derive_new::new;

use crate::model::id::{LoanId, ReservationId, StockUnitId};

/// 保留中の予約に対して特定の在庫を貸し出す
#[derive(Debug, Clone, Copy, new)]
pub struct CreateLoan {
    pub reservation_id: ReservationId,
    pub stock_unit_id: StockUnitId,
}

/// 在庫が返却されたときに貸出を終了する
#[derive(Debug, Clone, Copy, new)]
pub struct FinishLoan {
    pub loan_id: LoanId,
}
