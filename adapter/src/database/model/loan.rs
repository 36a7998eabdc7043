use chrono::{DateTime, Utc};
use kernel::model::{
    id::{LoanId, ReservationId, StockUnitId, UserId},
    loan::Loan,
};
use shared::error::AppError;

use super::parse_status;

#[derive(sqlx::FromRow)]
pub struct LoanRow {
    pub loan_id: LoanId,
    pub loaned_at: DateTime<Utc>,
    pub return_by: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: String,
    pub admin_id: Option<UserId>,
    pub stock_unit_id: StockUnitId,
    pub reservation_id: ReservationId,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(value: LoanRow) -> Result<Self, Self::Error> {
        let LoanRow {
            loan_id,
            loaned_at,
            return_by,
            returned_at,
            status,
            admin_id,
            stock_unit_id,
            reservation_id,
        } = value;
        Ok(Loan {
            id: loan_id,
            loaned_at,
            return_by,
            returned_at,
            status: parse_status("loan status", &status)?,
            admin_id,
            stock_unit_id,
            reservation_id,
        })
    }
}
