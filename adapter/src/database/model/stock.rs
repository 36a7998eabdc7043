use kernel::model::{
    id::{BookId, StockUnitId},
    stock::StockUnit,
};
use shared::error::AppError;

use super::parse_status;

#[derive(sqlx::FromRow)]
pub struct StockUnitRow {
    pub stock_unit_id: StockUnitId,
    pub book_id: BookId,
    pub code: String,
    pub status: String,
}

impl TryFrom<StockUnitRow> for StockUnit {
    type Error = AppError;

    fn try_from(value: StockUnitRow) -> Result<Self, Self::Error> {
        let StockUnitRow {
            stock_unit_id,
            book_id,
            code,
            status,
        } = value;
        Ok(StockUnit {
            id: stock_unit_id,
            book_id,
            code,
            status: parse_status("stock unit status", &status)?,
        })
    }
}
