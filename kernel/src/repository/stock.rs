use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{
    book::Book,
    id::{BookId, StockUnitId},
    stock::{StockUnit, StockUnitStatus},
};

/// 蔵書と在庫の保存先。Unit of Work の中で使う
#[async_trait]
pub trait StockRepository: Send {
    async fn find_book(&mut self, book_id: BookId) -> AppResult<Option<Book>>;
    /// 蔵書の行をロックし、貸出可能数の確認を直列化する
    async fn find_book_for_update(&mut self, book_id: BookId) -> AppResult<Option<Book>>;
    async fn create_stock_unit(&mut self, unit: &StockUnit) -> AppResult<()>;
    /// 在庫が属する蔵書。ロックは取らない
    async fn find_book_id_of_stock_unit(
        &mut self,
        stock_unit_id: StockUnitId,
    ) -> AppResult<Option<BookId>>;
    /// Unit of Work が終わるまで在庫をロックする
    async fn find_stock_unit(&mut self, stock_unit_id: StockUnitId) -> AppResult<Option<StockUnit>>;
    // 蔵書の在庫をコード順で取得する。コード指定時はそのコードのみ
    async fn find_stock_units_by_book(
        &mut self,
        book_id: BookId,
        code: Option<String>,
    ) -> AppResult<Vec<StockUnit>>;
    async fn update_stock_unit_status(
        &mut self,
        stock_unit_id: StockUnitId,
        status: StockUnitStatus,
    ) -> AppResult<()>;
    async fn delete_stock_unit(&mut self, stock_unit_id: StockUnitId) -> AppResult<()>;
    async fn count_stock_units_by_status(
        &mut self,
        book_id: BookId,
        status: StockUnitStatus,
    ) -> AppResult<i64>;
}
