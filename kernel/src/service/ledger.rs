//! 在庫 1 冊ごとの台帳操作。呼び出し元の Unit of Work の中で実行する。
//! ステータスの変更はクレート内に閉じており、貸出・返却と
//! チェック付きの修正処理だけが在庫の状態を動かせる

use shared::error::{AppError, AppResult};

use crate::{
    model::{
        id::{BookId, StockUnitId},
        stock::{StockUnit, StockUnitStatus},
    },
    repository::stock::StockRepository,
};

pub async fn add_stock_unit<S>(store: &mut S, book_id: BookId, code: String) -> AppResult<StockUnit>
where
    S: StockRepository + ?Sized,
{
    let unit = StockUnit::new(book_id, code);
    store.create_stock_unit(&unit).await?;
    Ok(unit)
}

/// 在庫を取得する。`book_id` を指定した場合はその蔵書に属することも確認する
pub async fn get_stock_unit<S>(
    store: &mut S,
    stock_unit_id: StockUnitId,
    book_id: Option<BookId>,
) -> AppResult<StockUnit>
where
    S: StockRepository + ?Sized,
{
    store
        .find_stock_unit(stock_unit_id)
        .await?
        .filter(|unit| book_id.map_or(true, |book_id| unit.book_id == book_id))
        .ok_or_else(|| AppError::EntityNotFound(format!("stock unit {stock_unit_id} not found")))
}

pub(crate) async fn set_stock_unit_status<S>(
    store: &mut S,
    stock_unit_id: StockUnitId,
    status: StockUnitStatus,
) -> AppResult<()>
where
    S: StockRepository + ?Sized,
{
    store.update_stock_unit_status(stock_unit_id, status).await
}

pub async fn remove_stock_unit<S>(store: &mut S, unit: &StockUnit) -> AppResult<()>
where
    S: StockRepository + ?Sized,
{
    store.delete_stock_unit(unit.id).await
}
