use async_trait::async_trait;
use kernel::{
    model::{
        book::Book,
        id::{BookId, StockUnitId},
        stock::{StockUnit, StockUnitStatus},
    },
    repository::stock::StockRepository,
};
use shared::error::{AppError, AppResult};

use super::unit_of_work::{ensure_affected, UnitOfWorkImpl};
use crate::database::model::{book::BookRow, stock::StockUnitRow};

#[async_trait]
impl StockRepository for UnitOfWorkImpl {
    async fn find_book(&mut self, book_id: BookId) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>("SELECT book_id, title FROM books WHERE book_id = $1")
            .bind(book_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
        Ok(row.map(Book::from))
    }

    async fn find_book_for_update(&mut self, book_id: BookId) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
                SELECT book_id, title
                FROM books
                WHERE book_id = $1
                FOR UPDATE
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        Ok(row.map(Book::from))
    }

    async fn create_stock_unit(&mut self, unit: &StockUnit) -> AppResult<()> {
        let res = sqlx::query(
            r#"
                INSERT INTO stock_units (stock_unit_id, book_id, code, status)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(unit.id)
        .bind(unit.book_id)
        .bind(&unit.code)
        .bind(unit.status.as_ref())
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        ensure_affected(res, format!("stock unit {}", unit.id))
    }

    async fn find_book_id_of_stock_unit(
        &mut self,
        stock_unit_id: StockUnitId,
    ) -> AppResult<Option<BookId>> {
        sqlx::query_scalar::<_, BookId>("SELECT book_id FROM stock_units WHERE stock_unit_id = $1")
            .bind(stock_unit_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(AppError::SpecificOperationError)
    }

    async fn find_stock_unit(&mut self, stock_unit_id: StockUnitId) -> AppResult<Option<StockUnit>> {
        sqlx::query_as::<_, StockUnitRow>(
            r#"
                SELECT stock_unit_id, book_id, code, status
                FROM stock_units
                WHERE stock_unit_id = $1
                FOR UPDATE
            "#,
        )
        .bind(stock_unit_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .map(StockUnit::try_from)
        .transpose()
    }

    async fn find_stock_units_by_book(
        &mut self,
        book_id: BookId,
        code: Option<String>,
    ) -> AppResult<Vec<StockUnit>> {
        sqlx::query_as::<_, StockUnitRow>(
            r#"
                SELECT stock_unit_id, book_id, code, status
                FROM stock_units
                WHERE book_id = $1
                  AND ($2::VARCHAR IS NULL OR code = $2)
                ORDER BY code ASC
            "#,
        )
        .bind(book_id)
        .bind(code)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .into_iter()
        .map(StockUnit::try_from)
        .collect()
    }

    async fn update_stock_unit_status(
        &mut self,
        stock_unit_id: StockUnitId,
        status: StockUnitStatus,
    ) -> AppResult<()> {
        let res = sqlx::query(
            r#"
                UPDATE stock_units
                SET status = $2
                WHERE stock_unit_id = $1
            "#,
        )
        .bind(stock_unit_id)
        .bind(status.as_ref())
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        ensure_affected(res, format!("stock unit {stock_unit_id}"))
    }

    async fn delete_stock_unit(&mut self, stock_unit_id: StockUnitId) -> AppResult<()> {
        let res = sqlx::query("DELETE FROM stock_units WHERE stock_unit_id = $1")
            .bind(stock_unit_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    AppError::UnprocessableEntity(format!(
                        "stock unit {stock_unit_id} has loan history; mark it missing instead"
                    ))
                }
                e => AppError::SpecificOperationError(e),
            })?;
        ensure_affected(res, format!("stock unit {stock_unit_id}"))
    }

    async fn count_stock_units_by_status(
        &mut self,
        book_id: BookId,
        status: StockUnitStatus,
    ) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
                SELECT COUNT(*)
                FROM stock_units
                WHERE book_id = $1 AND status = $2
            "#,
        )
        .bind(book_id)
        .bind(status.as_ref())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)
    }
}
