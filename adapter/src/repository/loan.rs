use async_trait::async_trait;
use kernel::{
    model::{
        id::{LoanId, UserId},
        loan::{Loan, LoanListOptions},
    },
    repository::loan::LoanRepository,
};
use shared::error::{AppError, AppResult};

use super::unit_of_work::{ensure_affected, UnitOfWorkImpl};
use crate::database::model::loan::LoanRow;

#[async_trait]
impl LoanRepository for UnitOfWorkImpl {
    async fn create_loan(&mut self, loan: &Loan) -> AppResult<()> {
        let res = sqlx::query(
            r#"
                INSERT INTO loans
                (loan_id, loaned_at, return_by, returned_at, status, admin_id, stock_unit_id, reservation_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(loan.id)
        .bind(loan.loaned_at)
        .bind(loan.return_by)
        .bind(loan.returned_at)
        .bind(loan.status.as_ref())
        .bind(loan.admin_id)
        .bind(loan.stock_unit_id)
        .bind(loan.reservation_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::UnprocessableEntity(format!(
                    "reservation {} already has a loan",
                    loan.reservation_id
                ))
            }
            e => AppError::SpecificOperationError(e),
        })?;
        ensure_affected(res, format!("loan {}", loan.id))
    }

    async fn find_loan(&mut self, loan_id: LoanId) -> AppResult<Option<Loan>> {
        sqlx::query_as::<_, LoanRow>(
            r#"
                SELECT loan_id, loaned_at, return_by, returned_at,
                       status, admin_id, stock_unit_id, reservation_id
                FROM loans
                WHERE loan_id = $1
                FOR UPDATE
            "#,
        )
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .map(Loan::try_from)
        .transpose()
    }

    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()> {
        let res = sqlx::query(
            r#"
                UPDATE loans
                SET status = $2, returned_at = $3, admin_id = $4
                WHERE loan_id = $1
            "#,
        )
        .bind(loan.id)
        .bind(loan.status.as_ref())
        .bind(loan.returned_at)
        .bind(loan.admin_id)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        ensure_affected(res, format!("loan {}", loan.id))
    }

    async fn find_loans_by_user(&mut self, user_id: UserId) -> AppResult<Vec<Loan>> {
        sqlx::query_as::<_, LoanRow>(
            r#"
                SELECT l.loan_id, l.loaned_at, l.return_by, l.returned_at,
                       l.status, l.admin_id, l.stock_unit_id, l.reservation_id
                FROM loans AS l
                INNER JOIN reservations AS r ON r.reservation_id = l.reservation_id
                WHERE r.user_id = $1
                ORDER BY l.loaned_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .into_iter()
        .map(Loan::try_from)
        .collect()
    }

    async fn find_loans(&mut self, options: &LoanListOptions) -> AppResult<Vec<Loan>> {
        sqlx::query_as::<_, LoanRow>(
            r#"
                SELECT l.loan_id, l.loaned_at, l.return_by, l.returned_at,
                       l.status, l.admin_id, l.stock_unit_id, l.reservation_id
                FROM loans AS l
                INNER JOIN reservations AS r ON r.reservation_id = l.reservation_id
                INNER JOIN users AS u ON u.user_id = r.user_id
                WHERE ($1::VARCHAR IS NULL OR u.name ILIKE '%' || $1 || '%')
                  AND ($2::VARCHAR IS NULL OR l.status = $2)
                  AND ($3::DATE IS NULL OR (l.loaned_at AT TIME ZONE 'UTC')::DATE = $3)
                ORDER BY l.loaned_at DESC
            "#,
        )
        .bind(options.user_name.as_deref())
        .bind(options.status.as_ref().map(AsRef::<str>::as_ref))
        .bind(options.loaned_on)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .into_iter()
        .map(Loan::try_from)
        .collect()
    }
}
