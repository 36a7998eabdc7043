use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{
    id::{LoanId, UserId},
    loan::{Loan, LoanListOptions},
};

#[async_trait]
pub trait LoanRepository: Send {
    async fn create_loan(&mut self, loan: &Loan) -> AppResult<()>;
    /// Unit of Work が終わるまで貸出をロックする
    async fn find_loan(&mut self, loan_id: LoanId) -> AppResult<Option<Loan>>;
    /// `status`、`returned_at`、`admin_id` を更新する
    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()>;
    async fn find_loans_by_user(&mut self, user_id: UserId) -> AppResult<Vec<Loan>>;
    async fn find_loans(&mut self, options: &LoanListOptions) -> AppResult<Vec<Loan>>;
}
