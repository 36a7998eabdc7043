use async_trait::async_trait;
use shared::error::AppResult;

use super::{
    loan::LoanRepository, reservation::ReservationRepository, stock::StockRepository,
    user::UserRepository,
};

/// すべてのポートにまたがる 1 つのトランザクション。
/// [`UnitOfWork::commit`] を呼ばずに破棄すると書き込みはすべて取り消される
#[async_trait]
pub trait UnitOfWork:
    StockRepository + ReservationRepository + LoanRepository + UserRepository + Send
{
    async fn commit(self: Box<Self>) -> AppResult<()>;
}

#[mockall::automock]
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}
