//! プロセスのメモリ上にすべてを保持するストア
//!
//! Unit of Work は存続中ずっとストアのミューテックスを保持し、状態の
//! コピーを編集するので、トランザクションは完全に直列化される。
//! コミットでコピーを差し替え、破棄すればコピーは捨てられる

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use kernel::{
    model::{
        book::Book,
        id::{BookId, LoanId, ReservationId, StockUnitId, UserId},
        loan::Loan,
        reservation::Reservation,
        stock::StockUnit,
        user::UserAccount,
    },
    repository::unit_of_work::{UnitOfWork, UnitOfWorkFactory},
};
use shared::error::AppResult;
use tokio::sync::{Mutex, OwnedMutexGuard};

mod repository;

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryState {
    pub(crate) users: HashMap<UserId, UserAccount>,
    pub(crate) books: HashMap<BookId, Book>,
    pub(crate) stock_units: HashMap<StockUnitId, StockUnit>,
    pub(crate) reservations: HashMap<ReservationId, Reservation>,
    pub(crate) loans: HashMap<LoanId, Loan>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// アカウントは別の場所で管理される。これはテスト用に 1 件登録する
    pub async fn insert_user(&self, user: UserAccount) {
        self.state.lock().await.users.insert(user.id, user);
    }

    /// 蔵書は別の場所で管理される。これはテスト用に 1 件登録する
    pub async fn insert_book(&self, book: Book) {
        self.state.lock().await.books.insert(book.id, book);
    }

    pub async fn set_user_active(&self, user_id: UserId, is_active: bool) {
        if let Some(user) = self.state.lock().await.users.get_mut(&user_id) {
            user.is_active = is_active;
        }
    }
}

pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, working }))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kernel::model::user::Role;

    use super::*;

    fn book() -> Book {
        Book {
            id: BookId::new(),
            title: "The Rust Programming Language".into(),
        }
    }

    #[tokio::test]
    async fn commit_publishes_writes() {
        let store = InMemoryStore::new();
        let book = book();
        store.insert_book(book.clone()).await;

        let unit = StockUnit::new(book.id, "RPL-1".into());
        let mut uow = store.begin().await.unwrap();
        uow.create_stock_unit(&unit).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.find_stock_unit(unit.id).await.unwrap(), Some(unit));
    }

    #[tokio::test]
    async fn dropping_discards_writes() {
        let store = InMemoryStore::new();
        let book = book();
        store.insert_book(book.clone()).await;

        let unit = StockUnit::new(book.id, "RPL-2".into());
        {
            let mut uow = store.begin().await.unwrap();
            uow.create_stock_unit(&unit).await.unwrap();
        }

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.find_stock_unit(unit.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn units_of_work_are_serialized() {
        let store = InMemoryStore::new();
        let first = store.begin().await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(20), store.begin()).await;
        assert!(blocked.is_err());

        drop(first);
        assert!(store.begin().await.is_ok());
    }

    #[tokio::test]
    async fn seeded_users_are_visible() {
        let store = InMemoryStore::new();
        let user = UserAccount {
            id: UserId::new(),
            name: "Ada".into(),
            role: Role::User,
            is_active: true,
        };
        store.insert_user(user.clone()).await;
        store.set_user_active(user.id, false).await;

        let mut uow = store.begin().await.unwrap();
        let found = uow.find_user(user.id).await.unwrap().unwrap();
        assert!(!found.is_active);
    }
}
