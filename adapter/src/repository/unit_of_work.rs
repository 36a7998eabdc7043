use async_trait::async_trait;
use derive_new::new;
use kernel::repository::unit_of_work::{UnitOfWork, UnitOfWorkFactory};
use shared::error::{AppError, AppResult};
use sqlx::{Postgres, Transaction};

use crate::database::ConnectionPool;

#[derive(new)]
pub struct UnitOfWorkFactoryImpl {
    db: ConnectionPool,
}

/// 1 つのデータベーストランザクションを包む。`find_*` で読んだ行は
/// コミットかロールバックまで `FOR UPDATE` でロックされる。
/// コミットされなかった場合は破棄時にロールバックされる
pub struct UnitOfWorkImpl {
    pub(crate) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWorkFactory for UnitOfWorkFactoryImpl {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(UnitOfWorkImpl { tx }))
    }
}

#[async_trait]
impl UnitOfWork for UnitOfWorkImpl {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await.map_err(AppError::CommitUnconfirmed)
    }
}

/// 1 行も対象にならなかった UPDATE/DELETE をエラーにする
pub(crate) fn ensure_affected(
    result: sqlx::postgres::PgQueryResult,
    what: impl std::fmt::Display,
) -> AppResult<()> {
    if result.rows_affected() < 1 {
        return Err(AppError::NoRowAffectedError(what.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{str::FromStr, sync::Arc, time::Duration};

    use kernel::{
        model::{
            id::{BookId, StockUnitId, UserId},
            loan::event::{CreateLoan, FinishLoan},
            reservation::{event::CreateReservation, Reservation},
            stock::StockUnitStatus,
            user::{ActingUser, Role},
        },
        service::circulation::CirculationService,
    };
    use shared::{
        clock::SystemClock,
        config::CirculationConfig,
        error::{Ineligibility, StateConflict},
    };

    use super::*;

    const BOOK: &str = "9890736e-a4e4-461a-a77d-eac3517ef11b";
    const ADMIN: &str = "5b4c96ac-316a-4bee-8e69-cac5eb84ff4c";
    const READER: &str = "9582f9de-0fd1-4892-b20c-70139a7eb95b";
    const COPY_1: &str = "7f4f2fc4-0a3e-4d2a-9b77-2b5b2a7a0c01";
    const COPY_2: &str = "7f4f2fc4-0a3e-4d2a-9b77-2b5b2a7a0c02";

    fn id<T: FromStr>(s: &str) -> T
    where
        T::Err: std::fmt::Debug,
    {
        T::from_str(s).unwrap()
    }

    fn admin() -> ActingUser {
        ActingUser::new(id(ADMIN), Role::Admin)
    }

    fn circulation(pool: &sqlx::PgPool) -> (Arc<CirculationService>, UnitOfWorkFactoryImpl) {
        let service = CirculationService::new(
            Arc::new(UnitOfWorkFactoryImpl::new(ConnectionPool::new(pool.clone()))),
            Arc::new(SystemClock),
            CirculationConfig::default(),
        );
        let raw = UnitOfWorkFactoryImpl::new(ConnectionPool::new(pool.clone()));
        (Arc::new(service), raw)
    }

    async fn enroll(pool: &sqlx::PgPool, name: &str) -> UserId {
        let user_id = UserId::new();
        sqlx::query(
            r#"
                INSERT INTO users (user_id, name, email, role, is_active)
                VALUES ($1, $2, $3, 'user', TRUE)
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(format!("{}@example.com", name.to_lowercase()))
        .execute(pool)
        .await
        .unwrap();
        user_id
    }

    async fn reserve(service: &CirculationService, user_id: UserId) -> AppResult<Reservation> {
        service
            .create_reservation(&admin(), CreateReservation::new(user_id, id(BOOK), 30))
            .await
    }

    #[sqlx::test(migrations = "./migrations", fixtures("common"))]
    #[ignore = "needs a PostgreSQL server at DATABASE_URL"]
    async fn last_copy_goes_to_exactly_one_of_two_racing_reservations(pool: sqlx::PgPool) {
        let (service, _) = circulation(&pool);
        reserve(&service, id(READER)).await.unwrap();
        let ana = enroll(&pool, "Ana").await;
        let bento = enroll(&pool, "Bento").await;

        let (a, b) = tokio::join!(reserve(&service, ana), reserve(&service, bento));

        let (won, lost) = match (a, b) {
            (Ok(r), Err(e)) | (Err(e), Ok(r)) => (r, e),
            other => panic!("expected one winner, got {other:?}"),
        };
        assert_eq!(won.book_id, id::<BookId>(BOOK));
        assert!(matches!(lost, AppError::Ineligible(Ineligibility::OutOfStock)));
        assert_eq!(service.available_copies(id(BOOK)).await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("common"))]
    #[ignore = "needs a PostgreSQL server at DATABASE_URL"]
    async fn reservation_is_collected_only_once(pool: sqlx::PgPool) {
        let (service, _) = circulation(&pool);
        let reservation = reserve(&service, id(READER)).await.unwrap();

        let (admin_a, admin_b) = (admin(), admin());
        let (a, b) = tokio::join!(
            service.create_loan(&admin_a, CreateLoan::new(reservation.id, id(COPY_1))),
            service.create_loan(&admin_b, CreateLoan::new(reservation.id, id(COPY_2))),
        );

        let (loan, lost) = match (a, b) {
            (Ok(l), Err(e)) | (Err(e), Ok(l)) => (l, e),
            other => panic!("expected one loan, got {other:?}"),
        };
        assert!(matches!(
            lost,
            AppError::StateConflict(StateConflict::ReservationNotPending)
        ));

        let other_copy: StockUnitId = if loan.stock_unit_id == id(COPY_1) {
            id(COPY_2)
        } else {
            id(COPY_1)
        };
        let untouched = service.get_stock_unit(other_copy, None).await.unwrap();
        assert_eq!(untouched.status, StockUnitStatus::Available);
        assert_eq!(service.available_copies(id(BOOK)).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("common"))]
    #[ignore = "needs a PostgreSQL server at DATABASE_URL"]
    async fn loan_is_finished_only_once(pool: sqlx::PgPool) {
        let (service, _) = circulation(&pool);
        let reservation = reserve(&service, id(READER)).await.unwrap();
        let loan = service
            .create_loan(&admin(), CreateLoan::new(reservation.id, id(COPY_1)))
            .await
            .unwrap();

        let (admin_a, admin_b) = (admin(), admin());
        let (a, b) = tokio::join!(
            service.finish_loan(&admin_a, FinishLoan::new(loan.id)),
            service.finish_loan(&admin_b, FinishLoan::new(loan.id)),
        );

        let lost = match (a, b) {
            (Ok(()), Err(e)) | (Err(e), Ok(())) => e,
            other => panic!("expected one return, got {other:?}"),
        };
        assert!(matches!(
            lost,
            AppError::StateConflict(StateConflict::LoanNotBorrowed)
        ));
        assert_eq!(service.available_copies(id(BOOK)).await.unwrap(), 2);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("common"))]
    #[ignore = "needs a PostgreSQL server at DATABASE_URL"]
    async fn collecting_waits_for_a_reservation_holding_the_book(pool: sqlx::PgPool) {
        let (service, raw) = circulation(&pool);
        let reservation = reserve(&service, id(READER)).await.unwrap();
        let ana = enroll(&pool, "Ana").await;
        reserve(&service, ana).await.unwrap();

        // CreateReservation が蔵書をロックしている間に行う読み取りと同じもの
        let mut holder = raw.begin().await.unwrap();
        holder.find_book_for_update(id(BOOK)).await.unwrap().unwrap();
        let on_shelf = holder
            .count_stock_units_by_status(id(BOOK), StockUnitStatus::Available)
            .await
            .unwrap();
        assert_eq!(on_shelf, 2);

        let lending = tokio::spawn({
            let service = service.clone();
            async move {
                service
                    .create_loan(&admin(), CreateLoan::new(reservation.id, id(COPY_1)))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!lending.is_finished());

        let pending = holder
            .count_pending_reservations(id(BOOK), chrono::Utc::now())
            .await
            .unwrap();
        assert_eq!(on_shelf - pending, 0);
        drop(holder);

        lending.await.unwrap().unwrap();
        assert_eq!(service.available_copies(id(BOOK)).await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("common"))]
    #[ignore = "needs a PostgreSQL server at DATABASE_URL"]
    async fn collecting_waits_for_the_borrower_lock(pool: sqlx::PgPool) {
        let (service, raw) = circulation(&pool);
        let reservation = reserve(&service, id(READER)).await.unwrap();

        let mut holder = raw.begin().await.unwrap();
        holder.find_user(id(READER)).await.unwrap().unwrap();

        let lending = tokio::spawn({
            let service = service.clone();
            async move {
                service
                    .create_loan(&admin(), CreateLoan::new(reservation.id, id(COPY_1)))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!lending.is_finished());

        drop(holder);
        let loan = lending.await.unwrap().unwrap();
        assert_eq!(loan.reservation_id, reservation.id);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("common"))]
    #[ignore = "needs a PostgreSQL server at DATABASE_URL"]
    async fn availability_reads_do_not_wait_on_the_book_lock(pool: sqlx::PgPool) {
        let (service, raw) = circulation(&pool);
        let mut holder = raw.begin().await.unwrap();
        holder.find_book_for_update(id(BOOK)).await.unwrap().unwrap();

        let copies = tokio::time::timeout(Duration::from_secs(1), service.available_copies(id(BOOK)))
            .await
            .expect("availability read blocked on the book lock")
            .unwrap();
        assert_eq!(copies, 2);

        let units = tokio::time::timeout(
            Duration::from_secs(1),
            service.list_stock_units(id(BOOK), None),
        )
        .await
        .expect("stock listing blocked on the book lock")
        .unwrap();
        assert_eq!(units.len(), 3);
        drop(holder);
    }
}
