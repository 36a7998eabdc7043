use std::{future::Future, sync::Arc};

use derive_new::new;
use garde::Validate;
use shared::{
    clock::Clock,
    config::CirculationConfig,
    error::{AppError, AppResult, Ineligibility, StateConflict},
};

use crate::{
    model::{
        id::{BookId, LoanId, ReservationId, StockUnitId, UserId},
        loan::{
            event::{CreateLoan, FinishLoan},
            Loan, LoanListOptions,
        },
        reservation::{
            event::CreateReservation, BorrowedDays, Reservation, ReservationListOptions,
            ReservationStatus,
        },
        stock::{
            event::{CreateStockUnit, DeleteStockUnit, RepairStockUnitStatus},
            StockUnit, StockUnitStatus,
        },
        user::{ActingUser, BorrowerStanding},
    },
    repository::unit_of_work::{UnitOfWork, UnitOfWorkFactory},
};

use super::{availability, ledger};

/// すべての貸出操作の入り口。各呼び出しは 1 つの Unit of Work で実行され、
/// 状態遷移はすべてコミットされるか、まったくされないかのどちらか
///
/// 行ロックは常に 貸出、予約、ユーザー、蔵書、在庫 の順で取る
#[derive(new)]
pub struct CirculationService {
    store: Arc<dyn UnitOfWorkFactory>,
    clock: Arc<dyn Clock>,
    config: CirculationConfig,
}

type Staged<T> = (Box<dyn UnitOfWork>, T);

impl CirculationService {
    pub fn config(&self) -> &CirculationConfig {
        &self.config
    }

    /// `work` をタイムアウト付きで実行し、積んだ変更をコミットする。
    /// コミット自体は時間制限の対象外なので、`OperationTimedOut` は
    /// Unit of Work がコミットされずに破棄されたことを意味する
    async fn bounded<T>(&self, work: impl Future<Output = AppResult<Staged<T>>>) -> AppResult<T> {
        let limit = self.config.operation_timeout;
        let result = match tokio::time::timeout(limit, work).await {
            Err(_) => Err(AppError::OperationTimedOut(limit)),
            Ok(Err(e)) => Err(e),
            Ok(Ok((uow, value))) => uow.commit().await.map(|()| value),
        };
        if let Err(e) = &result {
            if e.status_code().is_client_error() {
                tracing::warn!(error.message = %e, "circulation request rejected");
            }
        }
        result
    }

    #[tracing::instrument(
        skip_all,
        fields(user_id = %event.user_id, book_id = %event.book_id, borrowed_days = event.borrowed_days)
    )]
    pub async fn create_reservation(
        &self,
        actor: &ActingUser,
        event: CreateReservation,
    ) -> AppResult<Reservation> {
        actor.ensure_can_act_for(event.user_id)?;
        let reservation = self
            .bounded(async move {
                let now = self.clock.now();
                let mut uow = self.store.begin().await?;

                let user = uow
                    .find_user(event.user_id)
                    .await?
                    .ok_or_else(|| not_found("user", event.user_id))?;
                user.ensure_active()?;

                event.validate()?;
                let borrowed_days = BorrowedDays::try_from(event.borrowed_days)?;

                let loans = uow.find_loans_by_user(user.id).await?;
                let reservations = uow.find_reservations_by_user(user.id).await?;
                BorrowerStanding::assess(&reservations, &loans, now)
                    .ensure_can_reserve(self.config.max_active_items)?;

                lock_book(&mut *uow, event.book_id).await?;
                if availability::available_copies(&mut *uow, event.book_id, now).await? <= 0 {
                    return Err(Ineligibility::OutOfStock.into());
                }

                let reservation = Reservation::new(
                    user.id,
                    event.book_id,
                    borrowed_days,
                    now,
                    self.config.pickup_window,
                );
                uow.create_reservation(&reservation).await?;
                Ok((uow, reservation))
            })
            .await?;

        tracing::info!(
            reservation_id = %reservation.id,
            expires_at = %reservation.expires_at,
            "reservation created"
        );
        Ok(reservation)
    }

    #[tracing::instrument(
        skip_all,
        fields(
            reservation_id = %event.reservation_id,
            stock_unit_id = %event.stock_unit_id,
            admin_id = %actor.id
        )
    )]
    pub async fn create_loan(&self, actor: &ActingUser, event: CreateLoan) -> AppResult<Loan> {
        actor.ensure_admin()?;
        let loan = self
            .bounded(async move {
                let now = self.clock.now();
                let mut uow = self.store.begin().await?;

                let mut reservation = uow
                    .find_reservation(event.reservation_id)
                    .await?
                    .ok_or_else(|| not_found("reservation", event.reservation_id))?;
                reservation.collect(actor.id, now)?;

                // 利用者の貸出・予約数と蔵書の貸出可能数の両方が変わるので、
                // CreateReservation と同じロックを取る
                uow.find_user(reservation.user_id)
                    .await?
                    .ok_or_else(|| not_found("user", reservation.user_id))?;
                lock_book(&mut *uow, reservation.book_id).await?;

                let mut unit = ledger::get_stock_unit(&mut *uow, event.stock_unit_id, None).await?;
                if unit.book_id != reservation.book_id {
                    return Err(StateConflict::StockNotAvailable.into());
                }
                unit.lend()?;

                let loan = Loan::issue(&reservation, unit.id, actor.id, now);
                uow.update_reservation_status(&reservation).await?;
                ledger::set_stock_unit_status(&mut *uow, unit.id, unit.status).await?;
                uow.create_loan(&loan).await?;
                Ok((uow, loan))
            })
            .await?;

        tracing::info!(loan_id = %loan.id, return_by = %loan.return_by, "loan issued");
        Ok(loan)
    }

    #[tracing::instrument(skip_all, fields(loan_id = %event.loan_id, admin_id = %actor.id))]
    pub async fn finish_loan(&self, actor: &ActingUser, event: FinishLoan) -> AppResult<()> {
        actor.ensure_admin()?;
        let stock_unit_id = self
            .bounded(async move {
                let now = self.clock.now();
                let mut uow = self.store.begin().await?;

                let mut loan = uow
                    .find_loan(event.loan_id)
                    .await?
                    .ok_or_else(|| not_found("loan", event.loan_id))?;
                loan.finish(actor.id, now)?;

                let mut reservation = uow
                    .find_reservation(loan.reservation_id)
                    .await?
                    .ok_or_else(|| not_found("reservation", loan.reservation_id))?;
                reservation.finish()?;

                let mut unit = ledger::get_stock_unit(&mut *uow, loan.stock_unit_id, None).await?;
                unit.restock();

                uow.update_loan(&loan).await?;
                ledger::set_stock_unit_status(&mut *uow, unit.id, unit.status).await?;
                uow.update_reservation_status(&reservation).await?;
                Ok((uow, unit.id))
            })
            .await?;

        tracing::info!(%stock_unit_id, "loan returned");
        Ok(())
    }

    /// 利用者は自分の予約だけを参照・取り消しできる。管理者は
    /// 誰の予約でも取り消せ、その管理者が予約に記録される
    #[tracing::instrument(skip_all, fields(%reservation_id, actor_id = %actor.id))]
    pub async fn cancel_reservation(
        &self,
        actor: &ActingUser,
        reservation_id: ReservationId,
    ) -> AppResult<()> {
        self.bounded(async move {
            let now = self.clock.now();
            let mut uow = self.store.begin().await?;

            let mut reservation = uow
                .find_reservation(reservation_id)
                .await?
                .filter(|r| actor.is_admin() || r.user_id == actor.id)
                .ok_or_else(|| not_found("reservation", reservation_id))?;
            reservation.cancel(actor.admin_id(), now)?;

            uow.update_reservation_status(&reservation).await?;
            Ok((uow, ()))
        })
        .await?;

        tracing::info!("reservation cancelled");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn available_copies(&self, book_id: BookId) -> AppResult<i64> {
        self.bounded(async move {
            let mut uow = self.store.begin().await?;
            ensure_book(&mut *uow, book_id).await?;
            let copies = availability::available_copies(&mut *uow, book_id, self.clock.now()).await?;
            Ok((uow, copies))
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(book_id = %event.book_id, code = %event.code))]
    pub async fn add_stock_unit(
        &self,
        actor: &ActingUser,
        event: CreateStockUnit,
    ) -> AppResult<StockUnit> {
        actor.ensure_admin()?;
        event.validate()?;
        let unit = self
            .bounded(async move {
                let mut uow = self.store.begin().await?;
                lock_book(&mut *uow, event.book_id).await?;
                let unit = ledger::add_stock_unit(&mut *uow, event.book_id, event.code).await?;
                Ok((uow, unit))
            })
            .await?;

        tracing::info!(stock_unit_id = %unit.id, "stock unit added");
        Ok(unit)
    }

    pub async fn get_stock_unit(
        &self,
        stock_unit_id: StockUnitId,
        book_id: Option<BookId>,
    ) -> AppResult<StockUnit> {
        self.bounded(async move {
            let mut uow = self.store.begin().await?;
            let unit = ledger::get_stock_unit(&mut *uow, stock_unit_id, book_id).await?;
            Ok((uow, unit))
        })
        .await
    }

    pub async fn list_stock_units(
        &self,
        book_id: BookId,
        code: Option<String>,
    ) -> AppResult<Vec<StockUnit>> {
        self.bounded(async move {
            let mut uow = self.store.begin().await?;
            ensure_book(&mut *uow, book_id).await?;
            let units = uow.find_stock_units_by_book(book_id, code).await?;
            Ok((uow, units))
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(stock_unit_id = %event.stock_unit_id))]
    pub async fn remove_stock_unit(&self, actor: &ActingUser, event: DeleteStockUnit) -> AppResult<()> {
        actor.ensure_admin()?;
        let book_id = self
            .bounded(async move {
                let now = self.clock.now();
                let mut uow = self.store.begin().await?;

                let book_id = lock_book_of_stock_unit(&mut *uow, event.stock_unit_id, event.book_id).await?;
                let unit = ledger::get_stock_unit(&mut *uow, event.stock_unit_id, Some(book_id)).await?;
                match unit.status {
                    StockUnitStatus::Borrowed => return Err(StateConflict::StockUnitOnLoan.into()),
                    StockUnitStatus::Available => ensure_spare_copy(&mut *uow, book_id, now).await?,
                    StockUnitStatus::Missing => {}
                }

                ledger::remove_stock_unit(&mut *uow, &unit).await?;
                Ok((uow, book_id))
            })
            .await?;

        tracing::info!(%book_id, "stock unit removed");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(stock_unit_id = %event.stock_unit_id, status = %event.status))]
    pub async fn repair_stock_unit_status(
        &self,
        actor: &ActingUser,
        event: RepairStockUnitStatus,
    ) -> AppResult<StockUnit> {
        actor.ensure_admin()?;
        let unit = self
            .bounded(async move {
                let now = self.clock.now();
                let mut uow = self.store.begin().await?;

                let book_id = lock_book_of_stock_unit(&mut *uow, event.stock_unit_id, None).await?;
                let mut unit = ledger::get_stock_unit(&mut *uow, event.stock_unit_id, Some(book_id)).await?;
                if unit.is_available() && event.status == StockUnitStatus::Missing {
                    ensure_spare_copy(&mut *uow, book_id, now).await?;
                }
                unit.repair(event.status)?;

                ledger::set_stock_unit_status(&mut *uow, unit.id, unit.status).await?;
                Ok((uow, unit))
            })
            .await?;

        tracing::info!("stock unit status repaired");
        Ok(unit)
    }

    pub async fn get_reservation(&self, reservation_id: ReservationId) -> AppResult<Reservation> {
        self.bounded(async move {
            let mut uow = self.store.begin().await?;
            let reservation = uow
                .find_reservation(reservation_id)
                .await?
                .ok_or_else(|| not_found("reservation", reservation_id))?;
            Ok((uow, reservation.observed_at(self.clock.now())))
        })
        .await
    }

    pub async fn list_reservations(
        &self,
        options: ReservationListOptions,
    ) -> AppResult<Vec<Reservation>> {
        options.validate()?;
        self.bounded(async move {
            let mut uow = self.store.begin().await?;
            let reservations = uow.find_reservations(&options).await?;
            Ok((uow, observe(reservations, options.status, self.clock.now())))
        })
        .await
    }

    pub async fn list_book_reservations(
        &self,
        book_id: BookId,
        status: Option<ReservationStatus>,
    ) -> AppResult<Vec<Reservation>> {
        self.bounded(async move {
            let mut uow = self.store.begin().await?;
            ensure_book(&mut *uow, book_id).await?;
            let reservations = uow
                .find_reservations_by_book(book_id, stored_status_hint(status))
                .await?;
            Ok((uow, observe(reservations, status, self.clock.now())))
        })
        .await
    }

    pub async fn list_user_reservations(
        &self,
        actor: &ActingUser,
        user_id: UserId,
    ) -> AppResult<Vec<Reservation>> {
        actor.ensure_can_act_for(user_id)?;
        self.bounded(async move {
            let mut uow = self.store.begin().await?;
            let reservations = uow.find_reservations_by_user(user_id).await?;
            Ok((uow, observe(reservations, None, self.clock.now())))
        })
        .await
    }

    pub async fn get_loan(&self, loan_id: LoanId) -> AppResult<Loan> {
        self.bounded(async move {
            let mut uow = self.store.begin().await?;
            let loan = uow
                .find_loan(loan_id)
                .await?
                .ok_or_else(|| not_found("loan", loan_id))?;
            Ok((uow, loan))
        })
        .await
    }

    pub async fn list_loans(&self, options: LoanListOptions) -> AppResult<Vec<Loan>> {
        options.validate()?;
        self.bounded(async move {
            let mut uow = self.store.begin().await?;
            let loans = uow.find_loans(&options).await?;
            Ok((uow, loans))
        })
        .await
    }

    pub async fn list_user_loans(&self, actor: &ActingUser, user_id: UserId) -> AppResult<Vec<Loan>> {
        actor.ensure_can_act_for(user_id)?;
        self.bounded(async move {
            let mut uow = self.store.begin().await?;
            let loans = uow.find_loans_by_user(user_id).await?;
            Ok((uow, loans))
        })
        .await
    }

    /// 受け取り期限を過ぎた保留中の予約に Expired を保存する。
    /// 読み取り時にはすでに導出しているので、保存上の行を整えるだけ
    #[tracing::instrument(skip(self))]
    pub async fn sweep_expired_reservations(&self) -> AppResult<u64> {
        let expired = self
            .bounded(async move {
                let mut uow = self.store.begin().await?;
                let expired = uow.expire_pending_reservations(self.clock.now()).await?;
                Ok((uow, expired))
            })
            .await?;

        if expired > 0 {
            tracing::info!(expired, "expired reservations swept");
        }
        Ok(expired)
    }
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> AppError {
    AppError::EntityNotFound(format!("{kind} {id} not found"))
}

async fn ensure_book(uow: &mut dyn UnitOfWork, book_id: BookId) -> AppResult<()> {
    uow.find_book(book_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| not_found("book", book_id))
}

async fn lock_book(uow: &mut dyn UnitOfWork, book_id: BookId) -> AppResult<()> {
    uow.find_book_for_update(book_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| not_found("book", book_id))
}

/// 在庫より先にその在庫が属する蔵書をロックする。
/// `scope` を指定した場合はその蔵書に属することも確認する
async fn lock_book_of_stock_unit(
    uow: &mut dyn UnitOfWork,
    stock_unit_id: StockUnitId,
    scope: Option<BookId>,
) -> AppResult<BookId> {
    let book_id = uow
        .find_book_id_of_stock_unit(stock_unit_id)
        .await?
        .filter(|book_id| scope.map_or(true, |scope| *book_id == scope))
        .ok_or_else(|| not_found("stock unit", stock_unit_id))?;
    lock_book(uow, book_id).await?;
    Ok(book_id)
}

/// 貸出可能な在庫を外すとき、保留中の予約が受け取る在庫を
/// 失わないようにする
async fn ensure_spare_copy(
    uow: &mut dyn UnitOfWork,
    book_id: BookId,
    now: chrono::DateTime<chrono::Utc>,
) -> AppResult<()> {
    if availability::available_copies(uow, book_id, now).await? < 1 {
        return Err(StateConflict::StockPromised.into());
    }
    Ok(())
}

/// Pending と Expired は期限切れ処理までどちらも Pending として保存されるので、
/// それ以外のステータスだけを保存先での絞り込みに使える
fn stored_status_hint(status: Option<ReservationStatus>) -> Option<ReservationStatus> {
    status.filter(|s| !matches!(s, ReservationStatus::Pending | ReservationStatus::Expired))
}

fn observe(
    reservations: Vec<Reservation>,
    status: Option<ReservationStatus>,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<Reservation> {
    reservations
        .into_iter()
        .map(|r| r.observed_at(now))
        .filter(|r| status.map_or(true, |status| r.status == status))
        .collect()
}
