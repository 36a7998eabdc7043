use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kernel::{
    model::{
        book::Book,
        id::{BookId, LoanId, ReservationId, StockUnitId, UserId},
        loan::{Loan, LoanListOptions},
        reservation::{Reservation, ReservationListOptions, ReservationStatus},
        stock::{StockUnit, StockUnitStatus},
        user::UserAccount,
    },
    repository::{
        loan::LoanRepository, reservation::ReservationRepository, stock::StockRepository,
        user::UserRepository,
    },
};
use shared::error::{AppError, AppResult};

use super::{InMemoryUnitOfWork, MemoryState};

impl MemoryState {
    fn user_name_matches(&self, user_id: UserId, needle: Option<&str>) -> bool {
        let Some(needle) = needle else {
            return true;
        };
        self.users
            .get(&user_id)
            .is_some_and(|u| u.name.to_lowercase().contains(&needle.to_lowercase()))
    }

    fn loan_owner(&self, loan: &Loan) -> Option<UserId> {
        self.reservations
            .get(&loan.reservation_id)
            .map(|r| r.user_id)
    }
}

fn newest_reservations_first(mut reservations: Vec<Reservation>) -> Vec<Reservation> {
    reservations.sort_by(|a, b| b.reserved_at.cmp(&a.reserved_at));
    reservations
}

fn newest_loans_first(mut loans: Vec<Loan>) -> Vec<Loan> {
    loans.sort_by(|a, b| b.loaned_at.cmp(&a.loaned_at));
    loans
}

#[async_trait]
impl StockRepository for InMemoryUnitOfWork {
    async fn find_book(&mut self, book_id: BookId) -> AppResult<Option<Book>> {
        Ok(self.working.books.get(&book_id).cloned())
    }

    async fn find_book_for_update(&mut self, book_id: BookId) -> AppResult<Option<Book>> {
        Ok(self.working.books.get(&book_id).cloned())
    }

    async fn create_stock_unit(&mut self, unit: &StockUnit) -> AppResult<()> {
        if !self.working.books.contains_key(&unit.book_id) {
            return Err(AppError::EntityNotFound(format!(
                "book {} not found",
                unit.book_id
            )));
        }
        self.working.stock_units.insert(unit.id, unit.clone());
        Ok(())
    }

    async fn find_book_id_of_stock_unit(
        &mut self,
        stock_unit_id: StockUnitId,
    ) -> AppResult<Option<BookId>> {
        Ok(self.working.stock_units.get(&stock_unit_id).map(|u| u.book_id))
    }

    async fn find_stock_unit(&mut self, stock_unit_id: StockUnitId) -> AppResult<Option<StockUnit>> {
        Ok(self.working.stock_units.get(&stock_unit_id).cloned())
    }

    async fn find_stock_units_by_book(
        &mut self,
        book_id: BookId,
        code: Option<String>,
    ) -> AppResult<Vec<StockUnit>> {
        let mut units: Vec<StockUnit> = self
            .working
            .stock_units
            .values()
            .filter(|u| u.book_id == book_id)
            .filter(|u| code.as_deref().map_or(true, |code| u.code == code))
            .cloned()
            .collect();
        units.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(units)
    }

    async fn update_stock_unit_status(
        &mut self,
        stock_unit_id: StockUnitId,
        status: StockUnitStatus,
    ) -> AppResult<()> {
        let unit = self
            .working
            .stock_units
            .get_mut(&stock_unit_id)
            .ok_or_else(|| AppError::NoRowAffectedError(format!("stock unit {stock_unit_id}")))?;
        unit.status = status;
        Ok(())
    }

    async fn delete_stock_unit(&mut self, stock_unit_id: StockUnitId) -> AppResult<()> {
        if self
            .working
            .loans
            .values()
            .any(|l| l.stock_unit_id == stock_unit_id)
        {
            return Err(AppError::UnprocessableEntity(format!(
                "stock unit {stock_unit_id} has loan history; mark it missing instead"
            )));
        }
        self.working
            .stock_units
            .remove(&stock_unit_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NoRowAffectedError(format!("stock unit {stock_unit_id}")))
    }

    async fn count_stock_units_by_status(
        &mut self,
        book_id: BookId,
        status: StockUnitStatus,
    ) -> AppResult<i64> {
        let count = self
            .working
            .stock_units
            .values()
            .filter(|u| u.book_id == book_id && u.status == status)
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl ReservationRepository for InMemoryUnitOfWork {
    async fn create_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn find_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> AppResult<Option<Reservation>> {
        Ok(self.working.reservations.get(&reservation_id).cloned())
    }

    async fn update_reservation_status(&mut self, reservation: &Reservation) -> AppResult<()> {
        let stored = self
            .working
            .reservations
            .get_mut(&reservation.id)
            .ok_or_else(|| AppError::NoRowAffectedError(format!("reservation {}", reservation.id)))?;
        stored.status = reservation.status;
        stored.admin_id = reservation.admin_id;
        Ok(())
    }

    async fn find_reservations_by_book(
        &mut self,
        book_id: BookId,
        status: Option<ReservationStatus>,
    ) -> AppResult<Vec<Reservation>> {
        let reservations = self
            .working
            .reservations
            .values()
            .filter(|r| r.book_id == book_id)
            .filter(|r| status.map_or(true, |status| r.status == status))
            .cloned()
            .collect();
        Ok(newest_reservations_first(reservations))
    }

    async fn find_reservations_by_user(&mut self, user_id: UserId) -> AppResult<Vec<Reservation>> {
        let reservations = self
            .working
            .reservations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_reservations_first(reservations))
    }

    async fn count_pending_reservations(
        &mut self,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        let count = self
            .working
            .reservations
            .values()
            .filter(|r| r.book_id == book_id && r.is_pending(now))
            .count();
        Ok(count as i64)
    }

    async fn find_reservations(
        &mut self,
        options: &ReservationListOptions,
    ) -> AppResult<Vec<Reservation>> {
        let state = &self.working;
        let reservations = state
            .reservations
            .values()
            .filter(|r| state.user_name_matches(r.user_id, options.user_name.as_deref()))
            .filter(|r| {
                options
                    .reserved_on
                    .map_or(true, |day| r.reserved_at.date_naive() == day)
            })
            .cloned()
            .collect();
        Ok(newest_reservations_first(reservations))
    }

    async fn expire_pending_reservations(&mut self, now: DateTime<Utc>) -> AppResult<u64> {
        let expired = self
            .working
            .reservations
            .values_mut()
            .map(|r| r.expire(now))
            .filter(|changed| *changed)
            .count();
        Ok(expired as u64)
    }
}

#[async_trait]
impl LoanRepository for InMemoryUnitOfWork {
    async fn create_loan(&mut self, loan: &Loan) -> AppResult<()> {
        if self
            .working
            .loans
            .values()
            .any(|l| l.reservation_id == loan.reservation_id)
        {
            return Err(AppError::UnprocessableEntity(format!(
                "reservation {} already has a loan",
                loan.reservation_id
            )));
        }
        self.working.loans.insert(loan.id, loan.clone());
        Ok(())
    }

    async fn find_loan(&mut self, loan_id: LoanId) -> AppResult<Option<Loan>> {
        Ok(self.working.loans.get(&loan_id).cloned())
    }

    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()> {
        let stored = self
            .working
            .loans
            .get_mut(&loan.id)
            .ok_or_else(|| AppError::NoRowAffectedError(format!("loan {}", loan.id)))?;
        stored.status = loan.status;
        stored.returned_at = loan.returned_at;
        stored.admin_id = loan.admin_id;
        Ok(())
    }

    async fn find_loans_by_user(&mut self, user_id: UserId) -> AppResult<Vec<Loan>> {
        let state = &self.working;
        let loans = state
            .loans
            .values()
            .filter(|l| state.loan_owner(l) == Some(user_id))
            .cloned()
            .collect();
        Ok(newest_loans_first(loans))
    }

    async fn find_loans(&mut self, options: &LoanListOptions) -> AppResult<Vec<Loan>> {
        let state = &self.working;
        let loans = state
            .loans
            .values()
            .filter(|l| {
                state.loan_owner(l).is_some_and(|owner| {
                    state.user_name_matches(owner, options.user_name.as_deref())
                })
            })
            .filter(|l| options.status.map_or(true, |status| l.status == status))
            .filter(|l| {
                options
                    .loaned_on
                    .map_or(true, |day| l.loaned_at.date_naive() == day)
            })
            .cloned()
            .collect();
        Ok(newest_loans_first(loans))
    }
}

#[async_trait]
impl UserRepository for InMemoryUnitOfWork {
    async fn find_user(&mut self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        Ok(self.working.users.get(&user_id).cloned())
    }
}
