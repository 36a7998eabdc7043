use chrono::{DateTime, NaiveDate, Utc};
use shared::error::{AppResult, StateConflict};
use strum::{AsRefStr, Display, EnumString};

use super::{
    id::{LoanId, ReservationId, StockUnitId, UserId},
    reservation::Reservation,
};

pub mod event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoanStatus {
    Borrowed,
    Returned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loan {
    pub id: LoanId,
    pub loaned_at: DateTime<Utc>,
    /// 貸出時に予約の貸出日数から決まる
    pub return_by: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub admin_id: Option<UserId>,
    pub stock_unit_id: StockUnitId,
    pub reservation_id: ReservationId,
}

impl Loan {
    /// 受け取りが済んだ予約に対して貸出を開始する
    pub fn issue(
        reservation: &Reservation,
        stock_unit_id: StockUnitId,
        admin_id: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LoanId::new(),
            loaned_at: now,
            return_by: now + reservation.borrowed_days.duration(),
            returned_at: None,
            status: LoanStatus::Borrowed,
            admin_id: Some(admin_id),
            stock_unit_id,
            reservation_id: reservation.id,
        }
    }

    pub fn is_borrowed(&self) -> bool {
        self.status == LoanStatus::Borrowed
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_borrowed() && self.return_by < now
    }

    /// Borrowed -> Returned
    pub fn finish(&mut self, admin_id: UserId, now: DateTime<Utc>) -> AppResult<()> {
        if !self.is_borrowed() {
            return Err(StateConflict::LoanNotBorrowed.into());
        }
        self.status = LoanStatus::Returned;
        self.returned_at = Some(now);
        self.admin_id = Some(admin_id);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, garde::Validate)]
pub struct LoanListOptions {
    #[garde(length(max = 100))]
    pub user_name: Option<String>,
    #[garde(skip)]
    pub status: Option<LoanStatus>,
    #[garde(skip)]
    pub loaned_on: Option<NaiveDate>,
}
