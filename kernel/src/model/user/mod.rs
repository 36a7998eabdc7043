use chrono::{DateTime, Utc};
use derive_new::new;
use shared::error::{AppError, AppResult, Ineligibility};
use strum::{AsRefStr, Display, EnumString};

use super::{id::UserId, loan::Loan, reservation::Reservation};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// ユーザー管理側が所有するアカウント情報。ここでは読み取り専用
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
}

/// 認証済みの操作の呼び出し元
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct ActingUser {
    pub id: UserId,
    pub role: Role,
}

impl ActingUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn ensure_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::ForbiddenOperation)
        }
    }

    /// 管理者は誰の代わりにでも操作できる。それ以外は本人の分のみ
    pub fn ensure_can_act_for(&self, user_id: UserId) -> AppResult<()> {
        if self.is_admin() || self.id == user_id {
            Ok(())
        } else {
            Err(AppError::ForbiddenOperation)
        }
    }

    /// この呼び出し元が操作したレコードに記録する管理者 ID
    pub fn admin_id(&self) -> Option<UserId> {
        self.is_admin().then_some(self.id)
    }
}

/// ある時点でのユーザーの未完了の貸出・予約の状況
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BorrowerStanding {
    pub pending_reservations: usize,
    pub borrowed_loans: usize,
    pub overdue_loans: usize,
}

impl BorrowerStanding {
    pub fn assess(reservations: &[Reservation], loans: &[Loan], now: DateTime<Utc>) -> Self {
        let pending_reservations = reservations.iter().filter(|r| r.is_pending(now)).count();
        let borrowed_loans = loans.iter().filter(|l| l.is_borrowed()).count();
        let overdue_loans = loans.iter().filter(|l| l.is_overdue(now)).count();
        Self {
            pending_reservations,
            borrowed_loans,
            overdue_loans,
        }
    }

    pub fn active_items(&self) -> usize {
        self.pending_reservations + self.borrowed_loans
    }

    /// ユーザーのみに依存するルール。延滞中の貸出、
    /// 貸出・予約数の上限の順に確認する
    pub fn ensure_can_reserve(&self, max_active_items: usize) -> AppResult<()> {
        if self.overdue_loans > 0 {
            return Err(Ineligibility::OverdueLoans.into());
        }
        if self.active_items() >= max_active_items {
            return Err(Ineligibility::TooManyActiveItems {
                limit: max_active_items,
            }
            .into());
        }
        Ok(())
    }
}

impl UserAccount {
    pub fn ensure_active(&self) -> AppResult<()> {
        if self.is_active {
            Ok(())
        } else {
            Err(Ineligibility::InactiveUser.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::{
        id::{BookId, LoanId, ReservationId, StockUnitId},
        loan::LoanStatus,
        reservation::{BorrowedDays, ReservationStatus},
    };

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn reservation(status: ReservationStatus, expires_in: Duration) -> Reservation {
        Reservation {
            id: ReservationId::new(),
            reserved_at: now() - Duration::hours(1),
            expires_at: now() + expires_in,
            borrowed_days: BorrowedDays::Thirty,
            status,
            user_id: UserId::new(),
            admin_id: None,
            book_id: BookId::new(),
        }
    }

    fn loan(status: LoanStatus, return_in: Duration) -> Loan {
        Loan {
            id: LoanId::new(),
            loaned_at: now() - Duration::days(1),
            return_by: now() + return_in,
            returned_at: None,
            status,
            admin_id: None,
            stock_unit_id: StockUnitId::new(),
            reservation_id: ReservationId::new(),
        }
    }

    #[test]
    fn counts_only_open_items() {
        let reservations = vec![
            reservation(ReservationStatus::Pending, Duration::hours(5)),
            reservation(ReservationStatus::Pending, Duration::hours(-5)),
            reservation(ReservationStatus::Cancelled, Duration::hours(5)),
            reservation(ReservationStatus::Collected, Duration::hours(5)),
        ];
        let loans = vec![
            loan(LoanStatus::Borrowed, Duration::days(3)),
            loan(LoanStatus::Returned, Duration::days(-3)),
        ];

        let standing = BorrowerStanding::assess(&reservations, &loans, now());
        assert_eq!(standing.pending_reservations, 1);
        assert_eq!(standing.borrowed_loans, 1);
        assert_eq!(standing.overdue_loans, 0);
        assert!(standing.ensure_can_reserve(5).is_ok());
    }

    #[test]
    fn overdue_loan_blocks_before_limit() {
        let loans = vec![loan(LoanStatus::Borrowed, Duration::days(-1))];
        let standing = BorrowerStanding::assess(&[], &loans, now());
        assert!(matches!(
            standing.ensure_can_reserve(1),
            Err(AppError::Ineligible(Ineligibility::OverdueLoans))
        ));
    }

    #[test]
    fn reaching_the_limit_is_rejected() {
        let standing = BorrowerStanding {
            pending_reservations: 3,
            borrowed_loans: 2,
            overdue_loans: 0,
        };
        assert!(matches!(
            standing.ensure_can_reserve(5),
            Err(AppError::Ineligible(Ineligibility::TooManyActiveItems { limit: 5 }))
        ));
        assert!(standing.ensure_can_reserve(6).is_ok());
    }

    #[test]
    fn members_act_only_for_themselves() {
        let member = ActingUser::new(UserId::new(), Role::User);
        let admin = ActingUser::new(UserId::new(), Role::Admin);

        assert!(member.ensure_can_act_for(member.id).is_ok());
        assert!(matches!(
            member.ensure_can_act_for(UserId::new()),
            Err(AppError::ForbiddenOperation)
        ));
        assert!(admin.ensure_can_act_for(member.id).is_ok());
        assert_eq!(member.admin_id(), None);
        assert_eq!(admin.admin_id(), Some(admin.id));
    }
}
