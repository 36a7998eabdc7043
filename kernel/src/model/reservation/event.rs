use crate::model::id::{BookId, UserId};

use super::BorrowedDays;

#[derive(Debug, Clone, garde::Validate)]
pub struct CreateReservation {
    #[garde(skip)]
    pub user_id: UserId,
    #[garde(skip)]
    pub book_id: BookId,
    #[garde(custom(allowed_borrowed_days))]
    pub borrowed_days: i32,
}

impl CreateReservation {
    pub fn new(user_id: UserId, book_id: BookId, borrowed_days: i32) -> Self {
        Self {
            user_id,
            book_id,
            borrowed_days,
        }
    }
}

fn allowed_borrowed_days(value: &i32, _ctx: &()) -> garde::Result {
    if BorrowedDays::ALLOWED.contains(value) {
        Ok(())
    } else {
        Err(garde::Error::new("borrowed days must be 30, 60, or 90"))
    }
}

#[cfg(test)]
mod tests {
    use garde::Validate;

    use super::*;

    #[test]
    fn rejects_days_outside_the_fixed_set() {
        for days in [30, 60, 90] {
            assert!(CreateReservation::new(UserId::new(), BookId::new(), days)
                .validate()
                .is_ok());
        }
        for days in [0, 29, 45, 120, -30] {
            assert!(CreateReservation::new(UserId::new(), BookId::new(), days)
                .validate()
                .is_err());
        }
    }
}
