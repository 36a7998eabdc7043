use shared::error::{AppResult, StateConflict};
use strum::{AsRefStr, Display, EnumString};

use super::id::{BookId, StockUnitId};

pub mod event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StockUnitStatus {
    Available,
    Borrowed,
    Missing,
}

/// 蔵書 1 冊分の物理的な在庫
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUnit {
    pub id: StockUnitId,
    pub book_id: BookId,
    pub code: String,
    pub status: StockUnitStatus,
}

impl StockUnit {
    pub fn new(book_id: BookId, code: String) -> Self {
        Self {
            id: StockUnitId::new(),
            book_id,
            code,
            status: StockUnitStatus::Available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == StockUnitStatus::Available
    }

    /// Available -> Borrowed。貸出の一部として
    pub fn lend(&mut self) -> AppResult<()> {
        if !self.is_available() {
            return Err(StateConflict::StockNotAvailable.into());
        }
        self.status = StockUnitStatus::Borrowed;
        Ok(())
    }

    /// Borrowed -> Available。返却の一部として
    pub fn restock(&mut self) {
        self.status = StockUnitStatus::Available;
    }

    /// Available <-> Missing の手動修正。Borrowed は貸出の流れでのみ
    /// 変わるので、ここでは設定も解除もできない
    pub fn repair(&mut self, status: StockUnitStatus) -> AppResult<()> {
        if self.status == StockUnitStatus::Borrowed || status == StockUnitStatus::Borrowed {
            return Err(StateConflict::InvalidStatusRepair.into());
        }
        self.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use shared::error::AppError;

    use super::*;

    #[test]
    fn lend_requires_available() {
        let mut unit = StockUnit::new(BookId::new(), "A-001".into());
        unit.lend().unwrap();
        assert_eq!(unit.status, StockUnitStatus::Borrowed);
        assert!(matches!(
            unit.lend(),
            Err(AppError::StateConflict(StateConflict::StockNotAvailable))
        ));
        unit.restock();
        assert!(unit.is_available());
    }

    #[test]
    fn repair_never_touches_borrowed() {
        let mut unit = StockUnit::new(BookId::new(), "A-002".into());
        unit.repair(StockUnitStatus::Missing).unwrap();
        unit.repair(StockUnitStatus::Available).unwrap();
        assert!(matches!(
            unit.repair(StockUnitStatus::Borrowed),
            Err(AppError::StateConflict(StateConflict::InvalidStatusRepair))
        ));

        unit.lend().unwrap();
        assert!(matches!(
            unit.repair(StockUnitStatus::Missing),
            Err(AppError::StateConflict(StateConflict::InvalidStatusRepair))
        ));
    }
}
