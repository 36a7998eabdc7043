pub mod availability;
pub mod circulation;
pub mod ledger;
