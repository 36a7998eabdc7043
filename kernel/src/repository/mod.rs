pub mod loan;
pub mod reservation;
pub mod stock;
pub mod unit_of_work;
pub mod user;
