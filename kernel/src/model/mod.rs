pub mod book;
pub mod id;
pub mod loan;
pub mod reservation;
pub mod stock;
pub mod user;
