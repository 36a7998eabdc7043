pub mod unit_of_work;

mod loan;
mod reservation;
mod stock;
mod user;
