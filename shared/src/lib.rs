pub mod clock;
pub mod config;
pub mod env;
pub mod error;
