use std::str::FromStr;

use shared::error::{AppError, AppResult};

pub mod book;
pub mod loan;
pub mod reservation;
pub mod stock;
pub mod user;

/// ステータス列は TEXT。未知の値の行はモデルに変換できない
pub(crate) fn parse_status<T: FromStr>(column: &str, raw: &str) -> AppResult<T> {
    raw.parse()
        .map_err(|_| AppError::ConversionEntityError(format!("unknown {column}: {raw}")))
}
