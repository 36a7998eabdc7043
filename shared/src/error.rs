use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// ユーザーが新しい予約をできるかの確認で発生する
/// 業務ルール上の拒否理由
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    #[error("user is not active")]
    InactiveUser,
    #[error("user has overdue loans")]
    OverdueLoans,
    #[error("user already has {limit} or more active reservations/loans")]
    TooManyActiveItems { limit: usize },
    #[error("book out of stock")]
    OutOfStock,
}

/// その状態からは許可されていない状態遷移
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateConflict {
    #[error("reservation is not pending")]
    ReservationNotPending,
    #[error("reservation has expired")]
    ReservationExpired,
    #[error("reservation is not collected")]
    ReservationNotCollected,
    #[error("book stock is not available")]
    StockNotAvailable,
    #[error("loan is not borrowed")]
    LoanNotBorrowed,
    #[error("cannot cancel unless status is pending")]
    CannotCancel,
    #[error("stock unit is currently on loan")]
    StockUnitOnLoan,
    #[error("stock unit is promised to pending reservations")]
    StockPromised,
    #[error("borrowed status is only changed by issuing or returning a loan")]
    InvalidStatusRepair,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    EntityNotFound(String),
    #[error("{0}")]
    ValidationError(#[from] garde::Report),
    #[error("{0}")]
    Ineligible(#[from] Ineligibility),
    #[error("{0}")]
    StateConflict(#[from] StateConflict),
    #[error(
        "inconsistent availability for book {book_id}: \
         {available_units} available units, {pending_reservations} pending reservations"
    )]
    InconsistentAvailability {
        book_id: String,
        available_units: i64,
        pending_reservations: i64,
    },
    // sqlx::Error を引数にするヴァリアントが複数あるので、[from] は使えず、[source] で代用している
    #[error("could not run the transaction")]
    TransactionError(#[source] sqlx::Error),
    #[error("commit did not complete; the operation may or may not have been applied")]
    CommitUnconfirmed(#[source] sqlx::Error),
    #[error("an error occurred while running a database operation")]
    SpecificOperationError(#[source] sqlx::Error),
    #[error("No rows affected: {0}")]
    NoRowAffectedError(String),
    #[error("operation did not finish within {0:?}")]
    OperationTimedOut(std::time::Duration),
    #[error("{0}")]
    ConvertToUuidError(#[from] uuid::Error),
    #[error("operation not permitted")]
    ForbiddenOperation,
    #[error("{0}")]
    ConversionEntityError(String),
}

impl AppError {
    /// 再試行してよいのは保存先の障害だけ。更新系の操作を繰り返す前に、
    /// 呼び出し側はコミットされていないことを確認する必要がある
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::TransactionError(_)
                | AppError::SpecificOperationError(_)
                | AppError::OperationTimedOut(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnprocessableEntity(_) | AppError::Ineligible(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) | AppError::ConvertToUuidError(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::StateConflict(_) => StatusCode::CONFLICT,
            AppError::ForbiddenOperation => StatusCode::FORBIDDEN,
            AppError::OperationTimedOut(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InconsistentAvailability { .. }
            | AppError::TransactionError(_)
            | AppError::CommitUnconfirmed(_)
            | AppError::SpecificOperationError(_)
            | AppError::NoRowAffectedError(_)
            | AppError::ConversionEntityError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!(
                error.cause_chain = ?self,
                error.message = %self,
                "Unexpected error happened"
            );
        }
        status_code.into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
