use chrono::{DateTime, Duration, NaiveDate, Utc};
use shared::error::{AppError, AppResult, StateConflict};
use strum::{AsRefStr, Display, EnumString};

use super::id::{BookId, ReservationId, UserId};

pub mod event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Cancelled,
    Expired,
    Collected,
    Finished,
}

impl ReservationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired | Self::Finished)
    }
}

/// 予約時に選ぶ貸出期間。受け取り時から適用される
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorrowedDays {
    Thirty,
    Sixty,
    Ninety,
}

impl BorrowedDays {
    pub const ALLOWED: [i32; 3] = [30, 60, 90];

    pub fn days(self) -> i32 {
        match self {
            Self::Thirty => 30,
            Self::Sixty => 60,
            Self::Ninety => 90,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::days(i64::from(self.days()))
    }
}

impl TryFrom<i32> for BorrowedDays {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            30 => Ok(Self::Thirty),
            60 => Ok(Self::Sixty),
            90 => Ok(Self::Ninety),
            other => Err(AppError::ConversionEntityError(format!(
                "borrowed days must be 30, 60, or 90 (got {other})"
            ))),
        }
    }
}

impl From<BorrowedDays> for i32 {
    fn from(value: BorrowedDays) -> Self {
        value.days()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: ReservationId,
    pub reserved_at: DateTime<Utc>,
    /// 受け取り期限。`borrowed_days` とは無関係
    pub expires_at: DateTime<Utc>,
    pub borrowed_days: BorrowedDays,
    /// 保存されているステータス。読み取りでは [`Reservation::effective_status`] を使う
    pub status: ReservationStatus,
    pub user_id: UserId,
    pub admin_id: Option<UserId>,
    pub book_id: BookId,
}

impl Reservation {
    pub fn new(
        user_id: UserId,
        book_id: BookId,
        borrowed_days: BorrowedDays,
        now: DateTime<Utc>,
        pickup_window: Duration,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            reserved_at: now,
            expires_at: now + pickup_window,
            borrowed_days,
            status: ReservationStatus::Pending,
            user_id,
            admin_id: None,
            book_id,
        }
    }

    /// 期限を過ぎた Pending の予約は Expired として扱う
    pub fn effective_status(&self, now: DateTime<Utc>) -> ReservationStatus {
        match self.status {
            ReservationStatus::Pending if now > self.expires_at => ReservationStatus::Expired,
            status => status,
        }
    }

    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == ReservationStatus::Pending
    }

    /// 導出したステータスを `status` に書き込んだコピー。
    /// 呼び出し元に返すときに使う
    pub fn observed_at(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }

    fn ensure_pending(&self, now: DateTime<Utc>, not_pending: StateConflict) -> AppResult<()> {
        match self.effective_status(now) {
            ReservationStatus::Pending => Ok(()),
            ReservationStatus::Expired if self.status == ReservationStatus::Pending => {
                Err(StateConflict::ReservationExpired.into())
            }
            _ => Err(not_pending.into()),
        }
    }

    /// Pending -> Collected。在庫を渡したとき
    pub fn collect(&mut self, admin_id: UserId, now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_pending(now, StateConflict::ReservationNotPending)?;
        self.status = ReservationStatus::Collected;
        self.admin_id = Some(admin_id);
        Ok(())
    }

    /// Pending -> Cancelled。本人または代理の管理者による
    pub fn cancel(&mut self, admin_id: Option<UserId>, now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_pending(now, StateConflict::CannotCancel)?;
        self.status = ReservationStatus::Cancelled;
        if admin_id.is_some() {
            self.admin_id = admin_id;
        }
        Ok(())
    }

    /// Collected -> Finished。この予約から始まった貸出が返却されたとき
    pub fn finish(&mut self) -> AppResult<()> {
        if self.status != ReservationStatus::Collected {
            return Err(StateConflict::ReservationNotCollected.into());
        }
        self.status = ReservationStatus::Finished;
        Ok(())
    }

    /// 読み取り時に判定した期限切れを保存する。変更があったかどうかを返す
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == ReservationStatus::Pending && now > self.expires_at {
            self.status = ReservationStatus::Expired;
            true
        } else {
            false
        }
    }
}

/// 予約一覧の絞り込み条件。すべて省略可能
#[derive(Debug, Clone, Default, garde::Validate)]
pub struct ReservationListOptions {
    /// 予約したユーザー名の部分一致 (大文字小文字を区別しない)
    #[garde(length(max = 100))]
    pub user_name: Option<String>,
    /// 導出したステータスと比較する
    #[garde(skip)]
    pub status: Option<ReservationStatus>,
    #[garde(skip)]
    pub reserved_on: Option<NaiveDate>,
}
