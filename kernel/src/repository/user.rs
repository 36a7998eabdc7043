use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{id::UserId, user::UserAccount};

#[async_trait]
pub trait UserRepository: Send {
    /// アカウントの行をロックし、同じユーザーの同時予約を直列化する
    async fn find_user(&mut self, user_id: UserId) -> AppResult<Option<UserAccount>>;
}
