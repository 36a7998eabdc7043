use kernel::model::{id::UserId, user::UserAccount};
use shared::error::AppError;

use super::parse_status;

#[derive(sqlx::FromRow)]
pub struct UserRow {
    pub user_id: UserId,
    pub name: String,
    pub role: String,
    pub is_active: bool,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = AppError;

    fn try_from(value: UserRow) -> Result<Self, Self::Error> {
        let UserRow {
            user_id,
            name,
            role,
            is_active,
        } = value;
        Ok(UserAccount {
            id: user_id,
            name,
            role: parse_status("role", &role)?,
            is_active,
        })
    }
}
