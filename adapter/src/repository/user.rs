use async_trait::async_trait;
use kernel::{
    model::{id::UserId, user::UserAccount},
    repository::user::UserRepository,
};
use shared::error::{AppError, AppResult};

use super::unit_of_work::UnitOfWorkImpl;
use crate::database::model::user::UserRow;

#[async_trait]
impl UserRepository for UnitOfWorkImpl {
    async fn find_user(&mut self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        sqlx::query_as::<_, UserRow>(
            r#"
                SELECT user_id, name, role, is_active
                FROM users
                WHERE user_id = $1
                FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .map(UserAccount::try_from)
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use kernel::{model::user::Role, repository::unit_of_work::UnitOfWorkFactory};

    use super::*;
    use crate::{database::ConnectionPool, repository::unit_of_work::UnitOfWorkFactoryImpl};

    #[sqlx::test(migrations = "./migrations", fixtures("common"))]
    #[ignore = "needs a PostgreSQL server at DATABASE_URL"]
    async fn maps_role_and_active_flag(pool: sqlx::PgPool) {
        let factory = UnitOfWorkFactoryImpl::new(ConnectionPool::new(pool));
        let mut uow = factory.begin().await.unwrap();

        let admin_id = UserId::from_str("5b4c96ac-316a-4bee-8e69-cac5eb84ff4c").unwrap();
        let admin = uow.find_user(admin_id).await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.is_active);

        let inactive_id = UserId::from_str("050afe56-c3da-4448-8e4d-6f44007d2ca5").unwrap();
        let inactive = uow.find_user(inactive_id).await.unwrap().unwrap();
        assert!(!inactive.is_active);

        assert!(uow.find_user(UserId::new()).await.unwrap().is_none());
    }
}
