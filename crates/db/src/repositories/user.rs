//! User repository.

use std::sync::Arc;

use crate::entities::{
    user::{self, UserRole},
    User,
};
use hostelhub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a user by ID, failing if absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
    }

    /// Find a user by email.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find users by a set of IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        User::find()
            .filter(user::Column::Id.is_in(ids.iter().map(String::as_str)))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Persist changes to an existing user.
    pub async fn save(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Management accounts awaiting approval.
    pub async fn find_pending_management(&self) -> AppResult<Vec<user::Model>> {
        User::find()
            .filter(user::Column::Role.eq(UserRole::Management))
            .filter(user::Column::IsApproved.eq(false))
            .order_by_desc(user::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All management accounts.
    pub async fn find_staff(&self) -> AppResult<Vec<user::Model>> {
        User::find()
            .filter(user::Column::Role.eq(UserRole::Management))
            .order_by_desc(user::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
