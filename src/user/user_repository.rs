use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use super::user_models::{NewUser, User, UserProjection};

/// Account records owned by the auth/profile side. The messaging core only
/// reads projections through this seam.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `AppError::Conflict` when the username or email is taken.
    async fn create(&self, new_user: NewUser) -> Result<User>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Unknown ids are skipped.
    async fn find_projections(&self, ids: &[Uuid]) -> Result<Vec<UserProjection>>;
}
