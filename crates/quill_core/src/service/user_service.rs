//! Read-only user queries.

use crate::auth::Caller;
use crate::model::user::{User, UserId};
use crate::repo::user_repo::UserRepository;
use crate::service::error::{ServiceError, ServiceResult};

pub struct UserService<U: UserRepository> {
    repo: U,
}

impl<U: UserRepository> UserService<U> {
    pub fn new(repo: U) -> Self {
        Self { repo }
    }

    /// Every account in id order. Projections never include the password.
    pub fn list_users(&self, _caller: &Caller) -> ServiceResult<Vec<User>> {
        Ok(self.repo.list_users()?)
    }

    pub fn get_user(&self, _caller: &Caller, id: UserId) -> ServiceResult<User> {
        self.repo
            .get_user(id)?
            .ok_or(ServiceError::NotFound { entity: "User", id })
    }

    /// The caller's own account, `None` without a caller.
    pub fn me(&self, caller: Option<&Caller>) -> ServiceResult<Option<User>> {
        match caller {
            Some(caller) => Ok(self.repo.get_user(caller.user_id)?),
            None => Ok(None),
        }
    }
}
