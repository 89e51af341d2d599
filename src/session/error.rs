use thiserror::Error;

use super::{store::StoreError, validate::MIN_PASSWORD_LEN};
use crate::http::ApiError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password must be at least {} characters", MIN_PASSWORD_LEN)]
    PasswordTooShort,

    #[error("Email not found")]
    EmailNotFound,

    #[error("User not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Failures caught on the device before any request went out.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidEmail | Self::PasswordTooShort)
    }
}
