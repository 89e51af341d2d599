use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use tracing::debug;

use super::{
    error::SessionError,
    state::UserProfile,
    store::SessionStore,
    validate::username_from_email,
};
use crate::http::{
    ApiService,
    models::{
        ForgotPasswordRequest, LogoutRequest, ProfileDto, UserAuthResponse,
        UserLoginRequest, UserRegistrationRequest,
    },
};

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u64::try_from(d.as_millis()).ok())
        .unwrap_or_default()
}

/// Outcome of a successful credential check.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthGrant {
    pub token: Option<String>,
    pub username: String,
    pub profile: UserProfile,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Whether a stored session is only valid while it carries a token.
    fn requires_token(&self) -> bool;

    async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, SessionError>;

    async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, SessionError>;

    async fn logout(
        &self,
        token: Option<&str>,
        username: &str,
    ) -> Result<(), SessionError>;

    async fn reset_password(&self, email: &str) -> Result<(), SessionError>;

    /// `None` when the backend has no server-side profile to offer.
    async fn fetch_profile(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<Option<ProfileDto>, SessionError>;
}

pub struct RemoteAuth {
    api: Arc<ApiService>,
}

impl RemoteAuth {
    pub fn new(api: Arc<ApiService>) -> Self {
        Self { api }
    }

    fn grant(response: UserAuthResponse) -> AuthGrant {
        let user = response.user;
        AuthGrant {
            token: Some(response.token),
            profile: UserProfile::new(
                user.id.to_string(),
                user.email,
                user.username.as_str(),
            ),
            username: user.username,
        }
    }
}

#[async_trait]
impl AuthBackend for RemoteAuth {
    fn requires_token(&self) -> bool {
        true
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, SessionError> {
        let request = UserRegistrationRequest {
            username: username_from_email(email),
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.api.register_user(&request).await?;
        Ok(Self::grant(response))
    }

    async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, SessionError> {
        let request = UserLoginRequest {
            username: username_from_email(email),
            password: password.to_string(),
        };
        let response = self.api.login_user(&request).await?;
        Ok(Self::grant(response))
    }

    async fn logout(
        &self,
        token: Option<&str>,
        username: &str,
    ) -> Result<(), SessionError> {
        let Some(token) = token else {
            debug!("no token stored, nothing to revoke");
            return Ok(());
        };
        let request = LogoutRequest {
            username: username.to_string(),
        };
        self.api.logout_user(&request, token).await?;
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> Result<(), SessionError> {
        let request = ForgotPasswordRequest {
            email: email.to_string(),
        };
        let response = self.api.forgot_password(&request).await?;
        debug!(username = %response.username, "password reset requested");
        Ok(())
    }

    async fn fetch_profile(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<Option<ProfileDto>, SessionError> {
        let token = token.ok_or(SessionError::NotLoggedIn)?;
        Ok(Some(self.api.fetch_profile(user_id, token).await?))
    }
}

/// Keeps every check on the device. Registration fabricates an id and
/// login only matches the email stored by a previous registration; the
/// password is never verified.
pub struct OfflineAuth {
    store: SessionStore,
}

impl OfflineAuth {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthBackend for OfflineAuth {
    fn requires_token(&self) -> bool {
        false
    }

    async fn register(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<AuthGrant, SessionError> {
        let local_part = email.split('@').next().unwrap_or_default();
        Ok(AuthGrant {
            token: None,
            username: username_from_email(email),
            profile: UserProfile::new(
                format!("user_{}", now_millis()),
                email,
                local_part,
            ),
        })
    }

    async fn login(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<AuthGrant, SessionError> {
        let record = self.store.load()?;
        if record.email.as_deref() != Some(email) {
            return Err(SessionError::EmailNotFound);
        }

        Ok(AuthGrant {
            token: None,
            username: record
                .username
                .clone()
                .unwrap_or_else(|| username_from_email(email)),
            profile: record.profile(),
        })
    }

    async fn logout(
        &self,
        _token: Option<&str>,
        _username: &str,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn reset_password(&self, _email: &str) -> Result<(), SessionError> {
        debug!("offline mode, password reset is a no-op");
        Ok(())
    }

    async fn fetch_profile(
        &self,
        _user_id: &str,
        _token: Option<&str>,
    ) -> Result<Option<ProfileDto>, SessionError> {
        Ok(None)
    }
}
