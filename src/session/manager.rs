use std::sync::{Arc, Mutex, PoisonError};

use flume::Receiver;
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};
use tracing::{debug, info, instrument, warn};

use super::{
    backend::{AuthBackend, AuthGrant, OfflineAuth, RemoteAuth, now_millis},
    error::SessionError,
    state::{AuthState, ProfileUpdate, SocialProvider, StateHolder, UserProfile},
    store::{SessionStore, open_store},
    validate::{self, username_from_email},
};
use crate::{
    config::{AuthMode, Config},
    event::{EventBus, events::SessionEvent},
    http::ApiService,
};

/// Owns the session: persisted record, observable auth/profile state and
/// the backend that checks credentials.
pub struct SessionManager {
    store: SessionStore,
    backend: Arc<dyn AuthBackend>,
    auth_state: StateHolder<AuthState>,
    profile: StateHolder<Option<UserProfile>>,
    events: Arc<EventBus>,
    revocations: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionManager {
    /// Builds the manager and restores whatever session the store holds.
    pub fn new(
        store: SessionStore,
        backend: Arc<dyn AuthBackend>,
    ) -> Result<Self, SessionError> {
        let manager = Self {
            store,
            backend,
            auth_state: StateHolder::new(AuthState::NotAuthenticated),
            profile: StateHolder::new(None),
            events: Arc::new(EventBus::new()),
            revocations: Mutex::new(Vec::new()),
        };
        manager.restore()?;
        Ok(manager)
    }

    pub fn from_config(
        config: &Config,
        api: Arc<ApiService>,
    ) -> Result<Self, SessionError> {
        let store = SessionStore::new(open_store(config)?);
        let backend: Arc<dyn AuthBackend> = match config.auth_mode {
            AuthMode::Remote => Arc::new(RemoteAuth::new(api)),
            AuthMode::Offline => Arc::new(OfflineAuth::new(store.clone())),
        };
        Self::new(store, backend)
    }

    pub fn offline(store: SessionStore) -> Result<Self, SessionError> {
        let backend = Arc::new(OfflineAuth::new(store.clone()));
        Self::new(store, backend)
    }

    fn restore(&self) -> Result<(), SessionError> {
        let record = self.store.load()?;
        if !record.authenticated {
            return Ok(());
        }

        if self.backend.requires_token() && record.token.is_none() {
            warn!("session flagged authenticated without a token, clearing it");
            self.store.clear_session()?;
            return Ok(());
        }

        info!(user_id = ?record.user_id, "restored session");
        self.profile.set(Some(record.profile()));
        self.auth_state.set(AuthState::Authenticated);
        Ok(())
    }

    pub fn auth_state(&self) -> watch::Receiver<AuthState> {
        self.auth_state.subscribe()
    }

    pub fn profile(&self) -> watch::Receiver<Option<UserProfile>> {
        self.profile.subscribe()
    }

    pub fn current_auth_state(&self) -> AuthState {
        self.auth_state.get()
    }

    pub fn current_profile(&self) -> Option<UserProfile> {
        self.profile.get()
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.store.token()?)
    }

    #[instrument(skip(self, password))]
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        validate::check_email(email)?;
        validate::check_password(password)?;

        let grant = self
            .backend
            .register(email, password)
            .await
            .inspect_err(|err| warn!(error = %err, "registration failed"))?;
        self.establish(grant)
    }

    #[instrument(skip(self, password))]
    pub async fn login_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        let grant = self
            .backend
            .login(email, password)
            .await
            .inspect_err(|err| warn!(error = %err, "login failed"))?;
        self.establish(grant)
    }

    pub fn login_with_google(&self) -> Result<(), SessionError> {
        self.login_with_social(SocialProvider::Google)
    }

    pub fn login_with_facebook(&self) -> Result<(), SessionError> {
        self.login_with_social(SocialProvider::Facebook)
    }

    /// Signs in with a placeholder identity. No provider is contacted and
    /// no token is issued. A server token held by the session being
    /// replaced is revoked in the background; see [`Self::settle`].
    pub fn login_with_social(
        &self,
        provider: SocialProvider,
    ) -> Result<(), SessionError> {
        self.revoke_replaced_token()?;
        let profile = provider.placeholder_profile(now_millis());
        info!(provider = provider.key(), "social sign-in");
        self.establish(AuthGrant {
            token: None,
            username: username_from_email(&profile.email),
            profile,
        })
    }

    /// Merges `update` over the cached profile and persists the result.
    pub fn update_profile(
        &self,
        update: ProfileUpdate,
    ) -> Result<UserProfile, SessionError> {
        let current = self.profile.get().ok_or(SessionError::NotLoggedIn)?;
        let updated = current.merged(&update);
        self.store.save_profile(&updated)?;
        self.publish_profile(Some(updated.clone()));
        Ok(updated)
    }

    /// Pulls name, avatar and music preferences from the server profile.
    /// Offline sessions return the cached profile untouched.
    pub async fn refresh_profile(&self) -> Result<UserProfile, SessionError> {
        let current = self.profile.get().ok_or(SessionError::NotLoggedIn)?;
        let token = self.store.token()?;
        if token.is_none() && self.backend.requires_token() {
            debug!("no server session, keeping cached profile");
            return Ok(current);
        }

        let Some(remote) = self
            .backend
            .fetch_profile(&current.id, token.as_deref())
            .await?
        else {
            return Ok(current);
        };

        self.update_profile(ProfileUpdate {
            display_name: remote.name.filter(|name| !name.is_empty()),
            profile_pic_url: remote.avatar,
            music_preferences: remote.music_preferences,
            ..ProfileUpdate::default()
        })
    }

    pub async fn reset_password(
        &self,
        email: &str,
    ) -> Result<(), SessionError> {
        validate::check_email(email)?;
        self.backend.reset_password(email).await
    }

    /// Ends the session locally even when the server cannot be reached.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let record = self.store.load()?;
        let username = record
            .username
            .or(record.display_name)
            .unwrap_or_default();

        if let Err(err) = self
            .backend
            .logout(record.token.as_deref(), &username)
            .await
        {
            warn!(error = %err, "server logout failed, signing out locally");
            self.events.publish(SessionEvent::Error(err.to_string()));
        }

        self.store.clear_session()?;
        self.publish_profile(None);
        self.publish_auth(AuthState::NotAuthenticated);
        info!("signed out");
        Ok(())
    }

    /// Waits for revocations started by social sign-ins.
    pub async fn settle(&self) {
        let tasks = std::mem::take(
            &mut *self
                .revocations
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "token revocation task failed");
            }
        }
    }

    fn revoke_replaced_token(&self) -> Result<(), SessionError> {
        let record = self.store.load()?;
        let Some(token) = record.token else {
            return Ok(());
        };
        let username = record
            .username
            .or(record.display_name)
            .unwrap_or_default();

        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime, replaced server token stays valid");
            self.events.publish(SessionEvent::Error(
                "Previous server session was not revoked".into(),
            ));
            return Ok(());
        };

        let backend = self.backend.clone();
        let events = self.events.clone();
        let task = runtime.spawn(async move {
            if let Err(err) = backend.logout(Some(&token), &username).await {
                warn!(error = %err, "revoking replaced session failed");
                events.publish(SessionEvent::Error(err.to_string()));
            }
        });
        self.revocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        Ok(())
    }

    fn establish(&self, grant: AuthGrant) -> Result<(), SessionError> {
        self.store.save_identity(
            grant.token.as_deref(),
            &grant.username,
            &grant.profile,
        )?;
        info!(user_id = %grant.profile.id, "signed in");
        self.publish_profile(Some(grant.profile));
        self.publish_auth(AuthState::Authenticated);
        Ok(())
    }

    fn publish_auth(&self, state: AuthState) {
        if self.auth_state.set(state) {
            self.events.publish(SessionEvent::AuthStateChanged(state));
        }
    }

    fn publish_profile(&self, profile: Option<UserProfile>) {
        if self.profile.set(profile.clone()) {
            self.events.publish(SessionEvent::ProfileUpdated(profile));
        }
    }
}
