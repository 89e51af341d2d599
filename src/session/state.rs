use std::collections::BTreeMap;

use tokio::sync::watch;

pub type InfoBlock = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    NotAuthenticated,
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(self) -> bool {
        self == Self::Authenticated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialProvider {
    Google,
    Facebook,
}

impl SocialProvider {
    pub fn key(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Google => "Google User",
            Self::Facebook => "Facebook User",
        }
    }

    /// Placeholder identity for a social sign-in. There is no provider
    /// round-trip; the id only varies with the timestamp.
    pub fn placeholder_profile(self, now_millis: u64) -> UserProfile {
        let key = self.key();
        UserProfile::new(
            format!("{key}_user_{now_millis}"),
            format!("{key}_user@example.com"),
            self.display_name(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub profile_pic_url: String,
    pub public_info: InfoBlock,
    pub friends_only_info: InfoBlock,
    pub private_info: InfoBlock,
    pub music_preferences: Vec<String>,
}

impl UserProfile {
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    pub fn avatar(&self) -> Option<&str> {
        (!self.profile_pic_url.is_empty())
            .then_some(self.profile_pic_url.as_str())
    }

    /// Applies `update` over this profile. Fields the update leaves as
    /// `None` keep their current value; provided blocks replace the
    /// whole block.
    pub fn merged(&self, update: &ProfileUpdate) -> Self {
        let pick = |new: &Option<String>, old: &String| {
            new.clone().unwrap_or_else(|| old.clone())
        };
        let pick_block = |new: &Option<InfoBlock>, old: &InfoBlock| {
            new.clone().unwrap_or_else(|| old.clone())
        };

        Self {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: pick(&update.display_name, &self.display_name),
            profile_pic_url: pick(
                &update.profile_pic_url,
                &self.profile_pic_url,
            ),
            public_info: pick_block(&update.public_info, &self.public_info),
            friends_only_info: pick_block(
                &update.friends_only_info,
                &self.friends_only_info,
            ),
            private_info: pick_block(&update.private_info, &self.private_info),
            music_preferences: update
                .music_preferences
                .clone()
                .unwrap_or_else(|| self.music_preferences.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub profile_pic_url: Option<String>,
    pub public_info: Option<InfoBlock>,
    pub friends_only_info: Option<InfoBlock>,
    pub private_info: Option<InfoBlock>,
    pub music_preferences: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn profile_pic_url(mut self, url: impl Into<String>) -> Self {
        self.profile_pic_url = Some(url.into());
        self
    }

    pub fn music_preferences(mut self, preferences: Vec<String>) -> Self {
        self.music_preferences = Some(preferences);
        self
    }
}

/// Latest-value holder that observers can watch for changes.
#[derive(Debug)]
pub struct StateHolder<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone + PartialEq> StateHolder<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Stores `value`, waking subscribers only when it differs from the
    /// current one. Returns whether anything changed.
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}
