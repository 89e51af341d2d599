use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::state::{InfoBlock, UserProfile};
use crate::config::{Config, StoreBackend};

pub const KEYRING_SERVICE: &str = "musicroom";

pub mod keys {
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const USER_ID: &str = "user_id";
    pub const USERNAME: &str = "username";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const EMAIL: &str = "email";
    pub const PROFILE_PIC_URL: &str = "profile_pic_url";
    pub const MUSIC_PREFERENCES: &str = "music_preferences";
    pub const PUBLIC_INFO: &str = "public_info";
    pub const FRIENDS_ONLY_INFO: &str = "friends_only_info";
    pub const PRIVATE_INFO: &str = "private_info";
    pub const IS_AUTHENTICATED: &str = "is_authenticated";

    pub const ALL: &[&str] = &[
        AUTH_TOKEN,
        USER_ID,
        USERNAME,
        DISPLAY_NAME,
        EMAIL,
        PROFILE_PIC_URL,
        MUSIC_PREFERENCES,
        PUBLIC_INFO,
        FRIENDS_ONLY_INFO,
        PRIVATE_INFO,
        IS_AUTHENTICATED,
    ];
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session data: {0}")]
    Serde(#[from] serde_json::Error),

    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Store backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Str(_) => None,
        }
    }
}

/// A set of edits committed together. `None` removes the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    edits: Vec<(String, Option<Value>)>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_string(mut self, key: &str, value: impl Into<String>) -> Self {
        self.edits
            .push((key.to_string(), Some(Value::Str(value.into()))));
        self
    }

    pub fn put_bool(mut self, key: &str, value: bool) -> Self {
        self.edits.push((key.to_string(), Some(Value::Bool(value))));
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.edits.push((key.to_string(), None));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn edits(&self) -> &[(String, Option<Value>)] {
        &self.edits
    }

    fn apply_to(self, entries: &mut BTreeMap<String, Value>) {
        for (key, value) in self.edits {
            match value {
                Some(value) => {
                    entries.insert(key, value);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
    }
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn apply(&self, batch: Batch) -> Result<(), StoreError>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries =
            self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn apply(&self, batch: Batch) -> Result<(), StoreError> {
        let mut entries =
            self.entries.write().unwrap_or_else(PoisonError::into_inner);
        batch.apply_to(&mut entries);
        Ok(())
    }
}

/// JSON document on disk, rewritten in full on every batch.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, Value>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                match serde_json::from_str(&contents) {
                    Ok(entries) => entries,
                    Err(err) => {
                        let backup = corrupt_path(&path);
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "unreadable session file, starting empty"
                        );
                        fs::rename(&path, &backup)?;
                        BTreeMap::new()
                    }
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!(
            path = %path.display(),
            keys = entries.len(),
            "opened session file"
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(
        &self,
        entries: &BTreeMap<String, Value>,
    ) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        write_private(&tmp_path, contents.as_bytes())?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries =
            self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn apply(&self, batch: Batch) -> Result<(), StoreError> {
        let mut entries =
            self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        batch.apply_to(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

/// `session.json` -> `session.json.corrupt`
fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// One OS credential-store entry per key. Batches are applied key by
/// key; the platform store offers no transaction.
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
pub struct KeyringStore {
    service: String,
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, StoreError> {
        Ok(keyring::Entry::new(&self.service, key)?)
    }
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn apply(&self, batch: Batch) -> Result<(), StoreError> {
        for (key, value) in batch.edits {
            let entry = self.entry(&key)?;
            match value {
                Some(value) => {
                    entry.set_password(&serde_json::to_string(&value)?)?
                }
                None => match entry.delete_credential() {
                    Ok(()) | Err(keyring::Error::NoEntry) => {}
                    Err(err) => return Err(err.into()),
                },
            }
        }
        Ok(())
    }
}

pub fn open_store(
    config: &Config,
) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match config.store {
        StoreBackend::File => {
            Ok(Arc::new(FileStore::open(config.session_path())?))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(any(
            target_os = "linux",
            target_os = "macos",
            target_os = "windows"
        ))]
        StoreBackend::Keyring => {
            Ok(Arc::new(KeyringStore::new(KEYRING_SERVICE)))
        }
        #[cfg(not(any(
            target_os = "linux",
            target_os = "macos",
            target_os = "windows"
        )))]
        StoreBackend::Keyring => Err(StoreError::Unavailable(
            "no keyring support on this platform".into(),
        )),
    }
}

/// Everything persisted about the current (or last) session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub profile_pic_url: Option<String>,
    pub music_preferences: Vec<String>,
    pub public_info: InfoBlock,
    pub friends_only_info: InfoBlock,
    pub private_info: InfoBlock,
    pub authenticated: bool,
}

impl SessionRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
            display_name: self.display_name.clone().unwrap_or_default(),
            profile_pic_url: self.profile_pic_url.clone().unwrap_or_default(),
            public_info: self.public_info.clone(),
            friends_only_info: self.friends_only_info.clone(),
            private_info: self.private_info.clone(),
            music_preferences: self.music_preferences.clone(),
        }
    }
}

/// Typed view over a [`KeyValueStore`] using the session keys.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn load(&self) -> Result<SessionRecord, StoreError> {
        let display_name = match self.get_string(keys::DISPLAY_NAME)? {
            Some(name) => Some(name),
            None => self.get_string(keys::USERNAME)?,
        };

        Ok(SessionRecord {
            token: self.get_string(keys::AUTH_TOKEN)?,
            user_id: self.get_string(keys::USER_ID)?,
            username: self.get_string(keys::USERNAME)?,
            email: self.get_string(keys::EMAIL)?,
            display_name,
            profile_pic_url: self.get_string(keys::PROFILE_PIC_URL)?,
            music_preferences: parse_list(
                keys::MUSIC_PREFERENCES,
                self.get_string(keys::MUSIC_PREFERENCES)?,
            ),
            public_info: parse_block(
                keys::PUBLIC_INFO,
                self.get_string(keys::PUBLIC_INFO)?,
            ),
            friends_only_info: parse_block(
                keys::FRIENDS_ONLY_INFO,
                self.get_string(keys::FRIENDS_ONLY_INFO)?,
            ),
            private_info: parse_block(
                keys::PRIVATE_INFO,
                self.get_string(keys::PRIVATE_INFO)?,
            ),
            authenticated: self
                .backend
                .get(keys::IS_AUTHENTICATED)?
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        })
    }

    pub fn token(&self) -> Result<Option<String>, StoreError> {
        self.get_string(keys::AUTH_TOKEN)
    }

    pub fn stored_email(&self) -> Result<Option<String>, StoreError> {
        self.get_string(keys::EMAIL)
    }

    /// Persists a freshly authenticated identity. The token (or its
    /// absence) and the authenticated flag land in the same batch.
    pub fn save_identity(
        &self,
        token: Option<&str>,
        username: &str,
        profile: &UserProfile,
    ) -> Result<(), StoreError> {
        let batch = match token {
            Some(token) => Batch::new().put_string(keys::AUTH_TOKEN, token),
            None => Batch::new().remove(keys::AUTH_TOKEN),
        };
        let batch = profile_edits(batch, profile)?
            .put_string(keys::USER_ID, profile.id.as_str())
            .put_string(keys::EMAIL, profile.email.as_str())
            .put_string(keys::USERNAME, username)
            .put_bool(keys::IS_AUTHENTICATED, true);
        self.backend.apply(batch)
    }

    pub fn save_profile(
        &self,
        profile: &UserProfile,
    ) -> Result<(), StoreError> {
        self.backend.apply(profile_edits(Batch::new(), profile)?)
    }

    /// Drops the credential but keeps the identity fields.
    pub fn clear_session(&self) -> Result<(), StoreError> {
        self.backend.apply(
            Batch::new()
                .remove(keys::AUTH_TOKEN)
                .put_bool(keys::IS_AUTHENTICATED, false),
        )
    }

    pub fn wipe(&self) -> Result<(), StoreError> {
        let batch = keys::ALL
            .iter()
            .fold(Batch::new(), |batch, key| batch.remove(key));
        self.backend.apply(batch)
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .backend
            .get(key)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }
}

fn profile_edits(
    batch: Batch,
    profile: &UserProfile,
) -> Result<Batch, StoreError> {
    Ok(batch
        .put_string(keys::DISPLAY_NAME, profile.display_name.as_str())
        .put_string(keys::PROFILE_PIC_URL, profile.profile_pic_url.as_str())
        .put_string(
            keys::PUBLIC_INFO,
            serde_json::to_string(&profile.public_info)?,
        )
        .put_string(
            keys::FRIENDS_ONLY_INFO,
            serde_json::to_string(&profile.friends_only_info)?,
        )
        .put_string(
            keys::PRIVATE_INFO,
            serde_json::to_string(&profile.private_info)?,
        )
        .put_string(
            keys::MUSIC_PREFERENCES,
            serde_json::to_string(&profile.music_preferences)?,
        ))
}

/// Accepts a JSON array, or the `{"tag": true}` object form some older
/// clients wrote. Anything else reads as empty.
fn parse_list(key: &str, raw: Option<String>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .filter(|(_, v)| v.as_bool().unwrap_or(true))
            .map(|(k, _)| k)
            .collect(),
        _ => {
            warn!(key, "unreadable list in session store, using empty");
            Vec::new()
        }
    }
}

fn parse_block(key: &str, raw: Option<String>) -> InfoBlock {
    let Some(raw) = raw else {
        return InfoBlock::new();
    };

    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!(
            key,
            error = %err,
            "unreadable map in session store, using empty"
        );
        InfoBlock::new()
    })
}
