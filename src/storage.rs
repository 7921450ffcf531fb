use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::economy::Progress;
use crate::model::{User, WalletState};

pub const USER_KEY: &str = "minier_user";
pub const WALLET_KEY: &str = "minier_wallet";
pub const PROGRESS_KEY: &str = "minier_progress";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("malformed record: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid record: {0}")]
    Invalid(String),
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        fs::write(&tmp_path, value.as_bytes()).map_err(io_err)?;
        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            io_err(source)
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

// Clones share one map, so a second `App` sees what the first one saved.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: std::rc::Rc<std::cell::RefCell<std::collections::HashMap<String, String>>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// A stored `null` is the logged-out marker and parses to `None`.
pub fn parse_user(raw: &str) -> Result<Option<User>, StorageError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn parse_wallet(raw: &str) -> Result<WalletState, StorageError> {
    let wallet: WalletState = serde_json::from_str(raw)?;
    wallet.validate().map_err(StorageError::Invalid)?;
    Ok(wallet)
}

pub fn parse_progress(raw: &str) -> Result<Progress, StorageError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn or_default<T>(
    key: &str,
    record: Option<Result<T, StorageError>>,
    default: impl FnOnce() -> T,
) -> T {
    match record {
        Some(Ok(value)) => value,
        Some(Err(err)) => {
            tracing::warn!(key, error = %err, "stored record unusable, using default");
            default()
        }
        None => default(),
    }
}

pub struct Persistence {
    store: Box<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    fn read<T>(
        &self,
        key: &str,
        parse: impl FnOnce(&str) -> Result<T, StorageError>,
    ) -> Option<Result<T, StorageError>> {
        match self.store.get(key) {
            Ok(Some(raw)) => Some(parse(&raw)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }

    fn write<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json)
    }

    pub fn load_user(&self) -> Option<User> {
        or_default(USER_KEY, self.read(USER_KEY, parse_user), || None)
    }

    pub fn load_wallet(&self, now_ms: i64) -> WalletState {
        or_default(WALLET_KEY, self.read(WALLET_KEY, parse_wallet), || {
            WalletState::default_at(now_ms)
        })
    }

    pub fn load_progress(&self) -> Progress {
        or_default(
            PROGRESS_KEY,
            self.read(PROGRESS_KEY, parse_progress),
            Progress::default,
        )
    }

    pub fn save_user(&mut self, user: Option<&User>) -> Result<(), StorageError> {
        match user {
            Some(user) => self.write(USER_KEY, user),
            None => Ok(()),
        }
    }

    pub fn save_wallet(&mut self, wallet: &WalletState) -> Result<(), StorageError> {
        self.write(WALLET_KEY, wallet)
    }

    pub fn save_progress(&mut self, progress: &Progress) -> Result<(), StorageError> {
        self.write(PROGRESS_KEY, progress)
    }

    pub fn clear_user(&mut self) -> Result<(), StorageError> {
        self.store.remove(USER_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    #[test]
    fn wallet_survives_a_restart() {
        let store = MemoryStore::new();
        let mut persistence = Persistence::new(store.clone());
        let mut wallet = WalletState::new(7.25, 3.0, 1_000);
        for _ in 0..10 {
            wallet.accrue();
        }
        persistence.save_wallet(&wallet).unwrap();

        let reopened = Persistence::new(store);
        assert_eq!(reopened.load_wallet(99), wallet);
    }

    #[test]
    fn user_survives_a_restart_with_unknown_fields() {
        let mut store = MemoryStore::new();
        store
            .set(
                USER_KEY,
                r#"{"id":"abc","role":"user","name":"sari","avatar":"x.png"}"#,
            )
            .unwrap();
        let mut persistence = Persistence::new(store.clone());
        let user = persistence.load_user().expect("user");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.extra["avatar"], "x.png");

        persistence.save_user(Some(&user)).unwrap();
        let reloaded = Persistence::new(store).load_user().unwrap();
        assert_eq!(reloaded, user);
    }

    #[test]
    fn malformed_wallet_falls_back_to_default() {
        let mut store = MemoryStore::new();
        store.set(WALLET_KEY, "{balance: oops").unwrap();
        let wallet = Persistence::new(store).load_wallet(5_000);
        assert_eq!(wallet, WalletState::default_at(5_000));
        assert_eq!(wallet.balance, 1.0);
        assert_eq!(wallet.hashrate, 1.0);
        assert_eq!(wallet.accumulated_mined(), 0.0);
    }

    #[test]
    fn out_of_range_wallet_falls_back_to_default() {
        let mut store = MemoryStore::new();
        store
            .set(
                WALLET_KEY,
                r#"{"balance":2.0,"hashrate":-1.0,"lastClaimTime":0,"accumulatedMined":0.0}"#,
            )
            .unwrap();
        assert_eq!(
            Persistence::new(store).load_wallet(1),
            WalletState::default_at(1)
        );
    }

    #[test]
    fn negative_accumulator_is_rejected() {
        let raw = r#"{"balance":2.0,"hashrate":1.0,"lastClaimTime":0,"accumulatedMined":-0.5}"#;
        assert!(matches!(parse_wallet(raw), Err(StorageError::Invalid(_))));

        let mut store = MemoryStore::new();
        store.set(WALLET_KEY, raw).unwrap();
        assert_eq!(
            Persistence::new(store).load_wallet(3),
            WalletState::default_at(3)
        );
    }

    #[test]
    fn missing_records_use_defaults() {
        let persistence = Persistence::new(MemoryStore::new());
        assert!(persistence.load_user().is_none());
        assert_eq!(persistence.load_wallet(7), WalletState::default_at(7));
        assert_eq!(persistence.load_progress(), Progress::default());
    }

    #[test]
    fn corrupt_or_null_user_loads_as_absent() {
        let mut store = MemoryStore::new();
        store.set(USER_KEY, "not json").unwrap();
        assert!(Persistence::new(store.clone()).load_user().is_none());

        store.set(USER_KEY, "null").unwrap();
        assert!(Persistence::new(store).load_user().is_none());
    }

    #[test]
    fn saving_absent_user_is_a_noop_and_clear_removes_key() {
        let store = MemoryStore::new();
        let mut persistence = Persistence::new(store.clone());
        let user = User::new("id-1", "rina", Role::User);
        persistence.save_user(Some(&user)).unwrap();

        persistence.save_user(None).unwrap();
        assert!(store.get(USER_KEY).unwrap().is_some());

        persistence.clear_user().unwrap();
        assert!(store.get(USER_KEY).unwrap().is_none());
    }

    #[test]
    fn parse_errors_are_reported_not_panicked() {
        assert!(matches!(parse_wallet("[]"), Err(StorageError::Parse(_))));
        assert!(matches!(
            parse_wallet(r#"{"balance":1,"hashrate":0,"lastClaimTime":0,"accumulatedMined":0}"#),
            Err(StorageError::Invalid(_))
        ));
    }

    #[test]
    fn file_store_round_trips_and_removes() {
        let dir = std::env::temp_dir().join(format!("minier-test-{}", nanoid::nanoid!(10)));
        let mut store = FileStore::open(&dir).unwrap();
        assert_eq!(store.get(WALLET_KEY).unwrap(), None);

        store.set(WALLET_KEY, "{\"a\":1}").unwrap();
        assert_eq!(store.get(WALLET_KEY).unwrap().as_deref(), Some("{\"a\":1}"));
        assert!(dir.join("minier_wallet.json").exists());
        assert!(!dir.join("minier_wallet.json.tmp").exists());

        store.remove(WALLET_KEY).unwrap();
        store.remove(WALLET_KEY).unwrap();
        assert_eq!(store.get(WALLET_KEY).unwrap(), None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_store_reports_an_unusable_directory() {
        let blocker = std::env::temp_dir().join(format!("minier-file-{}", nanoid::nanoid!(10)));
        fs::write(&blocker, "not a directory").unwrap();

        let err = FileStore::open(blocker.join("data")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));

        let _ = fs::remove_file(&blocker);
    }
}
