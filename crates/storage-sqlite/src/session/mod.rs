//! File-backed session preferences.
//!
//! A small JSON object under the app data dir holding the bearer token and
//! profile fields. Whole-file rewrite per mutation; a tokio mutex serializes
//! writers within the process.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use turismo_core::session::SessionStore;
use turismo_core::{Error, Result};

const PREFS_FILE_NAME: &str = "session_prefs.json";

pub struct PrefsSessionStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl PrefsSessionStore {
    pub fn new(app_data_dir: &str) -> Result<Self> {
        std::fs::create_dir_all(app_data_dir)
            .map_err(|e| Error::Session(format!("cannot create app data dir: {}", e)))?;
        Ok(Self {
            path: Path::new(app_data_dir).join(PREFS_FILE_NAME),
            guard: Mutex::new(()),
        })
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Map<String, Value>>(&bytes)
                .map_err(|e| Error::Session(format!("corrupt session file: {}", e))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(Error::Session(err.to_string())),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec(map).map_err(|e| Error::Session(e.to_string()))?;
        std::fs::write(&self.path, bytes).map_err(|e| Error::Session(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for PrefsSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.guard.lock().await;
        Ok(self
            .read_map()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.guard.lock().await;
        debug!("clearing session preferences");
        self.write_map(&Map::new())
    }
}
