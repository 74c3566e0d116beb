//! File-backed bearer credential

use crate::core::error::{Result, SandboxError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const TOKEN_KEY: &str = "token";

/// JSON object on disk; the credential lives under `"token"`
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl CredentialStore {
    /// Read the store at `path`; a missing file is an empty store
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Map::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored credential, or `Auth` when there is none
    pub fn token(&self) -> Result<&str> {
        self.entries
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SandboxError::Auth("no stored credential; run `login` first".into()))
    }

    pub fn has_token(&self) -> bool {
        self.token().is_ok()
    }

    pub fn set_token(&mut self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SandboxError::InvalidRequest("token is empty".into()));
        }
        self.entries.insert(TOKEN_KEY.into(), Value::String(token.to_string()));
        self.save()
    }

    /// Forget the credential, e.g. after the server rejected it
    pub fn invalidate(&mut self) -> Result<()> {
        if self.entries.remove(TOKEN_KEY).is_some() {
            tracing::info!("Cleared stored credential at {}", self.path.display());
            self.save()?;
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::load(dir.path().join("credentials.json")).unwrap();
        assert!(matches!(store.token(), Err(SandboxError::Auth(_))));
    }

    #[test]
    fn test_set_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");
        let mut store = CredentialStore::load(&path).unwrap();
        store.set_token(" abc123 ").unwrap();

        let reloaded = CredentialStore::load(&path).unwrap();
        assert_eq!(reloaded.token().unwrap(), "abc123");
    }

    #[test]
    fn test_invalidate_keeps_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"{"token":"abc","theme":"dark"}"#).unwrap();

        let mut store = CredentialStore::load(&path).unwrap();
        store.invalidate().unwrap();
        assert!(!store.has_token());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("dark"));
        assert!(!content.contains("abc"));
    }

    #[test]
    fn test_rejects_empty_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CredentialStore::load(dir.path().join("c.json")).unwrap();
        assert!(store.set_token("   ").is_err());
    }
}
