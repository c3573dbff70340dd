//! Secure local storage for the session token, the biometric credential and the
//! biometric preference.
//!
//! This module provides:
//! - A `SecureStorage` backend trait with a file-based and an in-memory backend
//! - `TokenStore`, `CredentialVault` and `BiometricPreference`, which swallow
//!   backend failures and behave as "value absent"

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

pub const TOKEN_KEY: &str = "auth_token";
pub const CREDENTIALS_KEY: &str = "biometric_credentials";
pub const BIOMETRIC_ENABLED_KEY: &str = "biometric_enabled";

/// Key/value backend for small secrets.
pub trait SecureStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

// ============================================
// File Backend
// ============================================

/// One file per key under a private directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

impl SecureStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))?;
        }

        // Write to a temp file then rename for atomicity
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value)?;

        // Owner-only before the value becomes visible under its real name
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ============================================
// Memory Backend
// ============================================

#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

/// Sanitize storage key for filesystem use
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}

// ============================================
// Typed Stores
// ============================================

/// The single opaque session token.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn SecureStorage>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn SecureStorage>) -> Self {
        Self { backend }
    }

    pub fn get(&self) -> Option<String> {
        match self.backend.get(TOKEN_KEY) {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "token read failed");
                None
            }
        }
    }

    pub fn set(&self, token: &str) {
        if let Err(err) = self.backend.set(TOKEN_KEY, token) {
            warn!(error = %err, "token write failed");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.backend.delete(TOKEN_KEY) {
            warn!(error = %err, "token delete failed");
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricCredential {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BiometricCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricCredential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The email/password pair replayed after a successful biometric challenge.
#[derive(Clone)]
pub struct CredentialVault {
    backend: Arc<dyn SecureStorage>,
}

impl CredentialVault {
    pub fn new(backend: Arc<dyn SecureStorage>) -> Self {
        Self { backend }
    }

    pub fn get(&self) -> Option<BiometricCredential> {
        let raw = match self.backend.get(CREDENTIALS_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "credential read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(credential) => Some(credential),
            Err(err) => {
                warn!(error = %err, "stored credential is malformed");
                None
            }
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.get().is_some()
    }

    pub fn set(&self, credential: &BiometricCredential) {
        let result = serde_json::to_string(credential)
            .map_err(StorageError::from)
            .and_then(|raw| self.backend.set(CREDENTIALS_KEY, &raw));
        if let Err(err) = result {
            warn!(error = %err, "credential write failed");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.backend.delete(CREDENTIALS_KEY) {
            warn!(error = %err, "credential delete failed");
        }
    }
}

/// Whether the user opted in to biometric login.
#[derive(Clone)]
pub struct BiometricPreference {
    backend: Arc<dyn SecureStorage>,
}

impl BiometricPreference {
    pub fn new(backend: Arc<dyn SecureStorage>) -> Self {
        Self { backend }
    }

    pub fn is_enabled(&self) -> bool {
        match self.backend.get(BIOMETRIC_ENABLED_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(err) => {
                warn!(error = %err, "biometric preference read failed");
                false
            }
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        let value = if enabled { "true" } else { "false" };
        if let Err(err) = self.backend.set(BIOMETRIC_ENABLED_KEY, value) {
            warn!(error = %err, "biometric preference write failed");
        }
    }
}
