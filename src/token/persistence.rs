//! Credential Persistence
//!
//! Durable write-back of renewed credentials to the env file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::builders::keys;
use crate::error::{BullhornError, BullhornResult, StorageError};
use crate::types::CredentialSet;

/// Credential persistence interface.
#[async_trait]
pub trait CredentialPersistence: Send + Sync {
    /// Persist a freshly renewed credential set.
    async fn persist(&self, credentials: &CredentialSet) -> BullhornResult<()>;
}

/// Key/value pairs written for a credential set.
pub fn credential_entries(credentials: &CredentialSet) -> Vec<(&'static str, String)> {
    let mut entries = vec![
        (keys::ACCESS_TOKEN, credentials.access_token().to_string()),
        (keys::REFRESH_TOKEN, credentials.refresh_token().to_string()),
        (keys::REST_TOKEN, credentials.session_token().to_string()),
    ];
    if let Ok(corp) = credentials.corp_token() {
        entries.push((keys::CORP_TOKEN, corp));
    }
    entries.push((keys::REST_URL, credentials.rest_url().to_string()));
    entries
}

/// Env file rewritten in place.
///
/// Lines whose key is being written are replaced where they stand. Every
/// other line is kept verbatim. Keys not present yet are appended. Clones
/// share one write lock, so concurrent updates apply one after another.
#[derive(Clone, Debug)]
pub struct EnvFileStore {
    path: PathBuf,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `updates` into the file, creating it if missing.
    pub async fn update<K, V>(&self, updates: &[(K, V)]) -> BullhornResult<()>
    where
        K: AsRef<str> + Sync,
        V: AsRef<str> + Sync,
    {
        let _guard = self.write_lock.lock().await;
        let existing = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(BullhornError::Storage(StorageError::ReadFailed {
                    path: self.path.display().to_string(),
                    message: e.to_string(),
                }))
            }
        };

        let rewritten = rewrite_env(&existing, updates);

        let tmp = self.path.with_extension("tmp");
        let write_failed = |e: std::io::Error| {
            BullhornError::Storage(StorageError::WriteFailed {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
        };
        tokio::fs::write(&tmp, rewritten).await.map_err(write_failed)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(write_failed)?;

        tracing::debug!(path = %self.path.display(), keys = updates.len(), "Env file updated");
        Ok(())
    }
}

#[async_trait]
impl CredentialPersistence for EnvFileStore {
    async fn persist(&self, credentials: &CredentialSet) -> BullhornResult<()> {
        self.update(&credential_entries(credentials)).await
    }
}

/// Apply `updates` to dotenv `contents`.
///
/// Line endings are kept as found; appended lines follow the file's
/// convention.
pub fn rewrite_env<K, V>(contents: &str, updates: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut written = vec![false; updates.len()];
    let mut lines: Vec<String> = Vec::new();
    let appended_cr = if contents.contains("\r\n") { "\r" } else { "" };

    let body = contents.strip_suffix('\n').unwrap_or(contents);
    let raw_lines = body.split('\n').filter(|_| !contents.is_empty());
    for raw in raw_lines {
        let (line, cr) = match raw.strip_suffix('\r') {
            Some(line) => (line, "\r"),
            None => (raw, ""),
        };
        let position = line_key(line).and_then(|key| {
            updates
                .iter()
                .position(|(candidate, _)| candidate.as_ref() == key)
        });

        match position {
            Some(index) => {
                let (key, value) = &updates[index];
                lines.push(format!("{}{}", format_entry(key.as_ref(), value.as_ref()), cr));
                written[index] = true;
            }
            None => lines.push(raw.to_string()),
        }
    }

    for (index, (key, value)) in updates.iter().enumerate() {
        if !written[index] {
            lines.push(format!(
                "{}{}",
                format_entry(key.as_ref(), value.as_ref()),
                appended_cr
            ));
        }
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, _) = trimmed.split_once('=')?;
    Some(key.trim())
}

fn format_entry(key: &str, value: &str) -> String {
    if value.contains(|c: char| c.is_whitespace() || c == '#' || c == '"') {
        format!("{}=\"{}\"", key, value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        format!("{}={}", key, value)
    }
}

/// In-memory persistence for tests.
#[derive(Default)]
pub struct InMemoryPersistence {
    writes: Mutex<Vec<Vec<(&'static str, String)>>>,
    fail: Mutex<bool>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent persist fail.
    pub fn set_failing(&self, fail: bool) -> &Self {
        *self.fail.lock().unwrap_or_else(PoisonError::into_inner) = fail;
        self
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> Vec<Vec<(&'static str, String)>> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CredentialPersistence for InMemoryPersistence {
    async fn persist(&self, credentials: &CredentialSet) -> BullhornResult<()> {
        if *self.fail.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(BullhornError::Storage(StorageError::WriteFailed {
                path: "memory".to_string(),
                message: "persistence disabled".to_string(),
            }));
        }
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(credential_entries(credentials));
        Ok(())
    }
}
